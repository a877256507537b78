//! Upstream price API adapter.
//!
//! Implements the `pwb-core` [`PriceSource`] port over HTTP GET with JSON responses.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use pwb_core::{
    errors::Error,
    price::{PriceQuery, PriceResponse, PriceSource},
    Result,
};

const INTERVAL_PARAM: &str = "interval";
const DIRECTION_PARAM: &str = "type";
const MAX_ERROR_BODY: usize = 200;

#[derive(Clone, Debug)]
pub struct HttpPriceSource {
    url: String,
    http: reqwest::Client,
}

impl HttpPriceSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("http client build failed: {e}")))?;
        Ok(Self {
            url: url.into(),
            http,
        })
    }
}

fn query_pairs(query: &PriceQuery) -> [(&'static str, &str); 2] {
    [
        (INTERVAL_PARAM, query.interval.as_str()),
        (DIRECTION_PARAM, query.direction.as_str()),
    ]
}

fn decode_body(body: &str) -> Result<PriceResponse> {
    serde_json::from_str(body).map_err(|e| Error::Validation(format!("price json error: {e}")))
}

#[async_trait]
impl PriceSource for HttpPriceSource {
    async fn fetch(&self, query: &PriceQuery) -> Result<PriceResponse> {
        let resp = self
            .http
            .get(&self.url)
            .query(&query_pairs(query))
            .send()
            .await
            .map_err(|e| Error::Transport(format!("price request error: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::Transport(format!("price body error: {e}")))?;

        if !status.is_success() {
            return Err(Error::Transport(format!(
                "price api returned {status}: {}",
                body.chars().take(MAX_ERROR_BODY).collect::<String>()
            )));
        }

        debug!(bytes = body.len(), "price response received");
        decode_body(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_map_to_query_parameters() {
        let q = PriceQuery {
            interval: "daily".to_string(),
            direction: "sell".to_string(),
        };
        assert_eq!(query_pairs(&q), [("interval", "daily"), ("type", "sell")]);
    }

    #[test]
    fn decodes_price_list_ignoring_extra_fields() {
        let res = decode_body(
            r#"{"code":200,"data":[{"buy_price":1020000,"sell_price":"935000","last_update":"2024-05-01 08:00:00","unit":"gram"}]}"#,
        )
        .unwrap();
        assert_eq!(res.data.len(), 1);
        assert!(res.data[0].buy_price.is_some());
        assert!(res.data[0].sell_price.is_some());
    }

    #[test]
    fn non_json_body_is_a_validation_error() {
        assert!(matches!(
            decode_body("<html>maintenance</html>"),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn builds_client_with_timeout() {
        let src = HttpPriceSource::new("http://localhost/prices", Duration::from_secs(1)).unwrap();
        assert_eq!(src.url, "http://localhost/prices");
    }
}
