//! Price data model and the price-source port.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{errors::Error, Result};

/// Query parameters understood by the upstream price API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PriceQuery {
    /// Interval selector (e.g. `daily`).
    pub interval: String,
    /// Trade-direction selector (e.g. `buy`).
    pub direction: String,
}

/// Raw upstream payload. Fields are optional so that shape checks happen in one place
/// ([`Snapshot::from_response`]) instead of inside serde.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PriceResponse {
    #[serde(default)]
    pub data: Vec<PriceEntry>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PriceEntry {
    #[serde(default)]
    pub buy_price: Option<Decimal>,
    #[serde(default)]
    pub sell_price: Option<Decimal>,
    #[serde(default)]
    pub last_update: Option<String>,
}

/// Port for fetching the current price list.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch(&self, query: &PriceQuery) -> Result<PriceResponse>;
}

/// The most recently recorded price pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub buy: Decimal,
    pub sell: Decimal,
    /// Upstream "last update" time, never generated locally.
    pub updated_at: DateTime<FixedOffset>,
}

impl Snapshot {
    /// Build a candidate snapshot from the first entry of an upstream response.
    pub fn from_response(res: &PriceResponse) -> Result<Self> {
        let entry = res
            .data
            .first()
            .ok_or_else(|| Error::Validation("price list is empty".to_string()))?;

        let buy = entry
            .buy_price
            .ok_or_else(|| Error::Validation("missing buy price".to_string()))?;
        let sell = entry
            .sell_price
            .ok_or_else(|| Error::Validation("missing sell price".to_string()))?;
        let raw_ts = entry
            .last_update
            .as_deref()
            .ok_or_else(|| Error::Validation("missing last update".to_string()))?;

        if buy.is_sign_negative() || sell.is_sign_negative() {
            return Err(Error::Validation(format!(
                "negative price (buy={buy}, sell={sell})"
            )));
        }

        Ok(Self {
            buy,
            sell,
            updated_at: parse_upstream_time(raw_ts)?,
        })
    }

    /// Quoted retail prices: buy lowered and sell raised by `margin`.
    ///
    /// Prices too large to adjust are rejected as [`Error::Validation`].
    pub fn with_margin(&self, margin: Decimal) -> Result<Self> {
        let buy = self.buy.checked_sub(margin).ok_or_else(|| {
            Error::Validation(format!("buy price {} out of range for margin", self.buy))
        })?;
        let sell = self.sell.checked_add(margin).ok_or_else(|| {
            Error::Validation(format!("sell price {} out of range for margin", self.sell))
        })?;
        Ok(Self {
            buy,
            sell,
            updated_at: self.updated_at,
        })
    }
}

/// Parse an upstream timestamp. Accepts RFC3339 or a naive `YYYY-MM-DD HH:MM:SS`
/// (interpreted as UTC).
pub fn parse_upstream_time(raw: &str) -> Result<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt);
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(Utc.from_utc_datetime(&naive).fixed_offset());
        }
    }
    Err(Error::Validation(format!("unrecognized last update: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    fn entry(buy: Option<i64>, sell: Option<i64>, ts: Option<&str>) -> PriceEntry {
        PriceEntry {
            buy_price: buy.map(Decimal::from),
            sell_price: sell.map(Decimal::from),
            last_update: ts.map(str::to_string),
        }
    }

    #[test]
    fn takes_first_entry_of_price_list() {
        let res = PriceResponse {
            data: vec![
                entry(Some(100_000), Some(95_000), Some("2024-05-01T08:30:00+07:00")),
                entry(Some(1), Some(1), Some("2024-04-30T08:30:00+07:00")),
            ],
        };
        let snap = Snapshot::from_response(&res).unwrap();
        assert_eq!(snap.buy, Decimal::from(100_000));
        assert_eq!(snap.sell, Decimal::from(95_000));
        assert_eq!(snap.updated_at.day(), 1);
    }

    #[test]
    fn rejects_empty_and_incomplete_payloads() {
        let empty = PriceResponse::default();
        assert!(matches!(
            Snapshot::from_response(&empty),
            Err(Error::Validation(_))
        ));

        for e in [
            entry(None, Some(1), Some("2024-05-01 00:00:00")),
            entry(Some(1), None, Some("2024-05-01 00:00:00")),
            entry(Some(1), Some(1), None),
            entry(Some(1), Some(1), Some("yesterday")),
        ] {
            let res = PriceResponse { data: vec![e] };
            assert!(matches!(
                Snapshot::from_response(&res),
                Err(Error::Validation(_))
            ));
        }
    }

    #[test]
    fn deserializes_numbers_and_numeric_strings() {
        let res: PriceResponse = serde_json::from_str(
            r#"{"status":"ok","data":[{"buy_price":"100000.50","sell_price":95000,"last_update":"2024-05-01 10:00:00"}]}"#,
        )
        .unwrap();
        let snap = Snapshot::from_response(&res).unwrap();
        assert_eq!(snap.buy, Decimal::new(10_000_050, 2));
        assert_eq!(snap.sell, Decimal::from(95_000));
    }

    #[test]
    fn margin_lowers_buy_and_raises_sell() {
        let snap = Snapshot {
            buy: Decimal::from(100_000),
            sell: Decimal::from(95_000),
            updated_at: parse_upstream_time("2024-05-01 10:00:00").unwrap(),
        };
        let quoted = snap.with_margin(Decimal::from(1000)).unwrap();
        assert_eq!(quoted.buy, Decimal::from(99_000));
        assert_eq!(quoted.sell, Decimal::from(96_000));
        assert_eq!(quoted.updated_at, snap.updated_at);
    }

    #[test]
    fn margin_overflow_is_a_validation_error() {
        let ts = parse_upstream_time("2024-05-01 10:00:00").unwrap();
        let huge_sell = Snapshot {
            buy: Decimal::from(100_000),
            sell: Decimal::MAX,
            updated_at: ts,
        };
        assert!(matches!(
            huge_sell.with_margin(Decimal::from(1000)),
            Err(Error::Validation(_))
        ));

        let huge_buy = Snapshot {
            buy: Decimal::MIN,
            sell: Decimal::from(95_000),
            updated_at: ts,
        };
        assert!(matches!(
            huge_buy.with_margin(Decimal::from(1000)),
            Err(Error::Validation(_))
        ));
    }
}
