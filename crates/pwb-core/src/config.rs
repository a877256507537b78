use std::{
    env, fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use rust_decimal::Decimal;

use crate::{domain::ChatId, errors::Error, Result};

/// Spread applied to upstream prices after the first cycle (currency units).
pub const DEFAULT_PRICE_MARGIN: i64 = 1000;
/// Period between two price checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);
/// Upper bound for a single outbound HTTP request.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Typed configuration for the bot.
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub telegram_bot_token: String,
    pub admin_chat_id: ChatId,

    // Price source
    pub price_api_url: String,
    pub price_interval: String,
    pub price_direction: String,
    pub price_margin: Decimal,
    pub poll_interval: Duration,
    pub http_timeout: Duration,

    // Persistence
    pub data_dir: PathBuf,
    pub subscribers_file: PathBuf,
    pub snapshot_file: PathBuf,

    // Behavior flags
    pub reset_snapshot_on_start: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        // Required env vars
        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN")
            .and_then(non_empty)
            .ok_or_else(|| {
                Error::Config("TELEGRAM_BOT_TOKEN environment variable is required".to_string())
            })?;

        let admin_chat_id = env_str("ADMIN_CHAT_ID")
            .and_then(non_empty)
            .ok_or_else(|| {
                Error::Config("ADMIN_CHAT_ID environment variable is required".to_string())
            })?;
        let admin_chat_id = admin_chat_id.trim().parse::<i64>().map_err(|_| {
            Error::Config(format!("ADMIN_CHAT_ID is not a valid chat id: {admin_chat_id}"))
        })?;

        let price_api_url = env_str("PRICE_API_URL")
            .and_then(non_empty)
            .ok_or_else(|| {
                Error::Config("PRICE_API_URL environment variable is required".to_string())
            })?;

        // Price source selectors
        let price_interval = env_str("PRICE_INTERVAL")
            .and_then(non_empty)
            .unwrap_or_else(|| "daily".to_string());
        let price_direction = env_str("PRICE_DIRECTION")
            .and_then(non_empty)
            .unwrap_or_else(|| "buy".to_string());

        let price_margin = match env_str("PRICE_MARGIN").and_then(non_empty) {
            Some(raw) => Decimal::from_str(raw.trim())
                .map_err(|e| Error::Config(format!("PRICE_MARGIN is not a decimal: {e}")))?,
            None => Decimal::from(DEFAULT_PRICE_MARGIN),
        };
        if price_margin.is_sign_negative() {
            return Err(Error::Config("PRICE_MARGIN must not be negative".to_string()));
        }

        // Timeouts and intervals
        let poll_interval = env_u64("POLL_INTERVAL_SECS")
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_POLL_INTERVAL);
        let http_timeout = env_u64("HTTP_TIMEOUT_SECS")
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_HTTP_TIMEOUT);

        // Persistence
        let data_dir = env_path("DATA_DIR").unwrap_or_else(|| PathBuf::from("data"));
        let subscribers_file =
            env_path("SUBSCRIBERS_FILE").unwrap_or_else(|| data_dir.join("subscribers.json"));
        let snapshot_file =
            env_path("SNAPSHOT_FILE").unwrap_or_else(|| data_dir.join("price.json"));

        fs::create_dir_all(&data_dir)?;

        let reset_snapshot_on_start = env_bool("RESET_SNAPSHOT_ON_START").unwrap_or(true);

        Ok(Self {
            telegram_bot_token,
            admin_chat_id: ChatId(admin_chat_id),
            price_api_url,
            price_interval,
            price_direction,
            price_margin,
            poll_interval,
            http_timeout,
            data_dir,
            subscribers_file,
            snapshot_file,
            reset_snapshot_on_start,
        })
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| parse_bool(&s))
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
