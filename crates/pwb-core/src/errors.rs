use std::path::PathBuf;

/// Core error type for the price watch bot.
///
/// Adapter crates map their specific errors into this type so the tick handler
/// and the command handler can treat failures consistently.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid payload: {0}")]
    Validation(String),

    #[error("persistence error: {path}: {reason}")]
    Persistence { path: PathBuf, reason: String },
}

impl Error {
    pub fn persistence(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self::Persistence {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
