use thiserror::Error;

use crate::media::MediaError;

#[derive(Error, Debug)]
pub enum TubechanError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cannot resolve feed source: {0}")]
    Resolve(String),

    #[error("Listing error: {0}")]
    Listing(String),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Telegram {method} failed: {description}")]
    Telegram { method: String, description: String },

    #[error("Transcoder error: {0}")]
    Transcode(String),

    #[error("Cursor store error: {0}")]
    Store(String),

    #[error("Truncated download: expected about {expected} bytes, got {actual}")]
    Integrity { expected: u64, actual: u64 },

    #[error("{0}")]
    Other(String),
}

impl TubechanError {
    /// Configuration problems that will not go away by retrying.
    pub fn is_configuration(&self) -> bool {
        matches!(self, TubechanError::Config(_) | TubechanError::Resolve(_))
    }
}

pub type Result<T> = std::result::Result<T, TubechanError>;
