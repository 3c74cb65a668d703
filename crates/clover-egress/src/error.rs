//! Egress error types

use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EgressError>;

#[derive(Debug, Error)]
pub enum EgressError {
    #[error("Invalid channel URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to encode form body: {0}")]
    Encode(#[from] serde_urlencoded::ser::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl EgressError {
    /// Whether the request deadline elapsed
    pub fn is_timeout(&self) -> bool {
        matches!(self, EgressError::Timeout(_))
    }
}
