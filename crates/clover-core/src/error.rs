//! Error types for Clover Core

use std::fmt;

use thiserror::Error;

use crate::ids::{ChannelId, InterchangeId};

/// A single field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Path of the offending field, e.g. `interchanges[0].channels[1].url`
    pub field: String,
    /// Human readable reason
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Every failure found while validating a submitted configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError::new(field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    /// Whether any failure was recorded against `field`
    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("interchange not found: {0}")]
    InterchangeNotFound(String),

    #[error("channel not found: {0}")]
    ChannelNotFound(String),

    #[error("channel {channel} does not belong to interchange {interchange}")]
    OwnershipMismatch {
        channel: ChannelId,
        interchange: InterchangeId,
    },

    #[error("missing {0}")]
    MissingField(&'static str),

    #[error("Data integrity fault: {0}")]
    Integrity(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Expected failures are reported back to the caller verbatim; everything
    /// else is logged and collapsed into a generic internal error.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::Validation(_)
                | Error::InterchangeNotFound(_)
                | Error::ChannelNotFound(_)
                | Error::OwnershipMismatch { .. }
                | Error::MissingField(_)
                | Error::Serialization(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
