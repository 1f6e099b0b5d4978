//! Exchange error types.

use thiserror::Error;

/// Errors from an exchange backend.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("key not found: {0}")]
    NotFound(String),

    #[error("invalid key: {0:?}")]
    InvalidKey(String),

    #[error("unsupported blob format version {version} for '{key}'")]
    UnsupportedFormat { key: String, version: u16 },

    #[error("data corruption: {0}")]
    Corruption(String),

    #[error("core error: {0}")]
    Core(#[from] dfadev_core::CoreError),
}

impl ExchangeError {
    /// Returns whether the key was simply absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ExchangeError::NotFound(_))
    }
}
