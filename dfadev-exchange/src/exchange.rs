//! Named key-value exchange.
//!
//! The exchange only ever carries snapshot blobs from an outgoing process to
//! its replacement: publish overwrites, and a consumer deletes what it has
//! retrieved.

use crate::error::ExchangeError;
use parking_lot::RwLock;
use std::collections::HashMap;

/// A named blob store shared across a live-update handoff.
pub trait Exchange: Send + Sync {
    /// Stores `value` under `key`, replacing any previous value.
    fn publish(&self, key: &str, value: &[u8]) -> Result<(), ExchangeError>;

    /// Returns the value stored under `key`.
    fn retrieve(&self, key: &str) -> Result<Vec<u8>, ExchangeError>;

    /// Removes `key`. Removing an absent key is `NotFound`.
    fn delete(&self, key: &str) -> Result<(), ExchangeError>;

    /// Checks whether `key` is present.
    fn contains(&self, key: &str) -> Result<bool, ExchangeError> {
        match self.retrieve(key) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Keys are restricted so every backend can store them verbatim.
pub(crate) fn validate_key(key: &str) -> Result<(), ExchangeError> {
    let valid = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if valid {
        Ok(())
    } else {
        Err(ExchangeError::InvalidKey(key.to_string()))
    }
}

/// In-process exchange.
#[derive(Debug, Default)]
pub struct MemoryExchange {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryExchange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

impl Exchange for MemoryExchange {
    fn publish(&self, key: &str, value: &[u8]) -> Result<(), ExchangeError> {
        validate_key(key)?;
        self.blobs.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn retrieve(&self, key: &str) -> Result<Vec<u8>, ExchangeError> {
        self.blobs
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| ExchangeError::NotFound(key.to_string()))
    }

    fn delete(&self, key: &str) -> Result<(), ExchangeError> {
        self.blobs
            .write()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| ExchangeError::NotFound(key.to_string()))
    }
}
