//! Cache error types.

use thiserror::Error;

/// Errors raised by a [`CacheStore`](crate::CacheStore) or while encoding
/// cached values.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backing store could not be reached.
    #[error("cache store unavailable: {0}")]
    Unavailable(String),

    /// The backing store rejected the operation.
    #[error("cache store operation `{operation}` failed: {message}")]
    Store {
        /// The store operation (`get`, `set`, `remove`, `refresh`).
        operation: &'static str,
        /// Backend-specific detail.
        message: String,
    },

    /// A value could not be encoded or a cached entry could not be decoded.
    #[error("cache serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CacheError {
    /// Creates a store failure for the given operation.
    pub fn store(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Store {
            operation,
            message: message.into(),
        }
    }
}
