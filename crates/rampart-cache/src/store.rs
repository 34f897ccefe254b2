//! The cache store contract.

use async_trait::async_trait;
use std::time::Duration;

use crate::CacheError;

/// Expiration settings for a single cache entry.
///
/// An entry with neither field set never expires on its own; the
/// [`CacheService`](crate::CacheService) substitutes configured defaults
/// before such an entry reaches a store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheEntryOptions {
    /// Evict after this long without a read or refresh.
    pub sliding_expiration: Option<Duration>,
    /// Evict this long after the write, regardless of access.
    pub absolute_expiration_relative_to_now: Option<Duration>,
}

impl CacheEntryOptions {
    /// Returns `true` if no expiration is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sliding_expiration.is_none() && self.absolute_expiration_relative_to_now.is_none()
    }
}

/// A byte-oriented key/value cache, usually backed by a distributed store.
///
/// Implementations own their expiry. The pipeline never invalidates entries
/// explicitly after a write.
#[async_trait]
pub trait CacheStore: Send + Sync + 'static {
    /// Reads the entry for `key`. A read counts as access for sliding expiry.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Writes `value` under `key`, replacing any previous entry.
    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        options: CacheEntryOptions,
    ) -> Result<(), CacheError>;

    /// Removes the entry for `key` if present.
    async fn remove(&self, key: &str) -> Result<(), CacheError>;

    /// Resets the sliding expiration of `key` without reading it.
    async fn refresh(&self, key: &str) -> Result<(), CacheError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_options() {
        assert!(CacheEntryOptions::default().is_empty());
        assert!(!CacheEntryOptions {
            sliding_expiration: Some(Duration::from_secs(60)),
            ..Default::default()
        }
        .is_empty());
    }
}
