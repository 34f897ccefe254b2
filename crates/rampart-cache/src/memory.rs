//! In-process cache store.
//!
//! Useful for tests and single-instance deployments. Expiry is evaluated
//! lazily on access and when the store is full.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use crate::{CacheEntryOptions, CacheError, CacheStore};

/// Configuration for the in-memory store.
#[derive(Debug, Clone)]
pub struct MemoryCacheConfig {
    /// Maximum number of entries in the store.
    pub max_entries: usize,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Vec<u8>,
    created_at: Instant,
    last_access: Instant,
    sliding: Option<Duration>,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(value: Vec<u8>, options: CacheEntryOptions, now: Instant) -> Self {
        Self {
            value,
            created_at: now,
            last_access: now,
            sliding: options.sliding_expiration,
            expires_at: options.absolute_expiration_relative_to_now.map(|d| now + d),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        if self.expires_at.is_some_and(|at| now >= at) {
            return true;
        }
        self.sliding
            .is_some_and(|window| now.duration_since(self.last_access) >= window)
    }
}

/// Store statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of reads that found a live entry.
    pub hits: u64,
    /// Number of reads that found nothing.
    pub misses: u64,
    /// Number of entries currently held, live or not yet reaped.
    pub size: usize,
    /// Number of entries dropped for expiry or capacity.
    pub evictions: u64,
}

/// A [`CacheStore`] held in process memory.
///
/// # Example
///
/// ```
/// use rampart_cache::{CacheEntryOptions, CacheStore, MemoryCacheStore};
///
/// # tokio_test::block_on(async {
/// let store = MemoryCacheStore::new();
/// store.set("k", b"v".to_vec(), CacheEntryOptions::default()).await.unwrap();
/// assert_eq!(store.get("k").await.unwrap(), Some(b"v".to_vec()));
/// # });
/// ```
#[derive(Debug)]
pub struct MemoryCacheStore {
    config: MemoryCacheConfig,
    entries: DashMap<String, CacheEntry>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCacheStore {
    /// Creates a store with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MemoryCacheConfig::default())
    }

    /// Creates a store with the given configuration.
    #[must_use]
    pub fn with_config(config: MemoryCacheConfig) -> Self {
        Self {
            config,
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Returns store statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size: self.entries.len(),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    fn read(&self, key: &str, now: Instant) -> Option<Vec<u8>> {
        if let Some(mut entry) = self.entries.get_mut(key) {
            if !entry.is_expired(now) {
                entry.last_access = now;
                return Some(entry.value.clone());
            }
        }

        if self
            .entries
            .remove_if(key, |_, entry| entry.is_expired(now))
            .is_some()
        {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        None
    }

    fn make_room(&self, now: Instant) {
        if self.entries.len() < self.config.max_entries {
            return;
        }

        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let reaped = before.saturating_sub(self.entries.len());
        self.evictions.fetch_add(reaped as u64, Ordering::Relaxed);

        while self.entries.len() >= self.config.max_entries {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|entry| entry.created_at)
                .map(|entry| entry.key().clone());

            match oldest {
                Some(key) => {
                    self.entries.remove(&key);
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                }
                None => break,
            }
        }
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let value = self.read(key, Instant::now());
        let counter = if value.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        Ok(value)
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        options: CacheEntryOptions,
    ) -> Result<(), CacheError> {
        if self.config.max_entries == 0 {
            return Ok(());
        }

        let now = Instant::now();
        if !self.entries.contains_key(key) {
            self.make_room(now);
        }
        self.entries
            .insert(key.to_string(), CacheEntry::new(value, options, now));
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn refresh(&self, key: &str) -> Result<(), CacheError> {
        let now = Instant::now();
        if let Some(mut entry) = self.entries.get_mut(key) {
            if !entry.is_expired(now) {
                entry.last_access = now;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sliding(secs: u64) -> CacheEntryOptions {
        CacheEntryOptions {
            sliding_expiration: Some(Duration::from_secs(secs)),
            absolute_expiration_relative_to_now: None,
        }
    }

    fn absolute(secs: u64) -> CacheEntryOptions {
        CacheEntryOptions {
            sliding_expiration: None,
            absolute_expiration_relative_to_now: Some(Duration::from_secs(secs)),
        }
    }

    #[tokio::test]
    async fn test_hit_miss() {
        let store = MemoryCacheStore::new();

        assert!(store.get("k").await.unwrap().is_none());

        store.set("k", b"v".to_vec(), sliding(60)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(b"v".to_vec()));

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sliding_expiration_extends_on_read() {
        let store = MemoryCacheStore::new();
        store.set("k", b"v".to_vec(), sliding(60)).await.unwrap();

        tokio::time::advance(Duration::from_secs(45)).await;
        assert!(store.get("k").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(45)).await;
        assert!(store.get("k").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(store.get("k").await.unwrap().is_none());
        assert_eq!(store.stats().evictions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_absolute_expiration_ignores_access() {
        let store = MemoryCacheStore::new();
        store.set("k", b"v".to_vec(), absolute(10)).await.unwrap();

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(store.get("k").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_resets_sliding_window() {
        let store = MemoryCacheStore::new();
        store.set("k", b"v".to_vec(), sliding(10)).await.unwrap();

        tokio::time::advance(Duration::from_secs(8)).await;
        store.refresh("k").await.unwrap();

        tokio::time::advance(Duration::from_secs(8)).await;
        assert!(store.get("k").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let store = MemoryCacheStore::new();
        store.set("a", vec![1], sliding(60)).await.unwrap();
        store.set("b", vec![2], sliding(60)).await.unwrap();

        store.remove("a").await.unwrap();
        assert!(store.get("a").await.unwrap().is_none());

        store.clear();
        assert!(store.get("b").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_evicts_oldest() {
        let store = MemoryCacheStore::with_config(MemoryCacheConfig { max_entries: 2 });

        store.set("a", vec![1], sliding(60)).await.unwrap();
        tokio::time::advance(Duration::from_millis(1)).await;
        store.set("b", vec![2], sliding(60)).await.unwrap();
        tokio::time::advance(Duration::from_millis(1)).await;
        store.set("c", vec![3], sliding(60)).await.unwrap();

        assert!(store.get("a").await.unwrap().is_none());
        assert!(store.get("b").await.unwrap().is_some());
        assert!(store.get("c").await.unwrap().is_some());
        assert_eq!(store.stats().evictions, 1);
    }

    #[tokio::test]
    async fn test_zero_capacity_stores_nothing() {
        let store = MemoryCacheStore::with_config(MemoryCacheConfig { max_entries: 0 });
        store.set("k", vec![1], sliding(60)).await.unwrap();
        assert!(store.get("k").await.unwrap().is_none());
    }
}
