//! Namespaced, typed access to a [`CacheStore`].

use chrono::Utc;
use rampart_config::{CacheSettings, RampartConfig};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::{CacheEntryOptions, CacheError, CachePolicy, CacheStore};

/// Typed cache facade over a byte store.
///
/// Every key is prefixed with the application namespace as
/// `"{namespace}:{key}"`. Values are stored as JSON.
#[derive(Clone)]
pub struct CacheService {
    store: Arc<dyn CacheStore>,
    namespace: String,
    defaults: CacheEntryOptions,
}

impl fmt::Debug for CacheService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheService")
            .field("namespace", &self.namespace)
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

impl CacheService {
    /// Creates a service over `store`.
    ///
    /// An empty namespace disables key prefixing.
    pub fn new(
        store: Arc<dyn CacheStore>,
        namespace: impl Into<String>,
        settings: &CacheSettings,
    ) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            defaults: CacheEntryOptions {
                sliding_expiration: Some(settings.default_sliding_expiration()),
                absolute_expiration_relative_to_now: Some(settings.default_absolute_expiration()),
            },
        }
    }

    /// Creates a service using the configured namespace and default expirations.
    pub fn from_config(store: Arc<dyn CacheStore>, config: &RampartConfig) -> Self {
        Self::new(store, config.app.namespace.clone(), &config.cache)
    }

    /// Returns the namespaced form of `key`.
    ///
    /// # Example
    ///
    /// ```
    /// use rampart_cache::{CacheService, MemoryCacheStore};
    /// use rampart_config::CacheSettings;
    /// use std::sync::Arc;
    ///
    /// let store = Arc::new(MemoryCacheStore::new());
    /// let service = CacheService::new(store.clone(), "Geo", &CacheSettings::default());
    /// assert_eq!(service.cache_key("cities"), "Geo:cities");
    ///
    /// let bare = CacheService::new(store, "", &CacheSettings::default());
    /// assert_eq!(bare.cache_key("cities"), "cities");
    /// ```
    #[must_use]
    pub fn cache_key(&self, key: &str) -> String {
        if self.namespace.trim().is_empty() {
            key.to_string()
        } else {
            format!("{}:{key}", self.namespace)
        }
    }

    /// Reads and decodes the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns the store's error, or `CacheError::Serialization` if the
    /// stored bytes do not decode as `T`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        match self.store.get(&self.cache_key(key)).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Encodes and stores `value` under `key` with the policy's expirations.
    ///
    /// A policy without any expiration receives the configured defaults.
    /// Returns `false` without writing when the policy's absolute
    /// expiration has already passed.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Serialization` if `value` cannot be encoded, or
    /// the store's error.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        policy: &CachePolicy,
    ) -> Result<bool, CacheError> {
        let key = self.cache_key(key);
        let Some(options) = policy.entry_options(Utc::now()) else {
            tracing::warn!(
                cache_key = %key,
                absolute_expiration = ?policy.absolute_expiration,
                "Absolute expiration is in the past, skipping cache write"
            );
            return Ok(false);
        };

        let options = if options.is_empty() {
            self.defaults
        } else {
            options
        };

        let bytes = serde_json::to_vec(value)?;
        self.store.set(&key, bytes, options).await?;
        Ok(true)
    }

    /// Returns the cached value for `key`, or runs `factory` and caches a
    /// non-null result.
    ///
    /// Cache failures are logged and treated as a miss; only the factory's
    /// error is returned.
    pub async fn get_or_create<T, E, F, Fut>(
        &self,
        key: &str,
        policy: &CachePolicy,
        factory: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.get::<T>(key).await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(error) => {
                tracing::warn!(
                    cache_key = %self.cache_key(key),
                    %error,
                    "Error reading from cache"
                );
            }
        }

        let value = factory().await?;

        match serde_json::to_value(&value) {
            Ok(serde_json::Value::Null) => {}
            Ok(encoded) => {
                if let Err(error) = self.set(key, &encoded, policy).await {
                    tracing::warn!(
                        cache_key = %self.cache_key(key),
                        %error,
                        "Error writing to cache"
                    );
                }
            }
            Err(error) => {
                tracing::warn!(
                    cache_key = %self.cache_key(key),
                    %error,
                    "Error encoding cache value"
                );
            }
        }

        Ok(value)
    }

    /// Removes the entry under `key`.
    ///
    /// # Errors
    ///
    /// Returns the store's error.
    pub async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.store.remove(&self.cache_key(key)).await
    }

    /// Resets the sliding expiration of `key`.
    ///
    /// # Errors
    ///
    /// Returns the store's error.
    pub async fn refresh(&self, key: &str) -> Result<(), CacheError> {
        self.store.refresh(&self.cache_key(key)).await
    }
}
