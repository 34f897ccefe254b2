//! Cache service behaviour against a failing store.

use async_trait::async_trait;
use rampart_cache::{CacheEntryOptions, CacheError, CachePolicy, CacheService, CacheStore};
use rampart_config::{CacheSettings, RampartConfig};
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct UnreachableStore {
    writes: AtomicUsize,
}

#[async_trait]
impl CacheStore for UnreachableStore {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn set(
        &self,
        _key: &str,
        _value: Vec<u8>,
        _options: CacheEntryOptions,
    ) -> Result<(), CacheError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn remove(&self, _key: &str) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn refresh(&self, _key: &str) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }
}

#[tokio::test]
async fn get_or_create_survives_unreachable_store() {
    let store = Arc::new(UnreachableStore::default());
    let cache = CacheService::new(store.clone(), "Geo", &CacheSettings::default());
    let policy = CachePolicy::sliding(Duration::from_secs(60));

    let value: Result<String, Infallible> = cache
        .get_or_create("city:AMS", &policy, || async { Ok("Amsterdam".to_string()) })
        .await;

    assert_eq!(value.unwrap(), "Amsterdam");
    assert_eq!(store.writes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn direct_calls_surface_store_errors() {
    let cache = CacheService::new(
        Arc::new(UnreachableStore::default()),
        "Geo",
        &CacheSettings::default(),
    );

    assert!(matches!(
        cache.get::<String>("k").await,
        Err(CacheError::Unavailable(_))
    ));
    assert!(cache.remove("k").await.is_err());
    assert!(cache.refresh("k").await.is_err());
}

#[tokio::test]
async fn from_config_uses_namespace() {
    let mut config = RampartConfig::default();
    config.app.namespace = "Billing".to_string();

    let cache = CacheService::from_config(Arc::new(UnreachableStore::default()), &config);
    assert_eq!(cache.cache_key("invoice:1"), "Billing:invoice:1");
}
