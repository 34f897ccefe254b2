//! Response caching for the Rampart pipeline.
//!
//! - [`CacheStore`] is the byte-level contract a distributed cache implements.
//! - [`CacheService`] adds namespacing, JSON encoding and default expirations.
//! - [`CachePolicy`] declares how long a request type's responses live.
//! - [`derive_request_key`] builds the caller-scoped key for a request.
//! - [`MemoryCacheStore`] is an in-process store.
//!
//! # Example
//!
//! ```
//! use rampart_cache::{CachePolicy, CacheService, MemoryCacheStore};
//! use rampart_config::CacheSettings;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let store = Arc::new(MemoryCacheStore::new());
//! let cache = CacheService::new(store, "Geo", &CacheSettings::default());
//! let policy = CachePolicy::sliding(Duration::from_secs(60));
//!
//! cache.set("cities", &["Amsterdam"], &policy).await.unwrap();
//! let cities: Option<Vec<String>> = cache.get("cities").await.unwrap();
//! assert_eq!(cities.unwrap(), ["Amsterdam"]);
//! # });
//! ```

#![warn(missing_docs)]

mod error;
mod key;
mod memory;
mod policy;
mod service;
mod store;

pub use error::CacheError;
pub use key::{attribute_key, derive_key, derive_request_key};
pub use memory::{CacheStats, MemoryCacheConfig, MemoryCacheStore};
pub use policy::CachePolicy;
pub use service::CacheService;
pub use store::{CacheEntryOptions, CacheStore};
