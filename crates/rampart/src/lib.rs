//! # Rampart
//!
//! **In-process mediator with a resilience and caching pipeline**
//!
//! Rampart dispatches commands and queries to their handlers through a
//! fixed chain of stages:
//!
//! - **Resilience** – Rate limiting, circuit breaking, retries with jitter and timeouts
//! - **Caching** – Read-through response cache keyed by request, customer and user attributes
//! - **Validation** – Every registered validator runs before the handler
//! - **Observability** – Structured logs and Prometheus metrics for every request
//! - **Fallbacks** – A substitute response when the handler fails
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rampart::prelude::*;
//! use serde::Serialize;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[derive(Serialize)]
//! struct GetCityListQuery {
//!     country: String,
//! }
//!
//! impl Request for GetCityListQuery {
//!     type Response = Vec<String>;
//! }
//!
//! struct GetCityListHandler;
//!
//! #[async_trait]
//! impl RequestHandler<GetCityListQuery> for GetCityListHandler {
//!     async fn handle(
//!         &self,
//!         query: &GetCityListQuery,
//!         _cancellation: CancellationToken,
//!     ) -> Result<Vec<String>, PipelineError> {
//!         Ok(vec!["Amsterdam".into()])
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigLoader::new().with_defaults().with_env_prefix("RAMPART").load()?;
//!     rampart::telemetry::init_telemetry(&config)?;
//!
//!     let mediator = Mediator::builder()
//!         .config(config)
//!         .policies(PolicyRegistry::builder().cache::<GetCityListQuery>(
//!             CachePolicy::sliding(Duration::from_secs(30)),
//!         ))
//!         .handler::<GetCityListQuery, _>(GetCityListHandler)
//!         .cache_store(Arc::new(MemoryCacheStore::new()))
//!         .build()?;
//!
//!     let cities = mediator
//!         .send(GetCityListQuery { country: "NL".into() })
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! send → UnhandledException → Performance → Logging → Validation → RateLimit
//!      → CircuitBreaker → Retry → Timeout → Fallback → Caching → Handler
//! ```

#![doc(html_root_url = "https://docs.rs/rampart/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod mediator;

pub use mediator::{Mediator, MediatorBuilder};

// Re-export core types
pub use rampart_core as core;

// Re-export configuration types
pub use rampart_config as config;

// Re-export telemetry setup
pub use rampart_telemetry as telemetry;

// Re-export cache types
pub use rampart_cache as cache;

// Re-export pipeline types
pub use rampart_middleware as middleware;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust,ignore
/// use rampart::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{Mediator, MediatorBuilder};

    pub use rampart_core::{
        AuthorizedUser, ErrorCategory, FieldErrors, PipelineError, Request, RequestKind,
        RequestType, ValidationFailure,
    };

    pub use rampart_config::{ConfigLoader, Environment, RampartConfig};

    pub use rampart_cache::{CachePolicy, CacheStore, MemoryCacheStore};

    pub use rampart_middleware::{
        AnonymousAuthorization, CancellationToken, CircuitBreakerPolicy, ErrorMatcher,
        FallbackHandler, MiddlewareContext, Observers, PolicyRegistry, RateLimitPolicy,
        RequestHandler, RetryPolicy, StaticAuthorization, TimeoutPolicy, UserAuthorization,
        Validator,
    };

    pub use async_trait::async_trait;
}
