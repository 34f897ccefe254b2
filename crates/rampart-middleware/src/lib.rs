//! # Rampart Middleware
//!
//! The request pipeline behind the Rampart mediator.
//!
//! Every command and query passes through the same fixed chain of stages
//! before it reaches its handler. The stages add logging, validation and
//! resilience policies without the handler knowing about them.
//!
//! ## Pipeline Stages
//!
//! ```text
//! Request → UnhandledException → Performance → Logging → Validation
//!         → RateLimit → CircuitBreaker → Retry → Timeout → Fallback
//!         → Caching → Handler
//! ```
//!
//! | Stage | Middleware          | Purpose                                        |
//! |-------|---------------------|------------------------------------------------|
//! | 1     | Unhandled exception | Log failures nobody handled                    |
//! | 2     | Performance         | Time the request, warn above the threshold     |
//! | 3     | Logging             | Log every request, and query responses         |
//! | 4     | Validation          | Run validators, reject with field errors       |
//! | 5     | Rate limit          | Token bucket per request type (Production)     |
//! | 6     | Circuit breaker     | Fail fast after consecutive failures           |
//! | 7     | Retry               | Retry with decorrelated jitter                 |
//! | 8     | Timeout             | Bound each attempt                             |
//! | 9     | Fallback            | Replace a failure with a fallback response     |
//! | 10    | Caching             | Serve and store responses                      |
//!
//! Policies are resolved per request type by the [`PolicyRegistry`], from
//! declarations in code and the `[policies]` section of the configuration.
//!
//! ## Example
//!
//! ```
//! use rampart_middleware::pipeline::Stage;
//!
//! let stages = Stage::all();
//! assert_eq!(stages.len(), 10);
//! assert_eq!(stages[0].name(), "unhandled_exception");
//! assert_eq!(stages[9].name(), "caching");
//! ```

#![doc(html_root_url = "https://docs.rs/rampart-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod authorization;
pub mod backoff;
pub mod classifier;
pub mod context;
pub mod handler;
pub mod middleware;
pub mod observer;
pub mod pipeline;
pub mod registry;
pub mod stages;
pub mod types;

// Re-export main types at crate root
pub use authorization::{
    AnonymousAuthorization, AuthorizationError, StaticAuthorization, UserAttributes,
    UserAuthorization,
};
pub use classifier::{is_qualifying, ErrorMatcher};
pub use context::MiddlewareContext;
pub use handler::{FallbackHandler, HandlerEndpoint, RequestHandler, Validator};
pub use middleware::{BoxFuture, Endpoint, FnEndpoint, Middleware, Next};
pub use observer::{Observers, RetryEvent};
pub use pipeline::{BoxedMiddleware, Pipeline, PipelineBuilder, Stage};
pub use registry::{
    CircuitBreakerPolicy, PolicyRegistry, PolicyRegistryBuilder, RateLimitPolicy, RetryPolicy,
    TimeoutPolicy,
};
pub use stages::CircuitState;
pub use tokio_util::sync::CancellationToken;
pub use types::{Invocation, PipelineResult, Response};
