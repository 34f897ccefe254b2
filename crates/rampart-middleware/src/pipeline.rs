//! Fixed-order middleware pipeline.
//!
//! Every request flows through the same stages in the same order. The
//! order is part of the contract: reordering changes which failures a
//! policy sees, so [`PipelineBuilder::build`] rejects any other order.
//!
//! ## Pipeline Stages
//!
//! 1. **Unhandled exception** - Log failures nobody else handled
//! 2. **Performance** - Time the invocation
//! 3. **Logging** - Record commands and queries
//! 4. **Validation** - Reject invalid requests
//! 5. **Rate limit** - Token bucket per request type
//! 6. **Circuit breaker** - Fail fast while a handler keeps failing
//! 7. **Retry** - Repeat transient failures
//! 8. **Timeout** - Bound each attempt
//! 9. **Fallback** - Substitute a response for a failure
//! 10. **Caching** - Serve and store responses
//!
//! Stages with names outside this list may be added anywhere; they are
//! treated as custom extensions and not checked.

use crate::context::MiddlewareContext;
use crate::middleware::{Endpoint, Middleware, Next};
use crate::observer::Observers;
use crate::registry::PolicyRegistry;
use crate::stages::{
    CachingMiddleware, CircuitBreakerMiddleware, FallbackMiddleware, LoggingMiddleware,
    PerformanceMiddleware, RateLimitMiddleware, RetryMiddleware, TimeoutMiddleware,
    UnhandledExceptionMiddleware, ValidationMiddleware,
};
use crate::types::{Invocation, PipelineResult};
use rampart_cache::CacheService;
use rampart_config::{ConfigError, RampartConfig};
use std::fmt;
use std::sync::Arc;
use tracing::Instrument;

/// A type-erased middleware that can be stored in a vector.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// The fixed-order middleware pipeline.
///
/// # Example
///
/// ```
/// use rampart_config::RampartConfig;
/// use rampart_middleware::{Observers, Pipeline, PolicyRegistry, Stage};
/// use std::sync::Arc;
///
/// let config = RampartConfig::default();
/// let registry = Arc::new(PolicyRegistry::from_config(&config).unwrap());
/// let pipeline = Pipeline::builder()
///     .standard(&config, registry, None, Observers::new())
///     .build()
///     .unwrap();
///
/// assert_eq!(pipeline.stage_count(), Stage::all().len());
/// assert_eq!(pipeline.stage_names()[0], "unhandled_exception");
/// ```
pub struct Pipeline {
    stages: Vec<BoxedMiddleware>,
}

impl Pipeline {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Runs `invocation` through every stage, ending in `endpoint`.
    pub async fn process(
        &self,
        ctx: &mut MiddlewareContext,
        invocation: &Invocation,
        endpoint: &dyn Endpoint,
    ) -> PipelineResult {
        let span = tracing::info_span!(
            "request",
            request_id = %ctx.request_id(),
            request_name = invocation.name(),
        );
        Next::new(&self.stages, endpoint)
            .run(ctx, invocation)
            .instrument(span)
            .await
    }

    /// Returns the names of all middleware stages in order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|m| m.name()).collect()
    }

    /// Returns the number of middleware stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}

/// Builder for constructing a [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    stages: Vec<BoxedMiddleware>,
}

impl PipelineBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage.
    #[must_use]
    pub fn stage<M: Middleware>(mut self, middleware: M) -> Self {
        self.stages.push(Arc::new(middleware));
        self
    }

    /// Appends every standard stage, in order.
    ///
    /// Rate limiting is enforced only in the production environment and
    /// caching is bypassed in the test environment. Without a `cache` the
    /// caching stage passes every request through.
    #[must_use]
    pub fn standard(
        self,
        config: &RampartConfig,
        registry: Arc<PolicyRegistry>,
        cache: Option<CacheService>,
        observers: Observers,
    ) -> Self {
        let environment = config.app.environment.clone();
        self.stage(UnhandledExceptionMiddleware::new())
            .stage(PerformanceMiddleware::new(registry.clone()))
            .stage(LoggingMiddleware::new(config.app.namespace.clone()))
            .stage(ValidationMiddleware::new(registry.clone()))
            .stage(RateLimitMiddleware::new(registry.clone(), environment.clone()))
            .stage(CircuitBreakerMiddleware::new(registry.clone(), observers.clone()))
            .stage(RetryMiddleware::new(registry.clone(), observers.clone()))
            .stage(TimeoutMiddleware::new(registry.clone(), observers))
            .stage(FallbackMiddleware::new(registry.clone()))
            .stage(CachingMiddleware::new(registry, cache, environment))
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if a standard stage appears
    /// twice or out of order.
    pub fn build(self) -> Result<Pipeline, ConfigError> {
        let mut previous: Option<Stage> = None;
        for middleware in &self.stages {
            let Some(stage) = Stage::from_name(middleware.name()) else {
                continue;
            };
            if let Some(previous) = previous {
                if stage <= previous {
                    return Err(ConfigError::validation_error(format!(
                        "pipeline stage '{}' must come before '{}'",
                        stage.name(),
                        previous.name()
                    )));
                }
            }
            previous = Some(stage);
        }

        Ok(Pipeline {
            stages: self.stages,
        })
    }
}

impl fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.stages.iter().map(|m| m.name()).collect();
        f.debug_struct("PipelineBuilder").field("stages", &names).finish()
    }
}

/// The standard stages, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Stage {
    /// Stage 1: Outermost failure logging
    UnhandledException = 1,
    /// Stage 2: Timing and slow-request warnings
    Performance = 2,
    /// Stage 3: Command and query logging
    Logging = 3,
    /// Stage 4: Request validation
    Validation = 4,
    /// Stage 5: Token bucket rate limiting
    RateLimit = 5,
    /// Stage 6: Circuit breaker
    CircuitBreaker = 6,
    /// Stage 7: Retry with backoff
    Retry = 7,
    /// Stage 8: Per-attempt deadline
    Timeout = 8,
    /// Stage 9: Fallback response
    Fallback = 9,
    /// Stage 10: Response caching
    Caching = 10,
}

impl Stage {
    /// Returns the stage name, as reported by its middleware.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::UnhandledException => "unhandled_exception",
            Self::Performance => "performance",
            Self::Logging => "logging",
            Self::Validation => "validation",
            Self::RateLimit => "rate_limit",
            Self::CircuitBreaker => "circuit_breaker",
            Self::Retry => "retry",
            Self::Timeout => "timeout",
            Self::Fallback => "fallback",
            Self::Caching => "caching",
        }
    }

    /// Returns the stage with the given middleware name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().into_iter().find(|stage| stage.name() == name)
    }

    /// Returns all stages in order.
    #[must_use]
    pub const fn all() -> [Stage; 10] {
        [
            Self::UnhandledException,
            Self::Performance,
            Self::Logging,
            Self::Validation,
            Self::RateLimit,
            Self::CircuitBreaker,
            Self::Retry,
            Self::Timeout,
            Self::Fallback,
            Self::Caching,
        ]
    }
}
