//! Rate limiting middleware.
//!
//! Each request type gets its own token bucket. The bucket starts full at
//! the policy's burst size and gains one token every
//! `duration_limit / number_of_allowed_executions`. A request that finds the
//! bucket empty fails with [`PipelineError::RateLimited`] and never reaches
//! the handler.
//!
//! Limits are enforced only when the application runs in the production
//! environment. Everywhere else the stage passes every
//! request through, so local runs and test suites are never throttled.
//!
//! # Pipeline Position
//!
//! ```text
//! ... → Validation → [RateLimit] → CircuitBreaker → Retry → ... → Handler
//! ```
//!
//! Rejections happen before the circuit breaker and therefore never count
//! as circuit failures.
//!
//! # Example
//!
//! ```
//! use rampart_config::RampartConfig;
//! use rampart_middleware::stages::RateLimitMiddleware;
//! use rampart_middleware::PolicyRegistry;
//! use std::sync::Arc;
//!
//! let config = RampartConfig::production();
//! let registry = Arc::new(PolicyRegistry::from_config(&config).unwrap());
//! let rate_limit = RateLimitMiddleware::new(registry, config.app.environment.clone());
//! assert!(rate_limit.is_enforced());
//! ```

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::registry::{PolicyRegistry, RateLimitPolicy};
use crate::types::{Invocation, PipelineResult};
use dashmap::DashMap;
use parking_lot::Mutex;
use rampart_config::Environment;
use rampart_core::PipelineError;
use rampart_telemetry::metrics;
use std::any::TypeId;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Per-request-type token bucket rate limiting.
#[derive(Debug)]
pub struct RateLimitMiddleware {
    registry: Arc<PolicyRegistry>,
    environment: Environment,
    buckets: DashMap<TypeId, Arc<Mutex<TokenBucket>>>,
}

/// Tokens available to one request type.
#[derive(Debug)]
struct TokenBucket {
    tokens: u32,
    last_refill: Instant,
}

/// Result of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RateLimitResult {
    /// A token was taken.
    Allowed { remaining: u32 },
    /// The bucket is empty.
    Limited { retry_after: Duration },
}

impl TokenBucket {
    fn full(policy: &RateLimitPolicy, now: Instant) -> Self {
        Self {
            tokens: policy.burst,
            last_refill: now,
        }
    }

    fn refill(&mut self, policy: &RateLimitPolicy, now: Instant) {
        let interval = policy.refill_interval();
        let elapsed = now.saturating_duration_since(self.last_refill);
        let earned = elapsed.as_nanos() / interval.as_nanos();
        if earned == 0 {
            return;
        }

        let earned = u32::try_from(earned).unwrap_or(u32::MAX);
        self.tokens = self.tokens.saturating_add(earned).min(policy.burst);
        if self.tokens == policy.burst {
            self.last_refill = now;
        } else {
            self.last_refill += interval * earned;
        }
    }

    fn try_acquire(&mut self, policy: &RateLimitPolicy, now: Instant) -> RateLimitResult {
        self.refill(policy, now);

        if self.tokens == 0 {
            let since = now.saturating_duration_since(self.last_refill);
            return RateLimitResult::Limited {
                retry_after: policy.refill_interval().saturating_sub(since),
            };
        }

        if self.tokens == policy.burst {
            self.last_refill = now;
        }
        self.tokens -= 1;
        RateLimitResult::Allowed {
            remaining: self.tokens,
        }
    }
}

impl RateLimitMiddleware {
    /// Creates the stage for an application running in `environment`.
    #[must_use]
    pub fn new(registry: Arc<PolicyRegistry>, environment: Environment) -> Self {
        Self {
            registry,
            environment,
            buckets: DashMap::new(),
        }
    }

    /// Returns `true` if limits are enforced in this environment.
    #[must_use]
    pub fn is_enforced(&self) -> bool {
        self.environment.is_production()
    }

    /// Checks and updates the bucket for the invocation's request type.
    fn check_rate_limit(
        &self,
        invocation: &Invocation,
        policy: &RateLimitPolicy,
    ) -> RateLimitResult {
        let now = Instant::now();
        let bucket = self
            .buckets
            .entry(invocation.request_type().id())
            .or_insert_with(|| Arc::new(Mutex::new(TokenBucket::full(policy, now))))
            .clone();

        let mut bucket = bucket.lock();
        bucket.try_acquire(policy, now)
    }
}

impl Middleware for RateLimitMiddleware {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        invocation: &'a Invocation,
        next: Next<'a>,
    ) -> BoxFuture<'a, PipelineResult> {
        Box::pin(async move {
            if !self.is_enforced() {
                return next.run(ctx, invocation).await;
            }
            let Some(policy) = self.registry.rate_limit(invocation.request_type()) else {
                return next.run(ctx, invocation).await;
            };

            match self.check_rate_limit(invocation, &policy) {
                RateLimitResult::Allowed { remaining } => {
                    tracing::trace!(
                        request_name = invocation.name(),
                        remaining,
                        "Rate limit token acquired"
                    );
                    next.run(ctx, invocation).await
                }
                RateLimitResult::Limited { retry_after } => {
                    metrics::record_rate_limited(invocation.name());
                    tracing::warn!(
                        request_id = %ctx.request_id(),
                        request_name = invocation.name(),
                        retry_after_ms = retry_after.as_millis() as u64,
                        "Rate limit exceeded"
                    );
                    Err(PipelineError::rate_limited(invocation.name(), retry_after))
                }
            }
        })
    }
}
