//! Timeout middleware.
//!
//! # Pipeline Position
//!
//! ```text
//! ... → Retry → [Timeout] → Fallback → Caching → Handler
//! ```
//!
//! Sitting below retry, the deadline applies to each attempt separately.
//!
//! The handler runs with a child of the caller's cancellation token. When
//! the deadline passes the child is cancelled, the pending call is dropped
//! and the invocation fails with [`PipelineError::TimedOut`]. The caller's
//! own token is left untouched.

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::observer::Observers;
use crate::registry::PolicyRegistry;
use crate::types::{Invocation, PipelineResult};
use rampart_core::PipelineError;
use rampart_telemetry::metrics;
use std::sync::Arc;

/// Bounds each attempt by the type's deadline.
#[derive(Debug, Clone)]
pub struct TimeoutMiddleware {
    registry: Arc<PolicyRegistry>,
    observers: Observers,
}

impl TimeoutMiddleware {
    /// Creates the stage.
    #[must_use]
    pub fn new(registry: Arc<PolicyRegistry>, observers: Observers) -> Self {
        Self {
            registry,
            observers,
        }
    }
}

impl Middleware for TimeoutMiddleware {
    fn name(&self) -> &'static str {
        "timeout"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        invocation: &'a Invocation,
        next: Next<'a>,
    ) -> BoxFuture<'a, PipelineResult> {
        Box::pin(async move {
            let request_type = invocation.request_type();
            let Some(policy) = self.registry.timeout(request_type) else {
                return next.run(ctx, invocation).await;
            };

            let deadline = ctx.cancellation_token().child_token();
            let caller = ctx.replace_cancellation(deadline.clone());
            let outcome = tokio::time::timeout(policy.duration, next.run(ctx, invocation)).await;
            ctx.replace_cancellation(caller);

            match outcome {
                Ok(result) => result,
                Err(_elapsed) => {
                    deadline.cancel();
                    metrics::record_timeout(invocation.name());
                    tracing::warn!(
                        request_id = %ctx.request_id(),
                        request_name = invocation.name(),
                        timeout_ms = policy.duration.as_millis() as u64,
                        "Request {} timed out",
                        invocation.name()
                    );
                    if let Some(on_timeout) = &self.observers.on_timeout {
                        on_timeout(request_type, policy.duration);
                    }
                    Err(PipelineError::timed_out(invocation.name(), policy.duration))
                }
            }
        })
    }
}
