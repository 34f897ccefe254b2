//! Fallback middleware.
//!
//! # Pipeline Position
//!
//! ```text
//! ... → Timeout → [Fallback] → Caching → Handler
//! ```
//!
//! When the handler fails and a fallback is registered for the request
//! type, the fallback's response is returned instead of the error. Because
//! the stage sits below the circuit breaker, retry and timeout, a
//! substituted response counts as a success for all of them, and rejections
//! produced by those stages never reach it.

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::registry::PolicyRegistry;
use crate::types::{Invocation, PipelineResult};
use rampart_telemetry::metrics;
use std::sync::Arc;

/// Substitutes a registered fallback response for a failure.
#[derive(Debug, Clone)]
pub struct FallbackMiddleware {
    registry: Arc<PolicyRegistry>,
}

impl FallbackMiddleware {
    /// Creates the stage.
    #[must_use]
    pub fn new(registry: Arc<PolicyRegistry>) -> Self {
        Self { registry }
    }
}

impl Middleware for FallbackMiddleware {
    fn name(&self) -> &'static str {
        "fallback"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        invocation: &'a Invocation,
        next: Next<'a>,
    ) -> BoxFuture<'a, PipelineResult> {
        Box::pin(async move {
            let error = match next.run(ctx, invocation).await {
                Ok(response) => return Ok(response),
                Err(error) => error,
            };
            let Some(fallback) = self.registry.fallback(invocation.request_type()) else {
                return Err(error);
            };

            metrics::record_fallback(invocation.name());
            tracing::warn!(
                request_id = %ctx.request_id(),
                request_name = invocation.name(),
                error = %error,
                "Request {} failed, using fallback",
                invocation.name()
            );
            fallback.fallback(invocation, ctx.cancellation_token()).await
        })
    }
}
