//! Request timing.
//!
//! # Pipeline Position
//!
//! ```text
//! UnhandledException → [Performance] → Logging → ... → Handler
//! ```
//!
//! Every invocation is recorded in the `rampart_requests_total` and
//! `rampart_request_duration_seconds` metrics, labelled with its outcome.
//! Invocations slower than the type's threshold are also logged as a
//! warning and counted in `rampart_slow_requests_total`. The result is
//! never changed.

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::registry::PolicyRegistry;
use crate::types::{Invocation, PipelineResult};
use rampart_telemetry::metrics;
use std::sync::Arc;
use tokio::time::Instant;

/// Times every invocation and warns about slow ones.
#[derive(Debug, Clone)]
pub struct PerformanceMiddleware {
    registry: Arc<PolicyRegistry>,
}

impl PerformanceMiddleware {
    /// Creates the stage.
    #[must_use]
    pub fn new(registry: Arc<PolicyRegistry>) -> Self {
        Self { registry }
    }
}

impl Middleware for PerformanceMiddleware {
    fn name(&self) -> &'static str {
        "performance"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        invocation: &'a Invocation,
        next: Next<'a>,
    ) -> BoxFuture<'a, PipelineResult> {
        Box::pin(async move {
            let start = Instant::now();
            let result = next.run(ctx, invocation).await;
            let elapsed = start.elapsed();

            let outcome = match &result {
                Ok(_) => "ok",
                Err(e) => e.category().code(),
            };
            metrics::record_request(invocation.name(), outcome, elapsed);

            let threshold = self.registry.performance_threshold(invocation.request_type());
            if elapsed > threshold {
                metrics::record_slow_request(invocation.name());
                let user = ctx.caller().await;
                tracing::warn!(
                    request_id = %ctx.request_id(),
                    request_name = invocation.name(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    threshold_ms = threshold.as_millis() as u64,
                    user_id = %user.user_id,
                    user_name = %user.user_name,
                    payload = %invocation.payload(),
                    "Long running request: {} ({} milliseconds)",
                    invocation.name(),
                    elapsed.as_millis()
                );
            }

            result
        })
    }
}
