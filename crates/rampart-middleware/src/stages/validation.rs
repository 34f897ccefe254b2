//! Request validation.
//!
//! # Pipeline Position
//!
//! ```text
//! ... → Logging → [Validation] → RateLimit → CircuitBreaker → ... → Handler
//! ```
//!
//! Validation runs before every resilience policy so that invalid requests
//! never consume rate limit tokens, never count as circuit failures and are
//! never retried.
//!
//! All validators registered for the request type run concurrently. Their
//! failures are merged per field, with duplicate messages dropped, and the
//! handler is not called if any failure remains.

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::registry::PolicyRegistry;
use crate::types::{Invocation, PipelineResult};
use futures_util::future::join_all;
use rampart_core::{FieldErrors, PipelineError};
use rampart_telemetry::metrics;
use std::sync::Arc;

/// Runs the registered validators before anything else touches the request.
#[derive(Debug, Clone)]
pub struct ValidationMiddleware {
    registry: Arc<PolicyRegistry>,
}

impl ValidationMiddleware {
    /// Creates the stage.
    #[must_use]
    pub fn new(registry: Arc<PolicyRegistry>) -> Self {
        Self { registry }
    }
}

impl Middleware for ValidationMiddleware {
    fn name(&self) -> &'static str {
        "validation"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        invocation: &'a Invocation,
        next: Next<'a>,
    ) -> BoxFuture<'a, PipelineResult> {
        Box::pin(async move {
            let validators = self.registry.validators(invocation.request_type());
            if validators.is_empty() {
                return next.run(ctx, invocation).await;
            }

            let errors: FieldErrors = join_all(validators.iter().map(|v| v.validate(invocation)))
                .await
                .into_iter()
                .flatten()
                .collect();

            if !errors.is_empty() {
                metrics::record_validation_failure(invocation.name());
                tracing::debug!(
                    request_id = %ctx.request_id(),
                    request_name = invocation.name(),
                    fields = errors.len(),
                    "Request failed validation"
                );
                return Err(PipelineError::validation(errors));
            }

            next.run(ctx, invocation).await
        })
    }
}
