//! Outermost failure logging.
//!
//! # Pipeline Position
//!
//! ```text
//! [UnhandledException] → Performance → Logging → ... → Handler
//! ```
//!
//! The stage never changes the result. Expected outcomes were already
//! reported by whoever produced them and pass silently; cancellation is a
//! warning; anything else is logged as an error with the caller and payload
//! attached.

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Invocation, PipelineResult};
use rampart_core::{ErrorCategory, PipelineError};

/// Logs failures that reach the top of the pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnhandledExceptionMiddleware;

impl UnhandledExceptionMiddleware {
    /// Creates the stage.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    async fn report(ctx: &mut MiddlewareContext, invocation: &Invocation, error: &PipelineError) {
        match error.category() {
            ErrorCategory::Validation | ErrorCategory::BadRequest | ErrorCategory::NotFound => {}
            ErrorCategory::Cancelled => {
                tracing::warn!(
                    request_id = %ctx.request_id(),
                    request_name = invocation.name(),
                    error = %error,
                    "Request was cancelled"
                );
            }
            _ => {
                let user = ctx.caller().await;
                tracing::error!(
                    request_id = %ctx.request_id(),
                    request_name = invocation.name(),
                    request_type = invocation.request_type().full_name(),
                    user_id = %user.user_id,
                    user_name = %user.user_name,
                    payload = %invocation.payload(),
                    error = ?error,
                    "Unhandled exception for request {}",
                    invocation.name()
                );
            }
        }
    }
}

impl Middleware for UnhandledExceptionMiddleware {
    fn name(&self) -> &'static str {
        "unhandled_exception"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        invocation: &'a Invocation,
        next: Next<'a>,
    ) -> BoxFuture<'a, PipelineResult> {
        Box::pin(async move {
            let result = next.run(ctx, invocation).await;
            if let Err(error) = &result {
                Self::report(ctx, invocation, error).await;
            }
            result
        })
    }
}
