//! Pipeline stages.
//!
//! Each stage is a [`Middleware`](crate::Middleware) and runs in the fixed
//! order given by [`Stage`](crate::Stage):
//!
//! 1. [`unhandled_exception`] - Log failures nobody else handled
//! 2. [`performance`] - Time the invocation, warn when slow
//! 3. [`logging`] - Record the request and, for queries, the response
//! 4. [`validation`] - Reject invalid requests before any policy runs
//! 5. [`rate_limit`] - Token bucket per request type (Production only)
//! 6. [`circuit_breaker`] - Stop calling a failing handler for a while
//! 7. [`retry`] - Repeat transient failures with jittered backoff
//! 8. [`timeout`] - Bound each attempt
//! 9. [`fallback`] - Substitute a response for a failure
//! 10. [`caching`] - Serve and store responses

pub mod caching;
pub mod circuit_breaker;
pub mod fallback;
pub mod logging;
pub mod performance;
pub mod rate_limit;
pub mod retry;
pub mod timeout;
pub mod unhandled_exception;
pub mod validation;

pub use caching::CachingMiddleware;
pub use circuit_breaker::{CircuitBreakerMiddleware, CircuitState};
pub use fallback::FallbackMiddleware;
pub use logging::LoggingMiddleware;
pub use performance::PerformanceMiddleware;
pub use rate_limit::RateLimitMiddleware;
pub use retry::RetryMiddleware;
pub use timeout::TimeoutMiddleware;
pub use unhandled_exception::UnhandledExceptionMiddleware;
pub use validation::ValidationMiddleware;

#[cfg(test)]
pub(crate) mod test_support {
    use crate::context::MiddlewareContext;
    use crate::middleware::{BoxFuture, Endpoint, Middleware, Next};
    use crate::types::{Invocation, PipelineResult};
    use parking_lot::Mutex;
    use serde_json::Value;
    use std::io;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tracing::subscriber::DefaultGuard;
    use tracing::Level;

    /// Runs `invocation` through `stage` alone, ending in `endpoint`.
    pub(crate) async fn run_stage(
        stage: &Arc<dyn Middleware>,
        ctx: &mut MiddlewareContext,
        invocation: &Invocation,
        endpoint: &dyn Endpoint,
    ) -> PipelineResult {
        let chain = std::slice::from_ref(stage);
        Next::new(chain, endpoint).run(ctx, invocation).await
    }

    /// Endpoint that answers call `n` (one-based) with `respond(n)`.
    pub(crate) struct ScriptedEndpoint {
        calls: AtomicU32,
        respond: Box<dyn Fn(u32) -> PipelineResult + Send + Sync>,
    }

    impl ScriptedEndpoint {
        pub(crate) fn new(respond: impl Fn(u32) -> PipelineResult + Send + Sync + 'static) -> Self {
            Self {
                calls: AtomicU32::new(0),
                respond: Box::new(respond),
            }
        }

        pub(crate) fn ok(value: Value) -> Self {
            Self::new(move |_| Ok(value.clone()))
        }

        pub(crate) fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Endpoint for ScriptedEndpoint {
        fn call<'a>(
            &'a self,
            _ctx: &'a mut MiddlewareContext,
            _invocation: &'a Invocation,
        ) -> BoxFuture<'a, PipelineResult> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let result = (self.respond)(call);
            Box::pin(async move { result })
        }
    }

    /// Collects formatted `tracing` output written on the current thread.
    #[derive(Clone, Default)]
    pub(crate) struct LogCapture(Arc<Mutex<Vec<u8>>>);

    impl LogCapture {
        /// Installs a capturing subscriber until the guard is dropped.
        pub(crate) fn install(level: Level) -> (Self, DefaultGuard) {
            let capture = Self::default();
            let writer = capture.clone();
            let subscriber = tracing_subscriber::fmt()
                .with_max_level(level)
                .with_ansi(false)
                .with_writer(move || writer.clone())
                .finish();
            (capture, tracing::subscriber::set_default(subscriber))
        }

        pub(crate) fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    impl io::Write for LogCapture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}
