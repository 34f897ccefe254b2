//! Retry middleware.
//!
//! # Pipeline Position
//!
//! ```text
//! ... → CircuitBreaker → [Retry] → Timeout → Fallback → ... → Handler
//! ```
//!
//! A qualifying failure is retried up to `retry_count` times. Delays follow
//! [`decorrelated_jitter`] with the policy's `sleep_duration` as the median
//! first delay. Expected outcomes such as validation failures or missing
//! resources are returned at once unless the policy's matcher selects them.
//!
//! Each attempt gets its own deadline from the timeout stage below. A
//! cancelled caller stops the backoff immediately.

use crate::backoff::decorrelated_jitter;
use crate::classifier::is_qualifying;
use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::observer::{Observers, RetryEvent};
use crate::registry::PolicyRegistry;
use crate::types::{Invocation, PipelineResult};
use rampart_core::PipelineError;
use rampart_telemetry::metrics;
use std::sync::Arc;

/// Retries qualifying failures with jittered backoff.
#[derive(Debug, Clone)]
pub struct RetryMiddleware {
    registry: Arc<PolicyRegistry>,
    observers: Observers,
}

impl RetryMiddleware {
    /// Creates the stage.
    #[must_use]
    pub fn new(registry: Arc<PolicyRegistry>, observers: Observers) -> Self {
        Self {
            registry,
            observers,
        }
    }
}

impl Middleware for RetryMiddleware {
    fn name(&self) -> &'static str {
        "retry"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        invocation: &'a Invocation,
        next: Next<'a>,
    ) -> BoxFuture<'a, PipelineResult> {
        Box::pin(async move {
            let request_type = invocation.request_type();
            let Some(policy) = self.registry.retry(request_type) else {
                return next.run(ctx, invocation).await;
            };

            let delays = {
                let mut rng = rand::rng();
                decorrelated_jitter(policy.sleep_duration, policy.retry_count, &mut rng)
            };

            let mut attempt = 0_u32;
            loop {
                let error = match next.run(ctx, invocation).await {
                    Ok(response) => return Ok(response),
                    Err(error) => error,
                };

                if !is_qualifying(&error, policy.handle.as_ref()) {
                    return Err(error);
                }
                let Some(&delay) = delays.get(attempt as usize) else {
                    return Err(error);
                };
                attempt += 1;

                tracing::warn!(
                    request_id = %ctx.request_id(),
                    request_name = invocation.name(),
                    retry_attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Retrying request {} (attempt {} of {})",
                    invocation.name(),
                    attempt,
                    policy.retry_count
                );
                metrics::record_retry(invocation.name());
                if let Some(on_retry) = &self.observers.on_retry {
                    on_retry(&RetryEvent {
                        request_type,
                        attempt,
                        delay,
                        error: &error,
                    });
                }

                let cancellation = ctx.cancellation_token();
                tokio::select! {
                    biased;
                    () = cancellation.cancelled() => {
                        return Err(PipelineError::cancelled(format!(
                            "{} was cancelled while waiting to retry",
                            invocation.name()
                        )));
                    }
                    () = tokio::time::sleep(delay) => {}
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ErrorMatcher;
    use crate::registry::RetryPolicy;
    use crate::stages::test_support::{run_stage, ScriptedEndpoint};
    use rampart_config::RampartConfig;
    use rampart_core::{ErrorCategory, Request};
    use serde::Serialize;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    #[derive(Serialize)]
    struct GetCityListQuery;

    impl Request for GetCityListQuery {
        type Response = Vec<String>;
    }

    fn stage(policy: RetryPolicy, observers: Observers) -> Arc<dyn Middleware> {
        let registry = PolicyRegistry::builder()
            .retry::<GetCityListQuery>(policy)
            .build(&RampartConfig::default())
            .unwrap();
        Arc::new(RetryMiddleware::new(Arc::new(registry), observers))
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried() {
        let retries = Arc::new(AtomicU32::new(0));
        let counter = retries.clone();
        let observers = Observers::new().on_retry(move |event| {
            assert_eq!(event.attempt, counter.fetch_add(1, Ordering::SeqCst) + 1);
        });
        let stage = stage(RetryPolicy::new(3, Duration::from_millis(200)), observers);
        let endpoint = ScriptedEndpoint::new(|call| {
            if call < 3 {
                Err(PipelineError::internal("deadlock"))
            } else {
                Ok(json!(["Amsterdam"]))
            }
        });
        let invocation = Invocation::new(GetCityListQuery).unwrap();

        let result = run_stage(&stage, &mut MiddlewareContext::new(), &invocation, &endpoint).await;
        assert_eq!(result.unwrap(), json!(["Amsterdam"]));
        assert_eq!(endpoint.calls(), 3);
        assert_eq!(retries.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_retry_count() {
        let stage = stage(RetryPolicy::new(2, Duration::from_millis(50)), Observers::new());
        let endpoint = ScriptedEndpoint::new(|_| Err(PipelineError::internal("down")));
        let invocation = Invocation::new(GetCityListQuery).unwrap();

        let result = run_stage(&stage, &mut MiddlewareContext::new(), &invocation, &endpoint).await;
        assert!(matches!(result, Err(PipelineError::Internal { .. })));
        assert_eq!(endpoint.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_validation_failures_are_not_retried() {
        let stage = stage(RetryPolicy::new(3, Duration::from_millis(50)), Observers::new());
        let endpoint =
            ScriptedEndpoint::new(|_| Err(PipelineError::validation_field("name", "required")));
        let invocation = Invocation::new(GetCityListQuery).unwrap();

        let result = run_stage(&stage, &mut MiddlewareContext::new(), &invocation, &endpoint).await;
        assert!(matches!(result, Err(PipelineError::ValidationFailed { .. })));
        assert_eq!(endpoint.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_matcher_retries_expected_errors() {
        let policy = RetryPolicy::new(1, Duration::from_millis(50))
            .handle(ErrorMatcher::category(ErrorCategory::NotFound));
        let stage = stage(policy, Observers::new());
        let endpoint = ScriptedEndpoint::new(|call| {
            if call == 1 {
                Err(PipelineError::not_found("replica lag"))
            } else {
                Ok(json!([]))
            }
        });
        let invocation = Invocation::new(GetCityListQuery).unwrap();

        let result = run_stage(&stage, &mut MiddlewareContext::new(), &invocation, &endpoint).await;
        assert!(result.is_ok());
        assert_eq!(endpoint.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_backoff() {
        let stage = stage(RetryPolicy::new(3, Duration::from_secs(60)), Observers::new());
        let endpoint = ScriptedEndpoint::new(|_| Err(PipelineError::internal("down")));
        let invocation = Invocation::new(GetCityListQuery).unwrap();

        let token = CancellationToken::new();
        token.cancel();
        let mut ctx = MiddlewareContext::new().with_cancellation(token);

        let result = run_stage(&stage, &mut ctx, &invocation, &endpoint).await;
        assert!(matches!(result, Err(PipelineError::Cancelled { .. })));
        assert_eq!(endpoint.calls(), 1);
    }

    #[tokio::test]
    async fn test_disabled_policy_runs_once() {
        let stage = stage(RetryPolicy::disabled(), Observers::new());
        let endpoint = ScriptedEndpoint::new(|_| Err(PipelineError::internal("down")));
        let invocation = Invocation::new(GetCityListQuery).unwrap();

        let result = run_stage(&stage, &mut MiddlewareContext::new(), &invocation, &endpoint).await;
        assert!(result.is_err());
        assert_eq!(endpoint.calls(), 1);
    }
}
