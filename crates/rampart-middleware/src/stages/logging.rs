//! Request and response logging.
//!
//! # Pipeline Position
//!
//! ```text
//! ... → Performance → [Logging] → Validation → ... → Handler
//! ```
//!
//! Before the rest of the pipeline runs, every request is logged as
//! "{namespace} Request" with its name, caller and payload. After a
//! successful invocation a `Command` also logs "Command Request", and a
//! `Query` logs "Query Request" followed by "Query Response" with the
//! serialized result. Records are emitted at `DEBUG` and skipped entirely,
//! caller lookup included, when that level is disabled.

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Invocation, PipelineResult, Response};
use rampart_core::{AuthorizedUser, RequestKind};
use tracing::Level;

/// Logs every request, and successful commands and queries.
#[derive(Debug, Clone)]
pub struct LoggingMiddleware {
    namespace: String,
}

impl LoggingMiddleware {
    /// Creates the stage, tagging records with `namespace`.
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// Returns the namespace attached to every record.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn log_outcome(
        &self,
        ctx: &MiddlewareContext,
        invocation: &Invocation,
        user: &AuthorizedUser,
        response: &Response,
    ) {
        let request_name = invocation.name();

        match invocation.request_type().kind() {
            RequestKind::Command => tracing::debug!(
                namespace = %self.namespace,
                request_id = %ctx.request_id(),
                request_name,
                user_id = %user.user_id,
                user_name = %user.user_name,
                payload = %invocation.payload(),
                "Command Request"
            ),
            RequestKind::Query => {
                tracing::debug!(
                    namespace = %self.namespace,
                    request_id = %ctx.request_id(),
                    request_name,
                    user_id = %user.user_id,
                    user_name = %user.user_name,
                    payload = %invocation.payload(),
                    "Query Request"
                );
                tracing::debug!(
                    namespace = %self.namespace,
                    request_id = %ctx.request_id(),
                    request_name,
                    user_id = %user.user_id,
                    user_name = %user.user_name,
                    response = %response,
                    "Query Response"
                );
            }
            RequestKind::Other => {}
        }
    }
}

impl Middleware for LoggingMiddleware {
    fn name(&self) -> &'static str {
        "logging"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        invocation: &'a Invocation,
        next: Next<'a>,
    ) -> BoxFuture<'a, PipelineResult> {
        Box::pin(async move {
            if !tracing::enabled!(Level::DEBUG) {
                return next.run(ctx, invocation).await;
            }

            let user = ctx.caller().await;
            tracing::debug!(
                namespace = %self.namespace,
                request_id = %ctx.request_id(),
                request_name = invocation.name(),
                user_id = %user.user_id,
                user_name = %user.user_name,
                payload = %invocation.payload(),
                "{} Request",
                self.namespace
            );

            let result = next.run(ctx, invocation).await;
            if let Ok(response) = &result {
                self.log_outcome(ctx, invocation, &user, response);
            }
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::{AuthorizationError, UserAttributes, UserAuthorization};
    use crate::middleware::FnEndpoint;
    use crate::stages::test_support::{run_stage, LogCapture};
    use async_trait::async_trait;
    use rampart_core::{PipelineError, Request};
    use serde::Serialize;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Serialize)]
    struct GetCityListQuery;

    impl Request for GetCityListQuery {
        type Response = Vec<String>;
    }

    #[derive(Serialize)]
    struct CreateCityCommand {
        name: String,
    }

    impl Request for CreateCityCommand {
        type Response = u32;
    }

    #[derive(Serialize)]
    struct PingRequest;

    impl Request for PingRequest {
        type Response = String;
    }

    #[derive(Default)]
    struct CountingAuthorization {
        lookups: AtomicU32,
    }

    #[async_trait]
    impl UserAuthorization for CountingAuthorization {
        async fn customer_code(&self) -> Result<String, AuthorizationError> {
            Ok(String::new())
        }

        async fn user_attributes(&self) -> Result<UserAttributes, AuthorizationError> {
            Ok(UserAttributes::new())
        }

        async fn authorized_user(&self) -> Result<AuthorizedUser, AuthorizationError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(AuthorizedUser::new("42", "jdoe"))
        }
    }

    #[tokio::test]
    async fn test_response_is_returned_unchanged() {
        let stage: Arc<dyn Middleware> = Arc::new(LoggingMiddleware::new("cities"));
        let endpoint = FnEndpoint::new(|_, _| async { Ok(json!(["Amsterdam", "Utrecht"])) });
        let invocation = Invocation::new(GetCityListQuery).unwrap();

        let result = run_stage(&stage, &mut MiddlewareContext::new(), &invocation, &endpoint).await;
        assert_eq!(result.unwrap(), json!(["Amsterdam", "Utrecht"]));
    }

    #[tokio::test]
    async fn test_caller_not_resolved_when_debug_disabled() {
        let (logs, _guard) = LogCapture::install(Level::INFO);
        let authorization = Arc::new(CountingAuthorization::default());
        let mut ctx = MiddlewareContext::with_authorization(authorization.clone());
        let stage: Arc<dyn Middleware> = Arc::new(LoggingMiddleware::new("cities"));
        let endpoint = FnEndpoint::new(|_, _| async { Ok(json!([])) });
        let invocation = Invocation::new(GetCityListQuery).unwrap();

        run_stage(&stage, &mut ctx, &invocation, &endpoint).await.unwrap();
        assert_eq!(authorization.lookups.load(Ordering::SeqCst), 0);
        assert!(logs.contents().is_empty());
    }

    #[tokio::test]
    async fn test_request_logged_before_handler_runs() {
        let (logs, _guard) = LogCapture::install(Level::DEBUG);
        let authorization = Arc::new(CountingAuthorization::default());
        let mut ctx = MiddlewareContext::with_authorization(authorization.clone());
        let stage: Arc<dyn Middleware> = Arc::new(LoggingMiddleware::new("Cities"));
        let seen = logs.clone();
        let before_handler = Arc::new(parking_lot::Mutex::new(String::new()));
        let snapshot = before_handler.clone();
        let endpoint = FnEndpoint::new(move |_, _| {
            *snapshot.lock() = seen.contents();
            async { Err(PipelineError::internal("db down")) }
        });
        let invocation = Invocation::new(CreateCityCommand {
            name: "Utrecht".into(),
        })
        .unwrap();

        let result = run_stage(&stage, &mut ctx, &invocation, &endpoint).await;
        assert!(matches!(result, Err(PipelineError::Internal { .. })));

        let logged = before_handler.lock().clone();
        assert!(logged.contains("DEBUG"), "{logged}");
        assert!(logged.contains("Cities Request"), "{logged}");
        assert!(logged.contains("CreateCityCommand"), "{logged}");
        assert!(logged.contains("user_id=42"), "{logged}");
        assert!(logged.contains("user_name=jdoe"), "{logged}");
        assert!(logged.contains(r#"payload={"name":"Utrecht"}"#), "{logged}");
        assert!(!logs.contents().contains("Command Request"));
        assert_eq!(authorization.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_other_kinds_get_the_request_record_only() {
        let (logs, _guard) = LogCapture::install(Level::DEBUG);
        let stage: Arc<dyn Middleware> = Arc::new(LoggingMiddleware::new("Cities"));
        let endpoint = FnEndpoint::new(|_, _| async { Ok(json!("pong")) });
        let invocation = Invocation::new(PingRequest).unwrap();

        run_stage(&stage, &mut MiddlewareContext::new(), &invocation, &endpoint)
            .await
            .unwrap();

        let output = logs.contents();
        assert!(output.contains("Cities Request"), "{output}");
        assert!(output.contains("PingRequest"), "{output}");
        assert!(!output.contains("Command Request") && !output.contains("Query Response"));
    }

    #[tokio::test]
    async fn test_successful_query_logs_response() {
        let (logs, _guard) = LogCapture::install(Level::DEBUG);
        let stage: Arc<dyn Middleware> = Arc::new(LoggingMiddleware::new("Cities"));
        let endpoint = FnEndpoint::new(|_, _| async { Ok(json!(["Amsterdam"])) });
        let invocation = Invocation::new(GetCityListQuery).unwrap();

        run_stage(&stage, &mut MiddlewareContext::new(), &invocation, &endpoint)
            .await
            .unwrap();

        let output = logs.contents();
        let request = output.find("Cities Request").unwrap();
        let query = output.find("Query Request").unwrap();
        let response = output.find("Query Response").unwrap();
        assert!(request < query && query < response, "{output}");
        assert!(output.contains(r#"response=["Amsterdam"]"#), "{output}");
    }

    #[tokio::test]
    async fn test_failure_is_returned_unchanged() {
        let stage: Arc<dyn Middleware> = Arc::new(LoggingMiddleware::new("cities"));
        let endpoint = FnEndpoint::new(|_, _| async { Err(PipelineError::bad_request("no")) });
        let invocation = Invocation::new(GetCityListQuery).unwrap();

        let result = run_stage(&stage, &mut MiddlewareContext::new(), &invocation, &endpoint).await;
        assert!(matches!(result, Err(PipelineError::BadRequest { .. })));
    }
}
