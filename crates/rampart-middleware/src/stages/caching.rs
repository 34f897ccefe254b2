//! Response caching middleware.
//!
//! # Pipeline Position
//!
//! ```text
//! ... → Fallback → [Caching] → Handler
//! ```
//!
//! Request types with a registered [`CachePolicy`](rampart_cache::CachePolicy)
//! are served from the cache when possible. The key combines the full type
//! name, the caller's customer code, a hash of the caller's attributes and
//! the serialized request fields, so two callers never share an entry
//! unless they would be authorized to see the same data.
//!
//! Only non-null responses are stored. Cache failures are logged and the
//! handler runs as if the entry was missing.
//!
//! The stage is bypassed entirely in the test environment.

use crate::authorization::AuthorizationError;
use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::registry::PolicyRegistry;
use crate::types::{Invocation, PipelineResult, Response};
use rampart_cache::{derive_key, CacheService};
use rampart_config::Environment;
use rampart_telemetry::metrics;
use std::sync::Arc;

/// Serves and stores responses of cacheable request types.
#[derive(Debug, Clone)]
pub struct CachingMiddleware {
    registry: Arc<PolicyRegistry>,
    cache: Option<CacheService>,
    environment: Environment,
}

impl CachingMiddleware {
    /// Creates the stage. Without a `cache` every request passes through.
    #[must_use]
    pub fn new(
        registry: Arc<PolicyRegistry>,
        cache: Option<CacheService>,
        environment: Environment,
    ) -> Self {
        Self {
            registry,
            cache,
            environment,
        }
    }

    async fn cache_key(
        ctx: &MiddlewareContext,
        invocation: &Invocation,
    ) -> Result<String, AuthorizationError> {
        let authorization = ctx.authorization();
        let customer_code = authorization.customer_code().await?;
        let attributes = authorization.user_attributes().await?;
        Ok(derive_key(
            invocation.request_type().full_name(),
            invocation.payload(),
            &customer_code,
            &attributes,
        ))
    }
}

impl Middleware for CachingMiddleware {
    fn name(&self) -> &'static str {
        "caching"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        invocation: &'a Invocation,
        next: Next<'a>,
    ) -> BoxFuture<'a, PipelineResult> {
        Box::pin(async move {
            if self.environment.is_test() {
                return next.run(ctx, invocation).await;
            }
            let (Some(cache), Some(policy)) = (
                self.cache.as_ref(),
                self.registry.cache_policy(invocation.request_type()),
            ) else {
                return next.run(ctx, invocation).await;
            };

            let key = match Self::cache_key(ctx, invocation).await {
                Ok(key) => key,
                Err(error) => {
                    tracing::warn!(
                        request_id = %ctx.request_id(),
                        request_name = invocation.name(),
                        error = %error,
                        "Could not resolve caller for cache key, skipping cache"
                    );
                    return next.run(ctx, invocation).await;
                }
            };

            match cache.get::<Response>(&key).await {
                Ok(Some(cached)) => {
                    metrics::record_cache_lookup(invocation.name(), true);
                    tracing::debug!(cache_key = %key, "Cache hit");
                    return Ok(cached);
                }
                Ok(None) => metrics::record_cache_lookup(invocation.name(), false),
                Err(error) => {
                    metrics::record_cache_lookup(invocation.name(), false);
                    tracing::warn!(cache_key = %key, error = %error, "Cache read failed");
                }
            }

            let response = next.run(ctx, invocation).await?;
            if !response.is_null() {
                if let Err(error) = cache.set(&key, &response, policy).await {
                    tracing::warn!(cache_key = %key, error = %error, "Cache write failed");
                }
            }
            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::{StaticAuthorization, UserAttributes, UserAuthorization};
    use crate::stages::test_support::{run_stage, ScriptedEndpoint};
    use async_trait::async_trait;
    use rampart_cache::{CachePolicy, MemoryCacheStore};
    use rampart_config::RampartConfig;
    use rampart_core::{AuthorizedUser, PipelineError, Request};
    use serde::Serialize;
    use serde_json::{json, Value};
    use std::time::Duration;

    #[derive(Serialize)]
    struct GetCityListQuery {
        country: String,
    }

    impl Request for GetCityListQuery {
        type Response = Vec<String>;
    }

    #[derive(Serialize)]
    struct FindCityQuery {
        name: String,
    }

    impl Request for FindCityQuery {
        type Response = Option<String>;
    }

    struct Unreachable;

    #[async_trait]
    impl UserAuthorization for Unreachable {
        async fn customer_code(&self) -> Result<String, AuthorizationError> {
            Err(AuthorizationError::Unavailable("identity service down".into()))
        }

        async fn user_attributes(&self) -> Result<UserAttributes, AuthorizationError> {
            Err(AuthorizationError::Unavailable("identity service down".into()))
        }

        async fn authorized_user(&self) -> Result<AuthorizedUser, AuthorizationError> {
            Err(AuthorizationError::Unavailable("identity service down".into()))
        }
    }

    fn stage(environment: Environment) -> (Arc<dyn Middleware>, Arc<MemoryCacheStore>) {
        let config = RampartConfig::default();
        let registry = PolicyRegistry::builder()
            .cache::<GetCityListQuery>(CachePolicy::sliding(Duration::from_secs(60)))
            .cache::<FindCityQuery>(CachePolicy::sliding(Duration::from_secs(60)))
            .build(&config)
            .unwrap();
        let store = Arc::new(MemoryCacheStore::new());
        let cache = CacheService::from_config(store.clone(), &config);
        let stage = CachingMiddleware::new(Arc::new(registry), Some(cache), environment);
        (Arc::new(stage), store)
    }

    fn acme() -> MiddlewareContext {
        MiddlewareContext::with_authorization(Arc::new(StaticAuthorization::new(
            "ACME",
            AuthorizedUser::new("42", "jdoe"),
        )))
    }

    fn cities(country: &str) -> Invocation {
        Invocation::new(GetCityListQuery {
            country: country.into(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_second_call_is_served_from_cache() {
        let (stage, _store) = stage(Environment::development());
        let endpoint = ScriptedEndpoint::ok(json!(["Amsterdam", "Utrecht"]));

        let first = run_stage(&stage, &mut acme(), &cities("NL"), &endpoint).await.unwrap();
        let second = run_stage(&stage, &mut acme(), &cities("NL"), &endpoint).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(endpoint.calls(), 1);
    }

    #[tokio::test]
    async fn test_key_includes_fields_and_customer() {
        let (stage, _store) = stage(Environment::development());
        let endpoint = ScriptedEndpoint::ok(json!(["somewhere"]));

        run_stage(&stage, &mut acme(), &cities("NL"), &endpoint).await.unwrap();
        run_stage(&stage, &mut acme(), &cities("BE"), &endpoint).await.unwrap();

        let mut other = MiddlewareContext::with_authorization(Arc::new(StaticAuthorization::new(
            "GLOBEX",
            AuthorizedUser::new("7", "asmith"),
        )));
        run_stage(&stage, &mut other, &cities("NL"), &endpoint).await.unwrap();

        assert_eq!(endpoint.calls(), 3);
    }

    #[tokio::test]
    async fn test_null_response_is_not_cached() {
        let (stage, _store) = stage(Environment::development());
        let endpoint = ScriptedEndpoint::ok(Value::Null);
        let invocation = Invocation::new(FindCityQuery {
            name: "Atlantis".into(),
        })
        .unwrap();

        run_stage(&stage, &mut acme(), &invocation, &endpoint).await.unwrap();
        run_stage(&stage, &mut acme(), &invocation, &endpoint).await.unwrap();

        assert_eq!(endpoint.calls(), 2);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let (stage, _store) = stage(Environment::development());
        let endpoint = ScriptedEndpoint::new(|call| {
            if call == 1 {
                Err(PipelineError::internal("db down"))
            } else {
                Ok(json!(["Amsterdam"]))
            }
        });

        assert!(run_stage(&stage, &mut acme(), &cities("NL"), &endpoint).await.is_err());
        assert!(run_stage(&stage, &mut acme(), &cities("NL"), &endpoint).await.is_ok());
        assert!(run_stage(&stage, &mut acme(), &cities("NL"), &endpoint).await.is_ok());
        assert_eq!(endpoint.calls(), 2);
    }

    #[tokio::test]
    async fn test_bypassed_in_test_environment() {
        let (stage, _store) = stage(Environment::test());
        let endpoint = ScriptedEndpoint::ok(json!(["Amsterdam"]));

        run_stage(&stage, &mut acme(), &cities("NL"), &endpoint).await.unwrap();
        run_stage(&stage, &mut acme(), &cities("NL"), &endpoint).await.unwrap();

        assert_eq!(endpoint.calls(), 2);
    }

    #[tokio::test]
    async fn test_unresolvable_caller_skips_cache() {
        let (stage, _store) = stage(Environment::development());
        let endpoint = ScriptedEndpoint::ok(json!(["Amsterdam"]));

        for _ in 0..2 {
            let mut ctx = MiddlewareContext::with_authorization(Arc::new(Unreachable));
            run_stage(&stage, &mut ctx, &cities("NL"), &endpoint).await.unwrap();
        }
        assert_eq!(endpoint.calls(), 2);
    }
}
