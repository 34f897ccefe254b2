//! Typed collaborators and their type-erased forms.
//!
//! Applications implement [`RequestHandler`], [`Validator`] and
//! [`FallbackHandler`] against their concrete request types. The pipeline
//! stores them behind erased wrappers keyed by [`rampart_core::RequestType`]
//! and recovers the typed request from the [`Invocation`].

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Endpoint};
use crate::types::{Invocation, PipelineResult, Response};
use async_trait::async_trait;
use rampart_core::{PipelineError, Request, ValidationFailure};
use std::marker::PhantomData;
use tokio_util::sync::CancellationToken;

/// Handles one request type.
///
/// # Example
///
/// ```
/// use async_trait::async_trait;
/// use rampart_core::{PipelineError, Request};
/// use rampart_middleware::{CancellationToken, RequestHandler};
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct GetCityListQuery;
///
/// impl Request for GetCityListQuery {
///     type Response = Vec<String>;
/// }
///
/// struct GetCityListHandler;
///
/// #[async_trait]
/// impl RequestHandler<GetCityListQuery> for GetCityListHandler {
///     async fn handle(
///         &self,
///         _request: &GetCityListQuery,
///         _cancellation: CancellationToken,
///     ) -> Result<Vec<String>, PipelineError> {
///         Ok(vec!["Amsterdam".into(), "Rotterdam".into()])
///     }
/// }
/// ```
#[async_trait]
pub trait RequestHandler<R: Request>: Send + Sync + 'static {
    /// Handles `request`.
    ///
    /// `cancellation` fires when the invocation is abandoned, for example by
    /// the timeout stage.
    async fn handle(
        &self,
        request: &R,
        cancellation: CancellationToken,
    ) -> Result<R::Response, PipelineError>;
}

/// Checks one request type before it reaches its handler.
#[async_trait]
pub trait Validator<R: Request>: Send + Sync + 'static {
    /// Returns every problem found with `request`; empty when valid.
    async fn validate(&self, request: &R) -> Vec<ValidationFailure>;
}

/// Produces a substitute response when the handler fails.
#[async_trait]
pub trait FallbackHandler<R: Request>: Send + Sync + 'static {
    /// Returns the substitute for `request`.
    async fn fallback(
        &self,
        request: &R,
        cancellation: CancellationToken,
    ) -> Result<R::Response, PipelineError>;
}

fn encode<R: Request>(response: &R::Response) -> PipelineResult {
    serde_json::to_value(response).map_err(|e| {
        PipelineError::internal_with_source(
            format!("failed to serialize the response of {}", R::request_type().name()),
            e,
        )
    })
}

fn typed<R: Request>(invocation: &Invocation) -> Result<&R, PipelineError> {
    invocation.downcast::<R>().ok_or_else(|| {
        PipelineError::internal(format!(
            "invocation of {} does not carry a {}",
            invocation.name(),
            R::request_type().name()
        ))
    })
}

/// Endpoint that runs a [`RequestHandler`].
pub struct HandlerEndpoint<R, H> {
    handler: H,
    _request: PhantomData<fn() -> R>,
}

impl<R: Request, H: RequestHandler<R>> HandlerEndpoint<R, H> {
    /// Wraps `handler`.
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _request: PhantomData,
        }
    }
}

impl<R: Request, H: RequestHandler<R>> Endpoint for HandlerEndpoint<R, H> {
    fn call<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        invocation: &'a Invocation,
    ) -> BoxFuture<'a, PipelineResult> {
        let cancellation = ctx.cancellation_token();
        Box::pin(async move {
            let request = typed::<R>(invocation)?;
            let response = self.handler.handle(request, cancellation).await?;
            encode::<R>(&response)
        })
    }
}

pub(crate) trait ErasedValidator: Send + Sync {
    fn validate<'a>(&'a self, invocation: &'a Invocation) -> BoxFuture<'a, Vec<ValidationFailure>>;
}

pub(crate) struct TypedValidator<R, V> {
    validator: V,
    _request: PhantomData<fn() -> R>,
}

impl<R: Request, V: Validator<R>> TypedValidator<R, V> {
    pub(crate) fn new(validator: V) -> Self {
        Self {
            validator,
            _request: PhantomData,
        }
    }
}

impl<R: Request, V: Validator<R>> ErasedValidator for TypedValidator<R, V> {
    fn validate<'a>(&'a self, invocation: &'a Invocation) -> BoxFuture<'a, Vec<ValidationFailure>> {
        Box::pin(async move {
            match invocation.downcast::<R>() {
                Some(request) => self.validator.validate(request).await,
                None => Vec::new(),
            }
        })
    }
}

pub(crate) trait ErasedFallback: Send + Sync {
    fn fallback<'a>(
        &'a self,
        invocation: &'a Invocation,
        cancellation: CancellationToken,
    ) -> BoxFuture<'a, Result<Response, PipelineError>>;
}

pub(crate) struct TypedFallback<R, F> {
    fallback: F,
    _request: PhantomData<fn() -> R>,
}

impl<R: Request, F: FallbackHandler<R>> TypedFallback<R, F> {
    pub(crate) fn new(fallback: F) -> Self {
        Self {
            fallback,
            _request: PhantomData,
        }
    }
}

impl<R: Request, F: FallbackHandler<R>> ErasedFallback for TypedFallback<R, F> {
    fn fallback<'a>(
        &'a self,
        invocation: &'a Invocation,
        cancellation: CancellationToken,
    ) -> BoxFuture<'a, Result<Response, PipelineError>> {
        Box::pin(async move {
            let request = typed::<R>(invocation)?;
            let response = self.fallback.fallback(request, cancellation).await?;
            encode::<R>(&response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use serde_json::json;

    #[derive(Serialize)]
    struct GetCityQuery {
        code: String,
    }

    impl Request for GetCityQuery {
        type Response = Option<String>;
    }

    #[derive(Serialize)]
    struct PingQuery;

    impl Request for PingQuery {
        type Response = ();
    }

    struct CityHandler;

    #[async_trait]
    impl RequestHandler<GetCityQuery> for CityHandler {
        async fn handle(
            &self,
            request: &GetCityQuery,
            _cancellation: CancellationToken,
        ) -> Result<Option<String>, PipelineError> {
            Ok((request.code == "AMS").then(|| "Amsterdam".to_string()))
        }
    }

    struct CodeLength;

    #[async_trait]
    impl Validator<GetCityQuery> for CodeLength {
        async fn validate(&self, request: &GetCityQuery) -> Vec<ValidationFailure> {
            if request.code.len() == 3 {
                Vec::new()
            } else {
                vec![ValidationFailure::new("Code", "Code must be 3 characters")]
            }
        }
    }

    #[tokio::test]
    async fn test_handler_endpoint_serializes_response() {
        let endpoint = HandlerEndpoint::<GetCityQuery, _>::new(CityHandler);
        let mut ctx = MiddlewareContext::new();

        let found = Invocation::new(GetCityQuery { code: "AMS".into() }).unwrap();
        assert_eq!(endpoint.call(&mut ctx, &found).await.unwrap(), json!("Amsterdam"));

        let missing = Invocation::new(GetCityQuery { code: "XXX".into() }).unwrap();
        assert!(endpoint.call(&mut ctx, &missing).await.unwrap().is_null());
    }

    #[tokio::test]
    async fn test_handler_endpoint_rejects_foreign_invocation() {
        let endpoint = HandlerEndpoint::<GetCityQuery, _>::new(CityHandler);
        let mut ctx = MiddlewareContext::new();
        let invocation = Invocation::new(PingQuery).unwrap();

        let result = endpoint.call(&mut ctx, &invocation).await;
        assert!(matches!(result, Err(PipelineError::Internal { .. })));
    }

    #[tokio::test]
    async fn test_typed_validator() {
        let validator = TypedValidator::<GetCityQuery, _>::new(CodeLength);

        let bad = Invocation::new(GetCityQuery { code: "AMST".into() }).unwrap();
        assert_eq!(validator.validate(&bad).await.len(), 1);

        let good = Invocation::new(GetCityQuery { code: "AMS".into() }).unwrap();
        assert!(validator.validate(&good).await.is_empty());
    }
}
