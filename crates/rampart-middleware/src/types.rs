//! Common types used throughout the middleware pipeline.
//!
//! Stages never see a concrete request type. They see an [`Invocation`],
//! which carries the request's [`RequestType`], its serialized fields and the
//! original value for the terminal handler to recover.

use rampart_core::{PipelineError, Request, RequestType};
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// The response type used in the middleware pipeline.
///
/// Handlers' typed responses are serialized to JSON on the way out of the
/// endpoint so that the caching and fallback stages can work on any type.
pub type Response = Value;

/// Result of running an invocation through the pipeline.
pub type PipelineResult = Result<Response, PipelineError>;

/// A single request travelling through the pipeline.
///
/// # Example
///
/// ```
/// use rampart_core::Request;
/// use rampart_middleware::Invocation;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct GetCityQuery {
///     code: String,
/// }
///
/// impl Request for GetCityQuery {
///     type Response = Option<String>;
/// }
///
/// let invocation = Invocation::new(GetCityQuery { code: "AMS".into() }).unwrap();
/// assert_eq!(invocation.name(), "GetCityQuery");
/// assert_eq!(invocation.payload()["code"], "AMS");
/// assert_eq!(invocation.downcast::<GetCityQuery>().unwrap().code, "AMS");
/// ```
#[derive(Clone)]
pub struct Invocation {
    request_type: RequestType,
    payload: Value,
    request: Arc<dyn Any + Send + Sync>,
}

impl Invocation {
    /// Wraps a typed request.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Internal` if the request cannot be serialized.
    pub fn new<R: Request>(request: R) -> Result<Self, PipelineError> {
        let request_type = R::request_type();
        let payload = serde_json::to_value(&request).map_err(|e| {
            PipelineError::internal_with_source(
                format!("failed to serialize {}", request_type.name()),
                e,
            )
        })?;

        Ok(Self {
            request_type,
            payload,
            request: Arc::new(request),
        })
    }

    /// Returns the identity of the request type.
    #[must_use]
    pub const fn request_type(&self) -> RequestType {
        self.request_type
    }

    /// Returns the short name of the request type.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.request_type.name()
    }

    /// Returns the request's serialized top-level fields.
    #[must_use]
    pub const fn payload(&self) -> &Value {
        &self.payload
    }

    /// Returns the original request if it is an `R`.
    #[must_use]
    pub fn downcast<R: Request>(&self) -> Option<&R> {
        self.request.downcast_ref::<R>()
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("request_type", &self.request_type)
            .field("payload", &self.payload)
            .finish_non_exhaustive()
    }
}
