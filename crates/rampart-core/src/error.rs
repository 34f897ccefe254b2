//! Error types for Rampart.
//!
//! This module provides [`PipelineError`], the single error type that flows
//! through every pipeline stage and out to the caller.
//!
//! # Expected vs. unexpected failures
//!
//! | `ErrorCategory` | Expected | Produced by |
//! |---|---|---|
//! | `Validation` | yes | validation stage |
//! | `BadRequest` | yes | handlers |
//! | `NotFound` | yes | handlers |
//! | `Cancelled` | yes | cancellation of the invocation |
//! | `Unauthorized` / `Forbidden` | no | handlers |
//! | `CircuitOpen` | no | circuit breaker stage |
//! | `RateLimited` | no | rate limit stage |
//! | `Timeout` | no | timeout stage |
//! | `Internal` | no | anything else |
//!
//! Expected failures are never retried, never counted against a circuit and
//! never logged above warning level.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using [`PipelineError`].
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Message carried by every [`PipelineError::ValidationFailed`] built from field errors.
pub const VALIDATION_FAILED_MESSAGE: &str = "One or more validation failures have occurred.";

/// Categories of errors for classification and handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Input validation failed.
    Validation,
    /// The request was malformed.
    BadRequest,
    /// A requested resource does not exist.
    NotFound,
    /// The caller is not authenticated.
    Unauthorized,
    /// The caller is authenticated but not allowed.
    Forbidden,
    /// The circuit for this request type is open.
    CircuitOpen,
    /// The rate limit for this request type was exceeded.
    RateLimited,
    /// The invocation exceeded its deadline.
    Timeout,
    /// The invocation was cancelled.
    Cancelled,
    /// Unclassified failure.
    Internal,
}

impl ErrorCategory {
    /// Returns `true` for outcomes the application expects and reports verbatim.
    ///
    /// These are the categories that resilience policies never treat as
    /// transient.
    #[must_use]
    pub const fn is_expected(&self) -> bool {
        matches!(
            self,
            Self::Validation | Self::BadRequest | Self::NotFound | Self::Cancelled
        )
    }

    /// Returns a stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION_FAILED",
            Self::BadRequest => "BAD_REQUEST",
            Self::NotFound => "NOT_FOUND",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::CircuitOpen => "CIRCUIT_OPEN",
            Self::RateLimited => "RATE_LIMITED",
            Self::Timeout => "TIMED_OUT",
            Self::Cancelled => "CANCELLED",
            Self::Internal => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Standard error type for the Rampart pipeline.
///
/// # Example
///
/// ```
/// use rampart_core::{ErrorCategory, PipelineError};
///
/// fn find_city(id: u32) -> Result<String, PipelineError> {
///     Err(PipelineError::not_found(format!("city {id} does not exist")))
/// }
///
/// let err = find_city(7).unwrap_err();
/// assert_eq!(err.category(), ErrorCategory::NotFound);
/// assert!(err.is_expected());
/// ```
#[derive(Error, Debug)]
pub enum PipelineError {
    /// One or more validators rejected the request.
    #[error("Validation failed: {message}")]
    ValidationFailed {
        /// Human-readable error message.
        message: String,
        /// Distinct messages per field.
        errors: FieldErrors,
    },

    /// The request was malformed.
    #[error("Bad request: {message}")]
    BadRequest {
        /// Human-readable error message.
        message: String,
    },

    /// Resource not found.
    #[error("Not found: {message}")]
    NotFound {
        /// Human-readable error message.
        message: String,
    },

    /// The caller is not authenticated.
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Human-readable error message.
        message: String,
    },

    /// The caller is not allowed to perform the operation.
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Human-readable error message.
        message: String,
    },

    /// The circuit breaker rejected the call without invoking the handler.
    #[error("Circuit open for {request_name}")]
    CircuitOpen {
        /// Short name of the request type.
        request_name: String,
        /// Time remaining until a trial call is allowed, if known.
        retry_after: Option<Duration>,
    },

    /// The rate limiter rejected the call without invoking the handler.
    #[error("Rate limit exceeded for {request_name}")]
    RateLimited {
        /// Short name of the request type.
        request_name: String,
        /// Time until the next execution is permitted.
        retry_after: Duration,
    },

    /// The invocation exceeded its deadline.
    #[error("{request_name} timed out after {after:?}")]
    TimedOut {
        /// Short name of the request type.
        request_name: String,
        /// The configured deadline.
        after: Duration,
    },

    /// The invocation was cancelled.
    #[error("Cancelled: {message}")]
    Cancelled {
        /// Human-readable error message.
        message: String,
    },

    /// Unclassified failure.
    #[error("Internal error: {message}")]
    Internal {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl PipelineError {
    /// Creates a validation error from collected field errors.
    #[must_use]
    pub fn validation(errors: FieldErrors) -> Self {
        Self::ValidationFailed {
            message: VALIDATION_FAILED_MESSAGE.to_string(),
            errors,
        }
    }

    /// Creates a validation error for a single field.
    #[must_use]
    pub fn validation_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.add(field, message);
        Self::validation(errors)
    }

    /// Creates a bad request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Creates a not found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates a not found error naming the missing resource.
    #[must_use]
    pub fn not_found_resource(resource_type: &str, resource_id: impl std::fmt::Display) -> Self {
        Self::not_found(format!("{resource_type} ({resource_id}) was not found"))
    }

    /// Creates an unauthorized error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Creates a forbidden error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Creates a circuit open error.
    #[must_use]
    pub fn circuit_open(request_name: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self::CircuitOpen {
            request_name: request_name.into(),
            retry_after,
        }
    }

    /// Creates a rate limited error.
    #[must_use]
    pub fn rate_limited(request_name: impl Into<String>, retry_after: Duration) -> Self {
        Self::RateLimited {
            request_name: request_name.into(),
            retry_after,
        }
    }

    /// Creates a timeout error.
    #[must_use]
    pub fn timed_out(request_name: impl Into<String>, after: Duration) -> Self {
        Self::TimedOut {
            request_name: request_name.into(),
            after,
        }
    }

    /// Creates a cancellation error.
    #[must_use]
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::Cancelled {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an internal error with a source error.
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::ValidationFailed { .. } => ErrorCategory::Validation,
            Self::BadRequest { .. } => ErrorCategory::BadRequest,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Unauthorized { .. } => ErrorCategory::Unauthorized,
            Self::Forbidden { .. } => ErrorCategory::Forbidden,
            Self::CircuitOpen { .. } => ErrorCategory::CircuitOpen,
            Self::RateLimited { .. } => ErrorCategory::RateLimited,
            Self::TimedOut { .. } => ErrorCategory::Timeout,
            Self::Cancelled { .. } => ErrorCategory::Cancelled,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns `true` if this is an expected application outcome.
    #[must_use]
    pub const fn is_expected(&self) -> bool {
        self.category().is_expected()
    }

    /// Returns the field errors of a validation failure.
    #[must_use]
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::ValidationFailed { errors, .. } => Some(errors),
            _ => None,
        }
    }

    /// Returns the underlying source of an internal error.
    #[must_use]
    pub fn internal_source(&self) -> Option<&anyhow::Error> {
        match self {
            Self::Internal { source, .. } => source.as_ref(),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for PipelineError {
    fn from(source: anyhow::Error) -> Self {
        Self::Internal {
            message: source.to_string(),
            source: Some(source),
        }
    }
}

/// A single message produced by a validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFailure {
    /// Name of the offending field.
    pub field: String,
    /// Human-readable error message.
    pub message: String,
}

impl ValidationFailure {
    /// Creates a new validation failure.
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Field-specific validation errors.
///
/// Messages are kept distinct per field, in the order they were first added.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl FieldErrors {
    /// Creates a new empty `FieldErrors`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an error for a field, ignoring a message already recorded for it.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        let message = message.into();
        let messages = self.fields.entry(field.into()).or_default();
        if !messages.contains(&message) {
            messages.push(message);
        }
    }

    /// Returns the messages recorded for a field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.fields.get(field).map(Vec::as_slice)
    }

    /// Iterates over fields and their messages in field-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.fields
            .iter()
            .map(|(field, messages)| (field.as_str(), messages.as_slice()))
    }

    /// Returns `true` if there are no field errors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the number of fields with errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }
}

impl FromIterator<ValidationFailure> for FieldErrors {
    fn from_iter<I: IntoIterator<Item = ValidationFailure>>(iter: I) -> Self {
        let mut errors = Self::new();
        for failure in iter {
            errors.add(failure.field, failure.message);
        }
        errors
    }
}
