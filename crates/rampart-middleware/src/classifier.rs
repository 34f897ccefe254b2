//! Transient versus definitive failures.
//!
//! The retry and circuit breaker stages only react to *qualifying* failures.
//! Expected outcomes (validation, bad request, not found, cancellation) are
//! definitive and propagate untouched, unless the policy names them through
//! an [`ErrorMatcher`].

use rampart_core::{ErrorCategory, PipelineError};
use std::fmt;
use std::sync::Arc;

/// Selects errors a policy should treat as qualifying.
///
/// # Example
///
/// ```
/// use rampart_core::{ErrorCategory, PipelineError};
/// use rampart_middleware::ErrorMatcher;
///
/// let matcher = ErrorMatcher::category(ErrorCategory::NotFound);
/// assert!(matcher.matches(&PipelineError::not_found("not replicated yet")));
/// assert!(!matcher.matches(&PipelineError::bad_request("bad")));
/// ```
#[derive(Clone)]
pub struct ErrorMatcher {
    label: String,
    predicate: Arc<dyn Fn(&PipelineError) -> bool + Send + Sync>,
}

impl ErrorMatcher {
    /// Matches every error of `category`.
    #[must_use]
    pub fn category(category: ErrorCategory) -> Self {
        Self {
            label: category.code().to_string(),
            predicate: Arc::new(move |error| error.category() == category),
        }
    }

    /// Matches internal errors whose source is an `E`.
    #[must_use]
    pub fn source<E>() -> Self
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Self {
            label: std::any::type_name::<E>().to_string(),
            predicate: Arc::new(|error| {
                error
                    .internal_source()
                    .is_some_and(|source| source.downcast_ref::<E>().is_some())
            }),
        }
    }

    /// Matches errors accepted by `predicate`.
    pub fn predicate<F>(label: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&PipelineError) -> bool + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// Returns `true` if `error` is selected.
    #[must_use]
    pub fn matches(&self, error: &PipelineError) -> bool {
        (self.predicate)(error)
    }

    /// Returns the matcher's label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Debug for ErrorMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ErrorMatcher").field(&self.label).finish()
    }
}

/// Returns `true` if `error` should trigger a retry or count against a circuit.
///
/// A matching `handle` always qualifies; otherwise only unexpected errors do.
#[must_use]
pub fn is_qualifying(error: &PipelineError, handle: Option<&ErrorMatcher>) -> bool {
    handle.is_some_and(|matcher| matcher.matches(error)) || !error.is_expected()
}
