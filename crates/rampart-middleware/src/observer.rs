//! Callbacks fired by the resilience stages.
//!
//! Every stage already logs its events through `tracing` and records them as
//! metrics. Observers are for callers that need to react in code, such as
//! tests counting retries or a health endpoint tracking open circuits.

use rampart_core::{PipelineError, RequestType};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// A retry about to be scheduled.
#[derive(Debug)]
pub struct RetryEvent<'a> {
    /// The request being retried.
    pub request_type: RequestType,
    /// One-based number of the retry.
    pub attempt: u32,
    /// Backoff before the retry runs.
    pub delay: Duration,
    /// The failure that triggered it.
    pub error: &'a PipelineError,
}

/// Called before each retry.
pub type RetryObserver = Arc<dyn Fn(&RetryEvent<'_>) + Send + Sync>;

/// Called when a circuit opens, with the break duration.
pub type BreakObserver = Arc<dyn Fn(RequestType, Duration) + Send + Sync>;

/// Called when a circuit closes again.
pub type ResetObserver = Arc<dyn Fn(RequestType) + Send + Sync>;

/// Called when an invocation exceeds its deadline.
pub type TimeoutObserver = Arc<dyn Fn(RequestType, Duration) + Send + Sync>;

/// The set of observers handed to the standard pipeline.
///
/// # Example
///
/// ```
/// use rampart_middleware::Observers;
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::sync::Arc;
///
/// let retries = Arc::new(AtomicU32::new(0));
/// let counter = retries.clone();
/// let observers = Observers::new().on_retry(move |_event| {
///     counter.fetch_add(1, Ordering::Relaxed);
/// });
/// # let _ = observers;
/// ```
#[derive(Clone, Default)]
pub struct Observers {
    pub(crate) on_retry: Option<RetryObserver>,
    pub(crate) on_break: Option<BreakObserver>,
    pub(crate) on_reset: Option<ResetObserver>,
    pub(crate) on_timeout: Option<TimeoutObserver>,
}

impl Observers {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the retry observer.
    #[must_use]
    pub fn on_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(&RetryEvent<'_>) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(f));
        self
    }

    /// Sets the circuit break observer.
    #[must_use]
    pub fn on_break<F>(mut self, f: F) -> Self
    where
        F: Fn(RequestType, Duration) + Send + Sync + 'static,
    {
        self.on_break = Some(Arc::new(f));
        self
    }

    /// Sets the circuit reset observer.
    #[must_use]
    pub fn on_reset<F>(mut self, f: F) -> Self
    where
        F: Fn(RequestType) + Send + Sync + 'static,
    {
        self.on_reset = Some(Arc::new(f));
        self
    }

    /// Sets the timeout observer.
    #[must_use]
    pub fn on_timeout<F>(mut self, f: F) -> Self
    where
        F: Fn(RequestType, Duration) + Send + Sync + 'static,
    {
        self.on_timeout = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("on_retry", &self.on_retry.is_some())
            .field("on_break", &self.on_break.is_some())
            .field("on_reset", &self.on_reset.is_some())
            .field("on_timeout", &self.on_timeout.is_some())
            .finish()
    }
}
