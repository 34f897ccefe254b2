//! Per-request-type cache policy.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::CacheEntryOptions;

/// How long a cached response lives.
///
/// At most one policy is registered per request type. Any combination of
/// fields may be set; an absolute expiration wins over a relative one.
///
/// # Example
///
/// ```
/// use rampart_cache::CachePolicy;
/// use std::time::Duration;
///
/// let policy = CachePolicy::sliding(Duration::from_secs(60))
///     .with_absolute_expiration_relative_to_now(Duration::from_secs(600));
///
/// let options = policy.entry_options(chrono::Utc::now()).unwrap();
/// assert_eq!(options.sliding_expiration, Some(Duration::from_secs(60)));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CachePolicy {
    /// Evict after this long without access.
    pub sliding_expiration: Option<Duration>,
    /// Evict at this instant.
    pub absolute_expiration: Option<DateTime<Utc>>,
    /// Evict this long after the write.
    pub absolute_expiration_relative_to_now: Option<Duration>,
}

impl CachePolicy {
    /// A policy with no expiration; cache defaults apply.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy with only a sliding expiration.
    #[must_use]
    pub fn sliding(duration: Duration) -> Self {
        Self::new().with_sliding_expiration(duration)
    }

    /// Sets the sliding expiration.
    #[must_use]
    pub fn with_sliding_expiration(mut self, duration: Duration) -> Self {
        self.sliding_expiration = Some(duration);
        self
    }

    /// Sets an absolute expiration instant.
    #[must_use]
    pub fn with_absolute_expiration(mut self, at: DateTime<Utc>) -> Self {
        self.absolute_expiration = Some(at);
        self
    }

    /// Sets an absolute expiration relative to the write.
    #[must_use]
    pub fn with_absolute_expiration_relative_to_now(mut self, duration: Duration) -> Self {
        self.absolute_expiration_relative_to_now = Some(duration);
        self
    }

    /// Converts the policy into store options as of `now`.
    ///
    /// Returns `None` when the absolute expiration is not in the future,
    /// meaning the entry must not be written.
    #[must_use]
    pub fn entry_options(&self, now: DateTime<Utc>) -> Option<CacheEntryOptions> {
        let absolute = match self.absolute_expiration {
            Some(at) if at <= now => return None,
            Some(at) => (at - now).to_std().ok(),
            None => self.absolute_expiration_relative_to_now,
        };

        Some(CacheEntryOptions {
            sliding_expiration: self.sliding_expiration,
            absolute_expiration_relative_to_now: absolute,
        })
    }
}
