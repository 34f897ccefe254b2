//! Per-request-type policy resolution.
//!
//! Policies are declared up front, either in code through
//! [`PolicyRegistryBuilder`] or in the configuration file under
//! `[policies.<ShortTypeName>]`, and resolved per [`RequestType`] at call
//! time. Nothing is discovered by reflection.
//!
//! # Resolution
//!
//! For retry, circuit breaker, rate limit and timeout:
//!
//! 1. A `[policies.<Name>]` section in the configuration replaces the numbers
//!    of any policy registered in code, keeping its error matcher.
//! 2. Otherwise a policy registered in code is used as is.
//! 3. Otherwise the `[resiliency]` default applies.
//!
//! The resolved policy is skipped entirely when `enabled = false`.
//!
//! # Example
//!
//! ```
//! use rampart_config::RampartConfig;
//! use rampart_core::{ErrorCategory, Request};
//! use rampart_middleware::{ErrorMatcher, PolicyRegistry, RetryPolicy};
//! use serde::Serialize;
//! use std::time::Duration;
//!
//! #[derive(Serialize)]
//! struct GetCityListQuery;
//!
//! impl Request for GetCityListQuery {
//!     type Response = Vec<String>;
//! }
//!
//! let registry = PolicyRegistry::builder()
//!     .retry::<GetCityListQuery>(
//!         RetryPolicy::new(5, Duration::from_millis(100))
//!             .handle(ErrorMatcher::category(ErrorCategory::NotFound)),
//!     )
//!     .build(&RampartConfig::default())
//!     .unwrap();
//!
//! let retry = registry.retry(GetCityListQuery::request_type()).unwrap();
//! assert_eq!(retry.retry_count, 5);
//! ```

use crate::classifier::ErrorMatcher;
use crate::handler::{
    ErasedFallback, ErasedValidator, FallbackHandler, TypedFallback, TypedValidator, Validator,
};
use rampart_cache::CachePolicy;
use rampart_config::{
    CircuitBreakerSettings, ConfigError, PolicyOverrides, RampartConfig, RateLimitSettings,
    RetrySettings, TimeoutSettings,
};
use rampart_core::{Request, RequestType};
use std::any::TypeId;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Retry parameters for one request type.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Whether the retry stage applies.
    pub enabled: bool,
    /// Additional attempts after the first failure.
    pub retry_count: u32,
    /// Median delay before the first retry.
    pub sleep_duration: Duration,
    /// Errors to retry even though they are expected outcomes.
    pub handle: Option<ErrorMatcher>,
}

impl RetryPolicy {
    /// Creates an enabled policy.
    #[must_use]
    pub fn new(retry_count: u32, sleep_duration: Duration) -> Self {
        Self {
            enabled: true,
            retry_count,
            sleep_duration,
            handle: None,
        }
    }

    /// Creates a policy that turns retrying off for the type.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::from(&RetrySettings::default())
        }
    }

    /// Also retries errors selected by `matcher`.
    #[must_use]
    pub fn handle(mut self, matcher: ErrorMatcher) -> Self {
        self.handle = Some(matcher);
        self
    }

    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        at_least_one(name, "retry.retry_count", u64::from(self.retry_count))?;
        positive(name, "retry.sleep_duration", self.sleep_duration)
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            enabled: settings.enabled,
            retry_count: settings.retry_count,
            sleep_duration: settings.sleep_duration(),
            handle: None,
        }
    }
}

/// Circuit breaker parameters for one request type.
#[derive(Debug, Clone)]
pub struct CircuitBreakerPolicy {
    /// Whether the circuit breaker stage applies.
    pub enabled: bool,
    /// Consecutive qualifying failures that open the circuit.
    pub exception_allowed: u32,
    /// How long the circuit stays open.
    pub duration_of_break: Duration,
    /// Errors to count even though they are expected outcomes.
    pub handle: Option<ErrorMatcher>,
}

impl CircuitBreakerPolicy {
    /// Creates an enabled policy.
    #[must_use]
    pub fn new(exception_allowed: u32, duration_of_break: Duration) -> Self {
        Self {
            enabled: true,
            exception_allowed,
            duration_of_break,
            handle: None,
        }
    }

    /// Creates a policy that turns circuit breaking off for the type.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::from(&CircuitBreakerSettings::default())
        }
    }

    /// Also counts errors selected by `matcher`.
    #[must_use]
    pub fn handle(mut self, matcher: ErrorMatcher) -> Self {
        self.handle = Some(matcher);
        self
    }

    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        at_least_one(
            name,
            "circuit_breaker.exception_allowed",
            u64::from(self.exception_allowed),
        )?;
        positive(name, "circuit_breaker.duration_of_break", self.duration_of_break)
    }
}

impl From<&CircuitBreakerSettings> for CircuitBreakerPolicy {
    fn from(settings: &CircuitBreakerSettings) -> Self {
        Self {
            enabled: settings.enabled,
            exception_allowed: settings.exception_allowed,
            duration_of_break: settings.duration_of_break(),
            handle: None,
        }
    }
}

/// Token bucket parameters for one request type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Whether the rate limit stage applies.
    pub enabled: bool,
    /// Executions permitted per window.
    pub number_of_allowed_executions: u32,
    /// The window.
    pub duration_limit: Duration,
    /// Bucket capacity.
    pub burst: u32,
}

impl RateLimitPolicy {
    /// Creates an enabled policy with a burst of one.
    #[must_use]
    pub fn new(number_of_allowed_executions: u32, duration_limit: Duration) -> Self {
        Self {
            enabled: true,
            number_of_allowed_executions,
            duration_limit,
            burst: 1,
        }
    }

    /// Creates a policy that turns rate limiting off for the type.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::from(&RateLimitSettings::default())
        }
    }

    /// Sets the bucket capacity.
    #[must_use]
    pub fn burst(mut self, burst: u32) -> Self {
        self.burst = burst;
        self
    }

    /// Time between two tokens.
    #[must_use]
    pub fn refill_interval(&self) -> Duration {
        (self.duration_limit / self.number_of_allowed_executions.max(1))
            .max(Duration::from_nanos(1))
    }

    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        at_least_one(
            name,
            "rate_limit.number_of_allowed_executions",
            u64::from(self.number_of_allowed_executions),
        )?;
        positive(name, "rate_limit.duration_limit", self.duration_limit)?;
        at_least_one(name, "rate_limit.burst", u64::from(self.burst))
    }
}

impl From<&RateLimitSettings> for RateLimitPolicy {
    fn from(settings: &RateLimitSettings) -> Self {
        Self {
            enabled: settings.enabled,
            number_of_allowed_executions: settings.number_of_allowed_executions,
            duration_limit: settings.duration_limit(),
            burst: settings.burst,
        }
    }
}

/// Deadline for one request type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    /// Whether the timeout stage applies.
    pub enabled: bool,
    /// The deadline.
    pub duration: Duration,
}

impl TimeoutPolicy {
    /// Creates an enabled policy.
    #[must_use]
    pub fn new(duration: Duration) -> Self {
        Self {
            enabled: true,
            duration,
        }
    }

    /// Creates a policy that turns the deadline off for the type.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::from(&TimeoutSettings::default())
        }
    }

    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        positive(name, "timeout.duration", self.duration)
    }
}

impl From<&TimeoutSettings> for TimeoutPolicy {
    fn from(settings: &TimeoutSettings) -> Self {
        Self {
            enabled: settings.enabled,
            duration: settings.duration(),
        }
    }
}

fn at_least_one(name: &str, field: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::invalid_value(
            format!("policies.{name}.{field}"),
            "must be at least 1",
        ));
    }
    Ok(())
}

fn positive(name: &str, field: &str, value: Duration) -> Result<(), ConfigError> {
    if value.is_zero() {
        return Err(ConfigError::invalid_value(
            format!("policies.{name}.{field}"),
            "must be greater than zero",
        ));
    }
    Ok(())
}

#[derive(Default)]
struct TypePolicies {
    retry: Option<RetryPolicy>,
    circuit_breaker: Option<CircuitBreakerPolicy>,
    rate_limit: Option<RateLimitPolicy>,
    timeout: Option<TimeoutPolicy>,
    performance_threshold: Option<Duration>,
    cache: Option<CachePolicy>,
    validators: Vec<Arc<dyn ErasedValidator>>,
    fallback: Option<Arc<dyn ErasedFallback>>,
}

struct Defaults {
    retry: RetryPolicy,
    circuit_breaker: CircuitBreakerPolicy,
    rate_limit: RateLimitPolicy,
    timeout: TimeoutPolicy,
    performance_threshold: Duration,
}

/// Resolved policies for every request type.
pub struct PolicyRegistry {
    defaults: Defaults,
    types: HashMap<TypeId, TypePolicies>,
    configured: BTreeMap<String, PolicyOverrides>,
}

impl PolicyRegistry {
    /// Creates a registry builder.
    #[must_use]
    pub fn builder() -> PolicyRegistryBuilder {
        PolicyRegistryBuilder::new()
    }

    /// Creates a registry with only the configured defaults and overrides.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the configuration is invalid.
    pub fn from_config(config: &RampartConfig) -> Result<Self, ConfigError> {
        Self::builder().build(config)
    }

    fn declared(&self, request_type: RequestType) -> Option<&TypePolicies> {
        self.types.get(&request_type.id())
    }

    fn configured(&self, request_type: RequestType) -> Option<&PolicyOverrides> {
        self.configured.get(request_type.name())
    }

    /// Returns the retry policy for `request_type`, or `None` when disabled.
    #[must_use]
    pub fn retry(&self, request_type: RequestType) -> Option<RetryPolicy> {
        let declared = self.declared(request_type).and_then(|p| p.retry.as_ref());
        let policy = match self.configured(request_type).and_then(|o| o.retry.as_ref()) {
            Some(settings) => RetryPolicy {
                handle: declared.and_then(|p| p.handle.clone()),
                ..RetryPolicy::from(settings)
            },
            None => declared.unwrap_or(&self.defaults.retry).clone(),
        };
        policy.enabled.then_some(policy)
    }

    /// Returns the circuit breaker policy for `request_type`, or `None` when disabled.
    #[must_use]
    pub fn circuit_breaker(&self, request_type: RequestType) -> Option<CircuitBreakerPolicy> {
        let declared = self
            .declared(request_type)
            .and_then(|p| p.circuit_breaker.as_ref());
        let policy = match self
            .configured(request_type)
            .and_then(|o| o.circuit_breaker.as_ref())
        {
            Some(settings) => CircuitBreakerPolicy {
                handle: declared.and_then(|p| p.handle.clone()),
                ..CircuitBreakerPolicy::from(settings)
            },
            None => declared.unwrap_or(&self.defaults.circuit_breaker).clone(),
        };
        policy.enabled.then_some(policy)
    }

    /// Returns the rate limit policy for `request_type`, or `None` when disabled.
    #[must_use]
    pub fn rate_limit(&self, request_type: RequestType) -> Option<RateLimitPolicy> {
        let policy = self
            .configured(request_type)
            .and_then(|o| o.rate_limit.as_ref())
            .map(RateLimitPolicy::from)
            .or_else(|| self.declared(request_type).and_then(|p| p.rate_limit))
            .unwrap_or(self.defaults.rate_limit);
        policy.enabled.then_some(policy)
    }

    /// Returns the timeout policy for `request_type`, or `None` when disabled.
    #[must_use]
    pub fn timeout(&self, request_type: RequestType) -> Option<TimeoutPolicy> {
        let policy = self
            .configured(request_type)
            .and_then(|o| o.timeout.as_ref())
            .map(TimeoutPolicy::from)
            .or_else(|| self.declared(request_type).and_then(|p| p.timeout))
            .unwrap_or(self.defaults.timeout);
        policy.enabled.then_some(policy)
    }

    /// Returns the slow-request threshold for `request_type`.
    #[must_use]
    pub fn performance_threshold(&self, request_type: RequestType) -> Duration {
        self.configured(request_type)
            .and_then(|o| o.request_performance_ms)
            .map(Duration::from_millis)
            .or_else(|| {
                self.declared(request_type)
                    .and_then(|p| p.performance_threshold)
            })
            .unwrap_or(self.defaults.performance_threshold)
    }

    /// Returns the cache policy registered for `request_type`.
    #[must_use]
    pub fn cache_policy(&self, request_type: RequestType) -> Option<&CachePolicy> {
        self.declared(request_type).and_then(|p| p.cache.as_ref())
    }

    /// Returns the number of validators registered for `request_type`.
    #[must_use]
    pub fn validator_count(&self, request_type: RequestType) -> usize {
        self.declared(request_type).map_or(0, |p| p.validators.len())
    }

    /// Returns `true` if a fallback is registered for `request_type`.
    #[must_use]
    pub fn has_fallback(&self, request_type: RequestType) -> bool {
        self.declared(request_type)
            .is_some_and(|p| p.fallback.is_some())
    }

    pub(crate) fn validators(&self, request_type: RequestType) -> &[Arc<dyn ErasedValidator>] {
        self.declared(request_type)
            .map_or(&[], |p| p.validators.as_slice())
    }

    pub(crate) fn fallback(&self, request_type: RequestType) -> Option<&Arc<dyn ErasedFallback>> {
        self.declared(request_type).and_then(|p| p.fallback.as_ref())
    }
}

impl fmt::Debug for PolicyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyRegistry")
            .field("types", &self.types.len())
            .field("configured", &self.configured.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Builder for a [`PolicyRegistry`].
#[derive(Default)]
pub struct PolicyRegistryBuilder {
    types: HashMap<TypeId, (RequestType, TypePolicies)>,
    duplicates: Vec<(&'static str, RequestType)>,
}

impl PolicyRegistryBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entry<R: Request>(&mut self) -> &mut TypePolicies {
        let request_type = R::request_type();
        &mut self
            .types
            .entry(request_type.id())
            .or_insert_with(|| (request_type, TypePolicies::default()))
            .1
    }

    fn declare<R: Request, T>(
        mut self,
        policy: &'static str,
        value: T,
        slot: impl FnOnce(&mut TypePolicies) -> &mut Option<T>,
    ) -> Self {
        let target = slot(self.entry::<R>());
        if target.is_some() {
            self.duplicates.push((policy, R::request_type()));
        } else {
            *target = Some(value);
        }
        self
    }

    /// Declares the retry policy of `R`.
    #[must_use]
    pub fn retry<R: Request>(self, policy: RetryPolicy) -> Self {
        self.declare::<R, _>("retry", policy, |p| &mut p.retry)
    }

    /// Declares the circuit breaker policy of `R`.
    #[must_use]
    pub fn circuit_breaker<R: Request>(self, policy: CircuitBreakerPolicy) -> Self {
        self.declare::<R, _>("circuit_breaker", policy, |p| &mut p.circuit_breaker)
    }

    /// Declares the rate limit policy of `R`.
    #[must_use]
    pub fn rate_limit<R: Request>(self, policy: RateLimitPolicy) -> Self {
        self.declare::<R, _>("rate_limit", policy, |p| &mut p.rate_limit)
    }

    /// Declares the timeout policy of `R`.
    #[must_use]
    pub fn timeout<R: Request>(self, policy: TimeoutPolicy) -> Self {
        self.declare::<R, _>("timeout", policy, |p| &mut p.timeout)
    }

    /// Declares the slow-request threshold of `R`.
    #[must_use]
    pub fn performance_threshold<R: Request>(self, threshold: Duration) -> Self {
        self.declare::<R, _>("performance", threshold, |p| &mut p.performance_threshold)
    }

    /// Caches responses of `R`.
    ///
    /// At most one cache policy may be declared per request type.
    #[must_use]
    pub fn cache<R: Request>(self, policy: CachePolicy) -> Self {
        self.declare::<R, _>("cache", policy, |p| &mut p.cache)
    }

    /// Adds a validator for `R`. Any number may be registered.
    #[must_use]
    pub fn validator<R: Request, V: Validator<R>>(mut self, validator: V) -> Self {
        self.entry::<R>()
            .validators
            .push(Arc::new(TypedValidator::new(validator)));
        self
    }

    /// Sets the fallback for `R`.
    #[must_use]
    pub fn fallback<R: Request, F: FallbackHandler<R>>(self, fallback: F) -> Self {
        let erased: Arc<dyn ErasedFallback> = Arc::new(TypedFallback::new(fallback));
        self.declare::<R, _>("fallback", erased, |p| &mut p.fallback)
    }

    /// Validates every declaration and merges in `config`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::DuplicatePolicy` if a single-valued policy was
    /// declared twice for one type, and `ConfigError::InvalidValue` for a
    /// threshold below one.
    pub fn build(self, config: &RampartConfig) -> Result<PolicyRegistry, ConfigError> {
        if let Some((policy, request_type)) = self.duplicates.first() {
            return Err(ConfigError::duplicate_policy(*policy, request_type.full_name()));
        }

        config.validate()?;

        let mut types = HashMap::with_capacity(self.types.len());
        for (id, (request_type, policies)) in self.types {
            let name = request_type.name();
            if let Some(p) = &policies.retry {
                p.validate(name)?;
            }
            if let Some(p) = &policies.circuit_breaker {
                p.validate(name)?;
            }
            if let Some(p) = &policies.rate_limit {
                p.validate(name)?;
            }
            if let Some(p) = &policies.timeout {
                p.validate(name)?;
            }
            if let Some(threshold) = policies.performance_threshold {
                positive(name, "request_performance", threshold)?;
            }
            types.insert(id, policies);
        }

        let resiliency = &config.resiliency;
        Ok(PolicyRegistry {
            defaults: Defaults {
                retry: RetryPolicy::from(&resiliency.retry),
                circuit_breaker: CircuitBreakerPolicy::from(&resiliency.circuit_breaker),
                rate_limit: RateLimitPolicy::from(&resiliency.rate_limit),
                timeout: TimeoutPolicy::from(&resiliency.timeout),
                performance_threshold: resiliency.request_performance(),
            },
            types,
            configured: config.policies.clone(),
        })
    }
}

impl fmt::Debug for PolicyRegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.types.values().map(|(t, _)| t.name()).collect();
        f.debug_struct("PolicyRegistryBuilder")
            .field("types", &names)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rampart_config::ResiliencyConfig;
    use rampart_core::{ErrorCategory, PipelineError, ValidationFailure};
    use serde::Serialize;
    use tokio_util::sync::CancellationToken;

    #[derive(Serialize)]
    struct GetCityListQuery;

    impl Request for GetCityListQuery {
        type Response = Vec<String>;
    }

    #[derive(Serialize)]
    struct CreateCityCommand;

    impl Request for CreateCityCommand {
        type Response = u32;
    }

    struct Always;

    #[async_trait]
    impl Validator<CreateCityCommand> for Always {
        async fn validate(&self, _request: &CreateCityCommand) -> Vec<ValidationFailure> {
            Vec::new()
        }
    }

    struct Zero;

    #[async_trait]
    impl FallbackHandler<CreateCityCommand> for Zero {
        async fn fallback(
            &self,
            _request: &CreateCityCommand,
            _cancellation: CancellationToken,
        ) -> Result<u32, PipelineError> {
            Ok(0)
        }
    }

    #[test]
    fn test_defaults_apply_to_undeclared_types() {
        let registry = PolicyRegistry::from_config(&RampartConfig::default()).unwrap();
        let defaults = ResiliencyConfig::default();

        let retry = registry.retry(GetCityListQuery::request_type()).unwrap();
        assert_eq!(retry.retry_count, defaults.retry.retry_count);
        assert_eq!(retry.sleep_duration, defaults.retry.sleep_duration());

        let circuit = registry.circuit_breaker(CreateCityCommand::request_type()).unwrap();
        assert_eq!(circuit.exception_allowed, defaults.circuit_breaker.exception_allowed);

        assert_eq!(
            registry.timeout(GetCityListQuery::request_type()),
            registry.timeout(CreateCityCommand::request_type())
        );
        assert_eq!(
            registry.performance_threshold(GetCityListQuery::request_type()),
            Duration::from_millis(60_000)
        );
        assert!(registry.cache_policy(GetCityListQuery::request_type()).is_none());
    }

    #[test]
    fn test_declared_policy_wins_over_default() {
        let registry = PolicyRegistry::builder()
            .circuit_breaker::<GetCityListQuery>(CircuitBreakerPolicy::new(
                3,
                Duration::from_secs(30),
            ))
            .build(&RampartConfig::default())
            .unwrap();

        let circuit = registry.circuit_breaker(GetCityListQuery::request_type()).unwrap();
        assert_eq!(circuit.exception_allowed, 3);

        let other = registry.circuit_breaker(CreateCityCommand::request_type()).unwrap();
        assert_eq!(other.exception_allowed, 10);
    }

    #[test]
    fn test_disabled_override_turns_stage_off() {
        let registry = PolicyRegistry::builder()
            .retry::<CreateCityCommand>(RetryPolicy::disabled())
            .timeout::<CreateCityCommand>(TimeoutPolicy::disabled())
            .build(&RampartConfig::default())
            .unwrap();

        assert!(registry.retry(CreateCityCommand::request_type()).is_none());
        assert!(registry.timeout(CreateCityCommand::request_type()).is_none());
        assert!(registry.retry(GetCityListQuery::request_type()).is_some());
    }

    #[test]
    fn test_disabled_default_applies_without_override() {
        let mut config = RampartConfig::default();
        config.resiliency.rate_limit.enabled = false;

        let registry = PolicyRegistry::builder()
            .rate_limit::<GetCityListQuery>(RateLimitPolicy::new(5, Duration::from_secs(1)))
            .build(&config)
            .unwrap();

        assert!(registry.rate_limit(GetCityListQuery::request_type()).is_some());
        assert!(registry.rate_limit(CreateCityCommand::request_type()).is_none());
    }

    #[test]
    fn test_configured_override_keeps_declared_matcher() {
        let config = RampartConfig::builder()
            .policy(
                "GetCityListQuery",
                PolicyOverrides {
                    retry: Some(RetrySettings {
                        enabled: true,
                        retry_count: 7,
                        sleep_duration_ms: 50,
                    }),
                    request_performance_ms: Some(250),
                    ..PolicyOverrides::default()
                },
            )
            .build();

        let registry = PolicyRegistry::builder()
            .retry::<GetCityListQuery>(
                RetryPolicy::new(2, Duration::from_secs(1))
                    .handle(ErrorMatcher::category(ErrorCategory::NotFound)),
            )
            .build(&config)
            .unwrap();

        let retry = registry.retry(GetCityListQuery::request_type()).unwrap();
        assert_eq!(retry.retry_count, 7);
        assert_eq!(retry.sleep_duration, Duration::from_millis(50));
        assert_eq!(retry.handle.unwrap().label(), "NOT_FOUND");
        assert_eq!(
            registry.performance_threshold(GetCityListQuery::request_type()),
            Duration::from_millis(250)
        );
    }

    #[test]
    fn test_duplicate_cache_policy_is_rejected() {
        let result = PolicyRegistry::builder()
            .cache::<GetCityListQuery>(CachePolicy::sliding(Duration::from_secs(60)))
            .cache::<GetCityListQuery>(CachePolicy::sliding(Duration::from_secs(30)))
            .build(&RampartConfig::default());

        assert!(matches!(
            result,
            Err(ConfigError::DuplicatePolicy { ref policy, .. }) if policy == "cache"
        ));
    }

    #[test]
    fn test_zero_thresholds_are_rejected() {
        let zero_retries = PolicyRegistry::builder()
            .retry::<GetCityListQuery>(RetryPolicy::new(0, Duration::from_millis(200)))
            .build(&RampartConfig::default());
        assert!(matches!(zero_retries, Err(ConfigError::InvalidValue { .. })));

        let zero_burst = PolicyRegistry::builder()
            .rate_limit::<GetCityListQuery>(
                RateLimitPolicy::new(10, Duration::from_secs(1)).burst(0),
            )
            .build(&RampartConfig::default());
        assert!(matches!(zero_burst, Err(ConfigError::InvalidValue { .. })));

        let zero_break = PolicyRegistry::builder()
            .circuit_breaker::<GetCityListQuery>(CircuitBreakerPolicy::new(3, Duration::ZERO))
            .build(&RampartConfig::default());
        assert!(matches!(zero_break, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_validators_accumulate_and_fallback_is_single() {
        let registry = PolicyRegistry::builder()
            .validator::<CreateCityCommand, _>(Always)
            .validator::<CreateCityCommand, _>(Always)
            .fallback::<CreateCityCommand, _>(Zero)
            .build(&RampartConfig::default())
            .unwrap();

        assert_eq!(registry.validator_count(CreateCityCommand::request_type()), 2);
        assert!(registry.has_fallback(CreateCityCommand::request_type()));
        assert!(!registry.has_fallback(GetCityListQuery::request_type()));

        let duplicate = PolicyRegistry::builder()
            .fallback::<CreateCityCommand, _>(Zero)
            .fallback::<CreateCityCommand, _>(Zero)
            .build(&RampartConfig::default());
        assert!(duplicate.is_err());
    }

    #[test]
    fn test_refill_interval() {
        let policy = RateLimitPolicy::new(100, Duration::from_secs(1));
        assert_eq!(policy.refill_interval(), Duration::from_millis(10));
    }
}
