//! Configuration schema types.
//!
//! This module defines the structure of all configuration sections.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::ConfigError;

/// The runtime environment name.
///
/// Two names have special meaning to the pipeline:
///
/// - [`Environment::PRODUCTION`] enables rate limiting.
/// - [`Environment::TEST`] bypasses caching and rate limiting.
///
/// # Example
///
/// ```
/// use rampart_config::Environment;
///
/// assert!(Environment::production().is_production());
/// assert!(Environment::test().is_test());
/// assert!(!Environment::default().is_production());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Environment(String);

impl Environment {
    /// The production-like environment.
    pub const PRODUCTION: &'static str = "Production";
    /// The environment used by automated tests.
    pub const TEST: &'static str = "Test";
    /// The default environment.
    pub const DEVELOPMENT: &'static str = "Development";

    /// Creates an environment with an arbitrary name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The production environment.
    #[must_use]
    pub fn production() -> Self {
        Self::new(Self::PRODUCTION)
    }

    /// The test environment.
    #[must_use]
    pub fn test() -> Self {
        Self::new(Self::TEST)
    }

    /// The development environment.
    #[must_use]
    pub fn development() -> Self {
        Self::new(Self::DEVELOPMENT)
    }

    /// Returns the environment name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }

    /// Returns `true` in the production-like environment.
    #[must_use]
    pub fn is_production(&self) -> bool {
        self.0 == Self::PRODUCTION
    }

    /// Returns `true` in the automated test environment.
    #[must_use]
    pub fn is_test(&self) -> bool {
        self.0 == Self::TEST
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::development()
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Application identity section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Application namespace. Prefixes cache keys and appears in log records.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Runtime environment name.
    #[serde(default)]
    pub environment: Environment,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            environment: Environment::default(),
        }
    }
}

fn default_namespace() -> String {
    "Rampart".to_string()
}

fn default_true() -> bool {
    true
}

fn require_at_least_one(field: &str, value: u64) -> Result<(), ConfigError> {
    if value < 1 {
        return Err(ConfigError::invalid_value(field, "must be at least 1"));
    }
    Ok(())
}

/// Retry policy settings.
///
/// # Example
///
/// ```
/// use rampart_config::RetrySettings;
/// use std::time::Duration;
///
/// let settings = RetrySettings::default();
/// assert_eq!(settings.retry_count, 3);
/// assert_eq!(settings.sleep_duration(), Duration::from_millis(200));
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RetrySettings {
    /// Whether retries are enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Number of additional attempts after the first failure.
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Median delay before the first retry, in milliseconds.
    #[serde(default = "default_sleep_duration_ms")]
    pub sleep_duration_ms: u64,
}

impl RetrySettings {
    /// Median delay before the first retry.
    #[must_use]
    pub fn sleep_duration(&self) -> Duration {
        Duration::from_millis(self.sleep_duration_ms)
    }

    pub(crate) fn validate(&self, prefix: &str) -> Result<(), ConfigError> {
        require_at_least_one(&format!("{prefix}.retry_count"), u64::from(self.retry_count))?;
        require_at_least_one(&format!("{prefix}.sleep_duration_ms"), self.sleep_duration_ms)
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            retry_count: default_retry_count(),
            sleep_duration_ms: default_sleep_duration_ms(),
        }
    }
}

fn default_retry_count() -> u32 {
    3
}

fn default_sleep_duration_ms() -> u64 {
    200
}

/// Circuit breaker policy settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CircuitBreakerSettings {
    /// Whether the circuit breaker is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Consecutive qualifying failures that open the circuit.
    #[serde(default = "default_exception_allowed")]
    pub exception_allowed: u32,

    /// How long the circuit stays open, in seconds.
    #[serde(default = "default_duration_of_break_secs")]
    pub duration_of_break_secs: u64,
}

impl CircuitBreakerSettings {
    /// How long the circuit stays open.
    #[must_use]
    pub fn duration_of_break(&self) -> Duration {
        Duration::from_secs(self.duration_of_break_secs)
    }

    pub(crate) fn validate(&self, prefix: &str) -> Result<(), ConfigError> {
        require_at_least_one(
            &format!("{prefix}.exception_allowed"),
            u64::from(self.exception_allowed),
        )?;
        require_at_least_one(
            &format!("{prefix}.duration_of_break_secs"),
            self.duration_of_break_secs,
        )
    }
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            exception_allowed: default_exception_allowed(),
            duration_of_break_secs: default_duration_of_break_secs(),
        }
    }
}

fn default_exception_allowed() -> u32 {
    10
}

fn default_duration_of_break_secs() -> u64 {
    30
}

/// Rate limit policy settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RateLimitSettings {
    /// Whether rate limiting is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Executions permitted per window.
    #[serde(default = "default_number_of_allowed_executions")]
    pub number_of_allowed_executions: u32,

    /// Window length, in seconds.
    #[serde(default = "default_duration_limit_secs")]
    pub duration_limit_secs: u64,

    /// Maximum executions that may happen back to back.
    #[serde(default = "default_burst")]
    pub burst: u32,
}

impl RateLimitSettings {
    /// Window length.
    #[must_use]
    pub fn duration_limit(&self) -> Duration {
        Duration::from_secs(self.duration_limit_secs)
    }

    pub(crate) fn validate(&self, prefix: &str) -> Result<(), ConfigError> {
        require_at_least_one(
            &format!("{prefix}.number_of_allowed_executions"),
            u64::from(self.number_of_allowed_executions),
        )?;
        require_at_least_one(&format!("{prefix}.duration_limit_secs"), self.duration_limit_secs)?;
        require_at_least_one(&format!("{prefix}.burst"), u64::from(self.burst))
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            number_of_allowed_executions: default_number_of_allowed_executions(),
            duration_limit_secs: default_duration_limit_secs(),
            burst: default_burst(),
        }
    }
}

fn default_number_of_allowed_executions() -> u32 {
    100
}

fn default_duration_limit_secs() -> u64 {
    1
}

fn default_burst() -> u32 {
    1
}

/// Timeout policy settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TimeoutSettings {
    /// Whether the timeout is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Deadline, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub duration_secs: u64,
}

impl TimeoutSettings {
    /// Deadline for a single invocation.
    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    pub(crate) fn validate(&self, prefix: &str) -> Result<(), ConfigError> {
        require_at_least_one(&format!("{prefix}.duration_secs"), self.duration_secs)
    }
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            duration_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    180
}

/// Bulkhead settings.
///
/// Parsed and validated, but no pipeline stage consumes them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BulkheadSettings {
    /// Whether the bulkhead is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximum concurrent executions.
    #[serde(default = "default_max_parallelization")]
    pub max_parallelization: u32,

    /// Maximum queued executions.
    #[serde(default = "default_max_queuing_actions")]
    pub max_queuing_actions: u32,
}

impl Default for BulkheadSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_parallelization: default_max_parallelization(),
            max_queuing_actions: default_max_queuing_actions(),
        }
    }
}

fn default_max_parallelization() -> u32 {
    120
}

fn default_max_queuing_actions() -> u32 {
    60
}

/// Process-wide resiliency defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ResiliencyConfig {
    /// Elapsed time above which the performance stage warns, in milliseconds.
    #[serde(default = "default_request_performance_ms")]
    pub request_performance_ms: u64,

    /// Default retry policy.
    #[serde(default)]
    pub retry: RetrySettings,

    /// Default circuit breaker policy.
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerSettings,

    /// Default rate limit policy.
    #[serde(default)]
    pub rate_limit: RateLimitSettings,

    /// Default timeout policy.
    #[serde(default)]
    pub timeout: TimeoutSettings,

    /// Bulkhead settings.
    #[serde(default)]
    pub bulkhead: BulkheadSettings,
}

impl ResiliencyConfig {
    /// Performance warning threshold.
    #[must_use]
    pub fn request_performance(&self) -> Duration {
        Duration::from_millis(self.request_performance_ms)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        require_at_least_one("resiliency.request_performance_ms", self.request_performance_ms)?;
        self.retry.validate("resiliency.retry")?;
        self.circuit_breaker.validate("resiliency.circuit_breaker")?;
        self.rate_limit.validate("resiliency.rate_limit")?;
        self.timeout.validate("resiliency.timeout")?;
        require_at_least_one(
            "resiliency.bulkhead.max_parallelization",
            u64::from(self.bulkhead.max_parallelization),
        )
    }
}

impl Default for ResiliencyConfig {
    fn default() -> Self {
        Self {
            request_performance_ms: default_request_performance_ms(),
            retry: RetrySettings::default(),
            circuit_breaker: CircuitBreakerSettings::default(),
            rate_limit: RateLimitSettings::default(),
            timeout: TimeoutSettings::default(),
            bulkhead: BulkheadSettings::default(),
        }
    }
}

fn default_request_performance_ms() -> u64 {
    60_000
}

/// Per-request-type policy overrides, keyed by short type name in the file.
///
/// ```toml
/// [policies.GetCityListQuery.retry]
/// retry_count = 5
/// sleep_duration_ms = 100
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PolicyOverrides {
    /// Retry override.
    #[serde(default)]
    pub retry: Option<RetrySettings>,

    /// Circuit breaker override.
    #[serde(default)]
    pub circuit_breaker: Option<CircuitBreakerSettings>,

    /// Rate limit override.
    #[serde(default)]
    pub rate_limit: Option<RateLimitSettings>,

    /// Timeout override.
    #[serde(default)]
    pub timeout: Option<TimeoutSettings>,

    /// Performance threshold override, in milliseconds.
    #[serde(default)]
    pub request_performance_ms: Option<u64>,
}

impl PolicyOverrides {
    pub(crate) fn validate(&self, name: &str) -> Result<(), ConfigError> {
        let prefix = format!("policies.{name}");
        if let Some(retry) = &self.retry {
            retry.validate(&format!("{prefix}.retry"))?;
        }
        if let Some(circuit_breaker) = &self.circuit_breaker {
            circuit_breaker.validate(&format!("{prefix}.circuit_breaker"))?;
        }
        if let Some(rate_limit) = &self.rate_limit {
            rate_limit.validate(&format!("{prefix}.rate_limit"))?;
        }
        if let Some(timeout) = &self.timeout {
            timeout.validate(&format!("{prefix}.timeout"))?;
        }
        if let Some(threshold) = self.request_performance_ms {
            require_at_least_one(&format!("{prefix}.request_performance_ms"), threshold)?;
        }
        Ok(())
    }
}

/// Cache service settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CacheSettings {
    /// Sliding expiration applied when a policy sets no expiration, in seconds.
    #[serde(default = "default_sliding_expiration_secs")]
    pub default_sliding_expiration_secs: u64,

    /// Absolute expiration applied when a policy sets no expiration, in seconds.
    #[serde(default = "default_absolute_expiration_secs")]
    pub default_absolute_expiration_secs: u64,
}

impl CacheSettings {
    /// Default sliding expiration.
    #[must_use]
    pub fn default_sliding_expiration(&self) -> Duration {
        Duration::from_secs(self.default_sliding_expiration_secs)
    }

    /// Default absolute expiration, relative to the write.
    #[must_use]
    pub fn default_absolute_expiration(&self) -> Duration {
        Duration::from_secs(self.default_absolute_expiration_secs)
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            default_sliding_expiration_secs: default_sliding_expiration_secs(),
            default_absolute_expiration_secs: default_absolute_expiration_secs(),
        }
    }
}

fn default_sliding_expiration_secs() -> u64 {
    30
}

fn default_absolute_expiration_secs() -> u64 {
    300
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON structured logging (production).
    #[default]
    Json,
    /// Human-readable format (development).
    Pretty,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingSettings {
    /// Enable logging.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level filter (e.g., "info", "rampart_middleware=debug").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Include file and line information in log records.
    #[serde(default)]
    pub include_location: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::default(),
            include_location: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Metrics settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MetricsSettings {
    /// Install a Prometheus recorder for pipeline metrics.
    #[serde(default)]
    pub enabled: bool,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self { enabled: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resiliency_defaults() {
        let config = ResiliencyConfig::default();
        assert_eq!(config.request_performance_ms, 60_000);
        assert_eq!(config.circuit_breaker.exception_allowed, 10);
        assert_eq!(config.circuit_breaker.duration_of_break(), Duration::from_secs(30));
        assert_eq!(config.rate_limit.number_of_allowed_executions, 100);
        assert_eq!(config.rate_limit.duration_limit(), Duration::from_secs(1));
        assert_eq!(config.rate_limit.burst, 1);
        assert_eq!(config.timeout.duration(), Duration::from_secs(180));
        assert_eq!(config.bulkhead.max_parallelization, 120);
        assert_eq!(config.bulkhead.max_queuing_actions, 60);
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let settings = CircuitBreakerSettings {
            exception_allowed: 0,
            ..Default::default()
        };
        let err = settings.validate("resiliency.circuit_breaker").unwrap_err();
        assert!(err.to_string().contains("resiliency.circuit_breaker.exception_allowed"));
    }

    #[test]
    fn test_disabled_policy_still_validated() {
        let settings = RetrySettings {
            enabled: false,
            retry_count: 0,
            sleep_duration_ms: 200,
        };
        assert!(settings.validate("resiliency.retry").is_err());
    }

    #[test]
    fn test_override_validation_names_the_type() {
        let overrides = PolicyOverrides {
            timeout: Some(TimeoutSettings {
                enabled: true,
                duration_secs: 0,
            }),
            ..Default::default()
        };
        let err = overrides.validate("GetCityListQuery").unwrap_err();
        assert!(err.to_string().contains("policies.GetCityListQuery.timeout.duration_secs"));
    }

    #[test]
    fn test_environment_names_are_case_sensitive() {
        assert!(!Environment::new("production").is_production());
        assert!(!Environment::new("test").is_test());
    }

    #[test]
    fn test_partial_section_uses_defaults() {
        let settings: RateLimitSettings = toml::from_str("burst = 5").unwrap();
        assert!(settings.enabled);
        assert_eq!(settings.burst, 5);
        assert_eq!(settings.number_of_allowed_executions, 100);
    }
}
