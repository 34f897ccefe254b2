//! Main configuration types.
//!
//! This module provides the top-level [`RampartConfig`] struct and its builder.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{
    AppConfig, CacheSettings, Environment, LogFormat, LoggingSettings, MetricsSettings,
    PolicyOverrides, ResiliencyConfig,
};

/// Complete Rampart pipeline configuration.
///
/// This is the root configuration type that contains all configuration sections.
/// Use [`ConfigLoader`](crate::ConfigLoader) to load configuration from files
/// and environment variables.
///
/// # Example
///
/// ```
/// use rampart_config::RampartConfig;
///
/// let config = RampartConfig::default();
/// assert_eq!(config.app.namespace, "Rampart");
/// assert_eq!(config.resiliency.retry.retry_count, 3);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct RampartConfig {
    /// Application identity.
    #[serde(default)]
    pub app: AppConfig,

    /// Process-wide resiliency defaults.
    #[serde(default)]
    pub resiliency: ResiliencyConfig,

    /// Cache service settings.
    #[serde(default)]
    pub cache: CacheSettings,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Metrics settings.
    #[serde(default)]
    pub metrics: MetricsSettings,

    /// Per-request-type overrides, keyed by short type name.
    #[serde(default)]
    pub policies: BTreeMap<String, PolicyOverrides>,
}

impl RampartConfig {
    /// Create a new configuration builder.
    ///
    /// # Example
    ///
    /// ```
    /// use rampart_config::{AppConfig, Environment, RampartConfig};
    ///
    /// let config = RampartConfig::builder()
    ///     .app(AppConfig {
    ///         namespace: "Geo".to_string(),
    ///         environment: Environment::production(),
    ///     })
    ///     .build();
    ///
    /// assert!(config.app.environment.is_production());
    /// ```
    #[must_use]
    pub fn builder() -> RampartConfigBuilder {
        RampartConfigBuilder::new()
    }

    /// Returns the overrides configured for a request type, if any.
    #[must_use]
    pub fn overrides_for(&self, short_name: &str) -> Option<&PolicyOverrides> {
        self.policies.get(short_name)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - The environment or namespace is empty
    /// - Any count, window or duration is below 1
    /// - Any per-type override carries such a value
    pub fn validate(&self) -> Result<(), crate::ConfigError> {
        if self.app.environment.name().trim().is_empty() {
            return Err(crate::ConfigError::invalid_value(
                "app.environment",
                "must not be empty",
            ));
        }

        if self.app.namespace.trim().is_empty() {
            return Err(crate::ConfigError::invalid_value(
                "app.namespace",
                "must not be empty",
            ));
        }

        self.resiliency.validate()?;

        for (name, overrides) in &self.policies {
            overrides.validate(name)?;
        }

        Ok(())
    }

    /// Create a development configuration preset.
    ///
    /// This preset is tuned for local development with:
    /// - Pretty log formatting
    /// - Debug log level
    /// - The `Development` environment (rate limiting inactive)
    ///
    /// # Example
    ///
    /// ```
    /// use rampart_config::RampartConfig;
    ///
    /// let config = RampartConfig::development();
    /// assert_eq!(config.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();

        config.logging.level = "debug".to_string();
        config.logging.format = LogFormat::Pretty;
        config.logging.include_location = true;

        config.app.environment = Environment::development();

        config
    }

    /// Create a production configuration preset.
    ///
    /// This preset enables:
    /// - JSON log formatting at info level
    /// - The `Production` environment (rate limiting active)
    /// - Prometheus metrics
    ///
    /// # Example
    ///
    /// ```
    /// use rampart_config::RampartConfig;
    ///
    /// let config = RampartConfig::production();
    /// assert!(config.app.environment.is_production());
    /// assert_eq!(config.logging.format, rampart_config::LogFormat::Json);
    /// ```
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();

        config.logging.level = "info".to_string();
        config.logging.format = LogFormat::Json;

        config.app.environment = Environment::production();
        config.metrics.enabled = true;

        config
    }

    /// Create a test configuration preset.
    ///
    /// Caching and rate limiting are bypassed in the `Test` environment.
    #[must_use]
    pub fn test() -> Self {
        let mut config = Self::default();
        config.app.environment = Environment::test();
        config.logging.level = "warn".to_string();
        config.logging.format = LogFormat::Pretty;
        config
    }
}

/// Builder for [`RampartConfig`].
#[derive(Debug, Default)]
pub struct RampartConfigBuilder {
    app: Option<AppConfig>,
    resiliency: Option<ResiliencyConfig>,
    cache: Option<CacheSettings>,
    logging: Option<LoggingSettings>,
    metrics: Option<MetricsSettings>,
    policies: BTreeMap<String, PolicyOverrides>,
}

impl RampartConfigBuilder {
    /// Create a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application section.
    #[must_use]
    pub fn app(mut self, app: AppConfig) -> Self {
        self.app = Some(app);
        self
    }

    /// Set the resiliency section.
    #[must_use]
    pub fn resiliency(mut self, resiliency: ResiliencyConfig) -> Self {
        self.resiliency = Some(resiliency);
        self
    }

    /// Set the cache section.
    #[must_use]
    pub fn cache(mut self, cache: CacheSettings) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Set the logging section.
    #[must_use]
    pub fn logging(mut self, logging: LoggingSettings) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Set the metrics section.
    #[must_use]
    pub fn metrics(mut self, metrics: MetricsSettings) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Add overrides for a request type, keyed by its short name.
    #[must_use]
    pub fn policy(mut self, short_name: impl Into<String>, overrides: PolicyOverrides) -> Self {
        self.policies.insert(short_name.into(), overrides);
        self
    }

    /// Build the configuration.
    ///
    /// Any unset sections will use their default values.
    #[must_use]
    pub fn build(self) -> RampartConfig {
        RampartConfig {
            app: self.app.unwrap_or_default(),
            resiliency: self.resiliency.unwrap_or_default(),
            cache: self.cache.unwrap_or_default(),
            logging: self.logging.unwrap_or_default(),
            metrics: self.metrics.unwrap_or_default(),
            policies: self.policies,
        }
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if validation fails.
    pub fn build_validated(self) -> Result<RampartConfig, crate::ConfigError> {
        let config = self.build();
        config.validate()?;
        Ok(config)
    }
}
