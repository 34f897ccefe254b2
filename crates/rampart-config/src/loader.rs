//! Configuration loader with layered approach.
//!
//! This module provides the [`ConfigLoader`] for loading configuration from
//! multiple sources: defaults, files, and environment variables.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::{ConfigError, Environment, LogFormat, RampartConfig};

/// Configuration loader with layered approach.
///
/// The loader applies configuration in layers, with later layers overriding
/// earlier ones:
/// 1. Default values (built into the code)
/// 2. Configuration file (TOML or JSON)
/// 3. Environment variables
///
/// # Example
///
/// ```no_run
/// use rampart_config::ConfigLoader;
///
/// # fn main() -> Result<(), rampart_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_defaults()
///     .with_file("rampart.toml")?
///     .with_env_prefix("RAMPART")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: RampartConfig,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: RampartConfig::default(),
            env_prefix: None,
        }
    }

    /// Start with default configuration values.
    ///
    /// This is called automatically by `new()`, but can be chained for clarity.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.config = RampartConfig::default();
        self
    }

    /// Start with development preset configuration.
    ///
    /// # Example
    ///
    /// ```
    /// use rampart_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_development()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = RampartConfig::development();
        self
    }

    /// Start with production preset configuration.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = RampartConfig::production();
        self
    }

    /// Start with test preset configuration.
    #[must_use]
    pub fn with_test(mut self) -> Self {
        self.config = RampartConfig::test();
        self
    }

    /// Load configuration from a file.
    ///
    /// Supports TOML (.toml) and JSON (.json) formats.
    /// The file format is determined by the file extension.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - The file does not exist
    /// - The file cannot be read
    /// - The file contains invalid TOML/JSON
    /// - The file contains unknown fields (strict mode)
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;

        self.config = Self::parse_file(&content, path)?;
        Ok(self)
    }

    /// Load configuration from an optional file.
    ///
    /// If the file exists, loads it. If not, silently continues.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be read or parsed.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load configuration from a string.
    ///
    /// # Arguments
    ///
    /// * `content` - Configuration content as a string
    /// * `format` - File format ("toml" or "json")
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if parsing fails.
    ///
    /// # Example
    ///
    /// ```
    /// use rampart_config::ConfigLoader;
    ///
    /// let toml = r#"
    ///     [app]
    ///     environment = "Production"
    /// "#;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string(toml, "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert!(config.app.environment.is_production());
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = match format.to_lowercase().as_str() {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            _ => {
                return Err(ConfigError::validation_error(format!(
                    "unsupported configuration format: {format}"
                )))
            }
        };
        Ok(self)
    }

    /// Set environment variable prefix for overrides.
    ///
    /// Environment variables use the format `PREFIX__SECTION__KEY`.
    /// For example, with prefix "RAMPART":
    /// - `RAMPART__APP__ENVIRONMENT=Production`
    /// - `RAMPART__RESILIENCY__RETRY__RETRY_COUNT=5`
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Load a `.env` file for environment variables.
    ///
    /// A missing `.env` file is not an error.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be parsed.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => Ok(self),
            Err(e) if e.not_found() => Ok(self),
            Err(e) => Err(ConfigError::validation_error(format!(
                "failed to load .env file: {e}"
            ))),
        }
    }

    /// Finalize and return the loaded configuration.
    ///
    /// Applies environment variable overrides (if a prefix was set) and
    /// validates the final configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Environment variable parsing fails
    /// - Configuration validation fails
    pub fn load(mut self) -> Result<RampartConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            self.apply_env_overrides(&prefix)?;
        }

        self.config.validate()?;

        Ok(self.config)
    }

    /// Finalize without validation.
    #[must_use]
    pub fn load_unvalidated(self) -> RampartConfig {
        self.config
    }

    fn parse_file(content: &str, path: &Path) -> Result<RampartConfig, ConfigError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some("toml") => Ok(toml::from_str(content)?),
            Some("json") => Ok(serde_json::from_str(content)?),
            _ => Err(ConfigError::validation_error(format!(
                "unsupported configuration file format: {}",
                path.display()
            ))),
        }
    }

    fn apply_env_overrides(&mut self, prefix: &str) -> Result<(), ConfigError> {
        let env_vars: HashMap<String, String> =
            env::vars().filter(|(k, _)| k.starts_with(prefix)).collect();

        for (key, value) in env_vars {
            self.apply_env_var(&key, &value, prefix)?;
        }

        Ok(())
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let key_without_prefix = key
            .strip_prefix(prefix)
            .and_then(|k| k.strip_prefix("__"))
            .ok_or_else(|| ConfigError::env_parse_error(key, "invalid key format"))?;

        let parts: Vec<&str> = key_without_prefix.split("__").collect();
        let config = &mut self.config;
        let resiliency = &mut config.resiliency;

        match parts.as_slice() {
            // App section
            ["APP", "NAMESPACE"] => config.app.namespace = value.to_string(),
            ["APP", "ENVIRONMENT"] => config.app.environment = Environment::new(value),

            // Resiliency section
            ["RESILIENCY", "REQUEST_PERFORMANCE_MS"] => {
                resiliency.request_performance_ms = parse_number(key, value)?;
            }
            ["RESILIENCY", "RETRY", "ENABLED"] => resiliency.retry.enabled = bool_var(key, value)?,
            ["RESILIENCY", "RETRY", "RETRY_COUNT"] => {
                resiliency.retry.retry_count = parse_number(key, value)?;
            }
            ["RESILIENCY", "RETRY", "SLEEP_DURATION_MS"] => {
                resiliency.retry.sleep_duration_ms = parse_number(key, value)?;
            }
            ["RESILIENCY", "CIRCUIT_BREAKER", "ENABLED"] => {
                resiliency.circuit_breaker.enabled = bool_var(key, value)?;
            }
            ["RESILIENCY", "CIRCUIT_BREAKER", "EXCEPTION_ALLOWED"] => {
                resiliency.circuit_breaker.exception_allowed = parse_number(key, value)?;
            }
            ["RESILIENCY", "CIRCUIT_BREAKER", "DURATION_OF_BREAK_SECS"] => {
                resiliency.circuit_breaker.duration_of_break_secs = parse_number(key, value)?;
            }
            ["RESILIENCY", "RATE_LIMIT", "ENABLED"] => {
                resiliency.rate_limit.enabled = bool_var(key, value)?;
            }
            ["RESILIENCY", "RATE_LIMIT", "NUMBER_OF_ALLOWED_EXECUTIONS"] => {
                resiliency.rate_limit.number_of_allowed_executions = parse_number(key, value)?;
            }
            ["RESILIENCY", "RATE_LIMIT", "DURATION_LIMIT_SECS"] => {
                resiliency.rate_limit.duration_limit_secs = parse_number(key, value)?;
            }
            ["RESILIENCY", "RATE_LIMIT", "BURST"] => {
                resiliency.rate_limit.burst = parse_number(key, value)?;
            }
            ["RESILIENCY", "TIMEOUT", "ENABLED"] => {
                resiliency.timeout.enabled = bool_var(key, value)?;
            }
            ["RESILIENCY", "TIMEOUT", "DURATION_SECS"] => {
                resiliency.timeout.duration_secs = parse_number(key, value)?;
            }
            ["RESILIENCY", "BULKHEAD", "ENABLED"] => {
                resiliency.bulkhead.enabled = bool_var(key, value)?;
            }
            ["RESILIENCY", "BULKHEAD", "MAX_PARALLELIZATION"] => {
                resiliency.bulkhead.max_parallelization = parse_number(key, value)?;
            }
            ["RESILIENCY", "BULKHEAD", "MAX_QUEUING_ACTIONS"] => {
                resiliency.bulkhead.max_queuing_actions = parse_number(key, value)?;
            }

            // Cache section
            ["CACHE", "DEFAULT_SLIDING_EXPIRATION_SECS"] => {
                config.cache.default_sliding_expiration_secs = parse_number(key, value)?;
            }
            ["CACHE", "DEFAULT_ABSOLUTE_EXPIRATION_SECS"] => {
                config.cache.default_absolute_expiration_secs = parse_number(key, value)?;
            }

            // Logging section
            ["LOGGING", "ENABLED"] => config.logging.enabled = bool_var(key, value)?,
            ["LOGGING", "LEVEL"] => config.logging.level = value.to_string(),
            ["LOGGING", "FORMAT"] => {
                config.logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => {
                        return Err(ConfigError::env_parse_error(
                            key,
                            "expected 'json' or 'pretty'",
                        ))
                    }
                };
            }
            ["LOGGING", "INCLUDE_LOCATION"] => {
                config.logging.include_location = bool_var(key, value)?;
            }

            // Metrics section
            ["METRICS", "ENABLED"] => config.metrics.enabled = bool_var(key, value)?,

            _ => {}
        }

        Ok(())
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::env_parse_error(key, "expected integer"))
}

fn bool_var(key: &str, value: &str) -> Result<bool, ConfigError> {
    parse_bool(value).ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))
}

/// Parse a boolean from a string.
fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
