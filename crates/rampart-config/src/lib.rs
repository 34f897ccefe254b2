//! Typed configuration for the Rampart request pipeline.
//!
//! This crate provides a strongly-typed configuration system with support for:
//! - TOML and JSON configuration files
//! - Environment variable overrides
//! - Strict validation (fails on unknown fields)
//! - Layered configuration (defaults → file → env)
//!
//! # Overview
//!
//! The root type is [`RampartConfig`]:
//!
//! - [`AppConfig`] - namespace and [`Environment`]
//! - [`ResiliencyConfig`] - process-wide retry, circuit breaker, rate limit
//!   and timeout defaults
//! - [`CacheSettings`] - default cache entry expirations
//! - [`LoggingSettings`] and [`MetricsSettings`] - observability
//! - [`PolicyOverrides`] - per-request-type overrides keyed by short type name
//!
//! # Example
//!
//! ```no_run
//! use rampart_config::ConfigLoader;
//!
//! # fn main() -> Result<(), rampart_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_defaults()
//!     .with_optional_file("rampart.toml")?
//!     .with_env_prefix("RAMPART")
//!     .load()?;
//!
//! println!("Running in {}", config.app.environment);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! [app]
//! namespace = "Geo"
//! environment = "Production"
//!
//! [resiliency]
//! request_performance_ms = 60000
//!
//! [resiliency.retry]
//! retry_count = 3
//! sleep_duration_ms = 200
//!
//! [resiliency.circuit_breaker]
//! exception_allowed = 10
//! duration_of_break_secs = 30
//!
//! [resiliency.rate_limit]
//! number_of_allowed_executions = 100
//! duration_limit_secs = 1
//! burst = 1
//!
//! [resiliency.timeout]
//! duration_secs = 180
//!
//! [cache]
//! default_sliding_expiration_secs = 30
//! default_absolute_expiration_secs = 300
//!
//! [logging]
//! level = "info"
//! format = "json"
//!
//! [policies.GetCityListQuery.retry]
//! retry_count = 5
//! sleep_duration_ms = 100
//! ```
//!
//! # Environment Variable Overrides
//!
//! Values can be overridden via environment variables using the format
//! `PREFIX__SECTION__KEY`. For example:
//!
//! - `RAMPART__APP__ENVIRONMENT=Production`
//! - `RAMPART__RESILIENCY__TIMEOUT__DURATION_SECS=30`
//! - `RAMPART__LOGGING__FORMAT=pretty`

#![warn(missing_docs)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::*;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RampartConfig::default();
        assert_eq!(config.app.namespace, "Rampart");
        assert_eq!(config.resiliency.request_performance_ms, 60_000);
    }

    #[test]
    fn test_json_round_trip_preserves_overrides() {
        let config = RampartConfig::builder()
            .policy("GetCityListQuery", PolicyOverrides::default())
            .build();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: RampartConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
