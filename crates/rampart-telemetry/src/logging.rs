//! Structured logging for the Rampart pipeline.
//!
//! Pipeline stages log through `tracing` using the field names in
//! [`fields`]. This module installs the subscriber that renders them.
//!
//! # Example
//!
//! ```rust,ignore
//! use rampart_telemetry::logging::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::development())?;
//!
//! tracing::info!(request_name = "GetCityListQuery", "Query Request");
//! ```

use crate::error::TelemetryError;
use crate::TelemetryResult;
use rampart_config::{LogFormat, LoggingSettings};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Whether logging is enabled.
    pub enabled: bool,

    /// Filter directive (e.g., "info", "rampart_middleware=debug").
    pub level: String,

    /// Whether to output JSON format.
    pub json_format: bool,

    /// Whether to include span events (new, close).
    pub span_events: bool,

    /// Whether to include file/line info.
    pub file_line_info: bool,

    /// Whether to include target (module path).
    pub include_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            json_format: true,
            span_events: false,
            file_line_info: false,
            include_target: true,
        }
    }
}

impl LogConfig {
    /// Creates a development configuration with human-readable output.
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            json_format: false,
            span_events: true,
            file_line_info: true,
            ..Self::default()
        }
    }

    /// Creates a production configuration with JSON output.
    #[must_use]
    pub fn production() -> Self {
        Self::default()
    }
}

impl From<&LoggingSettings> for LogConfig {
    fn from(settings: &LoggingSettings) -> Self {
        Self {
            enabled: settings.enabled,
            level: settings.level.clone(),
            json_format: settings.format == LogFormat::Json,
            span_events: false,
            file_line_info: settings.include_location,
            include_target: true,
        }
    }
}

/// Initializes the logging subsystem.
///
/// # Errors
///
/// Returns `TelemetryError::LoggingInit` if the filter is invalid or a
/// global subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let filter = create_env_filter(&config.level)?;

    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    if config.json_format {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_span_events(span_events)
            .with_file(config.file_line_info)
            .with_line_number(config.file_line_info)
            .with_target(config.include_target)
            .with_filter(filter);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_span_events(span_events)
            .with_file(config.file_line_info)
            .with_line_number(config.file_line_info)
            .with_target(config.include_target)
            .with_filter(filter);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    }

    Ok(())
}

/// Creates an env filter from a string.
///
/// # Errors
///
/// Returns error if the filter string is invalid.
pub fn create_env_filter(filter: &str) -> TelemetryResult<EnvFilter> {
    EnvFilter::try_new(filter)
        .map_err(|e| TelemetryError::LoggingInit(format!("Invalid log level: {e}")))
}

/// Field names used by pipeline log records.
pub mod fields {
    /// Request ID field name.
    pub const REQUEST_ID: &str = "request_id";

    /// Application namespace field name.
    pub const NAMESPACE: &str = "namespace";

    /// Short request type name field name.
    pub const REQUEST_NAME: &str = "request_name";

    /// Fully qualified request type field name.
    pub const REQUEST_TYPE: &str = "request_type";

    /// Serialized request payload field name.
    pub const PAYLOAD: &str = "payload";

    /// Serialized response field name.
    pub const RESPONSE: &str = "response";

    /// Caller user ID field name.
    pub const USER_ID: &str = "user_id";

    /// Caller display name field name.
    pub const USER_NAME: &str = "user_name";

    /// Elapsed time field name (in milliseconds).
    pub const ELAPSED_MS: &str = "elapsed_ms";

    /// Cache key field name.
    pub const CACHE_KEY: &str = "cache_key";

    /// Retry attempt number field name (1-based).
    pub const RETRY_ATTEMPT: &str = "retry_attempt";

    /// Retry delay field name (in milliseconds).
    pub const DELAY_MS: &str = "delay_ms";

    /// Error field name.
    pub const ERROR: &str = "error";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert!(config.enabled);
        assert!(config.json_format);
        assert_eq!(config.level, "info");
    }

    #[test]
    fn test_development_config() {
        let config = LogConfig::development();
        assert!(!config.json_format);
        assert!(config.span_events);
        assert!(config.file_line_info);
        assert_eq!(config.level, "debug");
    }

    #[test]
    fn test_from_settings() {
        let settings = LoggingSettings {
            enabled: true,
            level: "rampart_middleware=debug".to_string(),
            format: LogFormat::Pretty,
            include_location: true,
        };

        let config = LogConfig::from(&settings);
        assert!(!config.json_format);
        assert!(config.file_line_info);
        assert_eq!(config.level, "rampart_middleware=debug");
    }

    #[test]
    fn test_create_env_filter() {
        assert!(create_env_filter("info").is_ok());
        assert!(create_env_filter("rampart_middleware=debug,warn").is_ok());
    }

    #[test]
    fn test_field_names() {
        assert_eq!(fields::REQUEST_NAME, "request_name");
        assert_eq!(fields::ELAPSED_MS, "elapsed_ms");
        assert_eq!(fields::CACHE_KEY, "cache_key");
    }

    #[test]
    fn test_disabled_logging() {
        let config = LogConfig {
            enabled: false,
            ..Default::default()
        };

        assert!(init_logging(&config).is_ok());
    }
}
