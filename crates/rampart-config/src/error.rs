//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// Failed to read configuration file.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// Path to the file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error.
    #[error("failed to parse TOML configuration: {0}")]
    TomlError(#[from] toml::de::Error),

    /// JSON parsing error.
    #[error("failed to parse JSON configuration: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Invalid configuration value.
    #[error("invalid configuration value for {field}: {reason}")]
    InvalidValue {
        /// The field with the invalid value.
        field: String,
        /// Explanation of why the value is invalid.
        reason: String,
    },

    /// A policy was registered twice for the same request type.
    #[error("duplicate {policy} policy for request type {request_type}")]
    DuplicatePolicy {
        /// The policy kind, e.g. `cache`.
        policy: String,
        /// The request type name.
        request_type: String,
    },

    /// Environment variable parsing error.
    #[error("failed to parse environment variable {var}: {reason}")]
    EnvParseError {
        /// The environment variable name.
        var: String,
        /// Explanation of the parsing error.
        reason: String,
    },

    /// Validation error after loading.
    #[error("configuration validation failed: {0}")]
    ValidationError(String),
}

impl ConfigError {
    /// Create a new file not found error.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Create a new read error.
    pub fn read_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadError {
            path: path.into(),
            source,
        }
    }

    /// Create a new invalid value error.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a new duplicate policy error.
    pub fn duplicate_policy(policy: impl Into<String>, request_type: impl Into<String>) -> Self {
        Self::DuplicatePolicy {
            policy: policy.into(),
            request_type: request_type.into(),
        }
    }

    /// Create a new environment variable parse error.
    pub fn env_parse_error(var: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EnvParseError {
            var: var.into(),
            reason: reason.into(),
        }
    }

    /// Create a new validation error.
    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_not_found_error() {
        let err = ConfigError::file_not_found("/path/to/rampart.toml");
        assert!(err.to_string().contains("/path/to/rampart.toml"));
    }

    #[test]
    fn test_invalid_value_error() {
        let err = ConfigError::invalid_value("resiliency.retry.retry_count", "must be at least 1");
        assert_eq!(
            err.to_string(),
            "invalid configuration value for resiliency.retry.retry_count: must be at least 1"
        );
    }

    #[test]
    fn test_duplicate_policy_error() {
        let err = ConfigError::duplicate_policy("cache", "GetCityListQuery");
        assert_eq!(
            err.to_string(),
            "duplicate cache policy for request type GetCityListQuery"
        );
    }

    #[test]
    fn test_env_parse_error() {
        let err = ConfigError::env_parse_error(
            "RAMPART__RESILIENCY__TIMEOUT__DURATION_SECS",
            "expected integer",
        );
        assert!(err.to_string().contains("RAMPART__RESILIENCY__TIMEOUT__DURATION_SECS"));
        assert!(err.to_string().contains("expected integer"));
    }
}
