//! Observability for the Rampart request pipeline.
//!
//! This crate provides:
//!
//! - **Logging**: structured JSON or pretty logging through `tracing-subscriber`
//! - **Metrics**: Prometheus-format counters and histograms via the `metrics` crate
//!
//! Pipeline stages emit log records and metric observations regardless of
//! whether anything is installed; [`init_telemetry`] decides where they go.
//!
//! # Example
//!
//! ```rust,ignore
//! use rampart_config::RampartConfig;
//! use rampart_telemetry::init_telemetry;
//!
//! let config = RampartConfig::production();
//! init_telemetry(&config)?;
//!
//! // later, from a scrape endpoint
//! let body = rampart_telemetry::metrics::render_metrics().unwrap_or_default();
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig};
pub use metrics::{init_metrics, render_metrics};

use rampart_config::RampartConfig;

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Installs logging and, when enabled, the metrics recorder.
///
/// # Errors
///
/// Returns `TelemetryError` if either subsystem fails to initialize.
pub fn init_telemetry(config: &RampartConfig) -> TelemetryResult<()> {
    init_logging(&LogConfig::from(&config.logging))?;

    if config.metrics.enabled {
        init_metrics()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_telemetry_installs_nothing() {
        let mut config = RampartConfig::default();
        config.logging.enabled = false;
        config.metrics.enabled = false;

        assert!(init_telemetry(&config).is_ok());
    }
}
