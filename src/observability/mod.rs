//! # Observability Infrastructure
//!
//! Structured logging for the schema processing core, built on `tracing`
//! and scoped to what a pure, in-process library needs: no gRPC/HTTP
//! transport tracing, no metrics exporters, no health checks (those belong
//! to the host server embedding this crate).

pub mod logging;

pub use logging::log_config_info;

use crate::config::ObservabilityConfig;
use crate::errors::{CoreError, Result};
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global `tracing` subscriber for binaries and tests that
/// embed this crate. Safe to call at most once per process; a second call
/// returns an error rather than panicking, since `tracing`'s global
/// subscriber can only be set once.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.log_level)
        .map_err(|e| CoreError::config_with_source("invalid log level", Box::new(e)))?;

    let result = if config.json_logging {
        fmt().with_env_filter(filter).json().try_init()
    } else {
        fmt().with_env_filter(filter).try_init()
    };

    result.map_err(|e| CoreError::config(format!("tracing subscriber already initialized: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_tracing_accepts_a_valid_level() {
        let config = ObservabilityConfig { log_level: "debug".to_string(), json_logging: false };
        // May fail if a prior test in this binary already set the global
        // subscriber; either outcome is a valid result, never a panic.
        let _ = init_tracing(&config);
    }
}
