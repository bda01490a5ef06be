//! # Configuration Settings
//!
//! Defines the configuration structure for the schema processing core:
//! process-wide resource limits and the request validation mode, loaded
//! independently of however a host server chooses to expose them as CLI
//! flags.

use crate::errors::{CoreError, Result};
use serde::{Deserialize, Serialize};

/// Request-level policy governing whether unknown parameters/additional
/// properties are errors or warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestMode {
    Strict,
    Relaxed,
}

impl Default for RequestMode {
    fn default() -> Self {
        RequestMode::Relaxed
    }
}

/// Top-level configuration for the schema processing core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub schema: SchemaConfig,
    pub generator: GeneratorConfig,
    pub cache: CacheConfig,
    pub request: RequestConfig,
    pub observability: ObservabilityConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            schema: SchemaConfig::default(),
            generator: GeneratorConfig::default(),
            cache: CacheConfig::default(),
            request: RequestConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl CoreConfig {
    /// Validate the entire configuration beyond what deserialization checks.
    pub fn validate(&self) -> Result<()> {
        if self.schema.max_depth == 0 {
            return Err(CoreError::config("schema.max_depth must be at least 1"));
        }
        if self.generator.max_depth == 0 {
            return Err(CoreError::config("generator.max_depth must be at least 1"));
        }
        if self.cache.capacity == 0 {
            return Err(CoreError::config("cache.capacity must be at least 1"));
        }
        if self.schema.multiple_of_tolerance <= 0.0 || self.schema.multiple_of_tolerance > 1e-6 {
            return Err(CoreError::config(
                "schema.multiple_of_tolerance must be a small positive value (<= 1e-6)",
            ));
        }
        Ok(())
    }
}

/// Tunables consumed by [`crate::schema::indexer`] and [`crate::validator`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Sanity cap on schema nesting depth.
    pub max_depth: u32,
    /// Compiled-regex size guard for `pattern` evaluation, bounding
    /// catastrophic backtracking.
    pub regex_size_limit_bytes: usize,
    /// Tolerance used by the `multipleOf` keyword.
    pub multiple_of_tolerance: f64,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self { max_depth: 1024, regex_size_limit_bytes: 1 << 20, multiple_of_tolerance: 1e-12 }
    }
}

/// Tunables consumed by [`crate::generator`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Default recursion depth cap.
    pub max_depth: u32,
    /// Default seed used when a caller does not supply one.
    pub default_seed: u64,
    /// Whether `example`/`examples`/`default` are preferred over synthesized
    /// values by default.
    pub prefer_examples: bool,
    /// Bound on regeneration attempts when satisfying `uniqueItems`.
    pub unique_items_attempts: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self { max_depth: 16, default_seed: 0, prefer_examples: true, unique_items_attempts: 32 }
    }
}

/// Tunables for the process-wide `ProcessedSchema` LRU cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { capacity: 10_000 }
    }
}

/// Tunables for [`crate::request::RequestValidator`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    pub mode: RequestMode,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self { mode: RequestMode::Relaxed }
    }
}

/// Tunables for [`crate::observability`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Emit structured JSON logs instead of the human-readable format.
    pub json_logging: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self { log_level: "info".to_string(), json_logging: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(CoreConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_depth_is_rejected() {
        let mut config = CoreConfig::default();
        config.schema.max_depth = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_cache_capacity_is_rejected() {
        let mut config = CoreConfig::default();
        config.cache.capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn out_of_range_tolerance_is_rejected() {
        let mut config = CoreConfig::default();
        config.schema.multiple_of_tolerance = 0.5;
        assert!(config.validate().is_err());
    }
}
