//! # Configuration Management
//!
//! Loads the process-wide tunables consumed by the schema processing core:
//! cache capacity, depth caps, the regex size budget, response-generation
//! defaults, and strict/relaxed request mode. Layered the same way
//! `AppConfig` is elsewhere in this stack — defaults, then an optional
//! file, then environment variables — independent of how a host server
//! chooses to expose these as CLI flags.

pub mod settings;

pub use settings::{
    CacheConfig, CoreConfig, GeneratorConfig, ObservabilityConfig, RequestConfig, RequestMode,
    SchemaConfig,
};

use crate::errors::{CoreError, Result};
use config::{Config, Environment, File};
use std::path::Path;

/// Load configuration from multiple sources.
///
/// Configuration is loaded in the following order (later sources override
/// earlier ones):
/// 1. Default values
/// 2. Configuration file (if specified)
/// 3. Environment variables with a `SCHEMA_CORE_` prefix
pub fn load_config<P: AsRef<Path>>(config_path: Option<P>) -> Result<CoreConfig> {
    let mut builder = Config::builder();

    builder = builder.add_source(Config::try_from(&CoreConfig::default())?);

    if let Some(path) = config_path {
        let path = path.as_ref();
        if path.exists() {
            builder = builder.add_source(File::from(path));
        } else {
            return Err(CoreError::config(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }
    }

    builder = builder.add_source(
        Environment::with_prefix("SCHEMA_CORE").separator("_").try_parsing(true),
    );

    let config = builder
        .build()
        .map_err(|e| CoreError::config_with_source("failed to build configuration", Box::new(e)))?;

    let core_config: CoreConfig = config
        .try_deserialize()
        .map_err(|e| CoreError::config_with_source("failed to deserialize configuration", Box::new(e)))?;

    core_config.validate()?;

    Ok(core_config)
}

/// Load configuration from environment variables only. Useful for
/// embedding this crate in a containerized host.
pub fn load_config_from_env() -> Result<CoreConfig> {
    load_config::<&str>(None)
}

/// Load configuration from a file (plus environment overrides).
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> Result<CoreConfig> {
    load_config(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::Builder;

    // Environment variables are process-global; serialize tests that touch
    // them so they don't race under a parallel test runner.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn loads_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        let config = load_config_from_env().unwrap();
        assert_eq!(config.schema.max_depth, 1024);
        assert_eq!(config.generator.max_depth, 16);
        assert_eq!(config.cache.capacity, 10_000);
    }

    #[test]
    fn env_vars_override_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("SCHEMA_CORE_SCHEMA_MAX_DEPTH", "256");
        env::set_var("SCHEMA_CORE_CACHE_CAPACITY", "500");

        let config = load_config_from_env().unwrap();
        assert_eq!(config.schema.max_depth, 256);
        assert_eq!(config.cache.capacity, 500);

        env::remove_var("SCHEMA_CORE_SCHEMA_MAX_DEPTH");
        env::remove_var("SCHEMA_CORE_CACHE_CAPACITY");
    }

    #[test]
    fn file_overrides_defaults_and_env_overrides_file() {
        let _guard = ENV_LOCK.lock().unwrap();
        let yaml = "schema:\n  max_depth: 64\ngenerator:\n  max_depth: 8\n";
        let mut file = Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        env::set_var("SCHEMA_CORE_GENERATOR_MAX_DEPTH", "4");
        let config = load_config_from_file(file.path()).unwrap();
        assert_eq!(config.schema.max_depth, 64);
        assert_eq!(config.generator.max_depth, 4);
        env::remove_var("SCHEMA_CORE_GENERATOR_MAX_DEPTH");
    }

    #[test]
    fn nonexistent_file_is_an_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        let result = load_config_from_file("/nonexistent/schema-core.yaml");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("not found"));
    }

    #[test]
    fn invalid_values_fail_validation() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("SCHEMA_CORE_CACHE_CAPACITY", "0");
        let result = load_config_from_env();
        assert!(result.is_err());
        env::remove_var("SCHEMA_CORE_CACHE_CAPACITY");
    }
}
