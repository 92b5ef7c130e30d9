//! Configuration Loader
//!
//! Layers an optional TOML file and `DEDUP__*` environment variables over
//! the built-in defaults, then validates the result.

use super::error::ConfigResult;
use super::DedupConfig;
use config::{Config, Environment, File};
use std::path::Path;
use tracing::debug;

/// File looked up (without extension) when no explicit path is given
pub const DEFAULT_CONFIG_FILE: &str = "config/dedup";

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "DEDUP";

impl DedupConfig {
    /// Load from `config/dedup.toml` (if present) and the environment
    pub fn load() -> ConfigResult<Self> {
        let builder =
            Config::builder().add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false));
        Self::finish(builder)
    }

    /// Load from an explicit file, then apply environment overrides
    pub fn load_from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading configuration file");
        let builder = Config::builder().add_source(File::from(path).required(true));
        Self::finish(builder)
    }

    fn finish(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> ConfigResult<Self> {
        let config: DedupConfig = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;

        debug!(
            environment = %config.environment,
            backend = %config.store.backend,
            bloom_filter = config.bloom_filter.enabled,
            "Configuration loaded successfully"
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigurationError;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let file = write_config(
            r#"
            environment = "production"

            [store]
            backend = "dragonfly"
            key_prefix = "orders:"

            [store.redis]
            url = "redis://cache.internal:6379"

            [bloom_filter]
            enabled = true
            expected_insertions = 10000
            "#,
        );

        let config = DedupConfig::load_from_file(file.path()).unwrap();
        assert!(config.is_production());
        assert_eq!(config.store.backend, "dragonfly");
        assert_eq!(config.store.key_prefix, "orders:");
        let redis = config.store.redis.unwrap();
        assert_eq!(redis.url, "redis://cache.internal:6379");
        assert_eq!(redis.connection_timeout_seconds, 5);
        assert!(config.bloom_filter.enabled);
        assert_eq!(config.bloom_filter.expected_insertions, 10_000);
        assert_eq!(config.bloom_filter.name, "cache_penetration_bloom_filter");
        assert_eq!(config.cache.default_timeout_seconds, 30);
    }

    #[test]
    fn test_load_from_file_validates() {
        let file = write_config(
            r#"
            [store]
            backend = "redis"
            "#,
        );

        let err = DedupConfig::load_from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigurationError::MissingRequiredField { .. }));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = DedupConfig::load_from_file(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigurationError::Load(_)));
    }
}
