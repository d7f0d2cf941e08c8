//! Layered configuration loading (SPEC_FULL §10): defaults → YAML →
//! environment, in that precedence order, same figment pipeline the
//! teacher uses for its own config.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;

use crate::domain::errors::ConfigError;
use crate::domain::models::Config;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (`Serialized`)
    /// 2. `.clustermux/config.yaml` (project config)
    /// 3. `.clustermux/local.yaml` (optional dev/test overrides)
    /// 4. Environment variables (`CLUSTERMUX_*`, highest priority)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".clustermux/config.yaml"))
            .merge(Yaml::file(".clustermux/local.yaml"))
            .merge(Env::prefixed("CLUSTERMUX_").split("__"))
            .extract()
            .context("failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, skipping the project
    /// `.clustermux/` directory lookup (spec.md §10, used by the daemon's
    /// `--config` flag).
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("CLUSTERMUX_").split("__"))
            .extract()
            .with_context(|| format!("failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading (spec.md §10 boundary checks).
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.cluster.event.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidPollInterval(config.cluster.event.poll_interval_secs));
        }

        if config.cluster.event.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize(config.cluster.event.batch_size));
        }

        for writer in [&config.writers.access_log, &config.writers.backend_trace_log, &config.writers.alert_log] {
            if writer.queue_size == 0 {
                return Err(ConfigError::InvalidQueueSize(writer.queue_size));
            }
        }

        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }

        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(config.database.max_connections));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_log_rotations = ["daily", "hourly", "never"];
        if !valid_log_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidLogRotation(config.logging.rotation.clone()));
        }

        if config.cluster.tenant_ids.is_empty() {
            return Err(ConfigError::ValidationFailed("cluster.tenant_ids must not be empty".to_string()));
        }

        Ok(())
    }
}
