//! Logging infrastructure (SPEC_FULL §11).
//!
//! Structured logging using tracing and tracing-subscriber:
//! - JSON log formatting
//! - Log rotation
//! - Secret scrubbing

pub mod config;
pub mod logger;
pub mod secret_scrubbing;

pub use config::{LogConfig, LogFormat, RotationPolicy};
pub use logger::LoggerImpl;
pub use secret_scrubbing::{ScrubbingWriter, SecretScrubber};

use crate::domain::models::LoggingConfig;

impl From<&LoggingConfig> for LogConfig {
    /// Bridges the figment-facing `LoggingConfig` (flat strings, spec.md
    /// §6 shape) to the tracing-facing `LogConfig` this module's
    /// subscriber actually consumes.
    fn from(config: &LoggingConfig) -> Self {
        Self {
            level: config.level.clone(),
            format: if config.format.eq_ignore_ascii_case("pretty") {
                LogFormat::Pretty
            } else {
                LogFormat::Json
            },
            log_dir: config.log_dir.as_ref().map(std::path::PathBuf::from),
            enable_stdout: config.enable_stdout,
            rotation: if config.rotation.eq_ignore_ascii_case("hourly") {
                RotationPolicy::Hourly
            } else if config.rotation.eq_ignore_ascii_case("never") {
                RotationPolicy::Never
            } else {
                RotationPolicy::Daily
            },
            retention_days: config.retention_days,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bridge_maps_every_rotation_policy() {
        let mut logging = LoggingConfig::default();

        logging.rotation = "daily".to_string();
        assert!(matches!(LogConfig::from(&logging).rotation, RotationPolicy::Daily));

        logging.rotation = "hourly".to_string();
        assert!(matches!(LogConfig::from(&logging).rotation, RotationPolicy::Hourly));

        logging.rotation = "HOURLY".to_string();
        assert!(matches!(LogConfig::from(&logging).rotation, RotationPolicy::Hourly));

        logging.rotation = "never".to_string();
        assert!(matches!(LogConfig::from(&logging).rotation, RotationPolicy::Never));
    }
}
