//! Layered application configuration (SPEC_FULL §10).
//!
//! Mirrors the teacher's config model: one `Config` root with `#[serde]`
//! defaults on every field so `Serialized::defaults(Config::default())`
//! round-trips through figment cleanly.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub writers: WritersConfig,
    #[serde(default)]
    pub retention: RetentionConfigGroup,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub node_id: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            cluster: ClusterConfig::default(),
            writers: WritersConfig::default(),
            retention: RetentionConfigGroup::default(),
            logging: LoggingConfig::default(),
            node_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_db_path() -> String {
    ".clustermux/clustermux.db".to_string()
}

fn default_max_connections() -> u32 {
    10
}

/// `cluster.event.*` and `cluster.cleanup.*` keys (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct ClusterConfig {
    #[serde(default)]
    pub node_id: Option<String>,
    #[serde(default)]
    pub event: EventBusConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
    /// Tenants this node's bus instance polls for. The wire schema scopes
    /// every poll query to one `tenantId` at a time (spec.md §4.1.2); a node
    /// serving several tenants polls each in turn, sequentially, every tick.
    #[serde(default = "default_tenant_ids")]
    pub tenant_ids: Vec<String>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            node_id: None,
            event: EventBusConfig::default(),
            cleanup: CleanupConfig::default(),
            tenant_ids: default_tenant_ids(),
        }
    }
}

fn default_tenant_ids() -> Vec<String> {
    vec!["default".to_string()]
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct EventBusConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    #[serde(default = "default_expire_hours")]
    pub expire_hours: i64,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            batch_size: default_batch_size(),
            expire_hours: default_expire_hours(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    3
}

fn default_batch_size() -> u32 {
    100
}

fn default_expire_hours() -> i64 {
    24
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct CleanupConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_cleanup_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_ack_retention_hours")]
    pub ack_retention_hours: i64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            interval_secs: default_cleanup_interval_secs(),
            ack_retention_hours: default_ack_retention_hours(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_cleanup_interval_secs() -> u64 {
    3600
}

fn default_ack_retention_hours() -> i64 {
    48
}

/// Per-writer config, one instance per log table (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct WriterConfig {
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
    #[serde(default = "default_true")]
    pub async_enabled: bool,
    #[serde(default = "default_true")]
    pub batch_processing_enabled: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            queue_size: default_queue_size(),
            batch_size: default_batch_size(),
            flush_interval_ms: default_flush_interval_ms(),
            async_enabled: default_true(),
            batch_processing_enabled: default_true(),
        }
    }
}

fn default_queue_size() -> usize {
    10_000
}

fn default_flush_interval_ms() -> u64 {
    1_000
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct WritersConfig {
    #[serde(default)]
    pub access_log: WriterConfig,
    #[serde(default)]
    pub backend_trace_log: WriterConfig,
    #[serde(default)]
    pub alert_log: WriterConfig,
}

impl Default for WritersConfig {
    fn default() -> Self {
        Self {
            access_log: WriterConfig::default(),
            backend_trace_log: WriterConfig::default(),
            alert_log: WriterConfig::default(),
        }
    }
}

/// Per-cleaned-table retention config (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct RetentionTableConfig {
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    #[serde(default = "default_cleanup_interval_hour")]
    pub cleanup_interval_hour: u32,
    #[serde(default)]
    pub scheduled_time: Option<String>,
    #[serde(default = "default_batch_delete_size")]
    pub batch_delete_size: u32,
}

impl Default for RetentionTableConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            cleanup_interval_hour: default_cleanup_interval_hour(),
            scheduled_time: None,
            batch_delete_size: default_batch_delete_size(),
        }
    }
}

fn default_retention_days() -> i64 {
    30
}

fn default_cleanup_interval_hour() -> u32 {
    1
}

fn default_batch_delete_size() -> u32 {
    500
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct RetentionConfigGroup {
    #[serde(default)]
    pub access_log: RetentionTableConfig,
    /// Unused by the daemon: `backend_trace_log` is `access_log`'s detail
    /// table and is pruned in the same pass, under `access_log`'s policy
    /// (spec.md §4.3.1). Kept so a config file naming this key deserializes
    /// instead of failing, and so a caller wiring its own cleaner for a
    /// different sink layout still has a policy to read.
    #[serde(default)]
    pub backend_trace_log: RetentionTableConfig,
    #[serde(default)]
    pub alert_log: RetentionTableConfig,
}

impl Default for RetentionConfigGroup {
    fn default() -> Self {
        Self {
            access_log: RetentionTableConfig::default(),
            backend_trace_log: RetentionTableConfig::default(),
            alert_log: RetentionTableConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub log_dir: Option<String>,
    #[serde(default = "default_true")]
    pub enable_stdout: bool,
    /// File rotation policy: `daily`, `hourly`, or `never`. Only takes
    /// effect when `log_dir` is set (spec.md §6).
    #[serde(default = "default_log_rotation")]
    pub rotation: String,
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            enable_stdout: true,
            rotation: default_log_rotation(),
            retention_days: default_retention_days(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_log_rotation() -> String {
    "daily".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_defaults() {
        let config = Config::default();
        assert_eq!(config.cluster.event.poll_interval_secs, 3);
        assert_eq!(config.cluster.event.batch_size, 100);
        assert_eq!(config.cluster.event.expire_hours, 24);
        assert!(config.cluster.cleanup.enabled);
        assert_eq!(config.cluster.cleanup.interval_secs, 3600);
        assert_eq!(config.cluster.cleanup.ack_retention_hours, 48);
        assert_eq!(config.writers.access_log.queue_size, 10_000);
        assert_eq!(config.retention.access_log.retention_days, 30);
        assert_eq!(config.logging.rotation, "daily");
    }
}
