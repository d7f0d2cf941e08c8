//! Retention policy shapes shared by the SQL and partition-drop cleaners
//! (spec.md §3, §4.3).

use serde::{Deserialize, Serialize};

/// Which cleanup strategy a table's sink requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CleanupStrategy {
    /// Page through primary keys and delete rows in batches (§4.3.1).
    RowDelete,
    /// Drop whole time-bucketed partitions (§4.3.2, columnar sinks only).
    PartitionDrop,
}

/// Per-table retention configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub retention_days: i64,
    pub cleanup_interval_hour: u32,
    /// Wall-clock "HH:MM" for the first run of the day; `None` means run
    /// immediately on startup (spec.md §4.3.4).
    pub scheduled_time: Option<String>,
    pub batch_delete_size: u32,
    pub strategy: CleanupStrategy,
}

impl RetentionPolicy {
    /// `retention_days = 0` disables cleanup entirely (spec.md §8 boundary
    /// behaviors).
    pub const fn is_disabled(&self) -> bool {
        self.retention_days == 0
    }
}
