//! Storage-side ports the retention cleaner drives (spec.md §4.3.1, §4.3.2).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::SinkError;

/// Batched row delete for SQL-backed log tables (spec.md §4.3.1): page
/// through primary keys older than the cutoff, delete the detail table rows
/// first, then the main table rows, pausing between pages.
#[async_trait]
pub trait RetentionDeleter: Send + Sync {
    /// Return up to `batch_size` primary keys for `gateway_instance_id` whose
    /// partition/retention column is older than `cutoff`.
    async fn page_expired_keys(
        &self,
        gateway_instance_id: &str,
        cutoff: DateTime<Utc>,
        batch_size: u32,
    ) -> Result<Vec<String>, SinkError>;

    /// Delete detail-table rows referencing `keys`. A no-op implementation is
    /// valid for tables with no detail table.
    async fn delete_detail_by_keys(&self, keys: &[String]) -> Result<u64, SinkError>;

    /// Delete main-table rows by `keys`. Returns the number of rows removed.
    async fn delete_main_by_keys(&self, keys: &[String]) -> Result<u64, SinkError>;
}

/// Partition-drop cleanup for columnar sinks (spec.md §4.3.2). No
/// implementation against a real columnar store ships with this crate — see
/// `domain::ports::Sink`'s note on the same boundary.
#[async_trait]
pub trait PartitionDropCleaner: Send + Sync {
    /// List partition identifiers whose time bucket is entirely before
    /// `cutoff`.
    async fn list_partitions_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>, SinkError>;

    /// Drop one partition. Failures are logged and skipped by the caller;
    /// one bad partition must not block the rest (spec.md §4.3.2).
    async fn drop_partition(&self, partition_id: &str) -> Result<(), SinkError>;
}
