//! SQLite-backed retention deletion (spec.md §4.3.1, §6) and a no-op
//! partition-drop double for the columnar path spec.md §4.3.2 leaves
//! unimplemented against a real store (see DESIGN.md).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::domain::errors::SinkError;
use crate::domain::ports::{PartitionDropCleaner, RetentionDeleter};

/// Generic batched-delete driver for one (main table, optional detail
/// table) pair. `scope_column` is whatever column the cleaner's caller
/// scopes a cleanup pass by — `gateway_instance_id` for the access-log
/// pipeline, `tenant_id` for the alert log — spec.md §4.3.1 only requires
/// *a* scoping predicate, not that it always be the gateway instance.
pub struct SqliteRetentionDeleter {
    pool: SqlitePool,
    main_table: &'static str,
    main_key_column: &'static str,
    main_time_column: &'static str,
    scope_column: &'static str,
    detail_table: Option<&'static str>,
    detail_key_column: Option<&'static str>,
}

impl SqliteRetentionDeleter {
    pub fn new(
        pool: SqlitePool,
        main_table: &'static str,
        main_key_column: &'static str,
        main_time_column: &'static str,
        scope_column: &'static str,
    ) -> Self {
        Self {
            pool,
            main_table,
            main_key_column,
            main_time_column,
            scope_column,
            detail_table: None,
            detail_key_column: None,
        }
    }

    /// Attach a detail table sharing `main_key_column`'s values, deleted
    /// before the main rows (spec.md §4.3.1).
    pub fn with_detail(mut self, detail_table: &'static str, detail_key_column: &'static str) -> Self {
        self.detail_table = Some(detail_table);
        self.detail_key_column = Some(detail_key_column);
        self
    }
}

#[async_trait]
impl RetentionDeleter for SqliteRetentionDeleter {
    async fn page_expired_keys(
        &self,
        gateway_instance_id: &str,
        cutoff: DateTime<Utc>,
        batch_size: u32,
    ) -> Result<Vec<String>, SinkError> {
        let sql = format!(
            "SELECT {key} FROM {table} WHERE {scope} = ? AND {time} < ? LIMIT ?",
            key = self.main_key_column,
            table = self.main_table,
            scope = self.scope_column,
            time = self.main_time_column,
        );

        let rows: Vec<(String,)> = sqlx::query_as(&sql)
            .bind(gateway_instance_id)
            .bind(cutoff.to_rfc3339())
            .bind(i64::from(batch_size))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|(k,)| k).collect())
    }

    async fn delete_detail_by_keys(&self, keys: &[String]) -> Result<u64, SinkError> {
        let (Some(table), Some(key_column)) = (self.detail_table, self.detail_key_column) else {
            return Ok(0);
        };
        if keys.is_empty() {
            return Ok(0);
        }

        let placeholders = keys.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        let sql = format!("DELETE FROM {table} WHERE {key_column} IN ({placeholders})");
        let mut query = sqlx::query(&sql);
        for key in keys {
            query = query.bind(key);
        }
        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn delete_main_by_keys(&self, keys: &[String]) -> Result<u64, SinkError> {
        if keys.is_empty() {
            return Ok(0);
        }

        let placeholders = keys.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        let sql = format!(
            "DELETE FROM {table} WHERE {key} IN ({placeholders})",
            table = self.main_table,
            key = self.main_key_column,
        );
        let mut query = sqlx::query(&sql);
        for key in keys {
            query = query.bind(key);
        }
        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

/// No columnar store ships with this crate (spec.md's ClickHouse/Mongo
/// note is a pluggability statement, not a build target here). This
/// double logs every call so a cleaner wired against it is observable in
/// tests without a real columnar backend.
pub struct NoopPartitionDropCleaner;

#[async_trait]
impl PartitionDropCleaner for NoopPartitionDropCleaner {
    async fn list_partitions_older_than(&self, _cutoff: DateTime<Utc>) -> Result<Vec<String>, SinkError> {
        Ok(Vec::new())
    }

    async fn drop_partition(&self, partition_id: &str) -> Result<(), SinkError> {
        tracing::debug!(partition_id, "no-op partition drop");
        Ok(())
    }
}
