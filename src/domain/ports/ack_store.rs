//! Durable storage port for `ClusterEventAck` rows (spec.md §4.1.5, §4.6).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::AckStoreError;
use crate::domain::models::ClusterEventAck;

#[async_trait]
pub trait AckStore: Send + Sync {
    /// Insert a terminal ack (`Success`/`Failed`/`Skipped`). `Retry` is never
    /// passed here — it never becomes a row (spec.md §4.1.5).
    async fn insert_ack(&self, ack: &ClusterEventAck) -> Result<(), AckStoreError>;

    /// Whether `node_id` has already acked `event_id` for `tenant_id`. The
    /// SQLite implementation embeds this as a NOT-EXISTS subquery directly in
    /// the poll query instead of a separate round trip; this method exists
    /// for callers (tests, other backends) that need it standalone.
    async fn has_ack(&self, tenant_id: &str, event_id: &str, node_id: &str) -> Result<bool, AckStoreError>;

    /// Delete every ack row for `tenant_id`/`event_type` so the event type
    /// replays cluster-wide on its next publish (spec.md §9 open question:
    /// explicit operator action, not automatic).
    async fn clear_acks_for_event_type(&self, tenant_id: &str, event_type: &str) -> Result<u64, AckStoreError>;

    /// Delete ack rows older than `ack_retention_hours` (spec.md §4.3.3).
    async fn delete_expired(&self, now: DateTime<Utc>, ack_retention_hours: i64) -> Result<u64, AckStoreError>;
}
