//! Durable storage port for `ClusterEvent` rows (spec.md §4.1.2, §4.6).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::EventStoreError;
use crate::domain::models::ClusterEvent;

/// The bus's view of durable event storage. One implementation (SQLite) ships
/// with this crate; a second backend would implement this trait the same way
/// `Sink` lets a columnar store plug into the write pipeline.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Insert one newly published event. Rows are append-only; there is no
    /// update path.
    async fn insert(&self, event: &ClusterEvent) -> Result<(), EventStoreError>;

    /// Return up to `batch_size` active events for `tenant_id` with
    /// `event_time >= watermark` that this node has not yet acked, ordered
    /// by `event_time` ascending (spec.md §4.1.2). Expiry is not filtered
    /// here — the dispatcher decides per-event (spec.md §4.1.3).
    async fn poll_pending(
        &self,
        tenant_id: &str,
        node_id: &str,
        watermark: DateTime<Utc>,
        batch_size: u32,
    ) -> Result<Vec<ClusterEvent>, EventStoreError>;

    /// Delete events whose `expire_time` is more than `expire_hours` in the
    /// past (spec.md §4.3.3, cluster-side cleanup pass). Returns the number
    /// of rows removed.
    async fn delete_expired(&self, now: DateTime<Utc>, expire_hours: i64) -> Result<u64, EventStoreError>;
}
