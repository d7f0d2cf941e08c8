//! Write-side storage port for the async write pipeline (spec.md §4.2.3).

use async_trait::async_trait;

use crate::domain::errors::SinkError;
use crate::domain::models::Record;

/// Where a flushed batch lands. `SqliteSink` is the implementation this
/// crate ships; a columnar store (ClickHouse, Mongo) would implement the
/// same trait and plug into `AsyncWriter<T>` unchanged — this crate does not
/// build one, per spec.md's "pluggable log stores" note.
#[async_trait]
pub trait Sink<T: Record>: Send + Sync {
    /// Insert every record in one round trip (or one transaction). Flush
    /// faults are reported up to the writer, which discards the batch rather
    /// than retrying (spec.md §4.2.2) — this method must not retry
    /// internally either.
    async fn batch_insert(&self, table: &'static str, records: &[T]) -> Result<(), SinkError>;
}
