//! SQLite implementation of the `EventStore` port (spec.md §4.1.2, §6).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};

use crate::domain::errors::EventStoreError;
use crate::domain::models::{ActiveFlag, ClusterEvent, EventId};
use crate::domain::ports::EventStore;

#[derive(Clone)]
pub struct SqliteEventStore {
    pool: SqlitePool,
}

impl SqliteEventStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct ClusterEventRow {
    tenant_id: String,
    event_id: String,
    event_type: String,
    event_action: String,
    event_payload: String,
    source_node_id: String,
    source_node_ip: String,
    event_time: String,
    expire_time: Option<String>,
    active_flag: String,
    add_time: String,
    add_who: String,
    edit_time: String,
    edit_who: String,
    opr_seq_flag: String,
    current_version: i64,
}

impl TryFrom<ClusterEventRow> for ClusterEvent {
    type Error = EventStoreError;

    fn try_from(row: ClusterEventRow) -> Result<Self, Self::Error> {
        Ok(Self {
            tenant_id: row.tenant_id,
            event_id: EventId::new(row.event_id).map_err(|e| EventStoreError::CorruptRow(e.to_string()))?,
            event_type: row.event_type,
            event_action: row.event_action,
            event_payload: row.event_payload,
            source_node_id: row.source_node_id,
            source_node_ip: row.source_node_ip,
            event_time: parse_rfc3339(&row.event_time)?,
            expire_time: row.expire_time.as_deref().map(parse_rfc3339).transpose()?,
            active_flag: ActiveFlag::from_sql_char(&row.active_flag),
            add_time: parse_rfc3339(&row.add_time)?,
            add_who: row.add_who,
            edit_time: parse_rfc3339(&row.edit_time)?,
            edit_who: row.edit_who,
            opr_seq_flag: row.opr_seq_flag,
            current_version: row.current_version,
        })
    }
}

fn parse_rfc3339(s: &str) -> Result<DateTime<Utc>, EventStoreError> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| EventStoreError::CorruptRow(format!("bad timestamp {s:?}: {e}")))
}

#[async_trait]
impl EventStore for SqliteEventStore {
    async fn insert(&self, event: &ClusterEvent) -> Result<(), EventStoreError> {
        sqlx::query(
            r"
            INSERT INTO cluster_event (
                tenant_id, event_id, event_type, event_action, event_payload,
                source_node_id, source_node_ip, event_time, expire_time, active_flag,
                add_time, add_who, edit_time, edit_who, opr_seq_flag, current_version
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(&event.tenant_id)
        .bind(event.event_id.as_str())
        .bind(&event.event_type)
        .bind(&event.event_action)
        .bind(&event.event_payload)
        .bind(&event.source_node_id)
        .bind(&event.source_node_ip)
        .bind(event.event_time.to_rfc3339())
        .bind(event.expire_time.map(|t| t.to_rfc3339()))
        .bind(event.active_flag.as_sql_char())
        .bind(event.add_time.to_rfc3339())
        .bind(&event.add_who)
        .bind(event.edit_time.to_rfc3339())
        .bind(&event.edit_who)
        .bind(&event.opr_seq_flag)
        .bind(event.current_version)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn poll_pending(
        &self,
        tenant_id: &str,
        node_id: &str,
        watermark: DateTime<Utc>,
        batch_size: u32,
    ) -> Result<Vec<ClusterEvent>, EventStoreError> {
        let rows: Vec<ClusterEventRow> = sqlx::query_as(
            r"
            SELECT tenant_id, event_id, event_type, event_action, event_payload,
                   source_node_id, source_node_ip, event_time, expire_time, active_flag,
                   add_time, add_who, edit_time, edit_who, opr_seq_flag, current_version
            FROM cluster_event ce
            WHERE ce.tenant_id = ?
              AND ce.active_flag = 'Y'
              AND ce.event_time >= ?
              AND NOT EXISTS (
                  SELECT 1 FROM cluster_event_ack ack
                  WHERE ack.tenant_id = ce.tenant_id
                    AND ack.event_id = ce.event_id
                    AND ack.node_id = ?
              )
            ORDER BY ce.event_time ASC
            LIMIT ?
            ",
        )
        .bind(tenant_id)
        .bind(watermark.to_rfc3339())
        .bind(node_id)
        .bind(i64::from(batch_size))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ClusterEvent::try_from).collect()
    }

    async fn delete_expired(&self, now: DateTime<Utc>, expire_hours: i64) -> Result<u64, EventStoreError> {
        let cutoff = now - chrono::Duration::hours(expire_hours);
        let result = sqlx::query(
            "DELETE FROM cluster_event WHERE expire_time IS NOT NULL AND expire_time < ?",
        )
        .bind(cutoff.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
