//! SQLite implementation of the `AckStore` port (spec.md §4.6, §6).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::domain::errors::AckStoreError;
use crate::domain::models::ClusterEventAck;
use crate::domain::ports::AckStore;

#[derive(Clone)]
pub struct SqliteAckStore {
    pool: SqlitePool,
}

impl SqliteAckStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AckStore for SqliteAckStore {
    async fn insert_ack(&self, ack: &ClusterEventAck) -> Result<(), AckStoreError> {
        sqlx::query(
            r"
            INSERT INTO cluster_event_ack (
                tenant_id, ack_id, event_id, node_id, node_ip, ack_status,
                process_time, result_message, retry_count, active_flag,
                add_time, add_who, edit_time, edit_who, opr_seq_flag, current_version
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(&ack.tenant_id)
        .bind(&ack.ack_id)
        .bind(ack.event_id.as_str())
        .bind(&ack.node_id)
        .bind(&ack.node_ip)
        .bind(ack.ack_status.as_sql_str())
        .bind(ack.process_time.to_rfc3339())
        .bind(&ack.result_message)
        .bind(ack.retry_count)
        .bind(ack.active_flag.as_sql_char())
        .bind(ack.add_time.to_rfc3339())
        .bind(&ack.add_who)
        .bind(ack.edit_time.to_rfc3339())
        .bind(&ack.edit_who)
        .bind(&ack.opr_seq_flag)
        .bind(ack.current_version)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn has_ack(&self, tenant_id: &str, event_id: &str, node_id: &str) -> Result<bool, AckStoreError> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT 1 FROM cluster_event_ack WHERE tenant_id = ? AND event_id = ? AND node_id = ?",
        )
        .bind(tenant_id)
        .bind(event_id)
        .bind(node_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }

    async fn clear_acks_for_event_type(&self, tenant_id: &str, event_type: &str) -> Result<u64, AckStoreError> {
        let result = sqlx::query(
            r"
            DELETE FROM cluster_event_ack
            WHERE tenant_id = ?
              AND event_id IN (
                  SELECT event_id FROM cluster_event
                  WHERE tenant_id = ? AND event_type = ?
              )
            ",
        )
        .bind(tenant_id)
        .bind(tenant_id)
        .bind(event_type)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, now: DateTime<Utc>, ack_retention_hours: i64) -> Result<u64, AckStoreError> {
        let cutoff = now - chrono::Duration::hours(ack_retention_hours);
        let result = sqlx::query("DELETE FROM cluster_event_ack WHERE edit_time < ?")
            .bind(cutoff.to_rfc3339())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use crate::domain::models::{ActiveFlag, AckStatus, ClusterEvent, EventId};
    use crate::domain::ports::EventStore as EventStorePort;

    fn sample_ack(tenant: &str, event_id: &EventId, node: &str, at: DateTime<Utc>) -> ClusterEventAck {
        ClusterEventAck {
            tenant_id: tenant.to_string(),
            ack_id: EventId::generate().as_str().to_string(),
            event_id: event_id.clone(),
            node_id: node.to_string(),
            node_ip: "10.0.0.2".to_string(),
            ack_status: AckStatus::Success,
            process_time: at,
            result_message: Some("ok".to_string()),
            retry_count: 0,
            active_flag: ActiveFlag::Active,
            add_time: at,
            add_who: node.to_string(),
            edit_time: at,
            edit_who: node.to_string(),
            opr_seq_flag: "1".to_string(),
            current_version: 1,
        }
    }

    #[tokio::test]
    async fn has_ack_is_false_before_insert_and_true_after() {
        let pool = create_migrated_test_pool().await.unwrap();
        let store = SqliteAckStore::new(pool);
        let event_id = EventId::generate();
        let now = Utc::now();

        assert!(!store.has_ack("t1", event_id.as_str(), "node-b").await.unwrap());

        store.insert_ack(&sample_ack("t1", &event_id, "node-b", now)).await.unwrap();

        assert!(store.has_ack("t1", event_id.as_str(), "node-b").await.unwrap());
    }

    #[tokio::test]
    async fn delete_expired_only_removes_acks_past_retention() {
        let pool = create_migrated_test_pool().await.unwrap();
        let store = SqliteAckStore::new(pool);
        let now = Utc::now();

        let old = sample_ack("t1", &EventId::generate(), "node-b", now - chrono::Duration::hours(72));
        let fresh = sample_ack("t1", &EventId::generate(), "node-b", now);
        store.insert_ack(&old).await.unwrap();
        store.insert_ack(&fresh).await.unwrap();

        let deleted = store.delete_expired(now, 48).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(!store.has_ack("t1", old.event_id.as_str(), "node-b").await.unwrap());
        assert!(store.has_ack("t1", fresh.event_id.as_str(), "node-b").await.unwrap());
    }

    #[tokio::test]
    async fn clear_acks_for_event_type_only_clears_matching_events() {
        let pool = create_migrated_test_pool().await.unwrap();
        let event_store = crate::adapters::sqlite::SqliteEventStore::new(pool.clone());
        let ack_store = SqliteAckStore::new(pool);
        let now = Utc::now();

        let route_event = ClusterEvent {
            tenant_id: "t1".into(),
            event_id: EventId::generate(),
            event_type: "ROUTE_CONFIG".into(),
            event_action: "RELOAD".into(),
            event_payload: "{}".into(),
            source_node_id: "node-a".into(),
            source_node_ip: "10.0.0.1".into(),
            event_time: now,
            expire_time: None,
            active_flag: ActiveFlag::Active,
            add_time: now,
            add_who: "node-a".into(),
            edit_time: now,
            edit_who: "node-a".into(),
            opr_seq_flag: "1".into(),
            current_version: 1,
        };
        let mut alert_event = route_event.clone();
        alert_event.event_id = EventId::generate();
        alert_event.event_type = "ALERT_CONFIG".into();

        event_store.insert(&route_event).await.unwrap();
        event_store.insert(&alert_event).await.unwrap();

        ack_store.insert_ack(&sample_ack("t1", &route_event.event_id, "node-b", now)).await.unwrap();
        ack_store.insert_ack(&sample_ack("t1", &alert_event.event_id, "node-b", now)).await.unwrap();

        let cleared = ack_store.clear_acks_for_event_type("t1", "ROUTE_CONFIG").await.unwrap();
        assert_eq!(cleared, 1);
        assert!(!ack_store.has_ack("t1", route_event.event_id.as_str(), "node-b").await.unwrap());
        assert!(ack_store.has_ack("t1", alert_event.event_id.as_str(), "node-b").await.unwrap());
    }
}
