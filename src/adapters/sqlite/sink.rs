//! SQLite sink for the async write pipeline (spec.md §4.2.3, §6).
//!
//! One `SqliteSink` implements `Sink<T>` once per record type, mirroring
//! spec.md's note that a document or columnar store would implement the
//! same one-method contract against its own collection/table — a
//! ClickHouse or Mongo sink would be a second struct behind the same
//! `Sink<T>` trait, not a variant of this one.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::domain::errors::SinkError;
use crate::domain::models::{AccessLogRecord, AlertLogRecord, BackendTraceRecord};
use crate::domain::ports::Sink;

#[derive(Clone)]
pub struct SqliteSink {
    pool: SqlitePool,
}

impl SqliteSink {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Sink<AccessLogRecord> for SqliteSink {
    async fn batch_insert(&self, table: &'static str, records: &[AccessLogRecord]) -> Result<(), SinkError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for record in records {
            sqlx::query(
                r"
                INSERT INTO access_log (
                    trace_id, gateway_instance_id, tenant_id, route_id, method,
                    path, status_code, latency_ms, client_ip, start_time
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(trace_id) DO NOTHING
                ",
            )
            .bind(&record.trace_id)
            .bind(&record.gateway_instance_id)
            .bind(&record.tenant_id)
            .bind(&record.route_id)
            .bind(&record.method)
            .bind(&record.path)
            .bind(record.status_code)
            .bind(record.latency_ms)
            .bind(&record.client_ip)
            .bind(record.start_time.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        tracing::debug!(table, count = records.len(), "batch insert complete");
        Ok(())
    }
}

#[async_trait]
impl Sink<BackendTraceRecord> for SqliteSink {
    async fn batch_insert(&self, table: &'static str, records: &[BackendTraceRecord]) -> Result<(), SinkError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for record in records {
            sqlx::query(
                r"
                INSERT INTO backend_trace_log (
                    trace_id, gateway_instance_id, backend_name, upstream_latency_ms,
                    upstream_status_code, error, start_time
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                ",
            )
            .bind(&record.trace_id)
            .bind(&record.gateway_instance_id)
            .bind(&record.backend_name)
            .bind(record.upstream_latency_ms)
            .bind(record.upstream_status_code)
            .bind(&record.error)
            .bind(record.start_time.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        tracing::debug!(table, count = records.len(), "batch insert complete");
        Ok(())
    }
}

#[async_trait]
impl Sink<AlertLogRecord> for SqliteSink {
    async fn batch_insert(&self, table: &'static str, records: &[AlertLogRecord]) -> Result<(), SinkError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for record in records {
            sqlx::query(
                r"
                INSERT INTO alert_log (
                    alert_id, tenant_id, alert_type, severity, message, triggered_at
                ) VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(alert_id) DO NOTHING
                ",
            )
            .bind(&record.alert_id)
            .bind(&record.tenant_id)
            .bind(&record.alert_type)
            .bind(&record.severity)
            .bind(&record.message)
            .bind(record.triggered_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        tracing::debug!(table, count = records.len(), "batch insert complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use chrono::Utc;

    #[tokio::test]
    async fn batch_insert_persists_access_log_rows() {
        let pool = create_migrated_test_pool().await.unwrap();
        let sink = SqliteSink::new(pool.clone());

        let records = vec![AccessLogRecord {
            trace_id: "trace-1".into(),
            gateway_instance_id: "gw-1".into(),
            tenant_id: "t1".into(),
            route_id: Some("r1".into()),
            method: "GET".into(),
            path: "/health".into(),
            status_code: 200,
            latency_ms: 12,
            client_ip: "127.0.0.1".into(),
            start_time: Utc::now(),
        }];

        Sink::<AccessLogRecord>::batch_insert(&sink, "access_log", &records).await.unwrap();

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM access_log")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count.0, 1);
    }

    #[tokio::test]
    async fn batch_insert_of_empty_slice_is_a_no_op() {
        let pool = create_migrated_test_pool().await.unwrap();
        let sink = SqliteSink::new(pool.clone());

        Sink::<AlertLogRecord>::batch_insert(&sink, "alert_log", &[]).await.unwrap();

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM alert_log")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count.0, 0);
    }
}
