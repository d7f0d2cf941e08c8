//! Retention cleanup: the batched SQL row-delete loop (spec.md §4.3.1), the
//! partition-drop alternative for columnar sinks (§4.3.2), the bus-side ack
//! sweep (§4.3.3), and the scheduled-then-periodic runner shared by all
//! three (§4.3.4). Loop shape follows the teacher's
//! `memory_decay_daemon::run_loop` idiom: a `tokio::select!` between a
//! cancellation signal and a timer tick.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveTime, Timelike, Utc};
use tokio_util::sync::CancellationToken;

use crate::domain::models::RetentionPolicy;
use crate::domain::ports::{AckStore, EventStore, PartitionDropCleaner, RetentionDeleter};

/// One cleanup pass, run to completion each time the scheduler fires.
#[async_trait]
pub trait CleanupTask: Send + Sync {
    async fn run_once(&self);
}

/// Batched row-delete cleaner for a single SQL-backed log table (spec.md
/// §4.3.1): page through expired primary keys, delete the detail rows then
/// the main rows, sleep briefly between pages so a large backlog doesn't
/// monopolize the connection pool.
pub struct SqlRetentionCleaner {
    deleter: Arc<dyn RetentionDeleter>,
    policy: RetentionPolicy,
    gateway_instance_id: String,
    table: &'static str,
}

impl SqlRetentionCleaner {
    pub fn new(
        deleter: Arc<dyn RetentionDeleter>,
        policy: RetentionPolicy,
        gateway_instance_id: String,
        table: &'static str,
    ) -> Self {
        Self {
            deleter,
            policy,
            gateway_instance_id,
            table,
        }
    }
}

#[async_trait]
impl CleanupTask for SqlRetentionCleaner {
    async fn run_once(&self) {
        if self.policy.is_disabled() {
            return;
        }

        let cutoff = Utc::now() - chrono::Duration::days(self.policy.retention_days);
        let mut total_deleted: u64 = 0;

        loop {
            let keys = match self
                .deleter
                .page_expired_keys(&self.gateway_instance_id, cutoff, self.policy.batch_delete_size)
                .await
            {
                Ok(keys) => keys,
                Err(error) => {
                    tracing::warn!(table = self.table, %error, "retention page query failed, stopping this pass");
                    break;
                }
            };

            if keys.is_empty() {
                break;
            }

            if let Err(error) = self.deleter.delete_detail_by_keys(&keys).await {
                tracing::warn!(table = self.table, %error, "detail delete failed");
            }

            match self.deleter.delete_main_by_keys(&keys).await {
                Ok(deleted) => total_deleted += deleted,
                Err(error) => tracing::warn!(table = self.table, %error, "main delete failed"),
            }

            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        tracing::info!(table = self.table, total_deleted, "retention cleanup pass complete");
    }
}

/// Drives partition drops for a columnar sink (spec.md §4.3.2). One bad
/// partition is logged and skipped, never aborting the rest of the pass.
pub struct PartitionDropCleanerRunner {
    cleaner: Arc<dyn PartitionDropCleaner>,
    retention_days: i64,
    table: &'static str,
}

impl PartitionDropCleanerRunner {
    pub fn new(cleaner: Arc<dyn PartitionDropCleaner>, retention_days: i64, table: &'static str) -> Self {
        Self {
            cleaner,
            retention_days,
            table,
        }
    }
}

#[async_trait]
impl CleanupTask for PartitionDropCleanerRunner {
    async fn run_once(&self) {
        if self.retention_days == 0 {
            return;
        }

        let cutoff = Utc::now() - chrono::Duration::days(self.retention_days);
        let partitions = match self.cleaner.list_partitions_older_than(cutoff).await {
            Ok(partitions) => partitions,
            Err(error) => {
                tracing::warn!(table = self.table, %error, "partition listing failed");
                return;
            }
        };

        let mut dropped = 0u64;
        for partition_id in partitions {
            match self.cleaner.drop_partition(&partition_id).await {
                Ok(()) => dropped += 1,
                Err(error) => tracing::warn!(table = self.table, partition_id, %error, "partition drop failed, continuing"),
            }
        }

        tracing::info!(table = self.table, dropped, "partition drop pass complete");
    }
}

/// The bus-side two-pass cleanup of spec.md §4.3.3: expired events, then
/// stale acks, unconditionally (no per-tenant policy — it runs for the whole
/// node).
pub struct ClusterCleaner {
    event_store: Arc<dyn EventStore>,
    ack_store: Arc<dyn AckStore>,
    expire_hours: i64,
    ack_retention_hours: i64,
}

impl ClusterCleaner {
    pub fn new(
        event_store: Arc<dyn EventStore>,
        ack_store: Arc<dyn AckStore>,
        expire_hours: i64,
        ack_retention_hours: i64,
    ) -> Self {
        Self {
            event_store,
            ack_store,
            expire_hours,
            ack_retention_hours,
        }
    }
}

#[async_trait]
impl CleanupTask for ClusterCleaner {
    async fn run_once(&self) {
        let now = Utc::now();

        match self.event_store.delete_expired(now, self.expire_hours).await {
            Ok(deleted) => tracing::info!(deleted, "cluster event cleanup pass complete"),
            Err(error) => tracing::warn!(%error, "cluster event cleanup failed"),
        }

        match self.ack_store.delete_expired(now, self.ack_retention_hours).await {
            Ok(deleted) => tracing::info!(deleted, "cluster event ack cleanup pass complete"),
            Err(error) => tracing::warn!(%error, "cluster event ack cleanup failed"),
        }
    }
}

/// Scheduled-then-periodic runner shared by every cleanup flavor (spec.md
/// §4.3.4). `scheduled_time` of `"HH:MM"` delays the first pass until that
/// wall-clock time today (or tomorrow if it's already past); a malformed
/// value warns and runs immediately instead of blocking forever. After the
/// first pass, `interval` governs every subsequent one until cancelled.
pub async fn run_cleaner_loop(
    task: Arc<dyn CleanupTask>,
    scheduled_time: Option<String>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let initial_delay = compute_initial_delay(scheduled_time.as_deref());

    tokio::select! {
        () = tokio::time::sleep(initial_delay) => {}
        () = cancel.cancelled() => return,
    }

    task.run_once().await;

    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await; // consume the immediate first tick; we already ran

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => task.run_once().await,
        }
    }
}

fn compute_initial_delay(scheduled_time: Option<&str>) -> Duration {
    let Some(raw) = scheduled_time else {
        return Duration::ZERO;
    };

    match parse_hh_mm(raw) {
        Some(target) => seconds_until(target),
        None => {
            tracing::warn!(scheduled_time = raw, "malformed scheduled_time, running immediately");
            Duration::ZERO
        }
    }
}

fn parse_hh_mm(raw: &str) -> Option<NaiveTime> {
    let (hour, minute) = raw.split_once(':')?;
    let hour: u32 = hour.parse().ok()?;
    let minute: u32 = minute.parse().ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}

fn seconds_until(target: NaiveTime) -> Duration {
    let now = Utc::now();
    let today_target = now
        .with_hour(target.hour())
        .and_then(|t| t.with_minute(target.minute()))
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0));

    let Some(today_target) = today_target else {
        return Duration::ZERO;
    };

    let next_occurrence = if today_target > now {
        today_target
    } else {
        today_target + chrono::Duration::days(1)
    };

    (next_occurrence - now).to_std().unwrap_or(Duration::ZERO)
}
