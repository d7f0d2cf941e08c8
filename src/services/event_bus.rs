//! The durable, DB-backed fan-out bus (spec.md §4.1). Despite the name
//! overlap, this has no relation to an in-process broadcast channel: every
//! dispatch is driven off `EventStore::poll_pending`'s NOT-EXISTS dedup
//! query, and durability survives a process restart. Loop shape is the
//! teacher's `memory_decay_daemon` cancellation-token idiom, reused here
//! for the poll loop and handed to `run_cleaner_loop` for the cleanup side.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::domain::errors::BusError;
use crate::domain::models::{
    AckStatus, ActiveFlag, ClusterEvent, ClusterEventAck, CleanupConfig, EventBusConfig, EventId,
    NewClusterEvent,
};
use crate::domain::ports::{AckStore, EventStore, Handler, HandlerOutcome};
use crate::services::handler_registry::HandlerRegistry;
use crate::services::retention_cleaner::{run_cleaner_loop, ClusterCleaner, CleanupTask};

/// One node's event bus instance: a durable poll/dispatch loop plus the
/// cluster-wide expired-event/stale-ack sweep (spec.md §4.1, §4.3.3).
pub struct ClusterEventBus {
    event_store: Arc<dyn EventStore>,
    ack_store: Arc<dyn AckStore>,
    registry: Arc<HandlerRegistry>,
    node_id: String,
    node_ip: String,
    tenant_ids: Vec<String>,
    event_config: EventBusConfig,
    cleanup_config: CleanupConfig,
    watermark: Arc<Mutex<HashMap<String, DateTime<Utc>>>>,
    running: AtomicBool,
    cancel: Mutex<Option<CancellationToken>>,
    poll_handle: Mutex<Option<JoinHandle<()>>>,
    cleanup_handle: Mutex<Option<JoinHandle<()>>>,
}

impl ClusterEventBus {
    pub fn new(
        event_store: Arc<dyn EventStore>,
        ack_store: Arc<dyn AckStore>,
        registry: Arc<HandlerRegistry>,
        node_id: String,
        node_ip: String,
        tenant_ids: Vec<String>,
        event_config: EventBusConfig,
        cleanup_config: CleanupConfig,
    ) -> Self {
        let launch = Utc::now();
        let watermark = tenant_ids.iter().map(|t| (t.clone(), launch)).collect();

        Self {
            event_store,
            ack_store,
            registry,
            node_id,
            node_ip,
            tenant_ids,
            event_config,
            cleanup_config,
            watermark: Arc::new(Mutex::new(watermark)),
            running: AtomicBool::new(false),
            cancel: Mutex::new(None),
            poll_handle: Mutex::new(None),
            cleanup_handle: Mutex::new(None),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// True iff `start` has been called and `stop` has not completed
    /// (spec.md §4.1.1).
    pub fn ready(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Spawn the poll loop, and the cleanup loop if `cleanup.enabled`
    /// (spec.md §4.1.1). Non-blocking; returns once both tasks are spawned.
    pub async fn start(self: &Arc<Self>) -> Result<(), BusError> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(BusError::AlreadyRunning);
        }

        let token = CancellationToken::new();
        *self.cancel.lock().await = Some(token.clone());

        let poll_bus = self.clone();
        let poll_token = token.clone();
        let poll_handle = tokio::spawn(async move { poll_bus.run_poll_loop(poll_token).await });
        *self.poll_handle.lock().await = Some(poll_handle);

        if self.cleanup_config.enabled {
            let cleaner: Arc<dyn CleanupTask> = Arc::new(ClusterCleaner::new(
                self.event_store.clone(),
                self.ack_store.clone(),
                self.event_config.expire_hours,
                self.cleanup_config.ack_retention_hours,
            ));
            let cleanup_token = token.clone();
            let interval = Duration::from_secs(self.cleanup_config.interval_secs.max(1));
            let cleanup_handle = tokio::spawn(run_cleaner_loop(cleaner, None, interval, cleanup_token));
            *self.cleanup_handle.lock().await = Some(cleanup_handle);
        }

        Ok(())
    }

    /// Cancel both loops and wait up to `deadline`. Idempotent; always
    /// returns, reporting `true` only if every spawned task joined cleanly
    /// inside the deadline (spec.md §4.1.1).
    pub async fn stop(&self, deadline: Duration) -> bool {
        if !self.running.swap(false, Ordering::AcqRel) {
            return true;
        }

        if let Some(token) = self.cancel.lock().await.take() {
            token.cancel();
        }

        let poll_handle = self.poll_handle.lock().await.take();
        let cleanup_handle = self.cleanup_handle.lock().await.take();

        let mut clean = true;
        if let Some(handle) = poll_handle {
            clean &= tokio::time::timeout(deadline, handle).await.is_ok();
        }
        if let Some(handle) = cleanup_handle {
            clean &= tokio::time::timeout(deadline, handle).await.is_ok();
        }
        clean
    }

    /// Fill in the bus-owned fields and persist synchronously (spec.md
    /// §4.1.1).
    pub async fn publish(&self, new_event: NewClusterEvent) -> Result<ClusterEvent, BusError> {
        let now = Utc::now();

        let event_id = match new_event.event_id {
            Some(id) => id,
            None => EventId::generate(),
        };

        let expire_time = new_event.expire_time.or_else(|| {
            if self.event_config.expire_hours > 0 {
                Some(now + chrono::Duration::hours(self.event_config.expire_hours))
            } else {
                None
            }
        });

        let event = ClusterEvent {
            tenant_id: new_event.tenant_id,
            event_id,
            event_type: new_event.event_type,
            event_action: new_event.event_action,
            event_payload: new_event.event_payload,
            source_node_id: self.node_id.clone(),
            source_node_ip: self.node_ip.clone(),
            event_time: now,
            expire_time,
            active_flag: ActiveFlag::Active,
            add_time: now,
            add_who: self.node_id.clone(),
            edit_time: now,
            edit_who: self.node_id.clone(),
            opr_seq_flag: "1".to_string(),
            current_version: 1,
        };

        self.event_store.insert(&event).await?;
        Ok(event)
    }

    pub async fn register_handler(&self, handler: Arc<dyn Handler>) {
        self.registry.register(handler).await;
    }

    pub async fn unregister_handler(&self, event_type: &str) {
        self.registry.unregister(event_type).await;
    }

    async fn run_poll_loop(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(Duration::from_secs(self.event_config.poll_interval_secs.max(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    for tenant_id in self.tenant_ids.clone() {
                        self.poll_tenant_once(&tenant_id).await;
                    }
                }
            }
        }

        tracing::info!(node_id = %self.node_id, "poll loop stopped");
    }

    async fn poll_tenant_once(&self, tenant_id: &str) {
        let watermark = {
            let guard = self.watermark.lock().await;
            match guard.get(tenant_id) {
                Some(wm) => *wm,
                None => return,
            }
        };

        let events = match self
            .event_store
            .poll_pending(tenant_id, &self.node_id, watermark, self.event_config.batch_size)
            .await
        {
            Ok(events) => events,
            Err(error) => {
                tracing::warn!(tenant_id, %error, "poll query failed, skipping this tick");
                return;
            }
        };

        for event in events {
            self.dispatch_one(&event).await;

            let mut guard = self.watermark.lock().await;
            let entry = guard.entry(tenant_id.to_string()).or_insert(event.event_time);
            if event.event_time > *entry {
                *entry = event.event_time;
            }
        }
    }

    /// Implements spec.md §4.1.3 exactly: expired events never reach a
    /// handler; `Retry` never produces an ack row.
    async fn dispatch_one(&self, event: &ClusterEvent) {
        let now = Utc::now();

        if event.is_expired_at(now) {
            self.write_ack(event, AckStatus::Skipped, Some("expired".to_string()), now)
                .await;
            return;
        }

        let Some(handler) = self.registry.lookup(&event.event_type).await else {
            self.write_ack(event, AckStatus::Skipped, Some("no handler".to_string()), now)
                .await;
            return;
        };

        // Run the handler in its own task so a panic is caught as a
        // `JoinError` instead of taking down the poll loop (spec.md §4.1.6).
        let owned_event = event.clone();
        let outcome = match tokio::spawn(async move { handler.handle(&owned_event).await }).await {
            Ok(outcome) => outcome,
            Err(join_error) => {
                tracing::warn!(event_id = event.event_id.as_str(), %join_error, "handler panicked, recording FAILED");
                HandlerOutcome::Failed("handler panicked".to_string())
            }
        };

        match outcome {
            HandlerOutcome::Success(message) => {
                self.write_ack(event, AckStatus::Success, Some(message), Utc::now()).await;
            }
            HandlerOutcome::Failed(message) => {
                self.write_ack(event, AckStatus::Failed, Some(message), Utc::now()).await;
            }
            HandlerOutcome::Skipped(message) => {
                self.write_ack(event, AckStatus::Skipped, Some(message), Utc::now()).await;
            }
            HandlerOutcome::Retry => {
                tracing::debug!(event_id = event.event_id.as_str(), "handler requested retry, no ack written");
            }
        }
    }

    async fn write_ack(&self, event: &ClusterEvent, status: AckStatus, message: Option<String>, at: DateTime<Utc>) {
        let ack = ClusterEventAck {
            tenant_id: event.tenant_id.clone(),
            ack_id: EventId::generate().as_str().to_string(),
            event_id: event.event_id.clone(),
            node_id: self.node_id.clone(),
            node_ip: self.node_ip.clone(),
            ack_status: status,
            process_time: at,
            result_message: message,
            retry_count: 0,
            active_flag: ActiveFlag::Active,
            add_time: at,
            add_who: self.node_id.clone(),
            edit_time: at,
            edit_who: self.node_id.clone(),
            opr_seq_flag: "1".to_string(),
            current_version: 1,
        };

        if let Err(error) = self.ack_store.insert_ack(&ack).await {
            tracing::warn!(event_id = event.event_id.as_str(), %error, "ack insert failed, event will reappear on next poll");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::{AckStoreError, EventStoreError};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Mutex as TokioMutex;

    #[derive(Default)]
    struct InMemoryEventStore {
        events: TokioMutex<Vec<ClusterEvent>>,
    }

    #[async_trait]
    impl EventStore for InMemoryEventStore {
        async fn insert(&self, event: &ClusterEvent) -> Result<(), EventStoreError> {
            self.events.lock().await.push(event.clone());
            Ok(())
        }

        async fn poll_pending(
            &self,
            tenant_id: &str,
            _node_id: &str,
            watermark: DateTime<Utc>,
            batch_size: u32,
        ) -> Result<Vec<ClusterEvent>, EventStoreError> {
            let events = self.events.lock().await;
            let mut matched: Vec<ClusterEvent> = events
                .iter()
                .filter(|e| e.tenant_id == tenant_id)
                .filter(|e| e.active_flag == ActiveFlag::Active)
                .filter(|e| e.event_time >= watermark)
                .cloned()
                .collect();
            matched.sort_by_key(|e| e.event_time);
            matched.truncate(batch_size as usize);
            Ok(matched)
        }

        async fn delete_expired(&self, _now: DateTime<Utc>, _expire_hours: i64) -> Result<u64, EventStoreError> {
            Ok(0)
        }
    }

    #[derive(Default)]
    struct InMemoryAckStore {
        acks: TokioMutex<Vec<ClusterEventAck>>,
    }

    #[async_trait]
    impl AckStore for InMemoryAckStore {
        async fn insert_ack(&self, ack: &ClusterEventAck) -> Result<(), AckStoreError> {
            self.acks.lock().await.push(ack.clone());
            Ok(())
        }

        async fn has_ack(&self, tenant_id: &str, event_id: &str, node_id: &str) -> Result<bool, AckStoreError> {
            Ok(self
                .acks
                .lock()
                .await
                .iter()
                .any(|a| a.tenant_id == tenant_id && a.event_id.as_str() == event_id && a.node_id == node_id))
        }

        async fn clear_acks_for_event_type(&self, _tenant_id: &str, _event_type: &str) -> Result<u64, AckStoreError> {
            Ok(0)
        }

        async fn delete_expired(&self, _now: DateTime<Utc>, _ack_retention_hours: i64) -> Result<u64, AckStoreError> {
            Ok(0)
        }
    }

    struct CountingHandler {
        event_type: &'static str,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Handler for CountingHandler {
        fn event_type(&self) -> &str {
            self.event_type
        }

        async fn handle(&self, _event: &ClusterEvent) -> HandlerOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            HandlerOutcome::Success("ok".to_string())
        }
    }

    fn test_bus(event_store: Arc<dyn EventStore>, ack_store: Arc<dyn AckStore>) -> Arc<ClusterEventBus> {
        Arc::new(ClusterEventBus::new(
            event_store,
            ack_store,
            Arc::new(HandlerRegistry::new()),
            "node-a".to_string(),
            "10.0.0.1".to_string(),
            vec!["t1".to_string()],
            EventBusConfig {
                poll_interval_secs: 1,
                batch_size: 100,
                expire_hours: 24,
            },
            CleanupConfig {
                enabled: false,
                interval_secs: 3600,
                ack_retention_hours: 48,
            },
        ))
    }

    #[tokio::test]
    async fn double_start_returns_already_running() {
        let bus = test_bus(Arc::new(InMemoryEventStore::default()), Arc::new(InMemoryAckStore::default()));
        bus.start().await.unwrap();
        let second = bus.start().await;
        assert!(matches!(second, Err(BusError::AlreadyRunning)));
        assert!(bus.stop(Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn stop_before_start_is_a_no_op() {
        let bus = test_bus(Arc::new(InMemoryEventStore::default()), Arc::new(InMemoryAckStore::default()));
        assert!(bus.stop(Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn publish_fills_node_identity_and_event_time() {
        let bus = test_bus(Arc::new(InMemoryEventStore::default()), Arc::new(InMemoryAckStore::default()));
        let event = bus
            .publish(NewClusterEvent {
                tenant_id: "t1".to_string(),
                event_id: None,
                event_type: "ROUTE_CONFIG".to_string(),
                event_action: "RELOAD".to_string(),
                event_payload: "{}".to_string(),
                expire_time: None,
            })
            .await
            .unwrap();

        assert_eq!(event.source_node_id, "node-a");
        assert_eq!(event.source_node_ip, "10.0.0.1");
        assert!(event.expire_time.is_some());
    }

    #[tokio::test]
    async fn expired_event_is_skipped_without_invoking_handler() {
        let event_store = Arc::new(InMemoryEventStore::default());
        let ack_store = Arc::new(InMemoryAckStore::default());
        let bus = test_bus(event_store.clone(), ack_store.clone());

        let handler = Arc::new(CountingHandler { event_type: "ROUTE_CONFIG", calls: AtomicUsize::new(0) });
        bus.register_handler(handler.clone()).await;

        let now = Utc::now();
        let expired_event = ClusterEvent {
            tenant_id: "t1".into(),
            event_id: EventId::generate(),
            event_type: "ROUTE_CONFIG".into(),
            event_action: "RELOAD".into(),
            event_payload: "{}".into(),
            source_node_id: "node-b".into(),
            source_node_ip: "10.0.0.2".into(),
            event_time: now - chrono::Duration::seconds(10),
            expire_time: Some(now - chrono::Duration::seconds(1)),
            active_flag: ActiveFlag::Active,
            add_time: now,
            add_who: "node-b".into(),
            edit_time: now,
            edit_who: "node-b".into(),
            opr_seq_flag: "1".into(),
            current_version: 1,
        };
        event_store.insert(&expired_event).await.unwrap();

        bus.dispatch_one(&expired_event).await;

        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
        assert!(ack_store.has_ack("t1", expired_event.event_id.as_str(), "node-a").await.unwrap());
    }

    #[tokio::test]
    async fn retry_outcome_writes_no_ack() {
        struct RetryHandler;
        #[async_trait]
        impl Handler for RetryHandler {
            fn event_type(&self) -> &str {
                "ROUTE_CONFIG"
            }
            async fn handle(&self, _event: &ClusterEvent) -> HandlerOutcome {
                HandlerOutcome::Retry
            }
        }

        let ack_store = Arc::new(InMemoryAckStore::default());
        let bus = test_bus(Arc::new(InMemoryEventStore::default()), ack_store.clone());
        bus.register_handler(Arc::new(RetryHandler)).await;

        let now = Utc::now();
        let event = ClusterEvent {
            tenant_id: "t1".into(),
            event_id: EventId::generate(),
            event_type: "ROUTE_CONFIG".into(),
            event_action: "RELOAD".into(),
            event_payload: "{}".into(),
            source_node_id: "node-b".into(),
            source_node_ip: "10.0.0.2".into(),
            event_time: now,
            expire_time: None,
            active_flag: ActiveFlag::Active,
            add_time: now,
            add_who: "node-b".into(),
            edit_time: now,
            edit_who: "node-b".into(),
            opr_seq_flag: "1".into(),
            current_version: 1,
        };

        bus.dispatch_one(&event).await;
        assert!(!ack_store.has_ack("t1", event.event_id.as_str(), "node-a").await.unwrap());
    }

    #[tokio::test]
    async fn no_handler_registered_acks_skipped() {
        let ack_store = Arc::new(InMemoryAckStore::default());
        let bus = test_bus(Arc::new(InMemoryEventStore::default()), ack_store.clone());

        let now = Utc::now();
        let event = ClusterEvent {
            tenant_id: "t1".into(),
            event_id: EventId::generate(),
            event_type: "UNKNOWN_TYPE".into(),
            event_action: "NOOP".into(),
            event_payload: "{}".into(),
            source_node_id: "node-b".into(),
            source_node_ip: "10.0.0.2".into(),
            event_time: now,
            expire_time: None,
            active_flag: ActiveFlag::Active,
            add_time: now,
            add_who: "node-b".into(),
            edit_time: now,
            edit_who: "node-b".into(),
            opr_seq_flag: "1".into(),
            current_version: 1,
        };

        bus.dispatch_one(&event).await;
        assert!(ack_store.has_ack("t1", event.event_id.as_str(), "node-a").await.unwrap());
    }
}
