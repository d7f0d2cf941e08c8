//! clustermux — durable cross-node event bus and bounded async-write
//! pipeline for a multi-tenant API gateway.
//!
//! - Event Bus (`services::event_bus`): DB-backed pub/sub with at-least-once,
//!   deduplicated delivery to every node of a tenant.
//! - Async Writer (`services::async_writer`): bounded-queue batch persistence
//!   for high-volume access/trace/alert records.
//! - Retention Cleaner (`services::retention_cleaner`): scheduled row/ack
//!   expiry across both pipelines.
//! - Node Identity (`services::node_identity`): stable per-process
//!   `node_id`/`node_ip` resolution.
//!
//! SQLite is the reference adapter for every port in `domain::ports`; swap
//! in another implementation of those traits for a different backing store.

pub mod adapters;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::errors::{AckStoreError, BusError, CleanerError, ConfigError, EventStoreError, IdentityError, SinkError, WriterError};
pub use domain::models::{
    AccessLogRecord, AckStatus, ActiveFlag, AlertLogRecord, BackendTraceRecord, ClusterConfig,
    ClusterEvent, ClusterEventAck, CleanupConfig, Config, EventBusConfig, EventId, NewClusterEvent,
    WriterConfig,
};
pub use domain::ports::{AckStore, EventStore, Handler, HandlerOutcome, PartitionDropCleaner, RetentionDeleter, Sink};
pub use services::{AsyncWriter, ClusterEventBus, HandlerRegistry, NodeIdentity};
