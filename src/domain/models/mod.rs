//! Domain models
//!
//! Pure domain entities with business logic and validation rules.
//! These models are framework-agnostic and contain no infrastructure concerns.

pub mod cluster_event;
pub mod config;
pub mod log_records;
pub mod record;
pub mod retention;

pub use cluster_event::{
    AckStatus, ActiveFlag, ClusterEvent, ClusterEventAck, EventId, EventIdError,
    NewClusterEvent, EVENT_ID_MAX_BYTES,
};
pub use config::{
    ClusterConfig, CleanupConfig, Config, DatabaseConfig, EventBusConfig, LoggingConfig,
    RetentionConfigGroup, RetentionTableConfig, WriterConfig, WritersConfig,
};
pub use log_records::{AccessLogRecord, AlertLogRecord, BackendTraceRecord};
pub use record::{BatchBuffer, QueuedRecord, Record};
pub use retention::{CleanupStrategy, RetentionPolicy};
