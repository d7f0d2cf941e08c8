//! Per-component error types for the cluster fabric (spec.md §7).
//!
//! Each component gets its own `thiserror` enum rather than one shared
//! `DomainError`, mirroring the error table in spec.md §7 one variant at a
//! time. No error here is fatal to a loop: callers log and continue: only
//! `stop()`/`close()` exits a loop.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("event bus is already running")]
    AlreadyRunning,
    #[error("event bus is not running")]
    NotRunning,
    #[error("failed to persist event: {0}")]
    PersistFailed(#[from] EventStoreError),
    #[error("event id invalid: {0}")]
    InvalidEventId(#[from] crate::domain::models::EventIdError),
}

#[derive(Debug, Error)]
pub enum WriterError {
    #[error("writer is closed")]
    Closed,
    #[error("queue is full, record dropped")]
    QueueFull,
    #[error("queue_size must be greater than zero")]
    InvalidQueueSize,
    #[error("flush failed, batch discarded: {0}")]
    FlushFailed(#[from] SinkError),
}

#[derive(Debug, Error)]
pub enum CleanerError {
    #[error("sink error during cleanup: {0}")]
    Sink(#[from] SinkError),
    #[error("database error during cleanup: {0}")]
    Database(#[from] sqlx::Error),
    #[error("malformed scheduled_time {0:?}, running immediately")]
    MalformedScheduledTime(String),
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum AckStoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt ack row: {0}")]
    CorruptRow(String),
}

#[derive(Debug, Error)]
pub enum EventStoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("corrupt event row: {0}")]
    CorruptRow(String),
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("failed to read node id file {path}: {source}")]
    FileRead { path: String, #[source] source: std::io::Error },
    #[error("failed to write node id file {path}: {source}")]
    FileWrite { path: String, #[source] source: std::io::Error },
    #[error("failed to resolve a primary non-loopback IPv4 address: {0}")]
    NoPrimaryAddress(#[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid poll_interval_secs: {0}. Must be greater than zero")]
    InvalidPollInterval(u64),
    #[error("invalid batch_size: {0}. Must be greater than zero")]
    InvalidBatchSize(u32),
    #[error("invalid queue_size: {0}. Must be greater than zero")]
    InvalidQueueSize(usize),
    #[error("invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),
    #[error("invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),
    #[error("invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidLogRotation(String),
    #[error("database path cannot be empty")]
    EmptyDatabasePath,
    #[error("invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),
    #[error("configuration validation failed: {0}")]
    ValidationFailed(String),
}
