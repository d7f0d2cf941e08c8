//! Domain ports (trait seams) for the cluster coordination fabric.

pub mod ack_store;
pub mod event_store;
pub mod handler;
pub mod retention;
pub mod sink;

pub use ack_store::AckStore;
pub use event_store::EventStore;
pub use handler::{Handler, HandlerOutcome};
pub use retention::{PartitionDropCleaner, RetentionDeleter};
pub use sink::Sink;
