//! Application services for the cluster coordination fabric.

pub mod async_writer;
pub mod event_bus;
pub mod handler_registry;
pub mod node_identity;
pub mod retention_cleaner;

pub use async_writer::AsyncWriter;
pub use event_bus::ClusterEventBus;
pub use handler_registry::HandlerRegistry;
pub use node_identity::NodeIdentity;
pub use retention_cleaner::{
    run_cleaner_loop, ClusterCleaner, CleanupTask, PartitionDropCleanerRunner, SqlRetentionCleaner,
};
