//! SQLite adapters implementing the domain ports (spec.md §6).

pub mod ack_store;
pub mod connection;
pub mod event_store;
pub mod migrations;
pub mod retention;
pub mod sink;

pub use ack_store::SqliteAckStore;
pub use connection::{create_pool, create_test_pool, verify_connection, ConnectionError, PoolConfig};
pub use event_store::SqliteEventStore;
pub use migrations::{all_embedded_migrations, Migration, MigrationError, Migrator};
pub use retention::{NoopPartitionDropCleaner, SqliteRetentionDeleter};
pub use sink::SqliteSink;

use sqlx::SqlitePool;

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),
    #[error("migration error: {0}")]
    Migration(#[from] MigrationError),
    #[error("query error: {0}")]
    Query(#[from] sqlx::Error),
}

pub async fn initialize_database(database_url: &str) -> Result<SqlitePool, DatabaseError> {
    let pool = create_pool(database_url, None).await?;
    let migrator = Migrator::new(pool.clone());
    migrator.run_embedded_migrations(all_embedded_migrations()).await?;
    Ok(pool)
}

pub async fn initialize_default_database() -> Result<SqlitePool, DatabaseError> {
    initialize_database("sqlite:.clustermux/clustermux.db").await
}

/// Create an in-memory test pool with all migrations applied.
pub async fn create_migrated_test_pool() -> Result<SqlitePool, DatabaseError> {
    let pool = create_test_pool().await?;
    let migrator = Migrator::new(pool.clone());
    migrator.run_embedded_migrations(all_embedded_migrations()).await?;
    Ok(pool)
}
