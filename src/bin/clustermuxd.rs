//! `clustermuxd` — the standalone daemon process (SPEC_FULL §12): loads
//! config, opens the database, starts the event bus, the three async
//! writers, and the per-table retention cleaners, then waits for a
//! shutdown signal and drains everything within a bounded deadline.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;

use clustermux::adapters::sqlite::{initialize_database, SqliteAckStore, SqliteEventStore, SqliteRetentionDeleter, SqliteSink};
use clustermux::domain::models::{AccessLogRecord, AlertLogRecord, BackendTraceRecord, CleanupStrategy, RetentionPolicy, RetentionTableConfig};
use clustermux::infrastructure::config::ConfigLoader;
use clustermux::infrastructure::logging::{LogConfig, LoggerImpl};
use clustermux::services::node_identity::NodeIdentity;
use clustermux::services::retention_cleaner::{run_cleaner_loop, CleanupTask, SqlRetentionCleaner};
use clustermux::{AsyncWriter, ClusterEventBus, HandlerRegistry};

#[derive(Parser, Debug)]
#[command(name = "clustermuxd", about = "clustermux cluster event bus and write-pipeline daemon")]
struct Args {
    /// Load configuration from this YAML file instead of the `.clustermux/`
    /// project lookup.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override `database.path` from the loaded configuration.
    #[arg(long)]
    db: Option<String>,
}

fn row_delete_policy(table: &RetentionTableConfig) -> RetentionPolicy {
    RetentionPolicy {
        retention_days: table.retention_days,
        cleanup_interval_hour: table.cleanup_interval_hour,
        scheduled_time: table.scheduled_time.clone(),
        batch_delete_size: table.batch_delete_size,
        strategy: CleanupStrategy::RowDelete,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ConfigLoader::load_from_file(path).context("failed to load configuration")?,
        None => ConfigLoader::load().context("failed to load configuration")?,
    };
    if let Some(db) = args.db {
        config.database.path = db;
    }

    let _logger = LoggerImpl::init(&LogConfig::from(&config.logging)).context("failed to initialize logger")?;

    let identity = NodeIdentity::resolve(&config, &clustermux::services::node_identity::default_node_id_path())
        .context("failed to resolve node identity")?;
    tracing::info!(node_id = %identity.node_id, node_ip = %identity.node_ip, "node identity resolved");

    let database_url = format!("sqlite:{}", config.database.path);
    let pool = initialize_database(&database_url).await.context("failed to initialize database")?;
    tracing::info!(path = %config.database.path, "database ready");

    let event_store = Arc::new(SqliteEventStore::new(pool.clone()));
    let ack_store = Arc::new(SqliteAckStore::new(pool.clone()));
    let registry = Arc::new(HandlerRegistry::new());

    let bus = Arc::new(ClusterEventBus::new(
        event_store,
        ack_store,
        registry,
        identity.node_id.clone(),
        identity.node_ip.clone(),
        config.cluster.tenant_ids.clone(),
        config.cluster.event.clone(),
        config.cluster.cleanup.clone(),
    ));
    bus.start().await.context("failed to start event bus")?;
    tracing::info!("event bus started");

    let sink = Arc::new(SqliteSink::new(pool.clone()));
    let access_log_writer = Arc::new(
        AsyncWriter::<AccessLogRecord>::new("access_log", sink.clone(), config.writers.access_log.clone())
            .context("failed to construct access_log writer")?,
    );
    let backend_trace_writer = Arc::new(
        AsyncWriter::<BackendTraceRecord>::new("backend_trace_log", sink.clone(), config.writers.backend_trace_log.clone())
            .context("failed to construct backend_trace_log writer")?,
    );
    let alert_writer = Arc::new(
        AsyncWriter::<AlertLogRecord>::new("alert_log", sink.clone(), config.writers.alert_log.clone())
            .context("failed to construct alert_log writer")?,
    );
    tracing::info!("async writers started");

    // Each cleaner scopes its deletes by this node's own gateway_instance_id,
    // so a multi-node deployment needs one clustermuxd per node to reclaim
    // that node's rows (DESIGN.md: no cross-node retention coordination).
    let retention_cancel = CancellationToken::new();
    let mut retention_handles = Vec::new();

    // `backend_trace_log` is `access_log`'s detail table, joined on
    // `trace_id` (spec.md §4.3.1): one cleaner pages `access_log` keys and
    // deletes the matching detail rows first, then the main rows, rather
    // than running backend_trace_log's own independent time-based sweep.
    let access_log_deleter = Arc::new(
        SqliteRetentionDeleter::new(pool.clone(), "access_log", "trace_id", "start_time", "gateway_instance_id")
            .with_detail("backend_trace_log", "trace_id"),
    );
    let access_log_cleaner: Arc<dyn CleanupTask> = Arc::new(SqlRetentionCleaner::new(
        access_log_deleter,
        row_delete_policy(&config.retention.access_log),
        identity.node_id.clone(),
        "access_log",
    ));
    retention_handles.push(tokio::spawn(run_cleaner_loop(
        access_log_cleaner,
        config.retention.access_log.scheduled_time.clone(),
        Duration::from_secs(u64::from(config.retention.access_log.cleanup_interval_hour.max(1)) * 3600),
        retention_cancel.clone(),
    )));

    // alert_log scopes by tenant, not by node, so every tenant this node
    // serves gets its own cleaner loop sharing the same policy.
    let alert_log_deleter = Arc::new(SqliteRetentionDeleter::new(pool.clone(), "alert_log", "alert_id", "triggered_at", "tenant_id"));
    for tenant_id in &config.cluster.tenant_ids {
        let alert_log_cleaner: Arc<dyn CleanupTask> = Arc::new(SqlRetentionCleaner::new(
            alert_log_deleter.clone(),
            row_delete_policy(&config.retention.alert_log),
            tenant_id.clone(),
            "alert_log",
        ));
        retention_handles.push(tokio::spawn(run_cleaner_loop(
            alert_log_cleaner,
            config.retention.alert_log.scheduled_time.clone(),
            Duration::from_secs(u64::from(config.retention.alert_log.cleanup_interval_hour.max(1)) * 3600),
            retention_cancel.clone(),
        )));
    }
    tracing::info!(count = retention_handles.len(), "retention cleaners started");

    tracing::info!("clustermuxd ready");
    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    tracing::info!("shutdown signal received, draining");

    let shutdown_deadline = Duration::from_secs(10);

    retention_cancel.cancel();
    for handle in retention_handles {
        let _ = tokio::time::timeout(shutdown_deadline, handle).await;
    }

    if !bus.stop(shutdown_deadline).await {
        tracing::warn!("event bus did not stop cleanly within the shutdown deadline");
    }

    access_log_writer.close().await;
    backend_trace_writer.close().await;
    alert_writer.close().await;

    tracing::info!("clustermuxd stopped");
    Ok(())
}
