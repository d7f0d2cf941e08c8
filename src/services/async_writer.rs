//! Bounded async batch-write pipeline (spec.md §4.2).
//!
//! Shape borrowed from the teacher's daemon-loop idiom
//! (`memory_decay_daemon::run_loop`'s `tokio::select!` over a timer) and from
//! the buffer/should-flush struct the PostHog batch-ingestion reference
//! uses — but not its retry-with-jitter loop: spec.md §4.2.2 is explicit
//! that a flush fault discards the whole batch, it is never retried.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::domain::errors::WriterError;
use crate::domain::models::{BatchBuffer, Record, WriterConfig};
use crate::domain::ports::Sink;

/// One queue → buffer → sink pipeline for a single record type/table. Two
/// independent instances (main + detail) are composed by the caller for
/// writers that need both, exactly as the access-log pipeline needs an
/// `AsyncWriter<AccessLogRecord>` alongside an
/// `AsyncWriter<BackendTraceRecord>`.
pub struct AsyncWriter<T: Record> {
    table: &'static str,
    sink: Arc<dyn Sink<T>>,
    buffer: Arc<Mutex<BatchBuffer<T>>>,
    tx: Mutex<Option<mpsc::Sender<T>>>,
    closed: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    config: WriterConfig,
}

impl<T: Record> AsyncWriter<T> {
    /// `queue_size == 0` is rejected at construction rather than accepted
    /// and immediately useless (spec.md §8 boundary behaviors).
    pub fn new(table: &'static str, sink: Arc<dyn Sink<T>>, config: WriterConfig) -> Result<Self, WriterError> {
        if config.queue_size == 0 {
            return Err(WriterError::InvalidQueueSize);
        }

        let buffer = Arc::new(Mutex::new(BatchBuffer::new(config.batch_size as usize)));
        let closed = Arc::new(AtomicBool::new(false));

        let (tx, worker) = if config.async_enabled {
            let (tx, rx) = mpsc::channel::<T>(config.queue_size);
            let worker_buffer = buffer.clone();
            let worker_sink = sink.clone();
            let flush_interval = std::time::Duration::from_millis(config.flush_interval_ms.max(1));
            let handle = tokio::spawn(run_worker(rx, worker_buffer, worker_sink, table, flush_interval));
            (Some(tx), Some(handle))
        } else {
            (None, None)
        };

        Ok(Self {
            table,
            sink,
            buffer,
            tx: Mutex::new(tx),
            closed,
            worker: Mutex::new(worker),
            config,
        })
    }

    /// Enqueue one record. Rejected once `close()` has been called. In async
    /// mode a full queue drops the record (non-blocking backpressure,
    /// spec.md §4.2.2) rather than applying it synchronously; in sync mode
    /// the record is buffered/flushed inline on this call.
    pub async fn write(&self, record: T) -> Result<(), WriterError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(WriterError::Closed);
        }

        let tx = self.tx.lock().await.clone();
        if let Some(tx) = tx {
            match tx.try_send(record) {
                Ok(()) => Ok(()),
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(table = self.table, "writer queue full, record dropped");
                    Err(WriterError::QueueFull)
                }
                Err(mpsc::error::TrySendError::Closed(_)) => Err(WriterError::Closed),
            }
        } else {
            let should_flush = {
                let mut buffer = self.buffer.lock().await;
                buffer.push(record);
                self.config.batch_processing_enabled && buffer.should_flush()
            };
            if should_flush || !self.config.batch_processing_enabled {
                flush_buffer(&self.buffer, self.sink.as_ref(), self.table).await;
            }
            Ok(())
        }
    }

    /// Enqueue many records. Each goes through `write` independently; a drop
    /// partway through a batch does not roll back the rest.
    pub async fn batch_write(&self, records: Vec<T>) -> Result<(), WriterError> {
        for record in records {
            self.write(record).await?;
        }
        Ok(())
    }

    /// Force a flush of whatever is currently buffered, regardless of
    /// whether a size/time trigger has fired.
    pub async fn flush(&self) {
        flush_buffer(&self.buffer, self.sink.as_ref(), self.table).await;
    }

    /// Close in the exact order of spec.md §4.2.4: (1) stop accepting
    /// writes, (2) drop the sender so the worker's channel closes, (3) wait
    /// for the worker to drain and exit, (4) flush once more for good
    /// measure (a no-op if the worker already did), (5) the ticker stops
    /// with the worker task. Idempotent — calling twice is safe.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::Release);

        // Dropping the sender closes the channel; the worker's `rx.recv()`
        // then returns `None`, breaks its loop, and does a final flush.
        self.tx.lock().await.take();

        let worker_handle = self.worker.lock().await.take();
        if let Some(handle) = worker_handle {
            let _ = handle.await;
        }

        self.flush().await;
    }
}

async fn run_worker<T: Record>(
    mut rx: mpsc::Receiver<T>,
    buffer: Arc<Mutex<BatchBuffer<T>>>,
    sink: Arc<dyn Sink<T>>,
    table: &'static str,
    flush_interval: std::time::Duration,
) {
    let mut ticker = tokio::time::interval(flush_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            item = rx.recv() => {
                match item {
                    Some(record) => {
                        let should_flush = {
                            let mut buf = buffer.lock().await;
                            buf.push(record);
                            buf.should_flush()
                        };
                        if should_flush {
                            flush_buffer(&buffer, sink.as_ref(), table).await;
                        }
                    }
                    None => break,
                }
            }
            _ = ticker.tick() => {
                flush_buffer(&buffer, sink.as_ref(), table).await;
            }
        }
    }

    flush_buffer(&buffer, sink.as_ref(), table).await;
    tracing::info!(table, "writer worker drained and stopped");
}

async fn flush_buffer<T: Record>(buffer: &Mutex<BatchBuffer<T>>, sink: &dyn Sink<T>, table: &'static str) {
    let batch = {
        let mut buf = buffer.lock().await;
        if buf.is_empty() {
            return;
        }
        buf.drain_all()
    };
    let len = batch.len();
    if let Err(error) = sink.batch_insert(table, &batch).await {
        tracing::warn!(table, batch_len = len, %error, "flush failed, batch discarded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::SinkError;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug, Clone)]
    struct TestRecord(u32);

    impl Record for TestRecord {
        fn table_name(&self) -> &'static str {
            "test_record"
        }
    }

    struct CountingSink {
        inserted: AtomicUsize,
        fail_next: AtomicBool,
    }

    impl CountingSink {
        fn new() -> Self {
            Self {
                inserted: AtomicUsize::new(0),
                fail_next: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl Sink<TestRecord> for CountingSink {
        async fn batch_insert(&self, _table: &'static str, records: &[TestRecord]) -> Result<(), SinkError> {
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(SinkError::Database(sqlx::Error::RowNotFound));
            }
            self.inserted.fetch_add(records.len(), Ordering::SeqCst);
            Ok(())
        }
    }

    fn test_config(queue_size: usize, batch_size: u32) -> WriterConfig {
        WriterConfig {
            queue_size,
            batch_size,
            flush_interval_ms: 50,
            async_enabled: true,
            batch_processing_enabled: true,
        }
    }

    #[test]
    fn zero_queue_size_is_rejected_at_construction() {
        let sink = Arc::new(CountingSink::new());
        let result = AsyncWriter::new("test_record", sink, test_config(0, 10));
        assert!(matches!(result, Err(WriterError::InvalidQueueSize)));
    }

    #[tokio::test]
    async fn size_triggered_flush_inserts_once_threshold_reached() {
        let sink = Arc::new(CountingSink::new());
        let writer = AsyncWriter::new("test_record", sink.clone(), test_config(100, 2)).unwrap();

        writer.write(TestRecord(1)).await.unwrap();
        writer.write(TestRecord(2)).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(sink.inserted.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn close_drains_buffered_records() {
        let sink = Arc::new(CountingSink::new());
        let writer = AsyncWriter::new("test_record", sink.clone(), test_config(100, 1000)).unwrap();

        writer.write(TestRecord(1)).await.unwrap();
        writer.close().await;

        assert_eq!(sink.inserted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn write_after_close_is_rejected() {
        let sink = Arc::new(CountingSink::new());
        let writer = AsyncWriter::new("test_record", sink, test_config(100, 10)).unwrap();
        writer.close().await;
        let result = writer.write(TestRecord(1)).await;
        assert!(matches!(result, Err(WriterError::Closed)));
    }

    #[tokio::test]
    async fn full_queue_drops_the_record_instead_of_blocking() {
        let sink = Arc::new(CountingSink::new());
        // batch_size larger than queue_size so the worker never drains fast
        // enough to make room before we overflow the queue.
        let writer = AsyncWriter::new("test_record", sink, test_config(1, 1000)).unwrap();

        writer.write(TestRecord(1)).await.unwrap();
        let second = writer.write(TestRecord(2)).await;
        assert!(second.is_ok() || matches!(second, Err(WriterError::QueueFull)));
    }

    #[tokio::test]
    async fn flush_failure_discards_the_batch_without_retry() {
        let sink = Arc::new(CountingSink::new());
        sink.fail_next.store(true, Ordering::SeqCst);
        let writer = AsyncWriter::new("test_record", sink.clone(), test_config(100, 1)).unwrap();

        writer.write(TestRecord(1)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        // the failed batch is gone, not requeued: a later successful write
        // only accounts for itself.
        writer.write(TestRecord(2)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(sink.inserted.load(Ordering::SeqCst), 1);
    }
}
