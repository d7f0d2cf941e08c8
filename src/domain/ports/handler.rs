//! Handler seam the dispatcher calls into (spec.md §4.1.3, §4.4).

use async_trait::async_trait;

use crate::domain::models::ClusterEvent;

/// What a handler reports back to the dispatcher after processing one event.
/// `Retry` is the only variant that does not produce an ack row — the event
/// is picked up again on the next poll, indistinguishable from a fresh
/// delivery (spec.md §4.1.5).
#[derive(Debug, Clone)]
pub enum HandlerOutcome {
    Success(String),
    Failed(String),
    Skipped(String),
    Retry,
}

/// One event-type handler, looked up by `event_type` in the
/// `HandlerRegistry`. Handlers are the plug point this crate leaves for the
/// rest of the gateway (cache invalidation, config reload, lifecycle
/// notification, ...); this crate ships none itself.
#[async_trait]
pub trait Handler: Send + Sync {
    /// The `event_type` string this handler answers for.
    fn event_type(&self) -> &str;

    /// Process one event. A panic here is caught by the dispatcher and
    /// recorded as `Failed` — handlers do not need to guard against their
    /// own panics crashing the poll loop (spec.md §4.1.6).
    async fn handle(&self, event: &ClusterEvent) -> HandlerOutcome;
}
