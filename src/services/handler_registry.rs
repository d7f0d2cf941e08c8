//! Type-keyed handler dispatch table (spec.md §4.4).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::domain::ports::Handler;

/// Readers-writers map from `eventType` to the handler that processes it.
/// Registration and lookup can race with an in-flight poll tick; the lock
/// keeps both sides consistent without blocking the common case (many
/// lookups, rare registration changes).
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn Handler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, handler: Arc<dyn Handler>) {
        let key = handler.event_type().to_string();
        self.handlers.write().await.insert(key, handler);
    }

    pub async fn unregister(&self, event_type: &str) {
        self.handlers.write().await.remove(event_type);
    }

    pub async fn lookup(&self, event_type: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.read().await.get(event_type).cloned()
    }
}
