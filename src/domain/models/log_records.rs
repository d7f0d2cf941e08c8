//! Operational log/alert records carried through the async write pipeline
//! (spec.md §3, §6). Pure data; SQL binding lives at the adapter boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::record::Record;

/// One gateway request/response pair (spec.md §6, main table of the
/// access-log pipeline).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessLogRecord {
    pub trace_id: String,
    pub gateway_instance_id: String,
    pub tenant_id: String,
    pub route_id: Option<String>,
    pub method: String,
    pub path: String,
    pub status_code: i32,
    pub latency_ms: i64,
    pub client_ip: String,
    pub start_time: DateTime<Utc>,
}

impl Record for AccessLogRecord {
    fn table_name(&self) -> &'static str {
        "access_log"
    }
}

/// Per-upstream-call detail, keyed by the same `trace_id` as its
/// `AccessLogRecord` (spec.md §6, detail table).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendTraceRecord {
    pub trace_id: String,
    pub gateway_instance_id: String,
    pub backend_name: String,
    pub upstream_latency_ms: i64,
    pub upstream_status_code: Option<i32>,
    pub error: Option<String>,
    pub start_time: DateTime<Utc>,
}

impl Record for BackendTraceRecord {
    fn table_name(&self) -> &'static str {
        "backend_trace_log"
    }
}

/// An operational alert raised by the gateway (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertLogRecord {
    pub alert_id: String,
    pub tenant_id: String,
    pub alert_type: String,
    pub severity: String,
    pub message: String,
    pub triggered_at: DateTime<Utc>,
}

impl Record for AlertLogRecord {
    fn table_name(&self) -> &'static str {
        "alert_log"
    }
}
