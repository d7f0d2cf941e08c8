//! Cluster event and acknowledgement records.
//!
//! `ClusterEvent` is the fact published by one node and acted on by every
//! node of a tenant; `ClusterEventAck` is the durable record of how one node
//! handled one event. Both are append-only: rows are inserted once and never
//! updated, only eventually deleted by the retention cleaner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Maximum length, in bytes, of an `EventId`.
pub const EVENT_ID_MAX_BYTES: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventIdError {
    #[error("event id exceeds {EVENT_ID_MAX_BYTES} bytes: got {0}")]
    TooLong(usize),
    #[error("event id is empty")]
    Empty,
}

/// A globally unique opaque token identifying a `ClusterEvent`, clamped to
/// `EVENT_ID_MAX_BYTES` bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Construct from a caller-supplied string, rejecting anything over
    /// the byte limit instead of silently truncating it.
    pub fn new(raw: impl Into<String>) -> Result<Self, EventIdError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(EventIdError::Empty);
        }
        if raw.len() > EVENT_ID_MAX_BYTES {
            return Err(EventIdError::TooLong(raw.len()));
        }
        Ok(Self(raw))
    }

    /// Generate a fresh id (a UUID v4, which always fits the byte limit).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EventId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// `Y`/`N` liveness flag, serialized at the SQL boundary exactly as those
/// single characters (see spec.md §3, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActiveFlag {
    Active,
    Inactive,
}

impl ActiveFlag {
    pub const fn as_sql_char(self) -> &'static str {
        match self {
            Self::Active => "Y",
            Self::Inactive => "N",
        }
    }

    pub fn from_sql_char(s: &str) -> Self {
        match s {
            "Y" => Self::Active,
            _ => Self::Inactive,
        }
    }
}

/// A fact published by one node, to be acted on by every node of the tenant.
///
/// Invariants (spec.md §3): `event_time` is monotone non-decreasing per
/// publisher within its own process; `expire_time`, if set, is strictly
/// after `event_time`. Rows are append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterEvent {
    pub tenant_id: String,
    pub event_id: EventId,
    pub event_type: String,
    pub event_action: String,
    pub event_payload: String,
    pub source_node_id: String,
    pub source_node_ip: String,
    pub event_time: DateTime<Utc>,
    pub expire_time: Option<DateTime<Utc>>,
    pub active_flag: ActiveFlag,
    pub add_time: DateTime<Utc>,
    pub add_who: String,
    pub edit_time: DateTime<Utc>,
    pub edit_who: String,
    pub opr_seq_flag: String,
    pub current_version: i64,
}

impl ClusterEvent {
    /// True once `now` has passed `expire_time`; never expires if unset.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expire_time.is_some_and(|t| now > t)
    }
}

/// Caller-supplied fields for `ClusterEventBus::publish`; the bus fills in
/// everything else (spec.md §4.1.1).
#[derive(Debug, Clone)]
pub struct NewClusterEvent {
    pub tenant_id: String,
    pub event_id: Option<EventId>,
    pub event_type: String,
    pub event_action: String,
    pub event_payload: String,
    pub expire_time: Option<DateTime<Utc>>,
}

/// Terminal outcomes a dispatched event can be acknowledged with. `Retry`
/// is deliberately not a variant here — it is never materialized as an ack
/// row (spec.md §4.1.5); see `HandlerOutcome` for the handler-facing enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AckStatus {
    Success,
    Failed,
    Skipped,
}

impl AckStatus {
    pub const fn as_sql_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::Skipped => "SKIPPED",
        }
    }

    pub fn from_sql_str(s: &str) -> Self {
        match s {
            "SUCCESS" => Self::Success,
            "SKIPPED" => Self::Skipped,
            _ => Self::Failed,
        }
    }
}

/// One row per (event, node) pair recording how that node handled the
/// event. Identity is `(tenant_id, ack_id)`; uniqueness is also enforced on
/// `(tenant_id, event_id, node_id)` (spec.md §3, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterEventAck {
    pub tenant_id: String,
    pub ack_id: String,
    pub event_id: EventId,
    pub node_id: String,
    pub node_ip: String,
    pub ack_status: AckStatus,
    pub process_time: DateTime<Utc>,
    pub result_message: Option<String>,
    pub retry_count: i32,
    pub active_flag: ActiveFlag,
    pub add_time: DateTime<Utc>,
    pub add_who: String,
    pub edit_time: DateTime<Utc>,
    pub edit_who: String,
    pub opr_seq_flag: String,
    pub current_version: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_id_accepts_exactly_64_bytes() {
        let s = "a".repeat(64);
        assert!(EventId::new(s).is_ok());
    }

    #[test]
    fn event_id_rejects_65_bytes() {
        let s = "a".repeat(65);
        assert_eq!(EventId::new(s), Err(EventIdError::TooLong(65)));
    }

    #[test]
    fn event_id_rejects_empty() {
        assert_eq!(EventId::new(""), Err(EventIdError::Empty));
    }

    #[test]
    fn active_flag_roundtrips_through_sql_char() {
        assert_eq!(ActiveFlag::from_sql_char(ActiveFlag::Active.as_sql_char()), ActiveFlag::Active);
        assert_eq!(ActiveFlag::from_sql_char(ActiveFlag::Inactive.as_sql_char()), ActiveFlag::Inactive);
        assert_eq!(ActiveFlag::from_sql_char("garbage"), ActiveFlag::Inactive);
    }

    #[test]
    fn ack_status_roundtrips_through_sql_str() {
        for s in [AckStatus::Success, AckStatus::Failed, AckStatus::Skipped] {
            assert_eq!(AckStatus::from_sql_str(s.as_sql_str()), s);
        }
    }

    #[test]
    fn is_expired_at_respects_none_expire_time() {
        let event = sample_event(None);
        assert!(!event.is_expired_at(Utc::now()));
    }

    #[test]
    fn is_expired_at_true_once_past_deadline() {
        let now = Utc::now();
        let event = sample_event(Some(now - chrono::Duration::seconds(1)));
        assert!(event.is_expired_at(now));
    }

    fn sample_event(expire_time: Option<DateTime<Utc>>) -> ClusterEvent {
        let now = Utc::now();
        ClusterEvent {
            tenant_id: "t1".into(),
            event_id: EventId::generate(),
            event_type: "ROUTE_CONFIG".into(),
            event_action: "RELOAD".into(),
            event_payload: "{}".into(),
            source_node_id: "node-a".into(),
            source_node_ip: "10.0.0.1".into(),
            event_time: now,
            expire_time,
            active_flag: ActiveFlag::Active,
            add_time: now,
            add_who: "node-a".into(),
            edit_time: now,
            edit_who: "node-a".into(),
            opr_seq_flag: "1".into(),
            current_version: 1,
        }
    }
}
