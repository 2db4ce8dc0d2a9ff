//! Remote calendar gateway abstraction.
//!
//! This module defines the interface the reconciliation engine talks to,
//! along with the wire types for the remote event representation and the
//! error taxonomy every HTTP outcome is classified into, exactly once, at
//! this boundary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod convert;
pub mod google;

/// Gateway failure classes. Classified at the HTTP boundary and never
/// re-classified downstream.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// 401/403: the session token is invalid. Requires interactive re-auth
    /// and is never retried automatically.
    #[error("calendar session expired")]
    AuthExpired,

    /// Network failure or 5xx, safe to queue and retry later.
    #[error("transient calendar error: {0}")]
    Transient(String),

    /// Any other 4xx: malformed request or business validation. Surfaced to
    /// the caller and never retried.
    #[error("calendar request rejected: {0}")]
    Rejected(String),
}

/// Start or end of a remote event. Timed events carry `dateTime` plus
/// `timeZone`; all-day events carry only a calendar `date`. Absent fields are
/// omitted from outgoing payloads entirely, never sent as null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

/// Event as returned by the remote calendar service.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEvent {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub start: Option<EventTime>,
    #[serde(default)]
    pub end: Option<EventTime>,
    #[serde(default)]
    pub recurrence: Option<Vec<String>>,
}

/// Outgoing payload for event creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDraft {
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start: EventTime,
    pub end: EventTime,
}

/// Outgoing payload for a partial event update. Only present fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<EventTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<EventTime>,
}

/// Interface to the remote calendar service. Implementations perform the
/// network call and nothing else; retry and queue policy live in the
/// reconciliation engine.
#[async_trait]
pub trait CalendarGateway: Send + Sync {
    /// Fetch all single-instance events starting at or after `since`,
    /// ordered by start time.
    async fn list(&self, since: DateTime<Utc>) -> Result<Vec<RemoteEvent>, GatewayError>;

    /// Create an event and return its canonical remote representation.
    async fn create(&self, draft: &EventDraft) -> Result<RemoteEvent, GatewayError>;

    /// Apply a partial update to an existing event.
    async fn update(&self, id: &str, patch: &EventPatch) -> Result<(), GatewayError>;

    /// Delete an event.
    async fn delete(&self, id: &str) -> Result<(), GatewayError>;
}
