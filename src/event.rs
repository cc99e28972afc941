//! Fence events: the engine's only persisted output.
//!
//! Events are append-only. Once recorded they are never mutated or deleted,
//! and the latest event for a (fence, object) pair is the source of truth for
//! that pair's containment state.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fence::FenceId;
use crate::position::{ObjectId, Position};

/// Unique identifier for a recorded event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Create a new random event id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of containment transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Object crossed into the fence.
    Entry,
    /// Object crossed out of the fence.
    Exit,
    /// Object stayed inside past the dwell threshold.
    #[serde(rename = "dwell_exceeded", alias = "dwell")]
    Dwell,
}

impl EventType {
    /// Wire name as stored by the alert sink.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Exit => "exit",
            Self::Dwell => "dwell_exceeded",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position snapshot carried on an event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventPosition {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
}

impl From<&Position> for EventPosition {
    fn from(p: &Position) -> Self {
        Self {
            latitude: p.latitude,
            longitude: p.longitude,
            speed: p.speed,
            heading: p.heading,
        }
    }
}

/// An event the detector wants recorded.
///
/// The alert sink assigns the id, and `occurred_at` when it is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFenceEvent {
    pub fence_id: FenceId,
    pub object_id: ObjectId,
    pub event_type: EventType,
    pub position: EventPosition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occurred_at: Option<DateTime<Utc>>,
}

impl NewFenceEvent {
    #[must_use]
    pub fn new(fence_id: FenceId, event_type: EventType, position: &Position) -> Self {
        Self {
            fence_id,
            object_id: position.object_id.clone(),
            event_type,
            position: EventPosition::from(position),
            occurred_at: None,
        }
    }

    #[must_use]
    pub const fn at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = Some(occurred_at);
        self
    }

    /// Completes the event with an id, defaulting `occurred_at` to `now`.
    #[must_use]
    pub fn into_event(self, now: DateTime<Utc>) -> FenceEvent {
        FenceEvent {
            id: EventId::new(),
            fence_id: self.fence_id,
            object_id: self.object_id,
            event_type: self.event_type,
            position: self.position,
            occurred_at: self.occurred_at.unwrap_or(now),
        }
    }
}

/// A recorded fence event.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FenceEvent {
    pub id: EventId,
    pub fence_id: FenceId,
    pub object_id: ObjectId,
    pub event_type: EventType,
    pub position: EventPosition,
    pub occurred_at: DateTime<Utc>,
}
