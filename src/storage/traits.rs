//! Collaborator traits consumed by the engine.
//!
//! The engine owns no persistent state. Positions come from a tracking feed,
//! fences from an operator-managed store, and the alert sink is both the
//! output log and the only record of each pair's containment state.
//!
//! Implementations must be safe to call from several worker threads at once.
//! Remote backends are expected to bound their own calls; the monitor also
//! enforces a per-pair budget on top.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::event::{EventType, FenceEvent, NewFenceEvent};
use crate::fence::{FenceId, FenceRecord};
use crate::position::{ObjectId, Position};

/// Errors reported by collaborators.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backend error.
    #[error("Storage backend error: {0}")]
    BackendError(String),

    /// Serialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Connection failed.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Call exceeded its deadline.
    #[error("Storage call timed out: {0}")]
    Timeout(String),
}

/// Source of object positions.
pub trait PositionSource: Send + Sync {
    /// Most recent position for the object, if any has been reported.
    fn latest_position(&self, object_id: &ObjectId) -> Result<Option<Position>, StorageError>;

    /// Positions reported in `[from, to]`, ascending by timestamp.
    fn position_history(
        &self,
        object_id: &ObjectId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Position>, StorageError>;
}

/// Source of fence definitions.
pub trait FenceStore: Send + Sync {
    /// All active fences as stored. Validation is the caller's job.
    fn active_fences(&self) -> Result<Vec<FenceRecord>, StorageError>;
}

/// Append-only event log per (fence, object) pair.
pub trait AlertSink: Send + Sync {
    /// Latest event for the pair by `occurred_at`.
    fn latest_event(&self, fence_id: &FenceId, object_id: &ObjectId) -> Result<Option<FenceEvent>, StorageError>;

    /// Latest event of one type for the pair by `occurred_at`.
    fn latest_event_of_type(
        &self,
        fence_id: &FenceId,
        object_id: &ObjectId,
        event_type: EventType,
    ) -> Result<Option<FenceEvent>, StorageError>;

    /// Appends an event, assigning its id and, if missing, `occurred_at`.
    fn record_event(&self, event: NewFenceEvent) -> Result<FenceEvent, StorageError>;

    /// Events for the pair with `occurred_at >= since`, ascending.
    fn events_since(
        &self,
        fence_id: &FenceId,
        object_id: &ObjectId,
        since: DateTime<Utc>,
    ) -> Result<Vec<FenceEvent>, StorageError>;
}
