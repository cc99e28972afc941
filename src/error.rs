//! Error types for fencewatch.
//!
//! All errors are strongly typed using thiserror. Data-absence conditions
//! (no position, degenerate polygon, zero speed) are deliberately NOT errors;
//! they have documented defaults in the modules that handle them.

use thiserror::Error;

use crate::fence::FenceId;
use crate::position::ObjectId;
use crate::storage::StorageError;

/// Validation errors raised when fence or position data is malformed.
///
/// A fence failing validation is rejected on its own; the rest of the batch
/// continues.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Field '{field}' has non-finite value {value}")]
    NonFiniteCoordinate {
        field: String,
        value: f64,
    },

    #[error("Latitude {value} is out of range [-90, 90]")]
    LatitudeOutOfRange {
        value: f64,
    },

    #[error("Longitude {value} is out of range [-180, 180]")]
    LongitudeOutOfRange {
        value: f64,
    },

    #[error("Radius {value}nm must be a finite, non-negative number")]
    InvalidRadius {
        value: f64,
    },

    #[error("Dwell threshold {value}h must be a finite, positive number")]
    InvalidDwellThreshold {
        value: f64,
    },

    #[error("Unknown fence type '{fence_type}'")]
    UnknownFenceType {
        fence_type: String,
    },

    #[error("Required field '{field}' is missing")]
    MissingField {
        field: String,
    },

    #[error("Malformed fence record: {reason}")]
    MalformedRecord {
        reason: String,
    },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        reason: String,
    },
}

/// Execution errors raised by the monitor loop and its worker pool.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout {
        duration_ms: u64,
    },

    #[error("Worker pool '{path}' is disconnected")]
    Disconnected {
        path: String,
    },

    #[error("Worker pool '{path}' queue is full (capacity {capacity})")]
    QueueFull {
        path: String,
        capacity: usize,
    },

    #[error("A monitor cycle is already running")]
    AlreadyRunning,

    #[error("Fence {fence_id} / object {object_id} is still being evaluated by an earlier cycle")]
    PairInFlight {
        fence_id: FenceId,
        object_id: ObjectId,
    },

    #[error("Evaluation of fence {fence_id} / object {object_id} failed: {reason}")]
    PairFailed {
        fence_id: FenceId,
        object_id: ObjectId,
        reason: String,
    },
}

/// Top-level error type for fencewatch.
#[derive(Debug, Error)]
pub enum FenceError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl FenceError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns true if this is a storage (collaborator) error.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Returns true if this error is retryable.
    ///
    /// A retry here means "the next scheduled cycle", not an in-loop retry.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Validation(_) => false,
            Self::Execution(e) => matches!(
                e,
                ExecutionError::Timeout { .. }
                    | ExecutionError::AlreadyRunning
                    | ExecutionError::QueueFull { .. }
                    | ExecutionError::PairInFlight { .. }
            ),
            Self::Storage(e) => matches!(
                e,
                StorageError::ConnectionError(_) | StorageError::Timeout(_) | StorageError::BackendError(_)
            ),
            Self::Internal { .. } => false,
        }
    }
}

/// Result type alias for fencewatch operations.
pub type FenceResult<T> = Result<T, FenceError>;
