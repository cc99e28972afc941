//! Event-sourced containment state.
//!
//! There is no live "current state" table. A pair's state is whatever its
//! latest recorded event implies, so the state can never drift from the log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::event::EventType;
use crate::fence::FenceId;
use crate::position::ObjectId;
use crate::storage::{AlertSink, StorageError};

/// Last known containment state of a (fence, object) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ContainmentState {
    /// No history, or the latest event is an exit.
    Outside,
    /// Latest event is an entry.
    Inside { since: DateTime<Utc> },
    /// Latest event is a dwell alert. `since` is anchored to the entry that
    /// started the stay when it is still in the log.
    Dwelling {
        since: DateTime<Utc>,
        last_dwell_at: DateTime<Utc>,
    },
}

impl ContainmentState {
    #[must_use]
    pub const fn is_inside(&self) -> bool {
        !matches!(self, Self::Outside)
    }

    /// Start of the current stay; `None` when outside.
    #[must_use]
    pub const fn since(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Outside => None,
            Self::Inside { since } | Self::Dwelling { since, .. } => Some(*since),
        }
    }
}

/// Reconstructs the pair's state from its latest event.
///
/// # Errors
///
/// Propagates alert sink failures.
pub fn reconstruct_state(
    sink: &dyn AlertSink,
    fence_id: &FenceId,
    object_id: &ObjectId,
) -> Result<ContainmentState, StorageError> {
    let Some(latest) = sink.latest_event(fence_id, object_id)? else {
        return Ok(ContainmentState::Outside);
    };

    let state = match latest.event_type {
        EventType::Exit => ContainmentState::Outside,
        EventType::Entry => ContainmentState::Inside {
            since: latest.occurred_at,
        },
        EventType::Dwell => {
            let since = sink
                .latest_event_of_type(fence_id, object_id, EventType::Entry)?
                .map(|entry| entry.occurred_at)
                .filter(|at| *at <= latest.occurred_at)
                .unwrap_or(latest.occurred_at);
            ContainmentState::Dwelling {
                since,
                last_dwell_at: latest.occurred_at,
            }
        }
    };

    debug!(fence = %fence_id, object = %object_id, ?state, "reconstructed containment state");
    Ok(state)
}
