//! Transition detection for one (fence, object) pair.
//!
//! The canonical comparison is always the current position against the
//! event-log state, never against a raw previous position: the object may
//! have gone unchecked for several cycles, and only the log knows what was
//! last announced.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::DwellRearmPolicy;
use crate::containment::check_containment;
use crate::event::{EventType, NewFenceEvent};
use crate::fence::Fence;
use crate::geometry::{elapsed_hours, hours_to_duration};
use crate::position::{ObjectId, Position};
use crate::storage::{AlertSink, StorageError};

use super::state::ContainmentState;

/// Inputs observed for a pair in one cycle.
#[derive(Debug, Clone, Copy)]
pub struct Observation<'a> {
    /// Position being evaluated.
    pub position: &'a Position,
    /// Position evaluated before this one, when the caller has it. Only used
    /// to flag disagreement with the event log.
    pub previous: Option<&'a Position>,
    /// Evaluation instant; also the `occurred_at` of any emitted event.
    pub now: DateTime<Utc>,
}

impl<'a> Observation<'a> {
    #[must_use]
    pub const fn new(position: &'a Position, now: DateTime<Utc>) -> Self {
        Self {
            position,
            previous: None,
            now,
        }
    }

    #[must_use]
    pub const fn with_previous(mut self, previous: Option<&'a Position>) -> Self {
        self.previous = previous;
        self
    }
}

/// Outcome of a detection pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Whether the current position is inside the fence.
    pub inside: bool,
    /// Event to record, if a transition was confirmed.
    pub event: Option<NewFenceEvent>,
}

/// Decides which event, if any, a pair emits this cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventDetector {
    rearm: DwellRearmPolicy,
}

impl EventDetector {
    #[must_use]
    pub const fn new(rearm: DwellRearmPolicy) -> Self {
        Self { rearm }
    }

    #[must_use]
    pub const fn rearm_policy(&self) -> DwellRearmPolicy {
        self.rearm
    }

    /// Compares current containment with `prior` and the fence's alert flags.
    ///
    /// At most one event is produced: a single position cannot both cross the
    /// boundary and satisfy a dwell.
    ///
    /// # Errors
    ///
    /// Propagates alert sink failures from the dwell re-arm check.
    pub fn detect(
        &self,
        sink: &dyn AlertSink,
        fence: &Fence,
        prior: ContainmentState,
        obs: Observation<'_>,
    ) -> Result<Detection, StorageError> {
        let inside = check_containment(obs.position, fence);

        if let Some(prev) = obs.previous {
            let prev_inside = check_containment(prev, fence);
            if prev_inside != prior.is_inside() {
                debug!(
                    fence = %fence.id,
                    object = %obs.position.object_id,
                    prev_inside,
                    log_inside = prior.is_inside(),
                    "previous position disagrees with event log; trusting the log"
                );
            }
        }

        let event_type = match (inside, prior.is_inside()) {
            (true, false) if fence.alert_on_entry => Some(EventType::Entry),
            (false, true) if fence.alert_on_exit => Some(EventType::Exit),
            (true, true) => self
                .dwell_due(sink, fence, &obs.position.object_id, prior, obs.now)?
                .then_some(EventType::Dwell),
            _ => None,
        };

        let event = event_type.map(|kind| NewFenceEvent::new(fence.id.clone(), kind, obs.position).at(obs.now));

        Ok(Detection { inside, event })
    }

    fn dwell_due(
        &self,
        sink: &dyn AlertSink,
        fence: &Fence,
        object_id: &ObjectId,
        prior: ContainmentState,
        now: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let (Some(threshold), Some(since)) = (fence.dwell_threshold(), prior.since()) else {
            return Ok(false);
        };

        let dwell_hours = elapsed_hours(since, now);
        if dwell_hours < threshold {
            return Ok(false);
        }

        let guard_start = match self.rearm {
            DwellRearmPolicy::WindowElapsed => {
                let Some(window) = hours_to_duration(threshold) else {
                    return Ok(false);
                };
                now.checked_sub_signed(window).unwrap_or(DateTime::<Utc>::MIN_UTC)
            }
            DwellRearmPolicy::ExitOnly => since,
        };

        let already_fired = sink
            .events_since(&fence.id, object_id, guard_start)?
            .iter()
            .any(|e| e.event_type == EventType::Dwell);

        if already_fired {
            debug!(
                fence = %fence.id,
                object = %object_id,
                dwell_hours,
                policy = ?self.rearm,
                "dwell threshold exceeded but alert not re-armed"
            );
        }

        Ok(!already_fired)
    }
}
