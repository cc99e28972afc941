//! Historical replay of an object's track against one fence.
//!
//! Replay drives the same detector as the live monitor, but each position is
//! evaluated at its own report time, so a backfilled track produces the
//! events the monitor would have produced had it seen every report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::DwellRearmPolicy;
use crate::error::FenceResult;
use crate::event::FenceEvent;
use crate::fence::Fence;
use crate::monitor::{reconstruct_state, EventDetector, Observation};
use crate::position::{ObjectId, Position};
use crate::storage::{AlertSink, PositionSource};

/// Result of a replay run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplaySummary {
    /// Positions read from the source in the window.
    pub positions: usize,
    /// Positions dropped because they failed validation.
    pub rejected: usize,
    /// Positions at or before the pair's latest logged event, not re-evaluated.
    pub already_logged: usize,
    /// Events recorded, in the order they were produced.
    pub events: Vec<FenceEvent>,
}

/// Replays `object_id`'s positions in `[from, to]` through the detector and
/// records every resulting event in `sink`.
///
/// Positions at or before the pair's latest recorded event are already
/// reflected in the log and are skipped, so replaying a window twice, or
/// replaying after the live monitor has run, does not duplicate events.
///
/// # Errors
///
/// Propagates collaborator failures. Invalid positions are skipped, not
/// treated as errors.
pub fn replay_history(
    source: &dyn PositionSource,
    sink: &dyn AlertSink,
    fence: &Fence,
    object_id: &ObjectId,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    policy: DwellRearmPolicy,
) -> FenceResult<ReplaySummary> {
    let detector = EventDetector::new(policy);
    let history = source.position_history(object_id, from, to)?;
    let horizon = sink.latest_event(&fence.id, object_id)?.map(|e| e.occurred_at);

    let mut summary = ReplaySummary {
        positions: history.len(),
        ..ReplaySummary::default()
    };
    let mut previous: Option<&Position> = None;

    for position in &history {
        if horizon.is_some_and(|h| position.timestamp <= h) {
            summary.already_logged += 1;
            continue;
        }
        if let Err(err) = position.validate() {
            warn!(fence = %fence.id, object = %object_id, at = %position.timestamp, error = %err, "skipping invalid position");
            summary.rejected += 1;
            continue;
        }

        let prior = reconstruct_state(sink, &fence.id, object_id)?;
        let obs = Observation::new(position, position.timestamp).with_previous(previous);
        let detection = detector.detect(sink, fence, prior, obs)?;

        if let Some(event) = detection.event {
            let recorded = sink.record_event(event)?;
            debug!(fence = %fence.id, object = %object_id, event = %recorded.event_type, at = %recorded.occurred_at, "replayed event");
            summary.events.push(recorded);
        }
        previous = Some(position);
    }

    Ok(summary)
}
