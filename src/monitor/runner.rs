//! The monitor loop.
//!
//! One call to [`FenceMonitor::run_once`] is one batch: every active fence,
//! every watched object, one evaluation each. Nothing is carried between
//! calls except what was written to the alert sink, so the loop can be driven
//! by any scheduler (cron, a timer, a CLI invocation).
//!
//! A batch is not a transaction. A failing pair is logged and counted, and
//! the remaining pairs still run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::error::{ExecutionError, FenceResult};
use crate::event::FenceEvent;
use crate::fence::{Fence, FenceRecord};
use crate::position::ObjectId;
use crate::storage::{AlertSink, FenceStore, PositionSource};

use super::detector::{EventDetector, Observation};
use super::runtime::WorkerPool;
use super::state::reconstruct_state;

/// Why a pair was not evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The position source has nothing for the object.
    NoPosition,
    /// The latest position is older than the staleness limit.
    StalePosition,
}

/// Result of evaluating one (fence, object) pair.
#[derive(Debug, Clone, PartialEq)]
pub enum PairOutcome {
    Skipped(SkipReason),
    Evaluated {
        inside: bool,
        event: Option<FenceEvent>,
    },
}

/// Evaluates single pairs: position lookup, containment, state, detection
/// and persistence.
pub struct PairEvaluator {
    positions: Arc<dyn PositionSource>,
    alerts: Arc<dyn AlertSink>,
    detector: EventDetector,
    stale_after: Option<chrono::Duration>,
}

impl PairEvaluator {
    #[must_use]
    pub fn new(
        positions: Arc<dyn PositionSource>,
        alerts: Arc<dyn AlertSink>,
        detector: EventDetector,
        stale_after: Option<chrono::Duration>,
    ) -> Self {
        Self {
            positions,
            alerts,
            detector,
            stale_after,
        }
    }

    /// Runs one pair end to end.
    ///
    /// # Errors
    ///
    /// Collaborator failures and invalid positions.
    pub fn evaluate(&self, fence: &Fence, object_id: &ObjectId, now: DateTime<Utc>) -> FenceResult<PairOutcome> {
        let Some(position) = self.positions.latest_position(object_id)? else {
            debug!(fence = %fence.id, object = %object_id, "no position; skipping");
            return Ok(PairOutcome::Skipped(SkipReason::NoPosition));
        };

        if let Some(limit) = self.stale_after {
            if now - position.timestamp > limit {
                debug!(
                    fence = %fence.id,
                    object = %object_id,
                    reported_at = %position.timestamp,
                    "stale position; skipping"
                );
                return Ok(PairOutcome::Skipped(SkipReason::StalePosition));
            }
        }

        position.validate()?;

        let prior = reconstruct_state(self.alerts.as_ref(), &fence.id, object_id)?;
        let detection = self
            .detector
            .detect(self.alerts.as_ref(), fence, prior, Observation::new(&position, now))?;

        let event = match detection.event {
            Some(new_event) => {
                let recorded = self.alerts.record_event(new_event)?;
                info!(
                    fence = %fence.id,
                    object = %object_id,
                    event = %recorded.event_type,
                    event_id = %recorded.id,
                    lat = recorded.position.latitude,
                    lon = recorded.position.longitude,
                    "fence event recorded"
                );
                Some(recorded)
            }
            None => None,
        };

        Ok(PairOutcome::Evaluated {
            inside: detection.inside,
            event,
        })
    }
}

/// Counters for one monitor cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Valid active fences processed.
    pub fences: usize,
    /// Fence records rejected at load time.
    pub rejected_fences: usize,
    /// Pairs whose containment was evaluated.
    pub evaluated: usize,
    /// Events recorded.
    pub emitted: usize,
    /// Pairs skipped for lack of a usable position.
    pub skipped: usize,
    /// Pairs that failed (collaborator error, timeout, invalid position, or
    /// still running from an earlier cycle).
    pub failures: usize,
}

struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Periodic geofence monitor.
pub struct FenceMonitor {
    fences: Arc<dyn FenceStore>,
    pool: WorkerPool,
    pair_timeout: Duration,
    running: AtomicBool,
}

impl FenceMonitor {
    /// Creates a monitor and starts its worker pool.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an unusable config, or an internal
    /// error if worker threads cannot be spawned.
    pub fn new(
        positions: Arc<dyn PositionSource>,
        fences: Arc<dyn FenceStore>,
        alerts: Arc<dyn AlertSink>,
        config: &MonitorConfig,
    ) -> FenceResult<Self> {
        config.validate()?;

        let stale_after = config
            .stale_after_secs
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(chrono::Duration::try_seconds);

        let evaluator = Arc::new(PairEvaluator::new(
            positions,
            alerts,
            EventDetector::new(config.dwell_rearm),
            stale_after,
        ));
        let pool = WorkerPool::start("pairs", config.workers, config.queue_capacity, evaluator)?;

        Ok(Self {
            fences,
            pool,
            pair_timeout: config.pair_timeout(),
            running: AtomicBool::new(false),
        })
    }

    /// Runs one cycle at the current time.
    ///
    /// # Errors
    ///
    /// See [`FenceMonitor::run_once_at`].
    pub fn run_once(&self) -> FenceResult<RunSummary> {
        self.run_once_at(Utc::now())
    }

    /// Runs one cycle as of `now`.
    ///
    /// # Errors
    ///
    /// Fails only if another cycle is already running on this monitor or the
    /// fence store cannot be read. Per-pair problems are counted in the
    /// summary instead.
    ///
    /// Each pair gets `pair_timeout` from the moment it is queued. A pair that
    /// overruns is counted as a failure, and later cycles skip it until its
    /// worker finishes.
    pub fn run_once_at(&self, now: DateTime<Utc>) -> FenceResult<RunSummary> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("monitor cycle requested while another is running");
            return Err(ExecutionError::AlreadyRunning.into());
        }
        let _guard = RunGuard(&self.running);

        let (fences, rejected_fences) = self.load_fences()?;
        let mut summary = RunSummary {
            fences: fences.len(),
            rejected_fences,
            ..RunSummary::default()
        };

        let mut pending = Vec::new();
        for fence in fences {
            let fence = Arc::new(fence);
            for object_id in &fence.watched_object_ids {
                match self
                    .pool
                    .evaluate(Arc::clone(&fence), object_id.clone(), now, self.pair_timeout)
                {
                    Ok(handle) => pending.push((Arc::clone(&fence), object_id.clone(), handle)),
                    Err(ExecutionError::PairInFlight { .. }) => {
                        warn!(fence = %fence.id, object = %object_id, "pair still running from an earlier cycle; skipping");
                        summary.failures += 1;
                    }
                    Err(err) => {
                        warn!(fence = %fence.id, object = %object_id, error = %err, "failed to queue pair");
                        summary.failures += 1;
                    }
                }
            }
        }

        for (fence, object_id, handle) in pending {
            match handle.join() {
                Ok(PairOutcome::Skipped(_)) => summary.skipped += 1,
                Ok(PairOutcome::Evaluated { event, .. }) => {
                    summary.evaluated += 1;
                    if event.is_some() {
                        summary.emitted += 1;
                    }
                }
                Err(err) => {
                    warn!(
                        fence = %fence.id,
                        object = %object_id,
                        retryable = err.is_retryable(),
                        error = %err,
                        "pair evaluation failed"
                    );
                    summary.failures += 1;
                }
            }
        }

        info!(
            fences = summary.fences,
            rejected_fences = summary.rejected_fences,
            evaluated = summary.evaluated,
            emitted = summary.emitted,
            skipped = summary.skipped,
            failures = summary.failures,
            "monitor cycle complete"
        );
        Ok(summary)
    }

    /// Loads and validates active fences. Returns the valid fences and the
    /// number of rejected records.
    ///
    /// # Errors
    ///
    /// Propagates a fence store failure.
    pub fn load_fences(&self) -> FenceResult<(Vec<Fence>, usize)> {
        let records = self.fences.active_fences()?;
        Ok(validate_records(records))
    }
}

pub(crate) fn validate_records(records: Vec<FenceRecord>) -> (Vec<Fence>, usize) {
    let mut rejected = 0;
    let mut fences = Vec::with_capacity(records.len());
    for record in records {
        let id = record.id.clone();
        match record.into_fence() {
            Ok(fence) if fence.active => fences.push(fence),
            Ok(_) => {}
            Err(err) => {
                warn!(fence = %id, error = %err, "rejecting malformed fence");
                rejected += 1;
            }
        }
    }
    (fences, rejected)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::event::EventType;
    use crate::position::Position;
    use crate::storage::{InMemoryAlerts, InMemoryPositions};

    struct Fixture {
        positions: Arc<InMemoryPositions>,
        alerts: Arc<InMemoryAlerts>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                positions: Arc::new(InMemoryPositions::new()),
                alerts: Arc::new(InMemoryAlerts::new()),
            }
        }

        fn evaluator(&self, stale_after: Option<chrono::Duration>) -> PairEvaluator {
            PairEvaluator::new(
                Arc::clone(&self.positions) as Arc<dyn PositionSource>,
                Arc::clone(&self.alerts) as Arc<dyn AlertSink>,
                EventDetector::default(),
                stale_after,
            )
        }
    }

    fn fence() -> Fence {
        Fence::circle("f", 1.30, 103.80, 5.0).watching(["v1"])
    }

    #[test]
    fn missing_position_is_skipped() {
        let fx = Fixture::new();
        let outcome = fx.evaluator(None).evaluate(&fence(), &ObjectId::new("v1"), Utc::now()).unwrap();
        assert_eq!(outcome, PairOutcome::Skipped(SkipReason::NoPosition));
    }

    #[test]
    fn stale_position_is_skipped() {
        let fx = Fixture::new();
        let now = Utc::now();
        fx.positions
            .push(Position::new("v1", now - chrono::Duration::hours(3), 1.30, 103.80))
            .unwrap();

        let outcome = fx
            .evaluator(Some(chrono::Duration::hours(1)))
            .evaluate(&fence(), &ObjectId::new("v1"), now)
            .unwrap();
        assert_eq!(outcome, PairOutcome::Skipped(SkipReason::StalePosition));

        let outcome = fx.evaluator(None).evaluate(&fence(), &ObjectId::new("v1"), now).unwrap();
        assert!(matches!(outcome, PairOutcome::Evaluated { inside: true, .. }));
    }

    #[test]
    fn invalid_position_is_an_error_not_an_event() {
        let fx = Fixture::new();
        let now = Utc::now();
        fx.positions.push(Position::new("v1", now, f64::NAN, 103.80)).unwrap();

        let err = fx.evaluator(None).evaluate(&fence(), &ObjectId::new("v1"), now).unwrap_err();
        assert!(err.is_validation());
        assert!(fx.alerts.is_empty().unwrap());
    }

    #[test]
    fn evaluation_records_entry() {
        let fx = Fixture::new();
        let now = Utc::now();
        fx.positions.push(Position::new("v1", now, 1.31, 103.80)).unwrap();

        let outcome = fx.evaluator(None).evaluate(&fence(), &ObjectId::new("v1"), now).unwrap();
        let PairOutcome::Evaluated { inside, event } = outcome else {
            panic!("expected evaluation, got {outcome:?}");
        };
        assert!(inside);
        let event = event.unwrap();
        assert_eq!(event.event_type, EventType::Entry);
        assert_eq!(event.occurred_at, now);
        assert_eq!(fx.alerts.len().unwrap(), 1);
    }

    #[test]
    fn validate_records_counts_rejections() {
        let good = FenceRecord::from(&fence());
        let mut bad = FenceRecord::from(&fence());
        bad.id = "bad".to_string();
        bad.radius_nm = Some(f64::INFINITY);
        let mut inactive = FenceRecord::from(&fence());
        inactive.id = "off".to_string();
        inactive.active = false;

        let (fences, rejected) = validate_records(vec![good, bad, inactive]);
        assert_eq!(fences.len(), 1);
        assert_eq!(rejected, 1);
        assert_eq!(fences[0].id.as_str(), "f");
    }
}
