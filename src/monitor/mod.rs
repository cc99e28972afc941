//! MONITOR subsystem: periodic geofence evaluation.
//!
//! Each cycle loads the active fences, evaluates every (fence, watched object)
//! pair on a bounded worker pool, and records entry, exit and dwell events.
//! Pair state is never cached between cycles; it is rebuilt from the alert
//! log every time.

/// Transition detection for a single pair.
pub mod detector;
/// The cycle driver and per-pair evaluation.
pub mod runner;
pub(crate) mod runtime;
/// Event-sourced containment state.
pub mod state;

pub use detector::{Detection, EventDetector, Observation};
pub use runner::{FenceMonitor, PairEvaluator, PairOutcome, RunSummary, SkipReason};
pub use state::{reconstruct_state, ContainmentState};
