//! # fencewatch - Geofence Monitoring Engine
//!
//! fencewatch periodically evaluates the latest reported positions of moving
//! objects (vessels, in the maritime deployment) against configured
//! geographic fences, and records entry, exit and dwell events.
//!
//! ## Core Concepts
//!
//! - **Fence**: a circle or polygon with a watch list and alert flags
//! - **Position**: a timestamped location report for one object
//! - **FenceEvent**: an append-only record of a confirmed transition
//! - **ContainmentState**: a pair's last known state, rebuilt from its events
//!
//! The engine never keeps a live state table. Whatever the alert log says
//! last is what the next cycle compares against, which makes cycles
//! idempotent: running twice with no new positions records nothing new.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use fencewatch::storage::{InMemoryAlerts, InMemoryFences, InMemoryPositions};
//! use fencewatch::{Fence, FenceMonitor, MonitorConfig, Position};
//!
//! let positions = Arc::new(InMemoryPositions::new());
//! let fences = Arc::new(InMemoryFences::new());
//! let alerts = Arc::new(InMemoryAlerts::new());
//!
//! fences.upsert_fence(&Fence::circle("sg", 1.30, 103.80, 5.0).watching(["imo-1"]))?;
//! positions.push(Position::new("imo-1", chrono::Utc::now(), 1.31, 103.80))?;
//!
//! let monitor = FenceMonitor::new(positions, fences, alerts, &MonitorConfig::default())?;
//! let summary = monitor.run_once()?;
//! assert_eq!(summary.emitted, 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types and geometry
pub mod containment;
pub mod error;
pub mod event;
pub mod fence;
pub mod geometry;
pub mod position;

// Collaborators, configuration and the monitor loop
pub mod config;
pub mod monitor;
pub mod storage;

// Offline tooling
pub mod replay;
pub mod scenario;

pub use config::{DwellRearmPolicy, MonitorConfig};
pub use containment::{check_containment, eta_to_fence};
pub use error::{ExecutionError, FenceError, FenceResult, ValidationError};
pub use event::{EventId, EventPosition, EventType, FenceEvent, NewFenceEvent};
pub use fence::{Circle, Fence, FenceId, FenceRecord, FenceShape};
pub use geometry::{
    estimate_eta, haversine_distance_nm, is_point_in_circle, is_point_in_polygon, EtaEstimate, GeoPoint,
    EARTH_RADIUS_NM,
};
pub use monitor::{ContainmentState, FenceMonitor, PairOutcome, RunSummary, SkipReason};
pub use position::{ObjectId, Position};
pub use replay::{replay_history, ReplaySummary};
pub use scenario::{LoadReport, Scenario};
pub use storage::{AlertSink, FenceStore, PositionSource, StorageError};
