//! JSON scenario files for the CLI and integration tests.
//!
//! A scenario is a snapshot of all three collaborators:
//!
//! ```json
//! { "fences": [ ... ], "positions": [ ... ], "events": [ ... ] }
//! ```
//!
//! Fences are kept as raw JSON so one malformed record cannot make the whole
//! file unreadable, and so a write-back preserves them untouched.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::FenceResult;
use crate::event::FenceEvent;
use crate::fence::FenceRecord;
use crate::position::Position;
use crate::storage::{InMemoryStores, StorageError};

/// On-disk scenario.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Raw fence records.
    #[serde(default)]
    pub fences: Vec<serde_json::Value>,
    /// Position reports, in any order.
    #[serde(default)]
    pub positions: Vec<Position>,
    /// Previously recorded events.
    #[serde(default)]
    pub events: Vec<FenceEvent>,
}

/// What [`Scenario::into_stores`] loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Fence records stored.
    pub fences: usize,
    /// Fence entries that were not even record-shaped.
    pub unreadable_fences: usize,
    /// Positions stored.
    pub positions: usize,
    /// Events imported.
    pub events: usize,
}

impl Scenario {
    /// Parses a scenario document.
    ///
    /// # Errors
    ///
    /// Returns a serialization error for malformed JSON.
    pub fn from_json_str(json: &str) -> FenceResult<Self> {
        serde_json::from_str(json).map_err(|e| StorageError::SerializationError(e.to_string()).into())
    }

    /// Reads a scenario file.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> FenceResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| StorageError::BackendError(format!("reading {}: {e}", path.display())))?;
        Self::from_json_str(&raw)
    }

    /// Writes the scenario as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns a storage error if serialization or the write fails.
    pub fn write_to(&self, path: impl AsRef<Path>) -> FenceResult<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).map_err(|e| StorageError::SerializationError(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| StorageError::BackendError(format!("writing {}: {e}", path.display())))?;
        Ok(())
    }

    /// Loads the scenario into fresh in-memory collaborators.
    ///
    /// Fence entries that do not parse as records are logged and counted.
    /// Records that parse but fail geometric validation are stored as-is;
    /// the monitor rejects them when it loads fences.
    ///
    /// # Errors
    ///
    /// Propagates in-memory store failures.
    pub fn into_stores(self) -> FenceResult<(InMemoryStores, LoadReport)> {
        let stores = InMemoryStores::new();
        let mut report = LoadReport::default();

        for (idx, value) in self.fences.into_iter().enumerate() {
            match FenceRecord::from_json_value(value) {
                Ok(record) => {
                    stores.fences.upsert(record)?;
                    report.fences += 1;
                }
                Err(err) => {
                    warn!(index = idx, error = %err, "skipping unreadable fence entry");
                    report.unreadable_fences += 1;
                }
            }
        }

        report.positions = self.positions.len();
        for position in self.positions {
            stores.positions.push(position)?;
        }

        report.events = self.events.len();
        for event in self.events {
            stores.alerts.import(event)?;
        }

        info!(
            fences = report.fences,
            unreadable_fences = report.unreadable_fences,
            positions = report.positions,
            events = report.events,
            "scenario loaded"
        );
        Ok((stores, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::fence::FenceId;
    use crate::position::ObjectId;
    use crate::storage::{AlertSink, FenceStore, PositionSource};

    const SCENARIO: &str = r#"{
        "fences": [
            {
                "id": "sg-anchorage",
                "name": "Singapore anchorage",
                "fenceType": "port_area",
                "centerLat": 1.30,
                "centerLon": 103.80,
                "radiusNm": 5.0,
                "vesselIds": ["imo-1"],
                "alertOnDwell": true,
                "dwellThresholdHrs": 2.0
            },
            "not a fence"
        ],
        "positions": [
            { "objectId": "imo-1", "timestamp": "2026-01-01T00:00:00Z", "latitude": 1.31, "longitude": 103.80 }
        ],
        "events": [
            {
                "id": "3f1f4c1e-8a4a-4d3e-9a55-0e2f6c1b7a10",
                "fenceId": "sg-anchorage",
                "objectId": "imo-1",
                "eventType": "entry",
                "position": { "latitude": 1.31, "longitude": 103.80 },
                "occurredAt": "2025-12-31T23:00:00Z"
            }
        ]
    }"#;

    #[test]
    fn loads_all_three_collaborators() {
        let scenario = Scenario::from_json_str(SCENARIO).unwrap();
        let (stores, report) = scenario.into_stores().unwrap();

        assert_eq!(
            report,
            LoadReport {
                fences: 1,
                unreadable_fences: 1,
                positions: 1,
                events: 1,
            }
        );
        assert_eq!(stores.fences.active_fences().unwrap().len(), 1);

        let imo = ObjectId::new("imo-1");
        assert!(stores.positions.latest_position(&imo).unwrap().is_some());
        let latest = stores
            .alerts
            .latest_event(&FenceId::new("sg-anchorage"), &imo)
            .unwrap()
            .unwrap();
        assert_eq!(latest.event_type, crate::event::EventType::Entry);
    }

    #[test]
    fn empty_document_is_an_empty_scenario() {
        assert_eq!(Scenario::from_json_str("{}").unwrap(), Scenario::default());
    }

    #[test]
    fn malformed_document_is_a_storage_error() {
        let err = Scenario::from_json_str("{\"fences\": 3}").unwrap_err();
        assert!(err.is_storage());
    }

    #[test]
    fn write_then_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenario.json");

        let scenario = Scenario::from_json_str(SCENARIO).unwrap();
        scenario.write_to(&path).unwrap();
        let reread = Scenario::from_path(&path).unwrap();
        assert_eq!(reread, scenario);

        assert!(Scenario::from_path(dir.path().join("missing.json")).unwrap_err().is_storage());
    }
}
