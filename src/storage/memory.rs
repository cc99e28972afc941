//! In-memory collaborator backends.
//!
//! Thread-safe implementations of the collaborator traits. They are intended
//! for embedded usage, tests and the CLI, and serve as reference
//! implementations of the ordering contracts.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::event::{EventType, FenceEvent, NewFenceEvent};
use crate::fence::{Fence, FenceId, FenceRecord};
use crate::position::{ObjectId, Position};
use crate::storage::traits::{AlertSink, FenceStore, PositionSource, StorageError};

fn lock_err(context: &'static str) -> StorageError {
    StorageError::BackendError(format!("poisoned lock: {context}"))
}

/// Thread-safe in-memory position feed.
#[derive(Debug, Default)]
pub struct InMemoryPositions {
    // Per object, ascending by timestamp.
    by_object: RwLock<HashMap<ObjectId, Vec<Position>>>,
}

impl InMemoryPositions {
    /// Create a new empty feed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a position report. Out-of-order reports are placed by timestamp.
    pub fn push(&self, position: Position) -> Result<(), StorageError> {
        let mut map = self.by_object.write().map_err(|_| lock_err("positions.push"))?;
        let track = map.entry(position.object_id.clone()).or_default();
        let idx = track.partition_point(|p| p.timestamp <= position.timestamp);
        track.insert(idx, position);
        Ok(())
    }

    /// All positions, grouped per object.
    pub fn all(&self) -> Result<Vec<Position>, StorageError> {
        let map = self.by_object.read().map_err(|_| lock_err("positions.all"))?;
        Ok(map.values().flat_map(|v| v.iter().cloned()).collect())
    }
}

impl PositionSource for InMemoryPositions {
    fn latest_position(&self, object_id: &ObjectId) -> Result<Option<Position>, StorageError> {
        let map = self.by_object.read().map_err(|_| lock_err("positions.latest"))?;
        Ok(map.get(object_id).and_then(|track| track.last().cloned()))
    }

    fn position_history(
        &self,
        object_id: &ObjectId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Position>, StorageError> {
        let map = self.by_object.read().map_err(|_| lock_err("positions.history"))?;
        Ok(map
            .get(object_id)
            .map(|track| {
                track
                    .iter()
                    .filter(|p| p.timestamp >= from && p.timestamp <= to)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Thread-safe in-memory fence store keyed by fence id.
#[derive(Debug, Default)]
pub struct InMemoryFences {
    records: RwLock<BTreeMap<String, FenceRecord>>,
}

impl InMemoryFences {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a raw record.
    pub fn upsert(&self, record: FenceRecord) -> Result<(), StorageError> {
        let mut records = self.records.write().map_err(|_| lock_err("fences.upsert"))?;
        records.insert(record.id.clone(), record);
        Ok(())
    }

    /// Inserts or replaces a typed fence.
    pub fn upsert_fence(&self, fence: &Fence) -> Result<(), StorageError> {
        self.upsert(FenceRecord::from(fence))
    }

    /// Removes a fence; returns whether it existed.
    pub fn remove(&self, fence_id: &FenceId) -> Result<bool, StorageError> {
        let mut records = self.records.write().map_err(|_| lock_err("fences.remove"))?;
        Ok(records.remove(fence_id.as_str()).is_some())
    }
}

impl FenceStore for InMemoryFences {
    fn active_fences(&self) -> Result<Vec<FenceRecord>, StorageError> {
        let records = self.records.read().map_err(|_| lock_err("fences.active"))?;
        Ok(records.values().filter(|r| r.active).cloned().collect())
    }
}

type PairKey = (FenceId, ObjectId);

/// Thread-safe in-memory alert log.
#[derive(Debug, Default)]
pub struct InMemoryAlerts {
    // Per pair, ascending by occurred_at; ties keep insertion order.
    by_pair: RwLock<HashMap<PairKey, Vec<FenceEvent>>>,
}

impl InMemoryAlerts {
    /// Create a new empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Imports an already-recorded event (e.g. history loaded from disk).
    pub fn import(&self, event: FenceEvent) -> Result<(), StorageError> {
        let mut map = self.by_pair.write().map_err(|_| lock_err("alerts.import"))?;
        insert_ordered(&mut map, event);
        Ok(())
    }

    /// Every recorded event, ascending by `occurred_at`.
    pub fn all_events(&self) -> Result<Vec<FenceEvent>, StorageError> {
        let map = self.by_pair.read().map_err(|_| lock_err("alerts.all"))?;
        let mut out: Vec<FenceEvent> = map.values().flat_map(|v| v.iter().cloned()).collect();
        out.sort_by_key(|e| e.occurred_at);
        Ok(out)
    }

    /// Events for one pair, ascending.
    pub fn events_for(&self, fence_id: &FenceId, object_id: &ObjectId) -> Result<Vec<FenceEvent>, StorageError> {
        let map = self.by_pair.read().map_err(|_| lock_err("alerts.events_for"))?;
        Ok(map
            .get(&(fence_id.clone(), object_id.clone()))
            .cloned()
            .unwrap_or_default())
    }

    /// Total number of recorded events.
    pub fn len(&self) -> Result<usize, StorageError> {
        let map = self.by_pair.read().map_err(|_| lock_err("alerts.len"))?;
        Ok(map.values().map(Vec::len).sum())
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }
}

fn insert_ordered(map: &mut HashMap<PairKey, Vec<FenceEvent>>, event: FenceEvent) {
    let log = map
        .entry((event.fence_id.clone(), event.object_id.clone()))
        .or_default();
    let idx = log.partition_point(|e| e.occurred_at <= event.occurred_at);
    log.insert(idx, event);
}

impl AlertSink for InMemoryAlerts {
    fn latest_event(&self, fence_id: &FenceId, object_id: &ObjectId) -> Result<Option<FenceEvent>, StorageError> {
        let map = self.by_pair.read().map_err(|_| lock_err("alerts.latest"))?;
        Ok(map
            .get(&(fence_id.clone(), object_id.clone()))
            .and_then(|log| log.last().cloned()))
    }

    fn latest_event_of_type(
        &self,
        fence_id: &FenceId,
        object_id: &ObjectId,
        event_type: EventType,
    ) -> Result<Option<FenceEvent>, StorageError> {
        let map = self.by_pair.read().map_err(|_| lock_err("alerts.latest_of_type"))?;
        Ok(map
            .get(&(fence_id.clone(), object_id.clone()))
            .and_then(|log| log.iter().rev().find(|e| e.event_type == event_type).cloned()))
    }

    fn record_event(&self, event: NewFenceEvent) -> Result<FenceEvent, StorageError> {
        let recorded = event.into_event(Utc::now());
        let mut map = self.by_pair.write().map_err(|_| lock_err("alerts.record"))?;
        insert_ordered(&mut map, recorded.clone());
        Ok(recorded)
    }

    fn events_since(
        &self,
        fence_id: &FenceId,
        object_id: &ObjectId,
        since: DateTime<Utc>,
    ) -> Result<Vec<FenceEvent>, StorageError> {
        let map = self.by_pair.read().map_err(|_| lock_err("alerts.since"))?;
        Ok(map
            .get(&(fence_id.clone(), object_id.clone()))
            .map(|log| log.iter().filter(|e| e.occurred_at >= since).cloned().collect())
            .unwrap_or_default())
    }
}

/// Convenience bundle of in-memory collaborators.
#[derive(Debug, Default)]
pub struct InMemoryStores {
    /// Position feed.
    pub positions: InMemoryPositions,
    /// Fence store.
    pub fences: InMemoryFences,
    /// Alert log.
    pub alerts: InMemoryAlerts,
}

impl InMemoryStores {
    /// Create a new bundle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}
