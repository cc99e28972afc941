//! Monitor configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FenceResult, ValidationError};
use crate::storage::StorageError;

/// When a dwell alert becomes eligible to fire again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DwellRearmPolicy {
    /// Re-fire once the last dwell alert is older than the dwell threshold,
    /// even if the object never left. A vessel parked for 3x the threshold
    /// gets about three dwell alerts.
    #[default]
    WindowElapsed,
    /// Fire at most once per stay; only an exit re-arms.
    ExitOnly,
}

/// Monitor runtime configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonitorConfig {
    /// Number of pair-evaluation workers.
    pub workers: usize,
    /// Maximum queued pair jobs before submission blocks.
    pub queue_capacity: usize,
    /// Budget for one (fence, object) evaluation, collaborator calls included.
    pub pair_timeout_ms: u64,
    /// Dwell re-arm behaviour.
    pub dwell_rearm: DwellRearmPolicy,
    /// Positions older than this are skipped like missing ones. `None` keeps
    /// every latest position regardless of age.
    pub stale_after_secs: Option<u64>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 256,
            pair_timeout_ms: 5_000,
            dwell_rearm: DwellRearmPolicy::default(),
            stale_after_secs: None,
        }
    }
}

impl MonitorConfig {
    /// Parses and validates a JSON config.
    ///
    /// # Errors
    ///
    /// Returns a validation error for malformed JSON or out-of-range values.
    pub fn from_json_str(json: &str) -> FenceResult<Self> {
        let cfg: Self = serde_json::from_str(json).map_err(|e| ValidationError::InvalidConfig {
            reason: e.to_string(),
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reads, parses and validates a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the file cannot be read, otherwise as
    /// [`MonitorConfig::from_json_str`].
    pub fn from_path(path: impl AsRef<Path>) -> FenceResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| StorageError::BackendError(format!("reading {}: {e}", path.display())))?;
        Self::from_json_str(&raw)
    }

    /// Rejects values that would stall the monitor.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidConfig` for zero workers, zero queue
    /// capacity or a zero pair timeout.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.workers == 0 {
            return Err(ValidationError::InvalidConfig {
                reason: "workers must be at least 1".to_string(),
            });
        }
        if self.queue_capacity == 0 {
            return Err(ValidationError::InvalidConfig {
                reason: "queue_capacity must be at least 1".to_string(),
            });
        }
        if self.pair_timeout_ms == 0 {
            return Err(ValidationError::InvalidConfig {
                reason: "pair_timeout_ms must be positive".to_string(),
            });
        }
        Ok(())
    }

    #[must_use]
    pub const fn pair_timeout(&self) -> Duration {
        Duration::from_millis(self.pair_timeout_ms)
    }
}
