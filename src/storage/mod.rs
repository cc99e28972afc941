//! Collaborator interfaces and their in-memory implementations.
//!
//! The traits define the contract external stores must implement; the
//! in-memory backend is the reference implementation used by tests and the CLI.

mod memory;
mod traits;

pub use memory::{InMemoryAlerts, InMemoryFences, InMemoryPositions, InMemoryStores};
pub use traits::{AlertSink, FenceStore, PositionSource, StorageError};
