//! Repository port for agent snapshot persistence.
//!
//! This module defines the trait boundary between the domain and
//! infrastructure layers for storing and retrieving agent snapshots.

use std::path::Path;

use crate::q_learning::SavedAgent;
use crate::Result;

/// Port for persisting and loading agent snapshots.
///
/// This trait abstracts the storage mechanism, allowing different
/// implementations (MessagePack files, in-memory stores for tests)
/// without coupling the domain logic to a serialization format.
///
/// A missing snapshot is not an error: `load` distinguishes "nothing
/// saved yet" (`Ok(None)`) from "something saved but unreadable"
/// (`Err(..)`), because the resume flow treats them differently.
pub trait SnapshotRepository {
    /// Save a snapshot to persistent storage.
    ///
    /// Implementations must make the write atomic with respect to
    /// readers: a crash mid-save leaves the previous snapshot intact.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be serialized or written.
    fn save(&self, snapshot: &SavedAgent, path: &Path) -> Result<()>;

    /// Load a snapshot from persistent storage.
    ///
    /// # Errors
    ///
    /// Returns an error if something is stored at `path` but cannot be
    /// read back as a valid snapshot. A clean absence is `Ok(None)`.
    fn load(&self, path: &Path) -> Result<Option<SavedAgent>>;
}
