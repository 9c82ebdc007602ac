//! In-memory snapshot repository for testing.
//!
//! This adapter provides a pure in-memory implementation of
//! SnapshotRepository, enabling fast tests without any file system I/O.

use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, Mutex},
};

use crate::{Result, error::Error, ports::SnapshotRepository, q_learning::SavedAgent};

/// In-memory repository for testing.
///
/// Stores snapshots in memory using a shared HashMap, avoiding file system
/// I/O entirely. Perfect for fast, isolated tests.
///
/// # Examples
///
/// ```
/// use dinoq::adapters::InMemoryRepository;
/// use dinoq::ports::SnapshotRepository;
/// use dinoq::q_learning::{QAgentConfig, QLearningAgent, SavedAgent};
/// use std::path::Path;
///
/// let repo = InMemoryRepository::new();
/// let agent = QLearningAgent::new(QAgentConfig::default())?;
/// let saved = SavedAgent::from_agent(&agent, Default::default(), Default::default());
///
/// // Save to "memory" (not disk)
/// repo.save(&saved, Path::new("test_snapshot"))?;
///
/// // Load from "memory"
/// let loaded = repo.load(Path::new("test_snapshot"))?;
/// assert!(loaded.is_some());
/// # Ok::<(), dinoq::Error>(())
/// ```
///
/// # Thread Safety
///
/// This repository is thread-safe and can be safely cloned and shared across
/// threads. All clones share the same underlying storage.
#[derive(Clone)]
pub struct InMemoryRepository {
    storage: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl InMemoryRepository {
    /// Create a new empty in-memory repository.
    pub fn new() -> Self {
        Self {
            storage: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Get the number of snapshots currently stored.
    ///
    /// Useful for testing to verify save operations occurred.
    pub fn count(&self) -> usize {
        self.storage.lock().unwrap().len()
    }

    /// Clear all stored snapshots.
    ///
    /// Useful for resetting state between tests.
    pub fn clear(&self) {
        self.storage.lock().unwrap().clear();
    }

    /// Check if a snapshot exists at the given path.
    pub fn contains(&self, path: &Path) -> bool {
        let key = path.to_string_lossy().to_string();
        self.storage.lock().unwrap().contains_key(&key)
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotRepository for InMemoryRepository {
    fn save(&self, saved: &SavedAgent, path: &Path) -> Result<()> {
        let key = path.to_string_lossy().to_string();

        let bytes = rmp_serde::to_vec(saved).map_err(|e| Error::SerializationContext {
            operation: "serialize snapshot for in-memory storage".to_string(),
            message: e.to_string(),
        })?;

        self.storage.lock().unwrap().insert(key, bytes);
        Ok(())
    }

    fn load(&self, path: &Path) -> Result<Option<SavedAgent>> {
        let key = path.to_string_lossy().to_string();
        let storage = self.storage.lock().unwrap();

        let Some(bytes) = storage.get(&key) else {
            return Ok(None);
        };

        let saved = rmp_serde::from_slice(bytes).map_err(|e| Error::SnapshotCorrupt {
            path: path.display().to_string(),
            reason: format!("in-memory payload decode failed: {e}"),
        })?;

        Ok(Some(saved))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::q_learning::{QAgentConfig, QLearningAgent};

    fn sample_snapshot() -> SavedAgent {
        let agent = QLearningAgent::new(QAgentConfig::default())
            .expect("Failed to create agent")
            .with_seed(11);
        SavedAgent::from_agent(&agent, Default::default(), Default::default())
    }

    #[test]
    fn test_in_memory_save_and_load() {
        let repo = InMemoryRepository::new();
        let saved = sample_snapshot();

        let path = Path::new("test_snapshot");

        // Initially empty
        assert_eq!(repo.count(), 0);
        assert!(!repo.contains(path));

        // Save
        repo.save(&saved, path).unwrap();
        assert_eq!(repo.count(), 1);
        assert!(repo.contains(path));

        // Load
        let loaded = repo.load(path).unwrap().expect("Snapshot should exist");
        assert_eq!(loaded.rng_seed, Some(11));
        assert_eq!(loaded.epsilon, saved.epsilon);
    }

    #[test]
    fn test_load_nonexistent_returns_none() {
        let repo = InMemoryRepository::new();
        let result = repo.load(Path::new("nonexistent")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_clear_removes_all() {
        let repo = InMemoryRepository::new();
        let saved = sample_snapshot();

        repo.save(&saved, Path::new("snap1")).unwrap();
        repo.save(&saved, Path::new("snap2")).unwrap();
        assert_eq!(repo.count(), 2);

        repo.clear();
        assert_eq!(repo.count(), 0);
    }

    #[test]
    fn test_clone_shares_storage() {
        let repo1 = InMemoryRepository::new();
        let repo2 = repo1.clone();

        let saved = sample_snapshot();
        let path = Path::new("shared");

        // Save via repo1
        repo1.save(&saved, path).unwrap();

        // Load via repo2 (should see the same data)
        let loaded = repo2.load(path).unwrap().expect("Snapshot should exist");
        assert_eq!(loaded.rng_seed, Some(11));

        // Both should report same count
        assert_eq!(repo1.count(), 1);
        assert_eq!(repo2.count(), 1);
    }
}
