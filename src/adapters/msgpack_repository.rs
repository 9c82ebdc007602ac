//! MessagePack implementation of the snapshot repository.
//!
//! This adapter implements the SnapshotRepository port using rmp_serde for
//! compact binary serialization. Snapshots are wrapped in a checksummed
//! envelope and written atomically so a crash mid-save never leaves a
//! half-written file behind.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
    Result, error::Error, ports::SnapshotRepository, q_learning::SavedAgent, utils::atomic_write,
};

/// On-disk wrapper around a serialized snapshot.
///
/// The payload is the MessagePack encoding of a [`SavedAgent`]; the checksum
/// is the lowercase SHA-256 hex digest of those payload bytes. Verifying the
/// digest on load catches truncated or bit-flipped files before they are
/// decoded into a live agent.
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotEnvelope {
    checksum: String,
    payload: Vec<u8>,
}

/// MessagePack-based snapshot repository.
///
/// Provides persistent storage using the MessagePack binary format via
/// rmp_serde. This format offers good compression and fast
/// serialization/deserialization for tables with thousands of rows.
///
/// # Examples
///
/// ```no_run
/// use dinoq::adapters::MsgPackRepository;
/// use dinoq::ports::SnapshotRepository;
/// use dinoq::q_learning::{QAgentConfig, QLearningAgent, SavedAgent};
/// use std::path::Path;
///
/// let repo = MsgPackRepository;
/// let agent = QLearningAgent::new(QAgentConfig::default())?;
/// let saved = SavedAgent::from_agent(&agent, Default::default(), Default::default());
///
/// // Save snapshot
/// repo.save(&saved, Path::new("learning_data.msgpack"))?;
///
/// // Load snapshot (None when the file does not exist)
/// let loaded = repo.load(Path::new("learning_data.msgpack"))?;
/// # Ok::<(), dinoq::Error>(())
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPackRepository;

impl MsgPackRepository {
    /// Create a new MessagePack repository.
    pub fn new() -> Self {
        Self
    }
}

/// Lowercase SHA-256 hex digest of the given bytes.
fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

impl SnapshotRepository for MsgPackRepository {
    fn save(&self, saved: &SavedAgent, path: &Path) -> Result<()> {
        let payload = rmp_serde::to_vec(saved).map_err(|e| Error::SerializationContext {
            operation: "serialize snapshot to MessagePack".to_string(),
            message: e.to_string(),
        })?;

        let envelope = SnapshotEnvelope {
            checksum: sha256_hex(&payload),
            payload,
        };

        let bytes = rmp_serde::to_vec(&envelope).map_err(|e| Error::SerializationContext {
            operation: "serialize snapshot envelope to MessagePack".to_string(),
            message: e.to_string(),
        })?;

        atomic_write(path, &bytes)
    }

    fn load(&self, path: &Path) -> Result<Option<SavedAgent>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(Error::Io {
                    operation: format!("read snapshot file {path:?}"),
                    source,
                });
            }
        };

        let envelope: SnapshotEnvelope =
            rmp_serde::from_slice(&bytes).map_err(|e| Error::SnapshotCorrupt {
                path: path.display().to_string(),
                reason: format!("envelope decode failed: {e}"),
            })?;

        let computed = sha256_hex(&envelope.payload);
        if computed != envelope.checksum {
            return Err(Error::SnapshotCorrupt {
                path: path.display().to_string(),
                reason: format!(
                    "checksum mismatch (stored {}, computed {})",
                    envelope.checksum, computed
                ),
            });
        }

        let saved =
            rmp_serde::from_slice(&envelope.payload).map_err(|e| Error::SnapshotCorrupt {
                path: path.display().to_string(),
                reason: format!("payload decode failed: {e}"),
            })?;

        Ok(Some(saved))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::q_learning::{QAgentConfig, QLearningAgent};
    use crate::runner::{EncodedObstacle, SpeedBand, StateKey};
    use crate::types::{Action, ObstacleKind};

    fn sample_agent() -> QLearningAgent {
        let mut agent = QLearningAgent::new(QAgentConfig::default())
            .expect("Failed to create agent")
            .with_seed(7);
        let key = StateKey {
            speed: SpeedBand::Medium,
            first: EncodedObstacle {
                kind: ObstacleKind::SmallCactus,
                x_bin: 4,
                y_bin: 0,
            },
            second: EncodedObstacle::NONE,
        };
        agent.update_with_reward(key, Action::Jump, 1.0, &key, false);
        agent
    }

    #[test]
    fn test_msgpack_roundtrip() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let file_path = temp_dir.path().join("test_snapshot.msgpack");

        let repo = MsgPackRepository::new();
        let agent = sample_agent();
        let saved = SavedAgent::from_agent(&agent, Default::default(), Default::default());

        repo.save(&saved, &file_path).expect("Failed to save");
        let loaded = repo
            .load(&file_path)
            .expect("Failed to load")
            .expect("Snapshot should exist");

        assert_eq!(loaded.entries.len(), saved.entries.len());
        assert_eq!(loaded.epsilon, saved.epsilon);
        assert_eq!(loaded.rng_seed, Some(7));
    }

    #[test]
    fn test_load_nonexistent_returns_none() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let repo = MsgPackRepository::new();
        let result = repo
            .load(&temp_dir.path().join("nonexistent.msgpack"))
            .expect("Missing file should not be an error");
        assert!(result.is_none());
    }

    #[test]
    fn test_corrupt_file_is_rejected() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let file_path = temp_dir.path().join("test_snapshot.msgpack");

        let repo = MsgPackRepository::new();
        let agent = sample_agent();
        let saved = SavedAgent::from_agent(&agent, Default::default(), Default::default());
        repo.save(&saved, &file_path).expect("Failed to save");

        // Flip a byte near the end, inside the payload.
        let mut bytes = fs::read(&file_path).expect("Failed to read back");
        let last = bytes.len() - 3;
        bytes[last] ^= 0xFF;
        fs::write(&file_path, &bytes).expect("Failed to rewrite");

        let result = repo.load(&file_path);
        assert!(matches!(result, Err(Error::SnapshotCorrupt { .. })));
    }

    #[test]
    fn test_garbage_file_is_rejected() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let file_path = temp_dir.path().join("garbage.msgpack");
        fs::write(&file_path, b"not a snapshot at all").expect("Failed to write");

        let repo = MsgPackRepository::new();
        let result = repo.load(&file_path);
        assert!(matches!(result, Err(Error::SnapshotCorrupt { .. })));
    }

    #[test]
    fn test_save_overwrites_previous_snapshot() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let file_path = temp_dir.path().join("test_snapshot.msgpack");

        let repo = MsgPackRepository::new();
        let first = sample_agent();
        repo.save(
            &SavedAgent::from_agent(&first, Default::default(), Default::default()),
            &file_path,
        )
        .expect("Failed to save first");

        let mut second = sample_agent();
        second.end_episode();
        repo.save(
            &SavedAgent::from_agent(&second, Default::default(), Default::default()),
            &file_path,
        )
        .expect("Failed to save second");

        let loaded = repo
            .load(&file_path)
            .expect("Failed to load")
            .expect("Snapshot should exist");
        assert_eq!(loaded.epsilon, second.epsilon());
    }

    #[test]
    fn test_save_to_invalid_path_returns_error() {
        let repo = MsgPackRepository::new();
        let agent = sample_agent();
        let saved = SavedAgent::from_agent(&agent, Default::default(), Default::default());
        let result = repo.save(&saved, Path::new("/invalid_dir_12345/file.msgpack"));
        assert!(result.is_err());
    }
}
