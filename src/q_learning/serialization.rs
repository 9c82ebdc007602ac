//! Snapshot format and resume logic for Q-learning agents.
//!
//! A snapshot is the whole agent at rest: config, exploration state,
//! every table row in ascending key order, lifetime stats, and a little
//! provenance. Sorting the rows makes two snapshots of the same agent
//! byte-identical, so exports and checksums are stable.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::ports::SnapshotRepository;
use crate::q_learning::agent::{QAgentConfig, QLearningAgent};
use crate::q_learning::q_table::ActionValues;
use crate::runner::StateKey;
use crate::stats::RunStats;
use crate::{Error, Result};

/// One persisted table row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TableEntry {
    pub key: StateKey,
    pub values: ActionValues,
}

/// Provenance recorded alongside a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetadata {
    /// Episodes the agent had completed when saved.
    pub episodes_trained: u64,
    /// Name of the environment the agent was trained against.
    pub environment: Option<String>,
    /// RNG seed used for training, if fixed.
    pub seed: Option<u64>,
    /// Timestamp of the save, if the caller recorded one.
    pub saved_at: Option<String>,
}

/// A complete agent snapshot, ready for serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedAgent {
    pub version: u32,
    pub config: QAgentConfig,
    pub epsilon: f64,
    pub rng_seed: Option<u64>,
    /// Table rows in ascending key order.
    pub entries: Vec<TableEntry>,
    pub stats: RunStats,
    pub metadata: TrainingMetadata,
}

/// Result of [`SavedAgent::resume_or_new`].
pub struct ResumedAgent {
    pub agent: QLearningAgent,
    pub stats: RunStats,
    pub metadata: TrainingMetadata,
    /// Whether a usable snapshot was found and restored.
    pub resumed: bool,
}

impl SavedAgent {
    pub const VERSION: u32 = 1;

    /// Capture an agent and its bookkeeping into a snapshot.
    pub fn from_agent(
        agent: &QLearningAgent,
        stats: RunStats,
        metadata: TrainingMetadata,
    ) -> Self {
        let entries = agent
            .table()
            .entries_sorted()
            .into_iter()
            .map(|(key, values)| TableEntry { key, values })
            .collect();
        Self {
            version: Self::VERSION,
            config: agent.config().clone(),
            epsilon: agent.epsilon(),
            rng_seed: agent.rng_seed(),
            entries,
            stats,
            metadata,
        }
    }

    /// Rebuild the live agent from this snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SnapshotVersion`] for an unknown format version
    /// and [`Error::InvalidConfiguration`] if the saved config does not
    /// validate.
    pub fn into_agent(self) -> Result<(QLearningAgent, RunStats, TrainingMetadata)> {
        if self.version != Self::VERSION {
            return Err(Error::SnapshotVersion {
                found: self.version,
                expected: Self::VERSION,
            });
        }
        let entries = self
            .entries
            .into_iter()
            .map(|entry| (entry.key, entry.values))
            .collect();
        let agent =
            QLearningAgent::from_parts(self.config, self.epsilon, entries, self.rng_seed)?;
        Ok((agent, self.stats, self.metadata))
    }

    /// Check the saved config against the one requested for this session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SnapshotConfigMismatch`] naming the first field
    /// that differs.
    pub fn check_config(&self, requested: &QAgentConfig) -> Result<()> {
        let saved = &self.config;
        let fields: [(&str, f64, f64); 9] = [
            ("learning rate", saved.learning_rate, requested.learning_rate),
            (
                "discount factor",
                saved.discount_factor,
                requested.discount_factor,
            ),
            (
                "initial epsilon",
                saved.initial_epsilon,
                requested.initial_epsilon,
            ),
            ("epsilon decay", saved.epsilon_decay, requested.epsilon_decay),
            ("minimum epsilon", saved.min_epsilon, requested.min_epsilon),
            (
                "survival reward",
                saved.rewards.survive,
                requested.rewards.survive,
            ),
            (
                "obstacle pass reward",
                saved.rewards.obstacle_pass,
                requested.rewards.obstacle_pass,
            ),
            (
                "streak bonus",
                saved.rewards.streak_bonus,
                requested.rewards.streak_bonus,
            ),
            ("crash penalty", saved.rewards.crash, requested.rewards.crash),
        ];
        for (field, saved_value, requested_value) in fields {
            if saved_value != requested_value {
                return Err(Error::SnapshotConfigMismatch {
                    field: field.to_string(),
                    saved: saved_value.to_string(),
                    requested: requested_value.to_string(),
                });
            }
        }
        if saved.rewards.streak_every != requested.rewards.streak_every {
            return Err(Error::SnapshotConfigMismatch {
                field: "streak length".to_string(),
                saved: saved.rewards.streak_every.to_string(),
                requested: requested.rewards.streak_every.to_string(),
            });
        }
        Ok(())
    }

    /// Resume from a snapshot if one is usable, otherwise start cold.
    ///
    /// Missing and unreadable snapshots both fall back to a fresh agent
    /// (the latter with a warning); only a config mismatch without
    /// `adopt_saved_config` is surfaced, because silently training with
    /// different hyperparameters than the table was built with corrupts
    /// the estimates.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SnapshotConfigMismatch`] as described above, or
    /// [`Error::InvalidConfiguration`] if `config` itself is unusable.
    pub fn resume_or_new<R>(
        repo: &R,
        path: &Path,
        config: QAgentConfig,
        adopt_saved_config: bool,
    ) -> Result<ResumedAgent>
    where
        R: SnapshotRepository + ?Sized,
    {
        let saved = match repo.load(path) {
            Ok(Some(saved)) => saved,
            Ok(None) => {
                info!("no snapshot at {}, starting cold", path.display());
                return Self::fresh(config);
            }
            Err(err) => {
                warn!(
                    "discarding unreadable snapshot at {}: {err}",
                    path.display()
                );
                return Self::fresh(config);
            }
        };

        if saved.version != Self::VERSION {
            warn!(
                "discarding snapshot at {} with unsupported version {}",
                path.display(),
                saved.version
            );
            return Self::fresh(config);
        }

        if let Err(mismatch) = saved.check_config(&config) {
            if !adopt_saved_config {
                return Err(mismatch);
            }
            info!("adopting saved config from {}: {mismatch}", path.display());
        }

        match saved.into_agent() {
            Ok((agent, stats, metadata)) => {
                info!(
                    "resumed snapshot from {} ({} states, epsilon {:.3})",
                    path.display(),
                    agent.table().len(),
                    agent.epsilon()
                );
                Ok(ResumedAgent {
                    agent,
                    stats,
                    metadata,
                    resumed: true,
                })
            }
            Err(err) => {
                warn!(
                    "discarding unusable snapshot at {}: {err}",
                    path.display()
                );
                Self::fresh(config)
            }
        }
    }

    fn fresh(config: QAgentConfig) -> Result<ResumedAgent> {
        Ok(ResumedAgent {
            agent: QLearningAgent::new(config)?,
            stats: RunStats::default(),
            metadata: TrainingMetadata::default(),
            resumed: false,
        })
    }
}
