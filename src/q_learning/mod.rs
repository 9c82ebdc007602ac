//! Tabular Q-learning over encoded runner states
//!
//! This module implements off-policy temporal difference (TD) control for
//! the runner: a value table over discrete state keys, an epsilon-greedy
//! agent that owns it, and a whole-table snapshot format for pausing and
//! resuming training across sessions.
//!
//! ## Update rule
//!
//! Every transition applies one fixed-rate update:
//!
//! ```text
//! Q(s,a) ← Q(s,a) + α[r + γ max_a' Q(s',a') - Q(s,a)]
//! ```
//!
//! Crashes are terminal, so their target is the crash penalty alone. With
//! estimates starting at zero this keeps every value inside the reward
//! bounds and makes crash updates strictly downward revisions.

pub mod agent;
pub mod q_table;
pub mod serialization;

// Public re-exports
pub use agent::{QAgentConfig, QLearningAgent, RewardSchedule};
pub use q_table::{ActionValues, QTable};
pub use serialization::{ResumedAgent, SavedAgent, TableEntry, TrainingMetadata};
