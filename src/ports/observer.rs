//! Observer port - abstraction for training observation and data collection
//!
//! This port defines the interface for observing training events,
//! allowing composable data collection without coupling the game loop
//! to specific output formats or metrics.

use serde::{Deserialize, Serialize};

use crate::Result;

/// Summary of one finished run, handed to observers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpisodeRecord {
    /// Zero-based index of the run within this session.
    pub episode: u64,
    /// Ticks the run lasted.
    pub ticks: u64,
    /// Distance covered before the run ended.
    pub distance_ran: f64,
    /// Obstacles cleared during the run.
    pub obstacles_passed: u64,
    /// Whether the run ended in a crash (as opposed to a tick cap).
    pub crashed: bool,
    /// Controller's exploration rate after the run, if it has one.
    pub epsilon: Option<f64>,
}

/// Observer trait for monitoring training
///
/// Observers can be composed to collect different views of the same
/// session: a progress bar for the terminal, a JSONL trace for later
/// analysis, aggregate metrics for the final summary.
///
/// # Event Sequence
///
/// 1. `on_training_start(total_episodes)` - once at the beginning
/// 2. `on_episode_end(record)` - once per finished run
/// 3. `on_training_end()` - once at the end
pub trait Observer: Send {
    /// Called when training starts.
    ///
    /// # Default Implementation
    ///
    /// Does nothing. Override to initialize observation state.
    fn on_training_start(&mut self, _total_episodes: usize) -> Result<()> {
        Ok(())
    }

    /// Called when a run finishes, crash or tick cap alike.
    ///
    /// # Default Implementation
    ///
    /// Does nothing. Override to record per-run results.
    fn on_episode_end(&mut self, _record: &EpisodeRecord) -> Result<()> {
        Ok(())
    }

    /// Called when training completes.
    ///
    /// Use this to finalize outputs, flush files, or display summaries.
    ///
    /// # Default Implementation
    ///
    /// Does nothing.
    fn on_training_end(&mut self) -> Result<()> {
        Ok(())
    }
}
