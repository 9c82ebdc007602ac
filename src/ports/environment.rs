//! Environment port - abstraction over the game being played
//!
//! This port hides where the game actually runs. The training pipeline
//! only ever sees tick reports: an implementation may advance a local
//! simulation or poll a real browser tab, as long as it yields one
//! report per submitted action.

use crate::runner::TickReport;
use crate::types::Action;
use crate::Result;

/// Environment trait - one playable game instance
///
/// The lifecycle is `reset` once per run, then `step` per tick until a
/// report comes back with `crashed` set (or the caller stops early).
pub trait Environment {
    /// Get the environment's name, used in logs and saved metadata.
    fn name(&self) -> &str;

    /// Start a new run and return its first tick report.
    ///
    /// # Errors
    ///
    /// Returns an error if the game cannot be (re)started.
    fn reset(&mut self) -> Result<TickReport>;

    /// Submit one action and advance the game by one tick.
    ///
    /// # Errors
    ///
    /// Returns an error if the game cannot be polled or driven.
    fn step(&mut self, action: Action) -> Result<TickReport>;
}
