//! Controller port - abstraction for different playing strategies
//!
//! This port defines the interface that anything steering the dino must
//! implement, allowing the same game loop to drive:
//! - The tabular Q-learner
//! - The adaptive threshold heuristic
//! - Frozen policies used for evaluation

use crate::runner::Observation;
use crate::types::Action;
use crate::Result;

/// One completed transition, handed to a controller after every tick.
///
/// `before` is the frame the action was chosen in, `after` the frame the
/// game produced in response. `passed_obstacle` is derived by the game
/// loop from consecutive frames, since the game itself never announces
/// passes.
#[derive(Debug, Clone, Copy)]
pub struct Transition<'a> {
    pub before: &'a Observation,
    pub action: Action,
    pub after: &'a Observation,
    pub crashed: bool,
    pub passed_obstacle: bool,
    /// Distance covered in the run up to and including this tick.
    pub distance_ran: f64,
}

/// Controller trait - Unified interface for playing strategies
///
/// This trait represents a **port** in hexagonal architecture: the game
/// loop is written against it, and each strategy is an adapter behind
/// it. Controllers that learn digest transitions in [`Controller::learn`];
/// fixed policies keep the default no-op.
pub trait Controller: Send {
    /// Get the controller's name, used in logs and saved metadata.
    fn name(&self) -> &str;

    /// Choose the input for the current frame.
    fn act(&mut self, observation: &Observation) -> Action;

    /// Digest one completed transition.
    ///
    /// Called once per tick, after the environment has applied the action
    /// chosen in [`Controller::act`]. The transition with `crashed` set
    /// is the last one of the run.
    ///
    /// # Default Implementation
    ///
    /// Does nothing, suitable for non-adaptive controllers.
    fn learn(&mut self, _transition: &Transition<'_>) -> Result<()> {
        Ok(())
    }

    /// Called when a run ends, before the environment resets.
    ///
    /// Adaptive controllers roll their per-run state over here (for the
    /// Q-learner, this is where epsilon decays).
    ///
    /// # Default Implementation
    ///
    /// Does nothing.
    fn end_episode(&mut self) -> Result<()> {
        Ok(())
    }

    /// Current exploration rate, if the controller has one.
    ///
    /// # Default Implementation
    ///
    /// Returns `None`, suitable for deterministic controllers.
    fn epsilon(&self) -> Option<f64> {
        None
    }

    /// Enable downcasting to concrete types, e.g. to reach the underlying
    /// agent when saving a snapshot.
    fn as_any(&self) -> &dyn std::any::Any;
}
