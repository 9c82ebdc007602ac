//! Raw per-tick game observations.
//!
//! These types mirror what the driver layer scrapes from the running game
//! each tick: the current speed, the obstacles ahead, how far the dino has
//! run, and whether it has crashed. Nothing here is discretized; that is
//! the job of [`crate::runner::encoder`].

use serde::{Deserialize, Serialize};

use crate::types::ObstacleKind;

/// One obstacle as reported by the game, in screen coordinates.
///
/// `x` is the horizontal distance from the dino (larger is farther away),
/// `y` the vertical position measured from the top of the canvas (larger
/// is closer to the ground).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub kind: ObstacleKind,
    pub x: f64,
    pub y: f64,
}

impl Obstacle {
    pub fn new(kind: ObstacleKind, x: f64, y: f64) -> Self {
        Obstacle { kind, x, y }
    }
}

/// Everything the bot can see in a single tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Current game speed in the game's own units.
    pub speed: f64,
    /// Obstacles ahead of the dino, nearest first.
    pub obstacles: Vec<Obstacle>,
}

impl Observation {
    pub fn new(speed: f64, obstacles: Vec<Obstacle>) -> Self {
        Observation { speed, obstacles }
    }

    /// An observation with no obstacles in sight.
    pub fn clear_road(speed: f64) -> Self {
        Observation {
            speed,
            obstacles: Vec::new(),
        }
    }

    /// The nearest obstacle, if any.
    pub fn first(&self) -> Option<&Obstacle> {
        self.obstacles.first()
    }

    /// The second-nearest obstacle, if any.
    pub fn second(&self) -> Option<&Obstacle> {
        self.obstacles.get(1)
    }

    fn first_kind(&self) -> ObstacleKind {
        self.first().map_or(ObstacleKind::None, |o| o.kind)
    }
}

/// One tick of game output: the observation plus the run bookkeeping
/// that goes with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    pub observation: Observation,
    /// Total distance covered in this run so far.
    pub distance_ran: f64,
    /// Whether the dino crashed on this tick. A crashed report is terminal;
    /// the environment must be reset before stepping again.
    pub crashed: bool,
}

impl TickReport {
    pub fn new(observation: Observation, distance_ran: f64, crashed: bool) -> Self {
        TickReport {
            observation,
            distance_ran,
            crashed,
        }
    }
}

/// Heuristic check for whether an obstacle was cleared between two
/// consecutive ticks.
///
/// The game gives no explicit "obstacle passed" signal, so this compares
/// the nearest obstacle's kind across ticks: if a real obstacle was ahead
/// and the nearest kind changed (or the road emptied), the old one is
/// behind us. Two identical obstacles in a row read as one, so the pass
/// count can run slightly low.
pub fn obstacle_passed(before: &Observation, after: &Observation) -> bool {
    let old_kind = before.first_kind();
    old_kind.is_present() && after.first_kind() != old_kind
}
