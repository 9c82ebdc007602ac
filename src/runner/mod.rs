//! Runner-game domain model
//!
//! This module covers everything the bot knows about the game itself:
//!
//! - Raw per-tick observations as the driver layer scrapes them
//! - The state encoder that folds raw observations into a small discrete
//!   key space suitable for tabular learning
//! - A simulated obstacle course used for offline training and tests

pub mod course;
pub mod encoder;
pub mod observation;

// Public re-exports
pub use course::{CourseConfig, SimulatedCourse};
pub use encoder::{EncodedObstacle, EncoderConfig, SpeedBand, SpeedBands, StateEncoder, StateKey};
pub use observation::{obstacle_passed, Observation, Obstacle, TickReport};
