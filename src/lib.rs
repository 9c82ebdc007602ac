//! Chrome Dino runner bot: tabular reinforcement learning and adaptive heuristics
//!
//! This crate provides:
//! - A state encoder folding raw game observations into discrete state keys
//! - A tabular Q-learning agent with epsilon-greedy exploration and
//!   whole-table snapshot persistence
//! - An adaptive jump-threshold heuristic as a learning-free alternative
//! - A simulated obstacle course for training without a browser
//! - A training pipeline with pluggable observers and snapshot repositories

pub mod adapters;
pub mod cli;
pub mod error;
pub mod pipeline;
pub mod ports;
pub mod q_learning;
pub mod runner;
pub mod stats;
pub mod threshold;
pub mod types;
pub mod utils;

pub use error::{Error, Result};
pub use types::{Action, ObstacleKind};
