//! Training and evaluation pipeline abstractions
//!
//! This module provides composable pipelines for:
//! - Training controllers on an environment
//! - Evaluating frozen policies
//! - Recording run records during training

pub mod controllers;
pub mod observers;
pub mod training;

// Re-export controller implementations (adapters)
pub use controllers::{QLearnerController, RandomController, ThresholdController};
// Re-export observer implementations (adapters)
pub use observers::{JsonlObserver, MetricsObserver, MetricsSummary, ProgressObserver};
pub use training::{TrainingConfig, TrainingPipeline, TrainingResult};

pub use crate::ports::{Controller, Environment, EpisodeRecord, Observer};
