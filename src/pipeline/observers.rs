//! Observer pattern for training pipelines
//!
//! Observers allow composable data collection during training without
//! coupling training logic to specific output formats.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};

use crate::{
    Result,
    ports::{EpisodeRecord, Observer},
};

/// Progress bar observer - Shows training progress
///
/// Each `run()` call gets its own bar; the headline numbers in the bar
/// message accumulate across calls so checkpointed sessions still show
/// lifetime bests.
pub struct ProgressObserver {
    progress_bar: Option<ProgressBar>,
    best_distance: f64,
    total_obstacles: u64,
    last_epsilon: Option<f64>,
}

impl ProgressObserver {
    /// Create a new progress observer
    pub fn new() -> Self {
        Self {
            progress_bar: None,
            best_distance: 0.0,
            total_obstacles: 0,
            last_epsilon: None,
        }
    }

    fn message(&self) -> String {
        match self.last_epsilon {
            Some(eps) => format!(
                "best {:.0}, passed {}, eps {:.3}",
                self.best_distance, self.total_obstacles, eps
            ),
            None => format!("best {:.0}, passed {}", self.best_distance, self.total_obstacles),
        }
    }
}

impl Default for ProgressObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl Observer for ProgressObserver {
    fn on_training_start(&mut self, total_episodes: usize) -> Result<()> {
        let pb = ProgressBar::new(total_episodes as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} runs ({msg})")
                .map_err(|e| crate::Error::ProgressBarTemplate {
                    message: e.to_string(),
                })?
                .progress_chars("=>-"),
        );
        self.progress_bar = Some(pb);
        Ok(())
    }

    fn on_episode_end(&mut self, record: &EpisodeRecord) -> Result<()> {
        if record.distance_ran > self.best_distance {
            self.best_distance = record.distance_ran;
        }
        self.total_obstacles += record.obstacles_passed;
        self.last_epsilon = record.epsilon;

        if let Some(pb) = &self.progress_bar {
            pb.inc(1);
            pb.set_message(self.message());
        }
        Ok(())
    }

    fn on_training_end(&mut self) -> Result<()> {
        if let Some(pb) = &self.progress_bar {
            pb.finish_with_message(self.message());
        }
        Ok(())
    }
}

/// Metrics observer - Tracks training metrics
///
/// Accumulates across repeated `run()` calls, so a checkpointed session
/// reports one coherent set of numbers at the end.
pub struct MetricsObserver {
    episodes: u64,
    crashes: u64,
    total_ticks: u64,
    total_distance: f64,
    best_distance: f64,
    total_obstacles_passed: u64,
    final_epsilon: Option<f64>,
}

impl MetricsObserver {
    /// Create a new metrics observer
    pub fn new() -> Self {
        Self {
            episodes: 0,
            crashes: 0,
            total_ticks: 0,
            total_distance: 0.0,
            best_distance: 0.0,
            total_obstacles_passed: 0,
            final_epsilon: None,
        }
    }

    /// Get current crash rate
    pub fn crash_rate(&self) -> f64 {
        if self.episodes == 0 {
            0.0
        } else {
            self.crashes as f64 / self.episodes as f64
        }
    }

    /// Get average distance per run
    pub fn mean_distance(&self) -> f64 {
        if self.episodes == 0 {
            0.0
        } else {
            self.total_distance / self.episodes as f64
        }
    }

    /// Get average run length in ticks
    pub fn mean_ticks(&self) -> f64 {
        if self.episodes == 0 {
            0.0
        } else {
            self.total_ticks as f64 / self.episodes as f64
        }
    }

    /// Get metrics summary
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            episodes: self.episodes,
            crashes: self.crashes,
            total_ticks: self.total_ticks,
            total_obstacles_passed: self.total_obstacles_passed,
            best_distance: self.best_distance,
            mean_distance: self.mean_distance(),
            mean_ticks: self.mean_ticks(),
            crash_rate: self.crash_rate(),
            final_epsilon: self.final_epsilon,
        }
    }
}

/// Summary of training metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub episodes: u64,
    pub crashes: u64,
    pub total_ticks: u64,
    pub total_obstacles_passed: u64,
    pub best_distance: f64,
    pub mean_distance: f64,
    pub mean_ticks: f64,
    pub crash_rate: f64,
    pub final_epsilon: Option<f64>,
}

impl Default for MetricsObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl Observer for MetricsObserver {
    fn on_episode_end(&mut self, record: &EpisodeRecord) -> Result<()> {
        self.episodes += 1;
        self.total_ticks += record.ticks;
        self.total_distance += record.distance_ran;
        self.total_obstacles_passed += record.obstacles_passed;
        if record.crashed {
            self.crashes += 1;
        }
        if record.distance_ran > self.best_distance {
            self.best_distance = record.distance_ran;
        }
        self.final_epsilon = record.epsilon;
        Ok(())
    }
}

/// JSONL observer - Exports run records to JSON Lines format
///
/// One record per line, flushed as it is written, so a killed session
/// still leaves a usable trace behind.
pub struct JsonlObserver {
    writer: BufWriter<File>,
}

impl JsonlObserver {
    /// Create a new JSONL observer
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        Ok(Self { writer })
    }
}

impl Observer for JsonlObserver {
    fn on_episode_end(&mut self, record: &EpisodeRecord) -> Result<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        writeln!(&mut self.writer)?;
        self.writer.flush()?;
        Ok(())
    }
}
