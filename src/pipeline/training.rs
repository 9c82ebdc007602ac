//! Training pipeline for runner controllers

use serde::{Deserialize, Serialize};

use crate::{
    Result,
    ports::{Controller, Environment, EpisodeRecord, Observer, Transition},
    runner::obstacle_passed,
    stats::RunStats,
};

/// Training configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Number of runs per `run()` call
    pub episodes: usize,

    /// Safety cap on ticks per run, so a policy that never crashes still
    /// terminates
    pub max_ticks_per_episode: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            episodes: 50,
            max_ticks_per_episode: 10_000,
        }
    }
}

/// Result of a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingResult {
    /// Total runs played
    pub episodes: u64,

    /// Total ticks across all runs
    pub total_ticks: u64,

    /// Obstacles cleared across all runs
    pub total_obstacles_passed: u64,

    /// Runs that ended in a crash (the rest hit the tick cap)
    pub crashes: u64,

    /// Longest single-run distance
    pub best_distance: f64,

    /// Sum of all run distances
    pub total_distance: f64,

    /// Mean distance per run
    pub mean_distance: f64,

    /// Controller's exploration rate after the last run, if it has one
    pub final_epsilon: Option<f64>,
}

impl TrainingResult {
    /// Build a result from accumulated run statistics.
    pub fn from_stats(
        stats: &RunStats,
        total_ticks: u64,
        crashes: u64,
        final_epsilon: Option<f64>,
    ) -> Self {
        Self {
            episodes: stats.episodes,
            total_ticks,
            total_obstacles_passed: stats.total_obstacles_passed,
            crashes,
            best_distance: stats.best_distance,
            total_distance: stats.total_distance,
            mean_distance: stats.mean_distance(),
            final_epsilon,
        }
    }

    /// The run counters in mergeable form.
    pub fn stats(&self) -> RunStats {
        RunStats {
            episodes: self.episodes,
            total_obstacles_passed: self.total_obstacles_passed,
            best_distance: self.best_distance,
            total_distance: self.total_distance,
        }
    }

    /// Save result to JSON file
    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    /// Load result from JSON file
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let result = serde_json::from_reader(file)?;
        Ok(result)
    }
}

/// Training pipeline driving one controller through one environment
///
/// The pipeline owns the tick loop: it asks the controller for an action,
/// steps the environment, derives transition facts (crash, obstacle pass)
/// from consecutive observations, and hands the transition back to the
/// controller to learn from. Persistence stays outside; callers snapshot
/// the controller's state between `run()` calls if they want checkpoints.
///
/// Repeated `run()` calls continue the same session: observers stay
/// attached and episode numbering carries on where the last call stopped.
pub struct TrainingPipeline {
    config: TrainingConfig,
    observers: Vec<Box<dyn Observer>>,
    next_episode: u64,
}

impl TrainingPipeline {
    /// Create a new training pipeline
    pub fn new(config: TrainingConfig) -> Self {
        Self {
            config,
            observers: Vec::new(),
            next_episode: 0,
        }
    }

    /// Add an observer to the pipeline
    pub fn with_observer(mut self, observer: Box<dyn Observer>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Start episode numbering at `first_episode` instead of zero.
    ///
    /// Resumed sessions use this so run records continue the lifetime
    /// count from the snapshot.
    pub fn with_first_episode(mut self, first_episode: u64) -> Self {
        self.next_episode = first_episode;
        self
    }

    /// Change how many episodes the next `run()` call plays.
    ///
    /// Checkpointed sessions use this for a final chunk shorter than the
    /// checkpoint interval.
    pub fn set_episodes(&mut self, episodes: usize) {
        self.config.episodes = episodes;
    }

    /// Run training with the given controller and environment
    pub fn run(
        &mut self,
        controller: &mut dyn Controller,
        environment: &mut dyn Environment,
    ) -> Result<TrainingResult> {
        let mut stats = RunStats::default();
        let mut total_ticks: u64 = 0;
        let mut crashes: u64 = 0;

        // Notify observers of training start
        for observer in &mut self.observers {
            observer.on_training_start(self.config.episodes)?;
        }

        for _ in 0..self.config.episodes {
            let record = self.run_episode(controller, environment)?;

            stats.record_episode(record.distance_ran, record.obstacles_passed);
            total_ticks += record.ticks;
            if record.crashed {
                crashes += 1;
            }

            // Notify observers of episode end
            for observer in &mut self.observers {
                observer.on_episode_end(&record)?;
            }
        }

        // Notify observers of training end
        for observer in &mut self.observers {
            observer.on_training_end()?;
        }

        Ok(TrainingResult::from_stats(
            &stats,
            total_ticks,
            crashes,
            controller.epsilon(),
        ))
    }

    fn run_episode(
        &mut self,
        controller: &mut dyn Controller,
        environment: &mut dyn Environment,
    ) -> Result<EpisodeRecord> {
        let episode = self.next_episode;
        self.next_episode += 1;

        let mut report = environment.reset()?;
        let mut ticks: u64 = 0;
        let mut obstacles_passed: u64 = 0;

        while ticks < self.config.max_ticks_per_episode {
            let action = controller.act(&report.observation);
            let next = environment.step(action)?;
            ticks += 1;

            let passed = obstacle_passed(&report.observation, &next.observation);
            if passed {
                obstacles_passed += 1;
            }

            let transition = Transition {
                before: &report.observation,
                action,
                after: &next.observation,
                crashed: next.crashed,
                passed_obstacle: passed,
                distance_ran: next.distance_ran,
            };
            controller.learn(&transition)?;

            let crashed = next.crashed;
            report = next;
            if crashed {
                break;
            }
        }

        controller.end_episode()?;

        Ok(EpisodeRecord {
            episode,
            ticks,
            distance_ran: report.distance_ran,
            obstacles_passed,
            crashed: report.crashed,
            epsilon: controller.epsilon(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::controllers::RandomController;
    use crate::runner::SimulatedCourse;

    #[test]
    fn test_training_pipeline_runs_requested_episodes() {
        let config = TrainingConfig {
            episodes: 10,
            max_ticks_per_episode: 2_000,
        };

        let mut pipeline = TrainingPipeline::new(config);
        let mut controller = RandomController::with_seed(42);
        let mut course = SimulatedCourse::with_seed(42);

        let result = pipeline.run(&mut controller, &mut course).unwrap();

        assert_eq!(result.episodes, 10);
        assert!(result.total_ticks >= 10);
        assert!(result.best_distance > 0.0);
        assert!(result.total_distance >= result.best_distance);
        assert_eq!(result.final_epsilon, None);
    }

    #[test]
    fn test_episode_numbering_continues_across_runs() {
        use std::sync::{Arc, Mutex};

        struct EpisodeLog(Arc<Mutex<Vec<u64>>>);
        impl Observer for EpisodeLog {
            fn on_episode_end(&mut self, record: &EpisodeRecord) -> Result<()> {
                self.0.lock().unwrap().push(record.episode);
                Ok(())
            }
        }

        let log = Arc::new(Mutex::new(Vec::new()));
        let config = TrainingConfig {
            episodes: 3,
            max_ticks_per_episode: 500,
        };
        let mut pipeline =
            TrainingPipeline::new(config).with_observer(Box::new(EpisodeLog(Arc::clone(&log))));
        let mut controller = RandomController::with_seed(1);
        let mut course = SimulatedCourse::with_seed(1);

        pipeline.run(&mut controller, &mut course).unwrap();
        pipeline.run(&mut controller, &mut course).unwrap();

        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_tick_cap_ends_episode_without_crash() {
        struct CapObserver {
            crashed: Vec<bool>,
        }
        impl Observer for CapObserver {
            fn on_episode_end(&mut self, record: &EpisodeRecord) -> Result<()> {
                self.crashed.push(record.crashed);
                Ok(())
            }
        }

        // A one-tick cap: no run can reach an obstacle that fast.
        let config = TrainingConfig {
            episodes: 2,
            max_ticks_per_episode: 1,
        };
        let mut pipeline = TrainingPipeline::new(config);
        let mut controller = RandomController::with_seed(5);
        let mut course = SimulatedCourse::with_seed(5);

        let result = pipeline.run(&mut controller, &mut course).unwrap();

        assert_eq!(result.episodes, 2);
        assert_eq!(result.crashes, 0);
        assert_eq!(result.total_ticks, 2);
    }
}
