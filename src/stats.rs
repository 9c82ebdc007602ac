//! Lifetime run statistics carried alongside the learned table.

use serde::{Deserialize, Serialize};

/// Counters accumulated over every run an agent has played.
///
/// These travel with the agent snapshot so a resumed session continues
/// the same history instead of starting its bookkeeping over.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RunStats {
    /// Completed runs (each ends in a crash or a tick cap).
    pub episodes: u64,
    /// Obstacles cleared across all runs.
    pub total_obstacles_passed: u64,
    /// Longest single-run distance seen so far.
    pub best_distance: f64,
    /// Sum of all run distances, for the lifetime mean.
    pub total_distance: f64,
}

impl RunStats {
    /// Fold one finished run into the counters.
    pub fn record_episode(&mut self, distance: f64, obstacles_passed: u64) {
        self.episodes += 1;
        self.total_obstacles_passed += obstacles_passed;
        self.total_distance += distance;
        if distance > self.best_distance {
            self.best_distance = distance;
        }
    }

    /// Mean distance per run, `0.0` before any run finished.
    pub fn mean_distance(&self) -> f64 {
        if self.episodes == 0 {
            return 0.0;
        }
        self.total_distance / self.episodes as f64
    }

    /// Fold another batch of runs into these counters.
    pub fn merge(&mut self, other: &RunStats) {
        self.episodes += other.episodes;
        self.total_obstacles_passed += other.total_obstacles_passed;
        self.total_distance += other.total_distance;
        if other.best_distance > self.best_distance {
            self.best_distance = other.best_distance;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_episode_accumulates() {
        let mut stats = RunStats::default();
        stats.record_episode(100.0, 3);
        stats.record_episode(300.0, 7);
        stats.record_episode(200.0, 5);

        assert_eq!(stats.episodes, 3);
        assert_eq!(stats.total_obstacles_passed, 15);
        assert_eq!(stats.best_distance, 300.0);
        assert!((stats.mean_distance() - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_mean_distance_of_fresh_stats() {
        assert_eq!(RunStats::default().mean_distance(), 0.0);
    }

    #[test]
    fn test_merge_combines_batches() {
        let mut lifetime = RunStats::default();
        lifetime.record_episode(400.0, 9);

        let mut batch = RunStats::default();
        batch.record_episode(100.0, 2);
        batch.record_episode(250.0, 4);

        lifetime.merge(&batch);

        assert_eq!(lifetime.episodes, 3);
        assert_eq!(lifetime.total_obstacles_passed, 15);
        assert_eq!(lifetime.best_distance, 400.0);
        assert!((lifetime.total_distance - 750.0).abs() < 1e-9);
    }
}
