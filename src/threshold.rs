//! Adaptive jump-threshold heuristic.
//!
//! The simpler sibling of the Q-learner: keep one jump distance per speed
//! band, jump whenever the nearest obstacle comes closer than the current
//! band's threshold, and nudge that threshold after every crash. If the
//! obstacle was inside the threshold at crash time the jump came too
//! late, so the threshold grows; otherwise it shrinks. The adjustment
//! step itself shrinks as the bot clears more obstacles, settling the
//! thresholds over time.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::runner::{Observation, SpeedBand, SpeedBands};
use crate::types::Action;
use crate::utils::atomic_write;
use crate::{Error, Result};

/// Configuration for the threshold policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Speed band boundaries, shared with the state encoder's defaults.
    pub speed: SpeedBands,
    /// Starting jump thresholds, indexed by [`SpeedBand::index`].
    pub initial_thresholds: [f64; SpeedBand::COUNT],
    /// Starting adjustment step applied after a crash.
    pub initial_step: f64,
    /// Thresholds never drop below this.
    pub min_threshold: f64,
    /// The step never decays below this.
    pub min_step: f64,
    /// Every this many cleared obstacles, the step shrinks by one.
    pub step_decay_every: u64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        ThresholdConfig {
            speed: SpeedBands::default(),
            initial_thresholds: [120.0, 140.0, 160.0],
            initial_step: 2.0,
            min_threshold: 20.0,
            min_step: 1.0,
            step_decay_every: 50,
        }
    }
}

impl ThresholdConfig {
    fn validate(&self) -> Result<()> {
        if self
            .initial_thresholds
            .iter()
            .any(|t| !t.is_finite() || *t < self.min_threshold)
        {
            return Err(Error::InvalidConfiguration {
                message: format!(
                    "initial thresholds {:?} must be finite and at least {}",
                    self.initial_thresholds, self.min_threshold
                ),
            });
        }
        if !(self.initial_step.is_finite() && self.initial_step > 0.0) {
            return Err(Error::InvalidConfiguration {
                message: format!("step {} must be positive", self.initial_step),
            });
        }
        if self.min_step > self.initial_step {
            return Err(Error::InvalidConfiguration {
                message: format!(
                    "minimum step {} exceeds initial step {}",
                    self.min_step, self.initial_step
                ),
            });
        }
        if self.step_decay_every == 0 {
            return Err(Error::InvalidConfiguration {
                message: "step decay interval must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// One recorded threshold adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdChange {
    pub band: SpeedBand,
    pub new_threshold: f64,
    pub distance_ran: f64,
}

/// Per-speed-band jump thresholds with crash-driven adaptation.
///
/// The whole policy serializes to JSON, histories included, so a later
/// session picks up exactly where the last one left off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdPolicy {
    config: ThresholdConfig,
    thresholds: [f64; SpeedBand::COUNT],
    step: f64,
    obstacles_passed: u64,
    /// Distance at every crash, in order.
    score_history: Vec<f64>,
    /// Every threshold adjustment, in order.
    threshold_history: Vec<ThresholdChange>,
}

impl ThresholdPolicy {
    /// Fresh policy from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] for degenerate settings.
    pub fn new(config: ThresholdConfig) -> Result<Self> {
        config.validate()?;
        Ok(ThresholdPolicy {
            thresholds: config.initial_thresholds,
            step: config.initial_step,
            config,
            obstacles_passed: 0,
            score_history: Vec::new(),
            threshold_history: Vec::new(),
        })
    }

    /// Current jump threshold for a raw speed. Pure.
    pub fn threshold_for(&self, speed: f64) -> f64 {
        self.thresholds[self.config.speed.band(speed).index()]
    }

    /// Decide the input for one frame: jump when the nearest obstacle is
    /// inside the current band's threshold, otherwise idle. Pure.
    pub fn decide(&self, observation: &Observation) -> Action {
        match observation.first() {
            Some(front) if front.x < self.threshold_for(observation.speed) => Action::Jump,
            _ => Action::Idle,
        }
    }

    /// Fold one crash into the policy.
    ///
    /// `observation` is the frame at crash time; its nearest obstacle
    /// position decides the adjustment direction. `passes_this_run` is
    /// the number of obstacles cleared in the run that just ended.
    pub fn record_crash(
        &mut self,
        observation: &Observation,
        distance_ran: f64,
        passes_this_run: u64,
    ) {
        self.score_history.push(distance_ran);

        if let Some(front) = observation.first() {
            let band = self.config.speed.band(observation.speed);
            let threshold = &mut self.thresholds[band.index()];
            if front.x < *threshold {
                // Obstacle was already inside the window: jumped too late.
                *threshold += self.step;
            } else {
                *threshold -= self.step;
            }
            *threshold = threshold.max(self.config.min_threshold);
            self.threshold_history.push(ThresholdChange {
                band,
                new_threshold: *threshold,
                distance_ran,
            });
        }

        self.obstacles_passed += passes_this_run;
        if self.obstacles_passed > 0
            && self.obstacles_passed % self.config.step_decay_every == 0
            && self.step > self.config.min_step
        {
            self.step = (self.step - 1.0).max(self.config.min_step);
            info!(
                "reduced threshold step to {} after {} cleared obstacles",
                self.step, self.obstacles_passed
            );
        }
    }

    /// Current thresholds, indexed by [`SpeedBand::index`].
    pub fn thresholds(&self) -> [f64; SpeedBand::COUNT] {
        self.thresholds
    }

    /// Current adjustment step.
    pub fn step(&self) -> f64 {
        self.step
    }

    /// Total obstacles cleared across all runs.
    pub fn obstacles_passed(&self) -> u64 {
        self.obstacles_passed
    }

    /// Crash distances, oldest first.
    pub fn score_history(&self) -> &[f64] {
        &self.score_history
    }

    /// Threshold adjustments, oldest first.
    pub fn threshold_history(&self) -> &[ThresholdChange] {
        &self.threshold_history
    }

    /// Write the policy as pretty JSON, atomically.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] or [`Error::Serialization`] on failure.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self)?;
        atomic_write(path, &bytes)
    }

    /// Read a policy back from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] or [`Error::Serialization`] on failure.
    pub fn load_from(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| Error::Io {
            operation: format!("open threshold file {}", path.display()),
            source,
        })?;
        let policy: ThresholdPolicy = serde_json::from_reader(BufReader::new(file))?;
        policy.config.validate()?;
        Ok(policy)
    }

    /// Load the policy at `path`, or start fresh when the file is missing
    /// or unreadable. Only a missing file is silent; anything else that
    /// prevents loading is logged and discarded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if `config` is unusable.
    pub fn load_or_default(path: &Path, config: ThresholdConfig) -> Result<Self> {
        if !path.exists() {
            info!("no threshold file at {}, starting cold", path.display());
            return ThresholdPolicy::new(config);
        }
        match ThresholdPolicy::load_from(path) {
            Ok(policy) => {
                info!(
                    "resumed thresholds from {} (step {}, {} crashes recorded)",
                    path.display(),
                    policy.step,
                    policy.score_history.len()
                );
                Ok(policy)
            }
            Err(err) => {
                warn!(
                    "discarding unreadable threshold file at {}: {err}",
                    path.display()
                );
                ThresholdPolicy::new(config)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::Obstacle;
    use crate::types::ObstacleKind;

    fn obs(speed: f64, x: f64) -> Observation {
        Observation::new(speed, vec![Obstacle::new(ObstacleKind::SmallCactus, x, 105.0)])
    }

    fn policy() -> ThresholdPolicy {
        ThresholdPolicy::new(ThresholdConfig::default()).expect("default config is valid")
    }

    #[test]
    fn test_thresholds_follow_speed_bands() {
        let policy = policy();
        assert_eq!(policy.threshold_for(4.0), 120.0);
        assert_eq!(policy.threshold_for(7.5), 140.0);
        assert_eq!(policy.threshold_for(11.0), 160.0);
    }

    #[test]
    fn test_decide_jumps_inside_threshold() {
        let policy = policy();
        assert_eq!(policy.decide(&obs(5.0, 100.0)), Action::Jump);
        assert_eq!(policy.decide(&obs(5.0, 119.9)), Action::Jump);
        assert_eq!(policy.decide(&obs(5.0, 120.0)), Action::Idle);
        assert_eq!(policy.decide(&obs(5.0, 400.0)), Action::Idle);
        assert_eq!(policy.decide(&Observation::clear_road(5.0)), Action::Idle);
    }

    #[test]
    fn test_crash_inside_threshold_raises_it() {
        let mut policy = policy();
        policy.record_crash(&obs(5.0, 30.0), 500.0, 0);
        assert_eq!(policy.thresholds()[SpeedBand::Slow.index()], 122.0);
        // Other bands untouched.
        assert_eq!(policy.thresholds()[SpeedBand::Fast.index()], 160.0);
    }

    #[test]
    fn test_crash_outside_threshold_lowers_it() {
        let mut policy = policy();
        policy.record_crash(&obs(10.0, 300.0), 700.0, 0);
        assert_eq!(policy.thresholds()[SpeedBand::Fast.index()], 158.0);
    }

    #[test]
    fn test_threshold_never_drops_below_floor() {
        let config = ThresholdConfig {
            initial_thresholds: [21.0, 140.0, 160.0],
            ..ThresholdConfig::default()
        };
        let mut policy = ThresholdPolicy::new(config).unwrap();
        policy.record_crash(&obs(5.0, 300.0), 100.0, 0);
        assert_eq!(policy.thresholds()[SpeedBand::Slow.index()], 20.0);
        policy.record_crash(&obs(5.0, 300.0), 100.0, 0);
        assert_eq!(policy.thresholds()[SpeedBand::Slow.index()], 20.0);
    }

    #[test]
    fn test_step_decays_at_pass_milestones() {
        let config = ThresholdConfig {
            step_decay_every: 10,
            ..ThresholdConfig::default()
        };
        let mut policy = ThresholdPolicy::new(config).unwrap();
        assert_eq!(policy.step(), 2.0);

        policy.record_crash(&obs(5.0, 30.0), 200.0, 10);
        assert_eq!(policy.step(), 1.0);

        // Already at the minimum step.
        policy.record_crash(&obs(5.0, 30.0), 200.0, 10);
        assert_eq!(policy.step(), 1.0);
    }

    #[test]
    fn test_histories_record_crashes() {
        let mut policy = policy();
        policy.record_crash(&obs(5.0, 30.0), 250.0, 2);
        policy.record_crash(&Observation::clear_road(5.0), 400.0, 1);

        assert_eq!(policy.score_history(), &[250.0, 400.0]);
        // No obstacle in the second crash frame, so only one adjustment.
        assert_eq!(policy.threshold_history().len(), 1);
        assert_eq!(policy.threshold_history()[0].band, SpeedBand::Slow);
        assert_eq!(policy.obstacles_passed(), 3);
    }

    #[test]
    fn test_json_round_trip() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("thresholds.json");

        let mut policy = policy();
        policy.record_crash(&obs(7.0, 50.0), 300.0, 4);
        policy.save_to(&path).expect("Failed to save thresholds");

        let loaded = ThresholdPolicy::load_from(&path).expect("Failed to load thresholds");
        assert_eq!(loaded, policy);
    }

    #[test]
    fn test_load_or_default_handles_missing_and_garbage() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let missing = dir.path().join("absent.json");
        let policy = ThresholdPolicy::load_or_default(&missing, ThresholdConfig::default())
            .expect("missing file should start cold");
        assert_eq!(policy.thresholds(), [120.0, 140.0, 160.0]);

        let garbage = dir.path().join("garbage.json");
        std::fs::write(&garbage, b"not json at all").expect("Failed to write garbage");
        let policy = ThresholdPolicy::load_or_default(&garbage, ThresholdConfig::default())
            .expect("garbage file should start cold");
        assert_eq!(policy.step(), 2.0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ThresholdConfig {
            initial_step: 0.0,
            ..ThresholdConfig::default()
        };
        assert!(ThresholdPolicy::new(config).is_err());

        let config = ThresholdConfig {
            step_decay_every: 0,
            ..ThresholdConfig::default()
        };
        assert!(ThresholdPolicy::new(config).is_err());
    }
}
