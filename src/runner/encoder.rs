//! State encoder: raw observations to discrete state keys.
//!
//! Tabular learning needs a small, finite state space. The encoder folds a
//! raw [`Observation`] into a [`StateKey`] made of a speed band plus the
//! nearest two obstacles, each reduced to (kind, x bin, y bin).
//!
//! The encoding is total: every observation maps to a key. Out-of-range
//! and non-finite coordinates clamp to the nearest bucket instead of
//! erroring, so a noisy scrape can never poison the learner.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::runner::observation::{Observation, Obstacle};
use crate::types::ObstacleKind;
use crate::{Error, Result};

/// Coarse bucket for the game speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SpeedBand {
    Slow,
    Medium,
    Fast,
}

impl SpeedBand {
    /// Number of speed bands.
    pub const COUNT: usize = 3;

    /// All bands from slowest to fastest.
    pub const ALL: [SpeedBand; SpeedBand::COUNT] =
        [SpeedBand::Slow, SpeedBand::Medium, SpeedBand::Fast];

    /// Stable index of this band, usable as an array offset.
    pub fn index(self) -> usize {
        match self {
            SpeedBand::Slow => 0,
            SpeedBand::Medium => 1,
            SpeedBand::Fast => 2,
        }
    }

    /// Short lowercase label for logs and exports.
    pub fn label(self) -> &'static str {
        match self {
            SpeedBand::Slow => "slow",
            SpeedBand::Medium => "medium",
            SpeedBand::Fast => "fast",
        }
    }
}

impl fmt::Display for SpeedBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Boundaries between the three speed bands.
///
/// Speeds below `slow_limit` are [`SpeedBand::Slow`], speeds below
/// `medium_limit` are [`SpeedBand::Medium`], everything else is
/// [`SpeedBand::Fast`]. NaN clamps to the slow band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedBands {
    pub slow_limit: f64,
    pub medium_limit: f64,
}

impl SpeedBands {
    /// Classify a raw game speed into its band.
    pub fn band(&self, speed: f64) -> SpeedBand {
        if speed.is_nan() || speed < self.slow_limit {
            SpeedBand::Slow
        } else if speed < self.medium_limit {
            SpeedBand::Medium
        } else {
            SpeedBand::Fast
        }
    }

    fn validate(&self) -> Result<()> {
        if !self.slow_limit.is_finite() || !self.medium_limit.is_finite() {
            return Err(Error::InvalidConfiguration {
                message: "speed band limits must be finite".to_string(),
            });
        }
        if self.slow_limit >= self.medium_limit {
            return Err(Error::InvalidConfiguration {
                message: format!(
                    "slow limit {} must be below medium limit {}",
                    self.slow_limit, self.medium_limit
                ),
            });
        }
        Ok(())
    }
}

impl Default for SpeedBands {
    fn default() -> Self {
        SpeedBands {
            slow_limit: 6.0,
            medium_limit: 9.0,
        }
    }
}

/// Configuration for the state encoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Speed band boundaries.
    pub speed: SpeedBands,
    /// Width of one horizontal distance bucket, in game units.
    pub x_bin_width: f64,
    /// Highest x bucket; anything farther clamps here.
    pub max_x_bin: u8,
    /// Ascending upper bounds of the first three vertical buckets.
    /// Anything at or above the last bound lands in the fourth bucket.
    pub y_bin_limits: [f64; 3],
}

impl Default for EncoderConfig {
    fn default() -> Self {
        EncoderConfig {
            speed: SpeedBands::default(),
            x_bin_width: 20.0,
            max_x_bin: 30,
            y_bin_limits: [40.0, 70.0, 100.0],
        }
    }
}

impl EncoderConfig {
    fn validate(&self) -> Result<()> {
        self.speed.validate()?;
        if !self.x_bin_width.is_finite() || self.x_bin_width <= 0.0 {
            return Err(Error::InvalidConfiguration {
                message: format!("x bin width {} must be positive and finite", self.x_bin_width),
            });
        }
        let ascending = self.y_bin_limits.windows(2).all(|w| w[0] < w[1]);
        if !ascending || self.y_bin_limits.iter().any(|l| !l.is_finite()) {
            return Err(Error::InvalidConfiguration {
                message: format!(
                    "y bin limits {:?} must be finite and strictly ascending",
                    self.y_bin_limits
                ),
            });
        }
        Ok(())
    }
}

/// One obstacle slot of a [`StateKey`].
///
/// A missing slot encodes as kind `none` with both bins at zero, so that
/// "one obstacle" and "two obstacles" observations land in distinct but
/// well-defined keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EncodedObstacle {
    pub kind: ObstacleKind,
    pub x_bin: u8,
    pub y_bin: u8,
}

impl EncodedObstacle {
    /// The empty slot.
    pub const NONE: EncodedObstacle = EncodedObstacle {
        kind: ObstacleKind::None,
        x_bin: 0,
        y_bin: 0,
    };
}

impl fmt::Display for EncodedObstacle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.kind, self.x_bin, self.y_bin)
    }
}

/// Discrete state key: speed band plus the nearest two obstacle slots.
///
/// Keys are small `Copy` values ordered lexicographically, which gives
/// snapshots and exports a stable listing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateKey {
    pub speed: SpeedBand,
    pub first: EncodedObstacle,
    pub second: EncodedObstacle,
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.speed, self.first, self.second)
    }
}

/// Maps raw observations to discrete state keys.
#[derive(Debug, Clone)]
pub struct StateEncoder {
    config: EncoderConfig,
}

impl StateEncoder {
    /// Create an encoder, validating the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if the bucket layout is
    /// degenerate (non-positive bin width, unordered limits).
    pub fn new(config: EncoderConfig) -> Result<Self> {
        config.validate()?;
        Ok(StateEncoder { config })
    }

    /// The configuration this encoder was built with.
    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Encode one observation. Total over all inputs.
    pub fn encode(&self, observation: &Observation) -> StateKey {
        StateKey {
            speed: self.config.speed.band(observation.speed),
            first: self.encode_slot(observation.first()),
            second: self.encode_slot(observation.second()),
        }
    }

    fn encode_slot(&self, obstacle: Option<&Obstacle>) -> EncodedObstacle {
        match obstacle {
            Some(o) => EncodedObstacle {
                kind: o.kind,
                x_bin: self.x_bin(o.x),
                y_bin: self.y_bin(o.y),
            },
            None => EncodedObstacle::NONE,
        }
    }

    fn x_bin(&self, x: f64) -> u8 {
        if x.is_nan() {
            return 0;
        }
        let bin = (x / self.config.x_bin_width).floor();
        if bin <= 0.0 {
            0
        } else if bin >= f64::from(self.config.max_x_bin) {
            self.config.max_x_bin
        } else {
            bin as u8
        }
    }

    fn y_bin(&self, y: f64) -> u8 {
        if y.is_nan() {
            return 0;
        }
        match self.config.y_bin_limits.iter().position(|&limit| y < limit) {
            Some(bin) => bin as u8,
            None => self.config.y_bin_limits.len() as u8,
        }
    }
}

impl Default for StateEncoder {
    fn default() -> Self {
        StateEncoder {
            config: EncoderConfig::default(),
        }
    }
}
