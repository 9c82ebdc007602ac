//! Simulated obstacle course for offline training and tests.
//!
//! A deterministic, physics-lite stand-in for the real game: speed ramps
//! up over time, obstacles spawn ahead and scroll toward the dino, and a
//! crash happens whenever an obstacle crosses the strike zone without the
//! matching evasive input being active. Jumps have a short rise time, so
//! pressing jump at the last instant is too late, which gives the learner
//! a real timing problem per speed band.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::ports::Environment;
use crate::runner::observation::{Observation, Obstacle, TickReport};
use crate::types::{Action, ObstacleKind};
use crate::utils::build_rng;
use crate::{Error, Result};

/// Vertical positions pterodactyls spawn at, from high flight to ground level.
const PTERODACTYL_HEIGHTS: [f64; 3] = [50.0, 75.0, 100.0];
const SMALL_CACTUS_Y: f64 = 105.0;
const LARGE_CACTUS_Y: f64 = 90.0;

/// Configuration for the simulated course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseConfig {
    /// Seed for obstacle layout. `None` draws from entropy.
    pub seed: Option<u64>,
    /// Speed at the start of every run.
    pub initial_speed: f64,
    /// Speed gained per tick.
    pub acceleration: f64,
    /// Speed cap.
    pub max_speed: f64,
    /// Horizontal position obstacles spawn at.
    pub spawn_x: f64,
    /// Minimum gap between consecutive obstacles.
    pub min_gap: f64,
    /// Extra gap per unit of current speed.
    pub gap_per_speed: f64,
    /// Upper bound of the random jitter added to each gap.
    pub gap_jitter: f64,
    /// Obstacles with x in (0, strike_zone] can hit the dino.
    pub strike_zone: f64,
    /// Ticks a jump keeps the dino airborne.
    pub jump_ticks: u32,
    /// Leading ticks of a jump during which the dino is still too low
    /// to clear anything.
    pub rise_ticks: u32,
    /// Pterodactyls only spawn at or above this speed.
    pub pterodactyl_min_speed: f64,
}

impl Default for CourseConfig {
    fn default() -> Self {
        CourseConfig {
            seed: None,
            initial_speed: 6.0,
            acceleration: 0.001,
            max_speed: 13.0,
            spawn_x: 625.0,
            min_gap: 120.0,
            gap_per_speed: 12.0,
            gap_jitter: 160.0,
            strike_zone: 32.0,
            jump_ticks: 20,
            rise_ticks: 3,
            pterodactyl_min_speed: 8.5,
        }
    }
}

impl CourseConfig {
    fn validate(&self) -> Result<()> {
        if self.initial_speed <= 0.0 || self.max_speed < self.initial_speed {
            return Err(Error::InvalidConfiguration {
                message: format!(
                    "speed range {}..{} is not usable",
                    self.initial_speed, self.max_speed
                ),
            });
        }
        if self.rise_ticks >= self.jump_ticks {
            return Err(Error::InvalidConfiguration {
                message: format!(
                    "rise ticks {} must be below jump ticks {}",
                    self.rise_ticks, self.jump_ticks
                ),
            });
        }
        if self.strike_zone <= 0.0 || self.spawn_x <= self.strike_zone {
            return Err(Error::InvalidConfiguration {
                message: "spawn position must lie beyond the strike zone".to_string(),
            });
        }
        if self.min_gap <= self.strike_zone {
            return Err(Error::InvalidConfiguration {
                message: format!(
                    "minimum gap {} must exceed the strike zone {}",
                    self.min_gap, self.strike_zone
                ),
            });
        }
        Ok(())
    }
}

/// Deterministic obstacle course implementing [`Environment`].
pub struct SimulatedCourse {
    config: CourseConfig,
    rng: StdRng,
    obstacles: VecDeque<Obstacle>,
    speed: f64,
    distance_ran: f64,
    crashed: bool,
    /// Remaining airborne ticks; zero when grounded.
    airborne: u32,
    /// Whether duck is held for the current tick.
    ducking: bool,
    next_gap: f64,
}

impl SimulatedCourse {
    /// Create a course, validating the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] for degenerate layouts.
    pub fn new(config: CourseConfig) -> Result<Self> {
        config.validate()?;
        Ok(SimulatedCourse::assemble(config))
    }

    /// Course with the default layout and a fixed seed.
    pub fn with_seed(seed: u64) -> Self {
        SimulatedCourse::assemble(CourseConfig {
            seed: Some(seed),
            ..CourseConfig::default()
        })
    }

    fn assemble(config: CourseConfig) -> Self {
        let rng = build_rng(config.seed);
        let mut course = SimulatedCourse {
            speed: config.initial_speed,
            config,
            rng,
            obstacles: VecDeque::new(),
            distance_ran: 0.0,
            crashed: false,
            airborne: 0,
            ducking: false,
            next_gap: 0.0,
        };
        course.next_gap = course.roll_gap();
        course
    }

    fn roll_gap(&mut self) -> f64 {
        self.config.min_gap
            + self.speed * self.config.gap_per_speed
            + self.rng.random_range(0.0..self.config.gap_jitter)
    }

    fn spawn_obstacle(&mut self) {
        let kind = if self.speed >= self.config.pterodactyl_min_speed
            && self.rng.random_bool(0.25)
        {
            ObstacleKind::Pterodactyl
        } else if self.rng.random_bool(0.5) {
            ObstacleKind::SmallCactus
        } else {
            ObstacleKind::LargeCactus
        };
        let y = match kind {
            ObstacleKind::SmallCactus => SMALL_CACTUS_Y,
            ObstacleKind::LargeCactus => LARGE_CACTUS_Y,
            ObstacleKind::Pterodactyl => *PTERODACTYL_HEIGHTS
                .choose(&mut self.rng)
                .unwrap_or(&PTERODACTYL_HEIGHTS[0]),
            ObstacleKind::None => return,
        };
        self.obstacles
            .push_back(Obstacle::new(kind, self.config.spawn_x, y));
        self.next_gap = self.roll_gap();
    }

    /// Whether the dino's current posture clears the given obstacle.
    fn hazard_cleared(&self, obstacle: &Obstacle) -> bool {
        let fully_airborne = self.airborne > 0
            && (self.config.jump_ticks - self.airborne) >= self.config.rise_ticks;
        match obstacle.kind {
            ObstacleKind::SmallCactus | ObstacleKind::LargeCactus => fully_airborne,
            ObstacleKind::Pterodactyl => {
                if obstacle.y < 70.0 {
                    // High flight passes over a running dino.
                    true
                } else if obstacle.y < 100.0 {
                    self.ducking
                } else {
                    fully_airborne
                }
            }
            ObstacleKind::None => true,
        }
    }

    fn report(&self) -> TickReport {
        let observation = Observation::new(
            self.speed,
            self.obstacles.iter().copied().collect(),
        );
        TickReport::new(observation, self.distance_ran, self.crashed)
    }
}

impl Environment for SimulatedCourse {
    fn name(&self) -> &str {
        "simulated-course"
    }

    fn reset(&mut self) -> Result<TickReport> {
        self.obstacles.clear();
        self.speed = self.config.initial_speed;
        self.distance_ran = 0.0;
        self.crashed = false;
        self.airborne = 0;
        self.ducking = false;
        self.next_gap = self.roll_gap();
        Ok(self.report())
    }

    fn step(&mut self, action: Action) -> Result<TickReport> {
        if self.crashed {
            return Ok(self.report());
        }

        // Inputs only take effect when grounded; duck must be held anew
        // every tick.
        self.ducking = false;
        match action {
            Action::Jump if self.airborne == 0 => self.airborne = self.config.jump_ticks,
            Action::Duck if self.airborne == 0 => self.ducking = true,
            _ => {}
        }

        self.speed = (self.speed + self.config.acceleration).min(self.config.max_speed);
        self.distance_ran += self.speed;
        for obstacle in &mut self.obstacles {
            obstacle.x -= self.speed;
        }

        if let Some(front) = self.obstacles.front() {
            if front.x > 0.0 && front.x <= self.config.strike_zone && !self.hazard_cleared(front)
            {
                self.crashed = true;
            }
        }

        if !self.crashed {
            while self.obstacles.front().is_some_and(|o| o.x <= 0.0) {
                self.obstacles.pop_front();
            }
            let due = match self.obstacles.back() {
                Some(last) => self.config.spawn_x - last.x >= self.next_gap,
                None => true,
            };
            if due {
                self.spawn_obstacle();
            }
        }

        if self.airborne > 0 {
            self.airborne -= 1;
        }

        Ok(self.report())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_with_policy<F>(course: &mut SimulatedCourse, max_ticks: usize, mut policy: F) -> TickReport
    where
        F: FnMut(&Observation) -> Action,
    {
        let mut report = course.reset().expect("reset should not fail");
        for _ in 0..max_ticks {
            if report.crashed {
                break;
            }
            let action = policy(&report.observation);
            report = course.step(action).expect("step should not fail");
        }
        report
    }

    #[test]
    fn test_same_seed_same_course() {
        let mut a = SimulatedCourse::with_seed(7);
        let mut b = SimulatedCourse::with_seed(7);
        let end_a = run_with_policy(&mut a, 2000, |_| Action::Idle);
        let end_b = run_with_policy(&mut b, 2000, |_| Action::Idle);
        assert_eq!(end_a, end_b);
    }

    #[test]
    fn test_idling_crashes_into_first_obstacle() {
        let mut course = SimulatedCourse::with_seed(1);
        let end = run_with_policy(&mut course, 2000, |_| Action::Idle);
        assert!(end.crashed);
        assert!(end.distance_ran > 0.0);
        // The crash happens with the obstacle still in the strike zone.
        let front = end.observation.first().expect("crash implies an obstacle");
        assert!(front.x <= course.config.strike_zone);
    }

    #[test]
    fn test_timed_jumps_clear_early_cacti() {
        let mut course = SimulatedCourse::with_seed(3);
        let mut passes = 0usize;
        let mut previous: Option<Observation> = None;
        let mut report = course.reset().expect("reset should not fail");
        for _ in 0..3000 {
            if report.crashed || passes >= 3 {
                break;
            }
            let action = match report.observation.first() {
                Some(front) if front.x < 90.0 => Action::Jump,
                _ => Action::Idle,
            };
            if let Some(prev) = &previous {
                if crate::runner::observation::obstacle_passed(prev, &report.observation) {
                    passes += 1;
                }
            }
            previous = Some(report.observation.clone());
            report = course.step(action).expect("step should not fail");
        }
        assert!(passes >= 1, "expected at least one cleared obstacle");
    }

    #[test]
    fn test_last_instant_jump_is_too_late() {
        let mut course = SimulatedCourse::with_seed(5);
        course.reset().expect("reset should not fail");
        // Plant a cactus that enters the strike zone on the very next step.
        course.obstacles.clear();
        course
            .obstacles
            .push_front(Obstacle::new(ObstacleKind::SmallCactus, 36.0, SMALL_CACTUS_Y));
        let report = course.step(Action::Jump).expect("step should not fail");
        assert!(report.crashed, "rise time should make the jump miss");
    }

    #[test]
    fn test_duck_clears_mid_height_pterodactyl() {
        let mut course = SimulatedCourse::with_seed(5);
        course.reset().expect("reset should not fail");
        course.obstacles.clear();
        course
            .obstacles
            .push_front(Obstacle::new(ObstacleKind::Pterodactyl, 36.0, 75.0));
        let report = course.step(Action::Duck).expect("step should not fail");
        assert!(!report.crashed);
    }

    #[test]
    fn test_high_pterodactyl_passes_overhead() {
        let mut course = SimulatedCourse::with_seed(5);
        course.reset().expect("reset should not fail");
        course.obstacles.clear();
        course
            .obstacles
            .push_front(Obstacle::new(ObstacleKind::Pterodactyl, 36.0, 50.0));
        let report = course.step(Action::Idle).expect("step should not fail");
        assert!(!report.crashed);
    }

    #[test]
    fn test_speed_ramps_toward_cap() {
        let mut course = SimulatedCourse::with_seed(2);
        let report = course.reset().expect("reset should not fail");
        let start_speed = report.observation.speed;
        for _ in 0..500 {
            course.step(Action::Jump).ok();
            if course.crashed {
                course.reset().expect("reset should not fail");
            }
        }
        assert!(course.speed > start_speed);
        assert!(course.speed <= course.config.max_speed);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = CourseConfig {
            rise_ticks: 30,
            jump_ticks: 20,
            ..CourseConfig::default()
        };
        assert!(SimulatedCourse::new(config).is_err());
    }
}
