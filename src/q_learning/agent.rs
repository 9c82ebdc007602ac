//! Tabular Q-learning agent with epsilon-greedy exploration.
//!
//! The agent owns the value table, the exploration schedule, and the RNG.
//! It works purely on encoded [`StateKey`]s; mapping raw observations to
//! keys is the encoder's job, and wiring the agent into a game loop is
//! the pipeline's.

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::q_learning::q_table::{ActionValues, QTable};
use crate::runner::StateKey;
use crate::types::Action;
use crate::utils::build_rng;
use crate::{Error, Result};

/// Reward shaping for one tick of play.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RewardSchedule {
    /// Paid every tick the dino survives.
    pub survive: f64,
    /// Paid when an obstacle drops behind the dino.
    pub obstacle_pass: f64,
    /// Extra paid every `streak_every`-th consecutive pass.
    pub streak_bonus: f64,
    /// Length of a pass streak that earns the bonus.
    pub streak_every: u32,
    /// Paid on the tick the dino crashes. Terminal.
    pub crash: f64,
}

impl Default for RewardSchedule {
    fn default() -> Self {
        RewardSchedule {
            survive: 0.01,
            obstacle_pass: 1.0,
            streak_bonus: 0.5,
            streak_every: 3,
            crash: -10.0,
        }
    }
}

impl RewardSchedule {
    /// Reward for a survived tick.
    ///
    /// `consecutive_passes` counts the streak including the pass on this
    /// tick, so the bonus lands on the 3rd, 6th, ... pass in a row.
    pub fn survival_reward(&self, passed_obstacle: bool, consecutive_passes: u32) -> f64 {
        let mut reward = self.survive;
        if passed_obstacle {
            reward += self.obstacle_pass;
            if consecutive_passes > 0 && consecutive_passes % self.streak_every == 0 {
                reward += self.streak_bonus;
            }
        }
        reward
    }

    fn validate(&self) -> Result<()> {
        let values = [
            self.survive,
            self.obstacle_pass,
            self.streak_bonus,
            self.crash,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidConfiguration {
                message: "reward values must be finite".to_string(),
            });
        }
        if self.streak_every == 0 {
            return Err(Error::InvalidConfiguration {
                message: "streak length must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Hyperparameters of a Q-learning agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QAgentConfig {
    /// Learning rate α, in (0, 1].
    pub learning_rate: f64,
    /// Discount factor γ, in [0, 1).
    pub discount_factor: f64,
    /// Exploration rate at the start of training.
    pub initial_epsilon: f64,
    /// Multiplicative epsilon decay per episode.
    pub epsilon_decay: f64,
    /// Exploration floor.
    pub min_epsilon: f64,
    /// Reward shaping.
    pub rewards: RewardSchedule,
}

impl Default for QAgentConfig {
    fn default() -> Self {
        QAgentConfig {
            learning_rate: 0.1,
            discount_factor: 0.9,
            initial_epsilon: 1.0,
            epsilon_decay: 0.99,
            min_epsilon: 0.05,
            rewards: RewardSchedule::default(),
        }
    }
}

impl QAgentConfig {
    /// Validate hyperparameter ranges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(Error::InvalidConfiguration {
                message: format!("learning rate {} must be in (0, 1]", self.learning_rate),
            });
        }
        if !(self.discount_factor >= 0.0 && self.discount_factor < 1.0) {
            return Err(Error::InvalidConfiguration {
                message: format!("discount factor {} must be in [0, 1)", self.discount_factor),
            });
        }
        if !(0.0..=1.0).contains(&self.initial_epsilon) {
            return Err(Error::InvalidConfiguration {
                message: format!("initial epsilon {} must be in [0, 1]", self.initial_epsilon),
            });
        }
        if !(self.epsilon_decay > 0.0 && self.epsilon_decay <= 1.0) {
            return Err(Error::InvalidConfiguration {
                message: format!("epsilon decay {} must be in (0, 1]", self.epsilon_decay),
            });
        }
        if !(0.0..=1.0).contains(&self.min_epsilon) {
            return Err(Error::InvalidConfiguration {
                message: format!("minimum epsilon {} must be in [0, 1]", self.min_epsilon),
            });
        }
        self.rewards.validate()
    }
}

/// Q-learning agent (off-policy TD control)
///
/// Learns crash avoidance by always updating toward the maximum
/// next-state value, regardless of the action actually taken. Crashes
/// are terminal: their update carries no bootstrap term.
#[derive(Debug, Clone)]
pub struct QLearningAgent {
    table: QTable,
    config: QAgentConfig,
    epsilon: f64,
    rng: StdRng,
    rng_seed: Option<u64>,
}

impl QLearningAgent {
    /// Create a fresh agent from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if any hyperparameter is
    /// out of range.
    pub fn new(config: QAgentConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            table: QTable::new(config.learning_rate, config.discount_factor, 0.0),
            epsilon: config.initial_epsilon,
            config,
            rng: build_rng(None),
            rng_seed: None,
        })
    }

    /// Reseed the agent's RNG for reproducible exploration.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = build_rng(Some(seed));
        self.rng_seed = Some(seed);
        self
    }

    /// ε-greedy action selection for the current state.
    pub fn select_action(&mut self, key: &StateKey) -> Action {
        if self.rng.random::<f64>() < self.epsilon {
            // Explore: uniform over all actions
            Action::ALL[self.rng.random_range(0..Action::COUNT)]
        } else {
            // Exploit: greedy action based on learned values
            self.table.greedy_action(key)
        }
    }

    /// Greedy action for the current state, ignoring exploration.
    pub fn greedy_action(&self, key: &StateKey) -> Action {
        self.table.greedy_action(key)
    }

    /// One fixed-rate TD update for a survived or crashed transition.
    ///
    /// A survived tick pays the base survival reward and bootstraps from
    /// `next_key`; a crash pays the crash penalty and bootstraps nothing.
    pub fn update(&mut self, key: StateKey, action: Action, next_key: &StateKey, survived: bool) {
        if survived {
            self.update_with_reward(key, action, self.config.rewards.survive, next_key, false);
        } else {
            self.update_with_reward(key, action, self.config.rewards.crash, next_key, true);
        }
    }

    /// TD update with an externally shaped reward.
    ///
    /// The training loop uses this to add pass and streak bonuses on top
    /// of the base survival reward.
    pub fn update_with_reward(
        &mut self,
        key: StateKey,
        action: Action,
        reward: f64,
        next_key: &StateKey,
        done: bool,
    ) {
        self.table
            .q_learning_update(key, action, reward, next_key, done);
    }

    /// Decay epsilon after a finished run, respecting the floor.
    pub fn end_episode(&mut self) {
        self.epsilon = (self.epsilon * self.config.epsilon_decay).max(self.config.min_epsilon);
    }

    /// Current exploration rate.
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// The configuration this agent was built with.
    pub fn config(&self) -> &QAgentConfig {
        &self.config
    }

    /// The learned value table.
    pub fn table(&self) -> &QTable {
        &self.table
    }

    /// The seed the RNG was built from, if any.
    pub fn rng_seed(&self) -> Option<u64> {
        self.rng_seed
    }

    /// Forget everything: clear the table and restart the exploration
    /// schedule.
    pub fn reset(&mut self) {
        self.table.reset();
        self.epsilon = self.config.initial_epsilon;
        self.rng = build_rng(self.rng_seed);
    }

    pub(crate) fn from_parts(
        config: QAgentConfig,
        epsilon: f64,
        entries: Vec<(StateKey, ActionValues)>,
        rng_seed: Option<u64>,
    ) -> Result<Self> {
        config.validate()?;
        let mut table = QTable::new(config.learning_rate, config.discount_factor, 0.0);
        for (key, values) in entries {
            table.insert_row(key, values);
        }
        Ok(Self {
            table,
            epsilon: epsilon.clamp(0.0, 1.0),
            config,
            rng: build_rng(rng_seed),
            rng_seed,
        })
    }
}
