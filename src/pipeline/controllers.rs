//! Controller implementations for the training pipeline
//!
//! This module wraps the decision policies as Controller port
//! implementations so the pipeline can drive any of them interchangeably:
//! - Q-learning agents (learning or frozen for evaluation)
//! - Adaptive threshold policies
//! - Random baselines

use rand::{Rng, rngs::StdRng};

use crate::{
    Result,
    ports::{Controller, Transition},
    q_learning::QLearningAgent,
    runner::{Observation, StateEncoder},
    threshold::ThresholdPolicy,
    types::Action,
    utils::build_rng,
};

/// Q-learning agent wrapper
///
/// Encodes raw observations into state keys, shapes rewards from
/// transition facts, and feeds the result to the tabular agent. In
/// frozen mode the wrapper acts greedily and never touches the table,
/// which is what evaluation runs want.
pub struct QLearnerController {
    agent: QLearningAgent,
    encoder: StateEncoder,
    consecutive_passes: u32,
    frozen: bool,
}

impl QLearnerController {
    /// Create a learning controller from an agent and encoder.
    pub fn new(agent: QLearningAgent, encoder: StateEncoder) -> Self {
        Self {
            agent,
            encoder,
            consecutive_passes: 0,
            frozen: false,
        }
    }

    /// Create a frozen controller: greedy actions, no table updates, no
    /// epsilon decay.
    pub fn frozen(agent: QLearningAgent, encoder: StateEncoder) -> Self {
        Self {
            agent,
            encoder,
            consecutive_passes: 0,
            frozen: true,
        }
    }

    /// Get reference to underlying agent
    pub fn agent(&self) -> &QLearningAgent {
        &self.agent
    }

    /// Get mutable reference to underlying agent
    pub fn agent_mut(&mut self) -> &mut QLearningAgent {
        &mut self.agent
    }

    /// Consume the controller and return the agent.
    pub fn into_agent(self) -> QLearningAgent {
        self.agent
    }
}

impl Controller for QLearnerController {
    fn name(&self) -> &str {
        if self.frozen { "q-policy" } else { "q-learner" }
    }

    fn act(&mut self, observation: &Observation) -> Action {
        let key = self.encoder.encode(observation);
        if self.frozen {
            self.agent.greedy_action(&key)
        } else {
            self.agent.select_action(&key)
        }
    }

    fn learn(&mut self, transition: &Transition<'_>) -> Result<()> {
        if self.frozen {
            return Ok(());
        }

        let before = self.encoder.encode(transition.before);
        let after = self.encoder.encode(transition.after);

        if transition.crashed {
            self.consecutive_passes = 0;
            self.agent.update(before, transition.action, &after, false);
            return Ok(());
        }

        if transition.passed_obstacle {
            self.consecutive_passes += 1;
        }
        let reward = self
            .agent
            .config()
            .rewards
            .survival_reward(transition.passed_obstacle, self.consecutive_passes);
        self.agent
            .update_with_reward(before, transition.action, reward, &after, false);
        Ok(())
    }

    fn end_episode(&mut self) -> Result<()> {
        self.consecutive_passes = 0;
        if !self.frozen {
            self.agent.end_episode();
        }
        Ok(())
    }

    fn epsilon(&self) -> Option<f64> {
        if self.frozen {
            None
        } else {
            Some(self.agent.epsilon())
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Adaptive threshold policy wrapper
///
/// Acts on the policy's current jump thresholds and, after each crash,
/// hands the crash context back so the policy can nudge the offending
/// band. Frozen mode keeps the thresholds fixed.
pub struct ThresholdController {
    policy: ThresholdPolicy,
    passes_this_run: u64,
    frozen: bool,
}

impl ThresholdController {
    /// Create an adapting controller from a policy.
    pub fn new(policy: ThresholdPolicy) -> Self {
        Self {
            policy,
            passes_this_run: 0,
            frozen: false,
        }
    }

    /// Create a frozen controller that never adjusts its thresholds.
    pub fn frozen(policy: ThresholdPolicy) -> Self {
        Self {
            policy,
            passes_this_run: 0,
            frozen: true,
        }
    }

    /// Get reference to underlying policy
    pub fn policy(&self) -> &ThresholdPolicy {
        &self.policy
    }

    /// Consume the controller and return the policy.
    pub fn into_policy(self) -> ThresholdPolicy {
        self.policy
    }
}

impl Controller for ThresholdController {
    fn name(&self) -> &str {
        if self.frozen {
            "threshold-policy"
        } else {
            "adaptive-threshold"
        }
    }

    fn act(&mut self, observation: &Observation) -> Action {
        self.policy.decide(observation)
    }

    fn learn(&mut self, transition: &Transition<'_>) -> Result<()> {
        if self.frozen {
            return Ok(());
        }

        if transition.passed_obstacle {
            self.passes_this_run += 1;
        }
        if transition.crashed {
            self.policy.record_crash(
                transition.after,
                transition.distance_ran,
                self.passes_this_run,
            );
            self.passes_this_run = 0;
        }
        Ok(())
    }

    fn end_episode(&mut self) -> Result<()> {
        // A run that ended on the tick cap carries no crash to learn from.
        self.passes_this_run = 0;
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Random baseline controller
///
/// Picks uniformly among all actions every tick. Useful as a floor when
/// judging whether a trained policy actually learned anything.
pub struct RandomController {
    rng: StdRng,
}

impl RandomController {
    /// Create a new random controller
    pub fn new() -> Self {
        Self {
            rng: build_rng(None),
        }
    }

    /// Create a new random controller with a deterministic seed
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: build_rng(Some(seed)),
        }
    }
}

impl Default for RandomController {
    fn default() -> Self {
        Self::new()
    }
}

impl Controller for RandomController {
    fn name(&self) -> &str {
        "random"
    }

    fn act(&mut self, _observation: &Observation) -> Action {
        Action::ALL[self.rng.random_range(0..Action::COUNT)]
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
