//! Q-table implementation for temporal difference learning

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::runner::StateKey;
use crate::types::Action;

/// Value estimates for every action in one state.
///
/// Stored as a dense row because the action set is tiny and fixed; the
/// first encounter with a state materializes the whole row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActionValues([f64; Action::COUNT]);

impl ActionValues {
    /// A row with every action at the given value.
    pub fn filled(value: f64) -> Self {
        ActionValues([value; Action::COUNT])
    }

    /// Estimate for one action.
    pub fn get(&self, action: Action) -> f64 {
        self.0[action.index()]
    }

    /// Overwrite the estimate for one action.
    pub fn set(&mut self, action: Action, value: f64) {
        self.0[action.index()] = value;
    }

    /// Highest estimate in the row.
    pub fn best(&self) -> f64 {
        self.0.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Action with the highest estimate. Ties go to the earliest action
    /// in [`Action::ALL`], so the bot prefers idling over jumping and
    /// jumping over ducking when estimates are equal.
    pub fn greedy(&self) -> Action {
        let mut best = Action::ALL[0];
        let mut best_value = self.get(best);
        for action in Action::ALL.into_iter().skip(1) {
            let value = self.get(action);
            if value > best_value {
                best = action;
                best_value = value;
            }
        }
        best
    }

    /// The raw row, indexed by [`Action::index`].
    pub fn as_array(&self) -> [f64; Action::COUNT] {
        self.0
    }
}

/// Q-table mapping state keys to per-action value estimates.
///
/// Rows are added lazily the first time a state is written; existing
/// rows are only ever updated in place, never removed.
#[derive(Debug, Clone)]
pub struct QTable {
    values: HashMap<StateKey, ActionValues>,
    /// Learning rate α
    learning_rate: f64,
    /// Discount factor γ
    discount_factor: f64,
    /// Initial estimate for unseen state-action pairs
    q_init: f64,
}

impl QTable {
    /// Create a new Q-table
    pub fn new(learning_rate: f64, discount_factor: f64, q_init: f64) -> Self {
        Self {
            values: HashMap::new(),
            learning_rate,
            discount_factor,
            q_init,
        }
    }

    /// Estimate for a state-action pair, `q_init` when unseen.
    pub fn value(&self, key: &StateKey, action: Action) -> f64 {
        self.values
            .get(key)
            .map_or(self.q_init, |row| row.get(action))
    }

    /// The full row for a state, a default row when unseen.
    pub fn action_values(&self, key: &StateKey) -> ActionValues {
        self.values
            .get(key)
            .copied()
            .unwrap_or_else(|| ActionValues::filled(self.q_init))
    }

    /// Overwrite the estimate for a state-action pair, materializing the
    /// row on first touch.
    pub fn set(&mut self, key: StateKey, action: Action, value: f64) {
        self.values
            .entry(key)
            .or_insert_with(|| ActionValues::filled(self.q_init))
            .set(action, value);
    }

    /// Best estimate available in a state, `q_init` when unseen.
    ///
    /// This is the bootstrap term of the Q-learning update; it never
    /// creates a row.
    pub fn best_value(&self, key: &StateKey) -> f64 {
        self.values.get(key).map_or(self.q_init, |row| row.best())
    }

    /// Greedy action for a state, with ties broken by action priority.
    pub fn greedy_action(&self, key: &StateKey) -> Action {
        self.action_values(key).greedy()
    }

    /// Q-learning update: off-policy TD control
    ///
    /// Q(s,a) ← Q(s,a) + α[r + γ max_a' Q(s',a') - Q(s,a)]
    ///
    /// A terminal transition (`done`) bootstraps nothing; the target is
    /// the reward alone, which is what makes crash updates always pull
    /// the estimate toward the crash penalty.
    pub fn q_learning_update(
        &mut self,
        key: StateKey,
        action: Action,
        reward: f64,
        next_key: &StateKey,
        done: bool,
    ) {
        let current_q = self.value(&key, action);
        let max_next_q = if done { 0.0 } else { self.best_value(next_key) };
        let td_target = reward + self.discount_factor * max_next_q;
        let td_error = td_target - current_q;
        let new_q = current_q + self.learning_rate * td_error;
        self.set(key, action, new_q);
    }

    /// Discard every learned row.
    pub fn reset(&mut self) {
        self.values.clear();
    }

    /// Number of states with a materialized row.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no state has been touched yet.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// All rows in ascending key order, for snapshots and exports.
    pub fn entries_sorted(&self) -> Vec<(StateKey, ActionValues)> {
        let mut entries: Vec<_> = self.values.iter().map(|(k, v)| (*k, *v)).collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub(crate) fn insert_row(&mut self, key: StateKey, values: ActionValues) {
        self.values.insert(key, values);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{Observation, Obstacle, StateEncoder};
    use crate::types::ObstacleKind;

    fn key_at(x: f64) -> StateKey {
        StateEncoder::default().encode(&Observation::new(
            7.0,
            vec![Obstacle::new(ObstacleKind::SmallCactus, x, 105.0)],
        ))
    }

    #[test]
    fn test_qtable_initialization() {
        let table = QTable::new(0.1, 0.9, 0.0);
        assert_eq!(table.value(&key_at(100.0), Action::Jump), 0.0);
        assert!(table.is_empty());
    }

    #[test]
    fn test_set_materializes_whole_row() {
        let mut table = QTable::new(0.1, 0.9, 0.0);
        let key = key_at(100.0);
        table.set(key, Action::Jump, 1.5);
        assert_eq!(table.len(), 1);
        assert_eq!(table.value(&key, Action::Jump), 1.5);
        assert_eq!(table.value(&key, Action::Idle), 0.0);

        // Writing a second action in the same state adds no new row.
        table.set(key, Action::Duck, -0.5);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_greedy_action_prefers_highest_value() {
        let mut table = QTable::new(0.1, 0.9, 0.0);
        let key = key_at(120.0);
        table.set(key, Action::Idle, 0.5);
        table.set(key, Action::Jump, 1.5);
        table.set(key, Action::Duck, 0.8);
        assert_eq!(table.greedy_action(&key), Action::Jump);
    }

    #[test]
    fn test_greedy_ties_break_by_priority() {
        let mut table = QTable::new(0.1, 0.9, 0.0);
        let key = key_at(120.0);
        // Unseen state: all defaults tie, idle wins.
        assert_eq!(table.greedy_action(&key), Action::Idle);

        table.set(key, Action::Jump, 2.0);
        table.set(key, Action::Duck, 2.0);
        assert_eq!(table.greedy_action(&key), Action::Jump);
    }

    #[test]
    fn test_best_value_over_recorded_row() {
        let mut table = QTable::new(0.1, 0.9, 0.0);
        let key = key_at(60.0);
        assert_eq!(table.best_value(&key), 0.0);
        table.set(key, Action::Idle, -1.0);
        table.set(key, Action::Jump, -2.0);
        table.set(key, Action::Duck, -3.0);
        assert_eq!(table.best_value(&key), -1.0);
    }

    #[test]
    fn test_q_learning_update_bootstraps_next_state() {
        let mut table = QTable::new(0.5, 0.99, 0.0);
        let key = key_at(200.0);
        let next = key_at(180.0);
        table.set(next, Action::Jump, 1.0);
        table.set(next, Action::Duck, 2.0);

        table.q_learning_update(key, Action::Idle, 0.0, &next, false);

        // Q(s,idle) = 0.0 + 0.5 * (0.0 + 0.99 * 2.0 - 0.0) = 0.99
        assert!((table.value(&key, Action::Idle) - 0.99).abs() < 1e-9);
    }

    #[test]
    fn test_terminal_update_ignores_next_state() {
        let mut table = QTable::new(0.5, 0.99, 0.0);
        let key = key_at(40.0);
        let next = key_at(20.0);
        table.set(next, Action::Jump, 100.0);

        table.q_learning_update(key, Action::Idle, -10.0, &next, true);

        // Target is the crash penalty alone, no bootstrap.
        assert!((table.value(&key, Action::Idle) - (-5.0)).abs() < 1e-9);
    }

    #[test]
    fn test_updates_never_remove_rows() {
        let mut table = QTable::new(0.1, 0.9, 0.0);
        let a = key_at(100.0);
        let b = key_at(200.0);
        table.q_learning_update(a, Action::Jump, 1.0, &b, false);
        table.q_learning_update(b, Action::Idle, 1.0, &a, false);
        assert_eq!(table.len(), 2);
        table.q_learning_update(a, Action::Jump, -10.0, &b, true);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_entries_sorted_is_stable() {
        let mut table = QTable::new(0.1, 0.9, 0.0);
        for x in [300.0, 100.0, 200.0] {
            table.set(key_at(x), Action::Jump, x);
        }
        let entries = table.entries_sorted();
        assert_eq!(entries.len(), 3);
        let keys: Vec<_> = entries.iter().map(|(k, _)| *k).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }
}
