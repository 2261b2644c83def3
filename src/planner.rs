//! Dynamic-programming planners over a known [`Environment`].
//!
//! Both planners solve the Bellman optimality equation
//!
//! ```text
//! V(s) = max_a sum_{s'} T(s'|s,a) * ( R(s') + gamma * V(s') )
//! ```
//!
//! and record one value-grid snapshot per sweep (value iteration) or per
//! outer iteration (policy iteration), ending with the final result.
//!
//! # Examples
//!
//! ```
//! use mdp_planner::environment::GridWorld;
//! use mdp_planner::planner::{Plan, PlanConfig, ValueIterationPlanner};
//!
//! let env = GridWorld::new(&[vec![0, 0, 0, 1], vec![0, 9, 0, -1], vec![0, 0, 0, 0]], 0.8)
//!     .unwrap();
//! let mut planner = ValueIterationPlanner::new(&env);
//! let values = planner.plan(&PlanConfig::default()).unwrap();
//!
//! assert_eq!(values.dim(), (3, 4));
//! assert!(values[[0, 2]] > values[[2, 0]]);
//! assert_eq!(planner.log().last(), Some(&values));
//! ```

pub mod policy_iteration;
pub mod value_iteration;

#[cfg(test)]
mod tests;

pub use policy_iteration::PolicyIterationPlanner;
pub use value_iteration::ValueIterationPlanner;

use crate::environment::{Action, Environment, State};
use crate::error::{PlanError, Result};
use log::warn;
use ndarray::Array2;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Dense value snapshot shaped like the grid. Blocked cells hold 0.0.
pub type ValueGrid = Array2<f64>;

/// State-value function `V(s)`.
pub type StateValues = HashMap<State, f64>;

/// Action probabilities per state, indexed by [`Action::index`].
pub type Policy = HashMap<State, [f64; Action::COUNT]>;

/// Default discount factor.
pub const DEFAULT_GAMMA: f64 = 0.9;

/// Default sup-norm convergence threshold.
pub const DEFAULT_THRESHOLD: f64 = 0.001;

/// Default cap on sweeps (and on outer iterations for policy iteration).
pub const DEFAULT_MAX_ITERATIONS: usize = 10_000;

/// Parameters of a single `plan` run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanConfig {
    /// Discount factor (0 <= gamma <= 1)
    pub gamma: f64,
    /// Stop once the sup-norm delta of a sweep drops below this value
    pub threshold: f64,
    /// Fail with `Convergence` after this many iterations; `None` disables the guard
    pub max_iterations: Option<usize>,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            gamma: DEFAULT_GAMMA,
            threshold: DEFAULT_THRESHOLD,
            max_iterations: Some(DEFAULT_MAX_ITERATIONS),
        }
    }
}

impl PlanConfig {
    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: Option<usize>) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// # Errors
    /// `InvalidConfiguration` for a discount outside `[0, 1]`, a
    /// non-positive threshold, or a zero iteration cap.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(PlanError::invalid_config(format!(
                "discount factor must be within [0, 1], got {}",
                self.gamma
            )));
        }
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(PlanError::invalid_config(format!(
                "threshold must be positive, got {}",
                self.threshold
            )));
        }
        if self.max_iterations == Some(0) {
            return Err(PlanError::invalid_config(
                "iteration cap must be at least 1",
            ));
        }
        Ok(())
    }

    /// Whether `iterations` has reached the cap.
    pub(crate) fn exhausted(&self, iterations: usize) -> bool {
        self.max_iterations.is_some_and(|cap| iterations >= cap)
    }

    /// Fails once `iterations` reaches the cap without convergence.
    pub(crate) fn check_guard(&self, iterations: usize, delta: f64) -> Result<()> {
        if self.exhausted(iterations) {
            warn!(
                "iteration guard tripped after {} iterations, delta {}",
                iterations, delta
            );
            return Err(PlanError::Convergence { iterations, delta });
        }
        Ok(())
    }
}

/// Machinery shared by both planners: transition/reward fusion, value
/// snapshots and the run log.
#[derive(Debug)]
pub struct PlannerBase<'a, E: Environment> {
    env: &'a E,
    log: Vec<ValueGrid>,
    iterations: usize,
    last_delta: f64,
}

impl<'a, E: Environment> PlannerBase<'a, E> {
    pub fn new(env: &'a E) -> Self {
        PlannerBase {
            env,
            log: Vec::new(),
            iterations: 0,
            last_delta: 0.0,
        }
    }

    pub fn env(&self) -> &'a E {
        self.env
    }

    /// Clears the log and run statistics.
    pub fn initialize(&mut self) {
        self.log.clear();
        self.iterations = 0;
        self.last_delta = 0.0;
    }

    /// Yields `(T(s'|s,a), s', R(s'))` for every distinct next state.
    ///
    /// Empty when `state` is terminal. Call again to restart.
    pub fn transitions_at(
        &self,
        state: &State,
        action: Action,
    ) -> impl Iterator<Item = (f64, State, f64)> + 'a {
        let env = self.env;
        env.transit(state, action)
            .into_iter()
            .map(move |(next_state, prob)| {
                let (reward, _) = env.reward(&next_state);
                (prob, next_state, reward)
            })
    }

    /// `sum_{s'} T(s'|s,a) * ( R(s') + gamma * V(s') )`.
    pub fn expected_value(
        &self,
        state: &State,
        action: Action,
        values: &StateValues,
        gamma: f64,
    ) -> f64 {
        self.transitions_at(state, action)
            .map(|(prob, next_state, reward)| {
                let next_value = values.get(&next_state).copied().unwrap_or(0.0);
                prob * (reward + gamma * next_value)
            })
            .sum()
    }

    /// Best action under `values` and its backed-up value.
    ///
    /// Ties go to the action listed first by the environment.
    pub fn greedy_action(
        &self,
        state: &State,
        values: &StateValues,
        gamma: f64,
    ) -> (Action, f64) {
        let mut best_action = Action::ALL[0];
        let mut best_value = f64::NEG_INFINITY;
        for &action in self.env.actions() {
            let q = self.expected_value(state, action, values, gamma);
            if q > best_value {
                best_value = q;
                best_action = action;
            }
        }
        (best_action, best_value)
    }

    /// Deterministic policy that is greedy with respect to `values`.
    pub fn greedy_policy(&self, values: &StateValues, gamma: f64) -> Policy {
        self.env
            .states()
            .iter()
            .map(|state| {
                let (action, _) = self.greedy_action(state, values, gamma);
                (*state, one_hot(action))
            })
            .collect()
    }

    /// Lays `values` out on the grid.
    pub fn format_values(&self, values: &StateValues) -> ValueGrid {
        let mut grid = Array2::zeros((self.env.row_count(), self.env.column_count()));
        for (state, value) in values {
            if let Some(cell) = grid.get_mut((state.row, state.column)) {
                *cell = *value;
            }
        }
        grid
    }

    /// Appends a snapshot of `values` to the log and returns it.
    pub fn record(&mut self, values: &StateValues) -> ValueGrid {
        let snapshot = self.format_values(values);
        self.log.push(snapshot.clone());
        snapshot
    }

    pub fn log(&self) -> &[ValueGrid] {
        &self.log
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn last_delta(&self) -> f64 {
        self.last_delta
    }

    /// Counts one completed iteration and remembers its delta.
    pub(crate) fn complete_iteration(&mut self, delta: f64) -> usize {
        self.iterations += 1;
        self.last_delta = delta;
        self.iterations
    }
}

/// One-hot action distribution.
pub fn one_hot(action: Action) -> [f64; Action::COUNT] {
    let mut probs = [0.0; Action::COUNT];
    probs[action.index()] = 1.0;
    probs
}

/// The action a deterministic distribution commits to, if any.
pub fn committed_action(probs: &[f64; Action::COUNT]) -> Option<Action> {
    Action::ALL.into_iter().find(|a| probs[a.index()] == 1.0)
}

mod private {
    pub trait Sealed {}
}

/// Common contract of the planners in this module.
pub trait Plan: private::Sealed {
    /// Resets the planner, solves the model, and returns the final value grid.
    ///
    /// # Errors
    /// `InvalidConfiguration` for a bad `config`, `Convergence` when the
    /// iteration guard trips during a sweep loop, `PolicyUnstable` when it
    /// trips while the policy is still changing.
    fn plan(&mut self, config: &PlanConfig) -> Result<ValueGrid>;

    /// Snapshots of the last run in chronological order.
    fn log(&self) -> &[ValueGrid];

    /// Deterministic policy derived from the last run.
    fn policy(&self) -> Policy;

    /// Iterations performed by the last run.
    fn iterations(&self) -> usize;

    /// Sup-norm delta of the final sweep of the last run.
    fn last_delta(&self) -> f64;
}

impl<E: Environment> private::Sealed for ValueIterationPlanner<'_, E> {}
impl<E: Environment> private::Sealed for PolicyIterationPlanner<'_, E> {}

/// Planner selector used at request boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    ValueIteration,
    PolicyIteration,
}

impl FromStr for Algorithm {
    type Err = PlanError;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "value" => Ok(Algorithm::ValueIteration),
            "policy" => Ok(Algorithm::PolicyIteration),
            other => Err(PlanError::UnsupportedPlanner {
                name: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::ValueIteration => f.write_str("value"),
            Algorithm::PolicyIteration => f.write_str("policy"),
        }
    }
}

/// Either planner, chosen at runtime.
#[derive(Debug)]
pub enum Planner<'a, E: Environment> {
    Value(ValueIterationPlanner<'a, E>),
    Policy(PolicyIterationPlanner<'a, E>),
}

impl<'a, E: Environment> Planner<'a, E> {
    pub fn new(algorithm: Algorithm, env: &'a E) -> Self {
        match algorithm {
            Algorithm::ValueIteration => Planner::Value(ValueIterationPlanner::new(env)),
            Algorithm::PolicyIteration => Planner::Policy(PolicyIterationPlanner::new(env)),
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        match self {
            Planner::Value(_) => Algorithm::ValueIteration,
            Planner::Policy(_) => Algorithm::PolicyIteration,
        }
    }
}

impl<E: Environment> private::Sealed for Planner<'_, E> {}

impl<E: Environment> Plan for Planner<'_, E> {
    fn plan(&mut self, config: &PlanConfig) -> Result<ValueGrid> {
        match self {
            Planner::Value(p) => p.plan(config),
            Planner::Policy(p) => p.plan(config),
        }
    }

    fn log(&self) -> &[ValueGrid] {
        match self {
            Planner::Value(p) => p.log(),
            Planner::Policy(p) => p.log(),
        }
    }

    fn policy(&self) -> Policy {
        match self {
            Planner::Value(p) => p.policy(),
            Planner::Policy(p) => p.policy(),
        }
    }

    fn iterations(&self) -> usize {
        match self {
            Planner::Value(p) => p.iterations(),
            Planner::Policy(p) => p.iterations(),
        }
    }

    fn last_delta(&self) -> f64 {
        match self {
            Planner::Value(p) => p.last_delta(),
            Planner::Policy(p) => p.last_delta(),
        }
    }
}
