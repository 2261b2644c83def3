//! Policy iteration: alternate policy evaluation and greedy improvement
//! until no state changes its action.
//!
//! Improvement only moves a state off its committed action for a gain above
//! the threshold, and the loop also stops once `V_pi` stops moving. Exactly
//! tied actions therefore cannot make the policy oscillate.

use super::{
    committed_action, one_hot, Plan, PlanConfig, PlannerBase, Policy, StateValues, ValueGrid,
};
use crate::environment::{Action, Environment};
use crate::error::{PlanError, Result};
use log::{debug, info, trace, warn};

/// Improves an explicit policy, starting from the uniform one.
#[derive(Debug)]
pub struct PolicyIterationPlanner<'a, E: Environment> {
    base: PlannerBase<'a, E>,
    policy: Policy,
    values: StateValues,
}

impl<'a, E: Environment> PolicyIterationPlanner<'a, E> {
    pub fn new(env: &'a E) -> Self {
        PolicyIterationPlanner {
            base: PlannerBase::new(env),
            policy: Policy::new(),
            values: StateValues::new(),
        }
    }

    /// Clears the log and sets every state to the uniform policy.
    pub fn initialize(&mut self) {
        self.base.initialize();
        let uniform = [1.0 / Action::COUNT as f64; Action::COUNT];
        self.policy = self
            .base
            .env()
            .states()
            .iter()
            .map(|state| (*state, uniform))
            .collect();
        self.values.clear();
    }

    /// The policy as it currently stands, stochastic before the first improvement.
    pub fn current_policy(&self) -> &Policy {
        &self.policy
    }

    /// `V_pi` from the last evaluation.
    pub fn values(&self) -> &StateValues {
        &self.values
    }

    /// Iterates `V(s) = sum_a pi(a|s) sum_{s'} T(s'|s,a) (R(s') + gamma V(s'))`
    /// to its fixed point. Returns the values and the final sweep delta.
    pub fn evaluate(&self, config: &PlanConfig) -> Result<(StateValues, f64)> {
        let env = self.base.env();
        let mut values: StateValues = env.states().iter().map(|s| (*s, 0.0)).collect();
        let mut sweeps = 0;

        loop {
            let mut delta = 0.0_f64;
            for state in env.states() {
                let Some(probs) = self.policy.get(state) else {
                    continue;
                };
                let current = values.get(state).copied().unwrap_or(0.0);
                let updated: f64 = env
                    .actions()
                    .iter()
                    .filter(|action| probs[action.index()] > 0.0)
                    .map(|&action| {
                        probs[action.index()]
                            * self
                                .base
                                .expected_value(state, action, &values, config.gamma)
                    })
                    .sum();
                values.insert(*state, updated);
                delta = delta.max((updated - current).abs());
            }
            sweeps += 1;

            if delta < config.threshold {
                debug!("policy evaluation settled after {} sweeps", sweeps);
                return Ok((values, delta));
            }
            config.check_guard(sweeps, delta)?;
        }
    }

    /// Makes the policy greedy in `values`; returns how many states changed action.
    ///
    /// A state keeps its committed action unless the best action beats it by
    /// more than `tolerance`. States with no committed action take the first
    /// best action in enumeration order.
    fn improve(&mut self, values: &StateValues, gamma: f64, tolerance: f64) -> usize {
        let env = self.base.env();
        let mut changed = 0;
        for state in env.states() {
            let (best_action, best_value) = self.base.greedy_action(state, values, gamma);
            let previous = self.policy.get(state).and_then(committed_action);
            let next_action = match previous {
                Some(action) if action == best_action => action,
                Some(action) => {
                    let held = self.base.expected_value(state, action, values, gamma);
                    if best_value - held > tolerance {
                        best_action
                    } else {
                        action
                    }
                }
                None => best_action,
            };
            if previous != Some(next_action) {
                trace!("policy at {}: {:?} -> {}", state, previous, next_action);
                changed += 1;
            }
            self.policy.insert(*state, one_hot(next_action));
        }
        changed
    }
}

/// Sup-norm distance between two value functions over the same states.
fn value_shift(previous: &StateValues, current: &StateValues) -> f64 {
    current
        .iter()
        .map(|(state, value)| (value - previous.get(state).copied().unwrap_or(0.0)).abs())
        .fold(0.0, f64::max)
}

impl<E: Environment> Plan for PolicyIterationPlanner<'_, E> {
    fn plan(&mut self, config: &PlanConfig) -> Result<ValueGrid> {
        config.validate()?;
        self.initialize();

        loop {
            let (values, delta) = self.evaluate(config)?;
            self.base.record(&values);
            let iterations = self.base.complete_iteration(delta);

            // a policy switch that leaves V_pi where it was is a tie, not progress
            if iterations > 1 && value_shift(&self.values, &values) < config.threshold {
                info!("policy values settled after {} iterations", iterations);
                self.values = values;
                break;
            }

            let changed = self.improve(&values, config.gamma, config.threshold);
            self.values = values;
            debug!(
                "policy iteration {}: {} states changed action",
                iterations, changed
            );
            if changed == 0 {
                info!("policy iteration stable after {} iterations", iterations);
                break;
            }
            if config.exhausted(iterations) {
                warn!(
                    "policy iteration guard tripped after {} iterations, {} states still changing",
                    iterations, changed
                );
                return Err(PlanError::PolicyUnstable {
                    iterations,
                    changed,
                });
            }
        }

        Ok(self.base.record(&self.values))
    }

    fn log(&self) -> &[ValueGrid] {
        self.base.log()
    }

    fn policy(&self) -> Policy {
        self.policy.clone()
    }

    fn iterations(&self) -> usize {
        self.base.iterations()
    }

    fn last_delta(&self) -> f64 {
        self.base.last_delta()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{GridWorld, State};
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_initial_policy_is_uniform() {
        let env = GridWorld::new(&[vec![0, 0, 1]], 0.8).unwrap();
        let mut planner = PolicyIterationPlanner::new(&env);
        planner.initialize();

        assert_eq!(planner.current_policy().len(), 3);
        for probs in planner.current_policy().values() {
            assert_abs_diff_eq!(probs.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
            assert!(probs.iter().all(|p| *p == 0.25));
        }
    }

    #[test]
    fn test_policy_becomes_deterministic() {
        let env = GridWorld::new(&[vec![0, 0, 1]], 0.8).unwrap();
        let mut planner = PolicyIterationPlanner::new(&env);
        planner.plan(&PlanConfig::default()).unwrap();

        for probs in planner.policy().values() {
            assert!(committed_action(probs).is_some());
            assert_eq!(probs.iter().filter(|p| **p == 0.0).count(), 3);
        }
        assert_eq!(
            committed_action(&planner.policy()[&State::new(0, 1)]),
            Some(Action::Right)
        );
    }

    #[test]
    fn test_uniform_evaluation_of_corridor() {
        // single actionable cell between two walls and a goal; uniform policy
        let env = GridWorld::new(&[vec![0, 1]], 1.0).unwrap();
        let mut planner = PolicyIterationPlanner::new(&env);
        planner.initialize();
        let config = PlanConfig::default().with_threshold(1e-12);
        let (values, delta) = planner.evaluate(&config).unwrap();

        // V = 0.25 * 1 + 0.75 * (-0.04 + 0.9 V)  =>  V = (0.25 - 0.03) / (1 - 0.675)
        let expected = (0.25 - 0.03) / (1.0 - 0.675);
        assert_abs_diff_eq!(values[&State::new(0, 0)], expected, epsilon = 1e-9);
        assert!(delta < 1e-12);
    }

    #[test]
    fn test_tied_actions_keep_committed_choice() {
        // symmetric about the diagonal: Down and Right tie at (1, 1)
        let env = GridWorld::new(&[vec![0, 0, 0], vec![0, 0, 0], vec![0, 0, 1]], 0.8).unwrap();
        let mut planner = PolicyIterationPlanner::new(&env);
        let config = PlanConfig::default().with_threshold(1e-9);
        planner.plan(&config).unwrap();
        let values = planner.values().clone();

        let state = State::new(1, 1);
        for action in [Action::Down, Action::Right] {
            planner.policy.insert(state, one_hot(action));
            assert_eq!(planner.improve(&values, config.gamma, 1e-6), 0);
            assert_eq!(
                committed_action(&planner.current_policy()[&state]),
                Some(action)
            );
        }
    }

    #[test]
    fn test_outer_guard_reports_changed_states() {
        // no rewards anywhere: evaluation settles in one sweep, improvement
        // still commits every state
        let env = GridWorld::new(&[vec![0, 0]], 0.8)
            .unwrap()
            .with_default_reward(0.0);
        let mut planner = PolicyIterationPlanner::new(&env);
        let config = PlanConfig::default().with_max_iterations(Some(1));

        assert_eq!(
            planner.plan(&config),
            Err(PlanError::PolicyUnstable {
                iterations: 1,
                changed: 2
            })
        );
    }

    #[test]
    fn test_log_has_one_snapshot_per_iteration_plus_result() {
        let env = GridWorld::new(&[vec![0, 0, 1]], 0.8).unwrap();
        let mut planner = PolicyIterationPlanner::new(&env);
        let values = planner.plan(&PlanConfig::default()).unwrap();

        assert!(planner.iterations() >= 2);
        assert_eq!(planner.log().len(), planner.iterations() + 1);
        assert_eq!(planner.log().last(), Some(&values));
    }
}
