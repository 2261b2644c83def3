//! Value iteration: repeated Bellman optimality backups until the value
//! function stops moving.
//!
//! Each sweep updates states in place (later states in a sweep already see
//! the new values of earlier ones). Since the backup is a `gamma`-contraction
//! in the sup norm, the final values are within `threshold * gamma / (1 - gamma)`
//! of the optimum.

use super::{Plan, PlanConfig, PlannerBase, Policy, StateValues, ValueGrid};
use crate::environment::Environment;
use crate::error::Result;
use log::{debug, info};

/// Solves for the optimal state values directly.
#[derive(Debug)]
pub struct ValueIterationPlanner<'a, E: Environment> {
    base: PlannerBase<'a, E>,
    values: StateValues,
    gamma: f64,
}

impl<'a, E: Environment> ValueIterationPlanner<'a, E> {
    pub fn new(env: &'a E) -> Self {
        ValueIterationPlanner {
            base: PlannerBase::new(env),
            values: StateValues::new(),
            gamma: 0.0,
        }
    }

    /// Resets values to zero over every state and clears the log.
    pub fn initialize(&mut self) {
        self.base.initialize();
        self.values = self
            .base
            .env()
            .states()
            .iter()
            .map(|state| (*state, 0.0))
            .collect();
    }

    /// Values from the last run.
    pub fn values(&self) -> &StateValues {
        &self.values
    }

    /// One in-place sweep over the actionable states; returns its sup-norm delta.
    fn sweep(&mut self, gamma: f64) -> f64 {
        let env = self.base.env();
        let mut delta = 0.0_f64;
        for state in env.states() {
            if !env.can_act(state) {
                continue;
            }
            let current = self.values.get(state).copied().unwrap_or(0.0);
            let best = env
                .actions()
                .iter()
                .map(|&action| self.base.expected_value(state, action, &self.values, gamma))
                .fold(f64::NEG_INFINITY, f64::max);
            self.values.insert(*state, best);
            delta = delta.max((best - current).abs());
        }
        delta
    }
}

impl<E: Environment> Plan for ValueIterationPlanner<'_, E> {
    fn plan(&mut self, config: &PlanConfig) -> Result<ValueGrid> {
        config.validate()?;
        self.initialize();
        self.gamma = config.gamma;

        loop {
            self.base.record(&self.values);
            let delta = self.sweep(config.gamma);
            let iterations = self.base.complete_iteration(delta);
            debug!("value iteration sweep {}: delta {}", iterations, delta);

            if delta < config.threshold {
                info!("value iteration converged after {} sweeps", iterations);
                break;
            }
            config.check_guard(iterations, delta)?;
        }

        Ok(self.base.record(&self.values))
    }

    fn log(&self) -> &[ValueGrid] {
        self.base.log()
    }

    fn policy(&self) -> Policy {
        self.base.greedy_policy(&self.values, self.gamma)
    }

    fn iterations(&self) -> usize {
        self.base.iterations()
    }

    fn last_delta(&self) -> f64 {
        self.base.last_delta()
    }
}
