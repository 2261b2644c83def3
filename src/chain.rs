//! A bounded-horizon binary decision chain solved by direct expansion of the
//! Bellman equation.
//!
//! A state is the history of `up`/`down` choices made so far. Each choice
//! is executed as intended with probability `move_prob`, otherwise the
//! opposite choice is recorded. Once the history reaches the horizon, the
//! next transition lands in one of two absorbing end states: `happy_end`
//! (+1) when at least `happy_threshold` choices were `up`, `bad_end` (-1)
//! otherwise. Every other state has reward 0.
//!
//! ```text
//! V(s) = R(s) + gamma * max_a sum_{s'} T(s'|s,a) * V(s')
//! ```
//!
//! [`ChainMdp::value`] evaluates this recursively with no table, re-expanding
//! the whole remaining tree on every call. The cost is exponential in the
//! remaining horizon. [`ChainMdp::value_memoized`] returns the same numbers
//! with a per-call cache.
//!
//! # Examples
//!
//! ```
//! use mdp_planner::chain::{ChainMdp, ChainState};
//!
//! let mdp = ChainMdp::default();
//! let start: ChainState = "state".parse().unwrap();
//! let doomed: ChainState = "state_down_down".parse().unwrap();
//!
//! assert!(mdp.value(&start, 0.99) > mdp.value(&doomed, 0.99));
//! ```

use crate::error::{PlanError, Result};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// The two choices available at every step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainAction {
    Up,
    Down,
}

impl ChainAction {
    pub const ALL: [ChainAction; 2] = [ChainAction::Up, ChainAction::Down];

    pub fn opposite(self) -> ChainAction {
        match self {
            ChainAction::Up => ChainAction::Down,
            ChainAction::Down => ChainAction::Up,
        }
    }

    fn token(self) -> &'static str {
        match self {
            ChainAction::Up => "up",
            ChainAction::Down => "down",
        }
    }
}

/// A node of the chain: an action history or one of the two end states.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChainState {
    History(Vec<ChainAction>),
    HappyEnd,
    BadEnd,
}

impl ChainState {
    /// The empty history.
    pub fn start() -> Self {
        ChainState::History(Vec::new())
    }

    pub fn is_end(&self) -> bool {
        !matches!(self, ChainState::History(_))
    }

    /// Number of `up` choices in the history; zero for end states.
    pub fn up_count(&self) -> usize {
        match self {
            ChainState::History(history) => {
                history.iter().filter(|a| **a == ChainAction::Up).count()
            }
            _ => 0,
        }
    }

    fn extended(history: &[ChainAction], action: ChainAction) -> ChainState {
        let mut next = history.to_vec();
        next.push(action);
        ChainState::History(next)
    }
}

impl fmt::Display for ChainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainState::HappyEnd => f.write_str("happy_end"),
            ChainState::BadEnd => f.write_str("bad_end"),
            ChainState::History(history) => {
                f.write_str("state")?;
                for action in history {
                    write!(f, "_{}", action.token())?;
                }
                Ok(())
            }
        }
    }
}

impl FromStr for ChainState {
    type Err = PlanError;

    /// Parses `state`, `state_up_down...`, `happy_end` or `bad_end`.
    fn from_str(token: &str) -> Result<Self> {
        let invalid = || PlanError::InvalidState {
            token: token.to_string(),
        };
        match token {
            "happy_end" => return Ok(ChainState::HappyEnd),
            "bad_end" => return Ok(ChainState::BadEnd),
            _ => {}
        }

        let mut parts = token.split('_');
        if parts.next() != Some("state") {
            return Err(invalid());
        }
        parts
            .map(|part| match part {
                "up" => Ok(ChainAction::Up),
                "down" => Ok(ChainAction::Down),
                _ => Err(invalid()),
            })
            .collect::<Result<Vec<_>>>()
            .map(ChainState::History)
    }
}

/// The chain model and its evaluator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainMdp {
    horizon: usize,
    happy_threshold: usize,
    move_prob: f64,
}

impl Default for ChainMdp {
    fn default() -> Self {
        ChainMdp {
            horizon: 5,
            happy_threshold: 4,
            move_prob: 0.9,
        }
    }
}

impl ChainMdp {
    /// Discount used when callers have no preference.
    pub const DEFAULT_GAMMA: f64 = 0.99;

    /// # Errors
    /// `InvalidConfiguration` for a zero horizon or a `move_prob` outside `[0, 1]`.
    pub fn new(horizon: usize, happy_threshold: usize, move_prob: f64) -> Result<Self> {
        if horizon == 0 {
            return Err(PlanError::invalid_config("horizon must be at least 1"));
        }
        if !(0.0..=1.0).contains(&move_prob) {
            return Err(PlanError::invalid_config(format!(
                "move probability must be within [0, 1], got {}",
                move_prob
            )));
        }
        Ok(ChainMdp {
            horizon,
            happy_threshold,
            move_prob,
        })
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn happy_threshold(&self) -> usize {
        self.happy_threshold
    }

    pub fn move_prob(&self) -> f64 {
        self.move_prob
    }

    /// `R(s)`: +1 for `happy_end`, -1 for `bad_end`, 0 otherwise.
    pub fn reward(&self, state: &ChainState) -> f64 {
        match state {
            ChainState::HappyEnd => 1.0,
            ChainState::BadEnd => -1.0,
            ChainState::History(_) => 0.0,
        }
    }

    /// `T(s'|s,a)`.
    ///
    /// End states have no successors. A history at (or past) the horizon
    /// moves to its end state with probability 1 whatever the action.
    pub fn transit(&self, state: &ChainState, action: ChainAction) -> Vec<(ChainState, f64)> {
        let history = match state {
            ChainState::History(history) => history,
            _ => return Vec::new(),
        };

        if history.len() >= self.horizon {
            let end = if state.up_count() >= self.happy_threshold {
                ChainState::HappyEnd
            } else {
                ChainState::BadEnd
            };
            return vec![(end, 1.0)];
        }

        vec![
            (ChainState::extended(history, action), self.move_prob),
            (
                ChainState::extended(history, action.opposite()),
                1.0 - self.move_prob,
            ),
        ]
    }

    /// `V(s)` by direct recursive expansion.
    pub fn value(&self, state: &ChainState, gamma: f64) -> f64 {
        self.reward(state) + gamma * self.max_next_value(state, gamma)
    }

    fn max_next_value(&self, state: &ChainState, gamma: f64) -> f64 {
        if state.is_end() {
            return 0.0;
        }
        ChainAction::ALL
            .iter()
            .map(|&action| {
                self.transit(state, action)
                    .iter()
                    .map(|(next_state, prob)| prob * self.value(next_state, gamma))
                    .sum::<f64>()
            })
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Same as [`ChainMdp::value`], caching each state's value for the
    /// duration of the call.
    pub fn value_memoized(&self, state: &ChainState, gamma: f64) -> f64 {
        let mut cache = HashMap::new();
        self.value_cached(state, gamma, &mut cache)
    }

    fn value_cached(
        &self,
        state: &ChainState,
        gamma: f64,
        cache: &mut HashMap<ChainState, f64>,
    ) -> f64 {
        if let Some(value) = cache.get(state) {
            return *value;
        }

        let next = if state.is_end() {
            0.0
        } else {
            let mut best = f64::NEG_INFINITY;
            for action in ChainAction::ALL {
                let mut expected = 0.0;
                for (next_state, prob) in self.transit(state, action) {
                    expected += prob * self.value_cached(&next_state, gamma, cache);
                }
                best = best.max(expected);
            }
            best
        };

        let value = self.reward(state) + gamma * next;
        cache.insert(state.clone(), value);
        value
    }

    /// Every state reachable from the empty history, breadth first.
    pub fn reachable_states(&self) -> Vec<ChainState> {
        let mut states = vec![ChainState::start()];
        let mut i = 0;
        while i < states.len() {
            let state = states[i].clone();
            for action in ChainAction::ALL {
                for (next_state, _) in self.transit(&state, action) {
                    if !states.contains(&next_state) {
                        states.push(next_state);
                    }
                }
            }
            i += 1;
        }
        states
    }
}
