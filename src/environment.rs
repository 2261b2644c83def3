//! Fully known environments for dynamic-programming planners.
//!
//! A planner never samples the world; it queries the model directly. The
//! [`Environment`] trait is the capability set a planner relies on:
//! state enumeration, the action set, the transition function
//! `T(s'|s,a)`, the reward function `R(s')`, and the grid shape used to lay
//! value functions out as snapshots.
//!
//! Currently implemented:
//! - [`GridWorld`]: a stochastic grid where the agent may drift sideways

pub mod grid;

pub use grid::{GridWorld, DEFAULT_MOVE_PROB, DEFAULT_STEP_REWARD};

use crate::error::{PlanError, Result};
use std::fmt;

/// A grid coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct State {
    pub row: usize,
    pub column: usize,
}

impl State {
    pub fn new(row: usize, column: usize) -> Self {
        State { row, column }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.row, self.column)
    }
}

/// The four grid moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Up,
    Down,
    Left,
    Right,
}

impl Action {
    pub const COUNT: usize = 4;

    /// Fixed enumeration order. Ties in greedy selection go to the earliest entry.
    pub const ALL: [Action; Action::COUNT] =
        [Action::Up, Action::Down, Action::Left, Action::Right];

    pub fn opposite(self) -> Action {
        match self {
            Action::Up => Action::Down,
            Action::Down => Action::Up,
            Action::Left => Action::Right,
            Action::Right => Action::Left,
        }
    }

    /// Position of this action in [`Action::ALL`].
    pub fn index(self) -> usize {
        match self {
            Action::Up => 0,
            Action::Down => 1,
            Action::Left => 2,
            Action::Right => 3,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Up => "UP",
            Action::Down => "DOWN",
            Action::Left => "LEFT",
            Action::Right => "RIGHT",
        };
        f.write_str(name)
    }
}

/// Cell kinds, keyed by their numeric codes in a grid payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cell {
    /// Code `-1`: terminal cell with reward -1.
    Ordinary,
    /// Code `0`: walkable cell; the only kind an agent can act from.
    Damage,
    /// Code `1`: terminal cell with reward +1.
    Reward,
    /// Code `9`: wall. Never part of the state set.
    Block,
}

impl Cell {
    /// Reward and terminal flag for landing in this cell.
    ///
    /// `Block` is never reachable; it is reported as an absorbing zero.
    pub fn classify(self, default_reward: f64) -> (f64, bool) {
        match self {
            Cell::Reward => (1.0, true),
            Cell::Ordinary => (-1.0, true),
            Cell::Damage => (default_reward, false),
            Cell::Block => (0.0, true),
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Cell::Ordinary => -1,
            Cell::Damage => 0,
            Cell::Reward => 1,
            Cell::Block => 9,
        }
    }
}

impl TryFrom<i64> for Cell {
    type Error = PlanError;

    fn try_from(code: i64) -> Result<Self> {
        match code {
            -1 => Ok(Cell::Ordinary),
            0 => Ok(Cell::Damage),
            1 => Ok(Cell::Reward),
            9 => Ok(Cell::Block),
            other => Err(PlanError::invalid_grid(format!(
                "unrecognized cell code {}",
                other
            ))),
        }
    }
}

/// Outcome distribution `T(s'|s,a)` over distinct next states.
///
/// Empty when the source state is terminal. Otherwise the probabilities sum
/// to 1.0. Entries keep the order in which their next state was first
/// produced, so iteration is deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransitionProbs {
    entries: Vec<(State, f64)>,
}

impl TransitionProbs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `prob` to the entry for `state`, creating it if needed.
    pub fn add(&mut self, state: State, prob: f64) {
        match self.entries.iter_mut().find(|(s, _)| *s == state) {
            Some((_, p)) => *p += prob,
            None => self.entries.push((state, prob)),
        }
    }

    pub fn probability(&self, state: &State) -> f64 {
        self.entries
            .iter()
            .find(|(s, _)| s == state)
            .map_or(0.0, |(_, p)| *p)
    }

    pub fn total(&self) -> f64 {
        self.entries.iter().map(|(_, p)| p).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (State, f64)> + '_ {
        self.entries.iter().copied()
    }
}

impl IntoIterator for TransitionProbs {
    type Item = (State, f64);
    type IntoIter = std::vec::IntoIter<(State, f64)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Capability set a planner needs from its model.
pub trait Environment {
    /// Number of grid rows.
    fn row_count(&self) -> usize;

    /// Number of grid columns.
    fn column_count(&self) -> usize;

    /// Every non-blocked state, in row-major order.
    fn states(&self) -> &[State];

    /// The action set, in its fixed enumeration order.
    fn actions(&self) -> &[Action] {
        &Action::ALL
    }

    /// Whether an agent can take actions from `state`.
    fn can_act(&self, state: &State) -> bool;

    /// `T(s'|s,a)`. Empty when `can_act(state)` is false.
    fn transit(&self, state: &State, action: Action) -> TransitionProbs;

    /// `R(s)` and whether `s` ends an episode.
    fn reward(&self, state: &State) -> (f64, bool);

    /// Puts the agent back on its start cell and returns that cell.
    fn reset(&mut self) -> State;
}
