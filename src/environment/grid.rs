//! Stochastic grid world.
//!
//! The agent moves one cell per step. The intended direction succeeds with
//! probability `move_prob`; the remainder is split evenly between the two
//! perpendicular directions. The agent never moves backwards. A move that
//! would leave the grid or enter a block cell leaves the agent in place.

use super::{Action, Cell, Environment, State, TransitionProbs};
use crate::error::{PlanError, Result};
use log::trace;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

/// Default probability that the intended move is executed.
pub const DEFAULT_MOVE_PROB: f64 = 0.8;

/// Default reward for landing on a walkable, non-terminal cell.
pub const DEFAULT_STEP_REWARD: f64 = -0.04;

/// A rectangular grid world with known dynamics.
#[derive(Debug, Clone)]
pub struct GridWorld {
    cells: Vec<Vec<Cell>>,
    move_prob: f64,
    default_reward: f64,
    states: Vec<State>,
    agent_state: State,
}

impl GridWorld {
    /// Builds a grid from numeric cell codes (`-1`, `0`, `1`, `9`).
    ///
    /// # Errors
    /// `InvalidGrid` if the grid is empty, ragged or holds an unknown code;
    /// `InvalidConfiguration` if `move_prob` lies outside `[0, 1]`.
    pub fn new(codes: &[Vec<i64>], move_prob: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&move_prob) {
            return Err(PlanError::invalid_config(format!(
                "move probability must be within [0, 1], got {}",
                move_prob
            )));
        }

        let columns = match codes.first() {
            Some(row) if !row.is_empty() => row.len(),
            _ => return Err(PlanError::invalid_grid("grid has no cells")),
        };

        let mut cells = Vec::with_capacity(codes.len());
        for (r, row) in codes.iter().enumerate() {
            if row.len() != columns {
                return Err(PlanError::invalid_grid(format!(
                    "row {} has {} cells, expected {}",
                    r,
                    row.len(),
                    columns
                )));
            }
            let parsed = row
                .iter()
                .map(|&code| Cell::try_from(code))
                .collect::<Result<Vec<_>>>()?;
            cells.push(parsed);
        }

        let states = cells
            .iter()
            .enumerate()
            .flat_map(|(r, row)| {
                row.iter()
                    .enumerate()
                    .filter(|(_, cell)| **cell != Cell::Block)
                    .map(move |(c, _)| State::new(r, c))
            })
            .collect();

        Ok(GridWorld {
            agent_state: State::new(cells.len() - 1, 0),
            cells,
            move_prob,
            default_reward: DEFAULT_STEP_REWARD,
            states,
        })
    }

    /// Replaces the reward for non-terminal cells.
    pub fn with_default_reward(mut self, reward: f64) -> Self {
        self.default_reward = reward;
        self
    }

    pub fn move_prob(&self) -> f64 {
        self.move_prob
    }

    pub fn default_reward(&self) -> f64 {
        self.default_reward
    }

    /// Current agent position.
    pub fn agent_state(&self) -> State {
        self.agent_state
    }

    /// Cell at `state`, or `None` outside the grid.
    pub fn cell(&self, state: &State) -> Option<Cell> {
        self.cells
            .get(state.row)
            .and_then(|row| row.get(state.column))
            .copied()
    }

    /// Single deterministic move, clamped to the grid and around blocks.
    ///
    /// # Errors
    /// `InvalidMove` if `state` cannot act.
    pub fn move_from(&self, state: &State, action: Action) -> Result<State> {
        if !self.can_act(state) {
            return Err(PlanError::InvalidMove {
                row: state.row,
                column: state.column,
            });
        }

        let (row, column) = (state.row, state.column);
        let target = match action {
            Action::Up => row.checked_sub(1).map(|r| State::new(r, column)),
            Action::Down => Some(State::new(row + 1, column)),
            Action::Left => column.checked_sub(1).map(|c| State::new(row, c)),
            Action::Right => Some(State::new(row, column + 1)),
        };

        Ok(match target.map(|t| (t, self.cell(&t))) {
            Some((next, Some(cell))) if cell != Cell::Block => next,
            _ => *state,
        })
    }

    /// Samples one outcome of taking `action` in `state`.
    ///
    /// Returns the next state, its reward and whether it is terminal.
    ///
    /// # Errors
    /// `InvalidMove` if `state` cannot act.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        state: &State,
        action: Action,
        rng: &mut R,
    ) -> Result<(State, f64, bool)> {
        let probs = self.transit(state, action);
        if probs.is_empty() {
            return Err(PlanError::InvalidMove {
                row: state.row,
                column: state.column,
            });
        }

        let (next_states, weights): (Vec<State>, Vec<f64>) = probs.iter().unzip();
        let dist = WeightedIndex::new(&weights).map_err(|e| {
            PlanError::invalid_config(format!("bad transition weights: {}", e))
        })?;
        let next_state = next_states[dist.sample(rng)];
        let (reward, done) = self.reward(&next_state);
        Ok((next_state, reward, done))
    }

    /// Moves the agent by sampling from the transition distribution.
    ///
    /// # Errors
    /// `InvalidMove` if the agent already sits on a terminal cell.
    pub fn step<R: Rng + ?Sized>(
        &mut self,
        action: Action,
        rng: &mut R,
    ) -> Result<(State, f64, bool)> {
        let (next_state, reward, done) = self.sample(&self.agent_state, action, rng)?;
        trace!("agent {} --{}--> {}", self.agent_state, action, next_state);
        self.agent_state = next_state;
        Ok((next_state, reward, done))
    }
}

impl Environment for GridWorld {
    fn row_count(&self) -> usize {
        self.cells.len()
    }

    fn column_count(&self) -> usize {
        self.cells.first().map_or(0, Vec::len)
    }

    fn states(&self) -> &[State] {
        &self.states
    }

    fn can_act(&self, state: &State) -> bool {
        self.cell(state) == Some(Cell::Damage)
    }

    fn transit(&self, state: &State, action: Action) -> TransitionProbs {
        let mut probs = TransitionProbs::new();
        if !self.can_act(state) {
            return probs;
        }

        let side_prob = (1.0 - self.move_prob) / 2.0;
        for &candidate in self.actions() {
            let prob = if candidate == action {
                self.move_prob
            } else if candidate == action.opposite() {
                0.0
            } else {
                side_prob
            };
            if prob <= 0.0 {
                continue;
            }
            // can_act was checked above, so the move cannot fail
            let next_state = self.move_from(state, candidate).unwrap_or(*state);
            probs.add(next_state, prob);
        }
        probs
    }

    fn reward(&self, state: &State) -> (f64, bool) {
        self.cell(state)
            .unwrap_or(Cell::Block)
            .classify(self.default_reward)
    }

    /// Always the lower-left cell, even when it is blocked or terminal;
    /// stepping from there then fails with `InvalidMove`.
    fn reset(&mut self) -> State {
        self.agent_state = State::new(self.row_count() - 1, 0);
        self.agent_state
    }
}
