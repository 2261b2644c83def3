//! Error types shared by the environment, planners and the request boundary.

use thiserror::Error;

/// Result type for planning operations
pub type Result<T> = std::result::Result<T, PlanError>;

/// Errors that can occur while building a model or planning over it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    /// The grid is empty, ragged, or holds an unknown cell code.
    #[error("invalid grid: {reason}")]
    InvalidGrid { reason: String },

    /// A probability, discount factor or threshold is out of range.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    /// An action was requested from a state that cannot act.
    #[error("cannot move from terminal or blocked state ({row}, {column})")]
    InvalidMove { row: usize, column: usize },

    /// A chain state token could not be parsed.
    #[error("invalid chain state: {token}")]
    InvalidState { token: String },

    /// The iteration guard tripped before the sup-norm delta fell below threshold.
    #[error("no convergence after {iterations} iterations (delta {delta})")]
    Convergence { iterations: usize, delta: f64 },

    /// Policy iteration hit the iteration guard while actions kept changing.
    #[error("policy still changing after {iterations} iterations ({changed} states changed action)")]
    PolicyUnstable { iterations: usize, changed: usize },

    /// The algorithm selector named no known planner.
    #[error("unsupported planner: {name}")]
    UnsupportedPlanner { name: String },

    /// A request body could not be decoded or encoded.
    #[error("malformed request: {reason}")]
    MalformedRequest { reason: String },
}

impl PlanError {
    pub(crate) fn invalid_grid(reason: impl Into<String>) -> Self {
        PlanError::InvalidGrid {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        PlanError::InvalidConfiguration {
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for PlanError {
    fn from(err: serde_json::Error) -> Self {
        PlanError::MalformedRequest {
            reason: err.to_string(),
        }
    }
}
