pub mod agent;
pub mod chain;
pub mod environment;
pub mod error;
pub mod planner;
pub mod service;

pub use chain::{ChainAction, ChainMdp, ChainState};
pub use environment::{Action, Cell, Environment, GridWorld, State, TransitionProbs};
pub use error::{PlanError, Result};
pub use planner::{
    Algorithm, Plan, PlanConfig, Planner, PolicyIterationPlanner, ValueGrid,
    ValueIterationPlanner,
};
