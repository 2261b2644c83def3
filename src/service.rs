//! Transport-independent request handling for "plan over this grid".
//!
//! An HTTP front end posts a body such as
//!
//! ```json
//! {"grid": [[0, 0, 0, 1], [0, 9, 0, -1], [0, 0, 0, 0]], "prob": 0.8, "plan": "value"}
//! ```
//!
//! and gets back `{"log": [...]}`: every snapshot recorded by the planner,
//! oldest first, ending with the final value grid.

use crate::environment::{GridWorld, DEFAULT_MOVE_PROB};
use crate::error::Result;
use crate::planner::{Algorithm, Plan, PlanConfig, Planner, ValueGrid};
use log::info;
use serde::{Deserialize, Serialize};

fn default_prob() -> f64 {
    DEFAULT_MOVE_PROB
}

/// Body of a planning request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRequest {
    /// Cell codes, row by row
    pub grid: Vec<Vec<i64>>,
    /// Probability that a move goes where intended
    #[serde(default = "default_prob")]
    pub prob: f64,
    /// `"value"` or `"policy"`
    pub plan: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gamma: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
}

impl PlanRequest {
    fn config(&self) -> PlanConfig {
        let mut config = PlanConfig::default();
        if let Some(gamma) = self.gamma {
            config = config.with_gamma(gamma);
        }
        if let Some(threshold) = self.threshold {
            config = config.with_threshold(threshold);
        }
        config
    }
}

/// Body of a planning response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResponse {
    pub log: Vec<Vec<Vec<f64>>>,
}

impl PlanResponse {
    pub fn from_log(log: &[ValueGrid]) -> Self {
        PlanResponse {
            log: log
                .iter()
                .map(|grid| grid.rows().into_iter().map(|row| row.to_vec()).collect())
                .collect(),
        }
    }
}

/// Builds the grid, runs the selected planner and returns its log.
///
/// # Errors
/// `UnsupportedPlanner` for an unknown selector, plus any error from grid
/// construction or planning.
pub fn handle_plan_request(request: &PlanRequest) -> Result<PlanResponse> {
    let algorithm: Algorithm = request.plan.parse()?;
    let env = GridWorld::new(&request.grid, request.prob)?;
    let mut planner = Planner::new(algorithm, &env);
    planner.plan(&request.config())?;

    info!(
        "{} planning over {}x{} grid produced {} snapshots",
        algorithm,
        request.grid.len(),
        request.grid.first().map_or(0, Vec::len),
        planner.log().len()
    );
    Ok(PlanResponse::from_log(planner.log()))
}

/// JSON in, JSON out.
///
/// # Errors
/// `MalformedRequest` if `body` is not a valid request, otherwise as
/// [`handle_plan_request`].
pub fn handle_plan_json(body: &str) -> Result<String> {
    let request: PlanRequest = serde_json::from_str(body)?;
    let response = handle_plan_request(&request)?;
    Ok(serde_json::to_string(&response)?)
}
