use crate::environment::{Action, Environment, GridWorld, State};
use crate::error::PlanError;
use crate::planner::{
    committed_action, Algorithm, Plan, PlanConfig, Planner, PlannerBase, PolicyIterationPlanner,
    StateValues, ValueIterationPlanner,
};
use approx::assert_abs_diff_eq;

// 3x4 grid: goal at (0, 3), pit at (1, 3), wall at (1, 1)
fn scenario() -> GridWorld {
    GridWorld::new(
        &[vec![0, 0, 0, 1], vec![0, 9, 0, -1], vec![0, 0, 0, 0]],
        0.8,
    )
    .unwrap()
}

#[test]
fn test_value_iteration_prefers_cells_near_goal() {
    let env = scenario();
    let mut planner = ValueIterationPlanner::new(&env);
    let config = PlanConfig::default().with_gamma(0.9);
    let values = planner.plan(&config).unwrap();

    assert!(values[[0, 2]] > values[[2, 0]]);
    assert!(values[[0, 2]] > values[[0, 1]]);
    assert!(values[[0, 1]] > values[[0, 0]]);
    assert_eq!(values[[1, 1]], 0.0);
}

#[test]
fn test_policy_iteration_steps_into_goal() {
    let env = scenario();
    let mut planner = PolicyIterationPlanner::new(&env);
    planner.plan(&PlanConfig::default()).unwrap();

    let policy = planner.policy();
    let probs = policy[&State::new(0, 2)];
    assert_eq!(probs[Action::Right.index()], 1.0);
    assert_abs_diff_eq!(probs.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
}

#[test]
fn test_both_planners_agree() {
    let env = scenario();
    let config = PlanConfig::default().with_threshold(1e-6);

    let mut value = ValueIterationPlanner::new(&env);
    let mut policy = PolicyIterationPlanner::new(&env);
    let v = value.plan(&config).unwrap();
    let p = policy.plan(&config).unwrap();

    assert_eq!(v.dim(), p.dim());
    for (a, b) in v.iter().zip(p.iter()) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-3);
    }

    let greedy = value.policy();
    assert_eq!(
        committed_action(&greedy[&State::new(0, 2)]),
        committed_action(&policy.policy()[&State::new(0, 2)])
    );
}

fn assert_planners_agree(env: &GridWorld) {
    let config = PlanConfig::default().with_threshold(1e-6);
    let v = ValueIterationPlanner::new(env).plan(&config).unwrap();
    let p = PolicyIterationPlanner::new(env).plan(&config).unwrap();
    for (a, b) in v.iter().zip(p.iter()) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-3);
    }
}

#[test]
fn test_policy_iteration_settles_on_tied_actions() {
    // symmetric about the diagonal, so Down and Right tie along it
    let corner = GridWorld::new(&[vec![0, 0, 0], vec![0, 0, 0], vec![0, 0, 1]], 0.8).unwrap();
    assert_planners_agree(&corner);

    let mut open = vec![vec![0, 0, 0, 0]; 3];
    open.push(vec![0, 0, 0, 1]);
    let open = GridWorld::new(&open, 0.5).unwrap();
    assert_planners_agree(&open);

    let mut planner = PolicyIterationPlanner::new(&corner);
    planner.plan(&PlanConfig::default()).unwrap();
    assert!(planner.iterations() < 20);
}

#[test]
fn test_delta_below_threshold_at_termination() {
    let env = scenario();
    let config = PlanConfig::default().with_threshold(1e-5);

    for algorithm in [Algorithm::ValueIteration, Algorithm::PolicyIteration] {
        let mut planner = Planner::new(algorithm, &env);
        planner.plan(&config).unwrap();
        assert!(planner.last_delta() < 1e-5, "{} planner", algorithm);
    }
}

#[test]
fn test_plan_is_idempotent() {
    let env = scenario();
    let config = PlanConfig::default();

    for algorithm in [Algorithm::ValueIteration, Algorithm::PolicyIteration] {
        let mut planner = Planner::new(algorithm, &env);
        let first = planner.plan(&config).unwrap();
        let first_log = planner.log().to_vec();
        let second = planner.plan(&config).unwrap();

        assert_eq!(first, second);
        assert_eq!(first_log, planner.log());
    }
}

#[test]
fn test_terminal_transitions_are_empty() {
    let env = scenario();
    let base = PlannerBase::new(&env);
    for state in env.states().iter().filter(|s| !env.can_act(s)) {
        for &action in env.actions() {
            assert_eq!(base.transitions_at(state, action).count(), 0);
        }
    }
}

#[test]
fn test_transitions_at_fuses_rewards() {
    let env = scenario();
    let base = PlannerBase::new(&env);
    let fused: Vec<_> = base.transitions_at(&State::new(0, 2), Action::Right).collect();

    assert_eq!(fused.len(), 3);
    let &(prob, _, reward) = fused
        .iter()
        .find(|(_, next_state, _)| *next_state == State::new(0, 3))
        .unwrap();
    assert_abs_diff_eq!(prob, 0.8, epsilon = 1e-12);
    assert_eq!(reward, 1.0);

    let total: f64 = fused.iter().map(|(p, _, _)| p).sum();
    assert_abs_diff_eq!(total, 1.0, epsilon = 1e-9);
    // restartable
    assert_eq!(base.transitions_at(&State::new(0, 2), Action::Right).count(), 3);
}

#[test]
fn test_format_values_zeroes_blocks() {
    let env = scenario();
    let base = PlannerBase::new(&env);
    let values: StateValues = env.states().iter().map(|s| (*s, 2.0)).collect();
    let grid = base.format_values(&values);

    assert_eq!(grid.dim(), (3, 4));
    assert_eq!(grid[[1, 1]], 0.0);
    assert_eq!(grid[[2, 3]], 2.0);
}

#[test]
fn test_undiscounted_run_still_converges() {
    let env = scenario();
    let config = PlanConfig::default().with_gamma(1.0);
    let mut planner = ValueIterationPlanner::new(&env);
    let values = planner.plan(&config).unwrap();
    assert!(values[[0, 2]] > 0.0);
}

#[test]
fn test_policy_iteration_guard() {
    let env = scenario();
    let config = PlanConfig::default()
        .with_threshold(1e-9)
        .with_max_iterations(Some(3));
    let mut planner = PolicyIterationPlanner::new(&env);

    assert!(matches!(
        planner.plan(&config),
        Err(PlanError::Convergence { .. })
    ));
}

#[test]
fn test_algorithm_selector() {
    assert_eq!("value".parse::<Algorithm>(), Ok(Algorithm::ValueIteration));
    assert_eq!("policy".parse::<Algorithm>(), Ok(Algorithm::PolicyIteration));
    assert_eq!(
        "sarsa".parse::<Algorithm>(),
        Err(PlanError::UnsupportedPlanner {
            name: "sarsa".to_string()
        })
    );
}
