use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mdp_planner::chain::{ChainMdp, ChainState};
use mdp_planner::environment::GridWorld;
use mdp_planner::planner::{Plan, PlanConfig, PolicyIterationPlanner, ValueIterationPlanner};

fn scenario() -> GridWorld {
    GridWorld::new(
        &[vec![0, 0, 0, 1], vec![0, 9, 0, -1], vec![0, 0, 0, 0]],
        0.8,
    )
    .unwrap()
}

fn bench_planners(c: &mut Criterion) {
    let env = scenario();
    let config = PlanConfig::default().with_threshold(1e-6);

    c.bench_function("value_iteration_3x4", |b| {
        b.iter(|| {
            let mut planner = ValueIterationPlanner::new(&env);
            black_box(planner.plan(black_box(&config)).unwrap())
        })
    });

    c.bench_function("policy_iteration_3x4", |b| {
        b.iter(|| {
            let mut planner = PolicyIterationPlanner::new(&env);
            black_box(planner.plan(black_box(&config)).unwrap())
        })
    });
}

fn bench_chain(c: &mut Criterion) {
    let mdp = ChainMdp::default();
    let start = ChainState::start();

    c.bench_function("chain_recursive", |b| {
        b.iter(|| black_box(mdp.value(black_box(&start), ChainMdp::DEFAULT_GAMMA)))
    });

    c.bench_function("chain_memoized", |b| {
        b.iter(|| {
            black_box(mdp.value_memoized(black_box(&start), ChainMdp::DEFAULT_GAMMA))
        })
    });
}

criterion_group!(benches, bench_planners, bench_chain);
criterion_main!(benches);
