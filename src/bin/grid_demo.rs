use mdp_planner::agent::{run_episode, PolicyAgent, RandomAgent};
use mdp_planner::environment::{Cell, GridWorld};
use mdp_planner::planner::{
    Plan, PlanConfig, PolicyIterationPlanner, ValueGrid, ValueIterationPlanner,
};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

fn print_grid(title: &str, values: &ValueGrid) {
    println!("{}", title);
    for row in values.rows() {
        let cells: Vec<String> = row.iter().map(|v| format!("{:>7.3}", v)).collect();
        println!("  {}", cells.join(" "));
    }
}

fn main() -> mdp_planner::Result<()> {
    let (d, r, o, b) = (
        Cell::Damage.code(),
        Cell::Reward.code(),
        Cell::Ordinary.code(),
        Cell::Block.code(),
    );
    let grid = vec![vec![d, d, d, r], vec![d, b, d, o], vec![d, d, d, d]];
    let mut env = GridWorld::new(&grid, 0.8)?;
    let mut rng = ChaCha20Rng::seed_from_u64(2024);

    let mut agent = RandomAgent::new(&env);
    for i in 0..10 {
        let episode = run_episode(&mut env, &mut agent, &mut rng, 1_000)?;
        println!(
            "Episode {:02}: Agent gets {:.2} rewards.",
            i, episode.total_reward
        );
    }

    let config = PlanConfig::default();

    let mut value = ValueIterationPlanner::new(&env);
    let values = value.plan(&config)?;
    print_grid(
        &format!("Value iteration ({} sweeps)", value.iterations()),
        &values,
    );

    let mut policy = PolicyIterationPlanner::new(&env);
    let values = policy.plan(&config)?;
    print_grid(
        &format!("Policy iteration ({} iterations)", policy.iterations()),
        &values,
    );

    let mut agent = PolicyAgent::new(policy.policy());
    for i in 0..10 {
        let episode = run_episode(&mut env, &mut agent, &mut rng, 1_000)?;
        println!(
            "Planned episode {:02}: Agent gets {:.2} rewards.",
            i, episode.total_reward
        );
    }
    Ok(())
}
