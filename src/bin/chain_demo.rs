use mdp_planner::chain::{ChainMdp, ChainState};

fn main() -> mdp_planner::Result<()> {
    let mdp = ChainMdp::default();
    for token in ["state", "state_up_up", "state_down_down"] {
        let state: ChainState = token.parse()?;
        println!("V({}) = {:.5}", state, mdp.value(&state, ChainMdp::DEFAULT_GAMMA));
    }
    Ok(())
}
