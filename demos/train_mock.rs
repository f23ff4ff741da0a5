//! Trains a small Q-network against the in-process mock simulator.
//!
//! Run with `RUST_LOG=info cargo run --example train_mock [run_dir]`.

use rand::rngs::StdRng;
use rand::SeedableRng;
use signal_rl::config::{EnvConfig, TrainerConfig};
use signal_rl::environment::SignalEnvironment;
use signal_rl::evaluation::{evaluate, EvaluationConfig};
use signal_rl::reward::RewardKind;
use signal_rl::simulator::MockSimulator;
use signal_rl::trainer::Trainer;
use signal_rl::GreedyPolicy;

fn main() -> signal_rl::Result<()> {
    env_logger::init();
    let run_dir = std::env::args().nth(1).unwrap_or_else(|| "runs/mock".to_string());

    let env_config = EnvConfig::builder()
        .without_route_file()
        .reward(RewardKind::WaitDecrease)
        .max_steps(5_000)
        .build()?;
    let trainer_config = TrainerConfig::builder()
        .episodes(20)
        .max_steps(500)
        .min_buffer_len(1_000)
        .epsilon(1.0, 0.1, 0.05)
        .checkpoint_every(5)
        .build()?;

    let mut env = SignalEnvironment::new(MockSimulator::new(), env_config)?;
    let input = env.reset()?.len();
    let q = trainer_config.q_network(input, 4, &mut StdRng::seed_from_u64(trainer_config.seed))?;

    let mut trainer = Trainer::new(env, q, trainer_config)?.with_run_dir(&run_dir);
    if let Some(path) = trainer.resume()? {
        println!("Resumed from {}", path.display());
    }
    let report = trainer.run()?;
    report.save_json(&std::path::Path::new(&run_dir).join("report.json"))?;
    println!("Average reward per episode: {:?}", report.average_rewards());

    let (mut env, agent) = trainer.into_parts();
    let mut policy = GreedyPolicy::new(agent.q());
    let summary = evaluate(
        &mut env,
        &mut policy,
        &EvaluationConfig::default(),
        &mut StdRng::seed_from_u64(1),
    )?;
    println!("{}", summary.to_json()?);
    env.close()
}
