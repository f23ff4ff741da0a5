//! Evaluates the fixed-time controller on the mock simulator.

use rand::rngs::StdRng;
use rand::SeedableRng;
use signal_rl::config::EnvConfig;
use signal_rl::environment::SignalEnvironment;
use signal_rl::evaluation::{evaluate, EvaluationConfig};
use signal_rl::simulator::MockSimulator;
use signal_rl::AlternatingPhases;

fn main() -> signal_rl::Result<()> {
    env_logger::init();

    let config = EnvConfig::builder().without_route_file().build()?;
    let mut env = SignalEnvironment::new(MockSimulator::new(), config)?;
    let mut policy = AlternatingPhases::new([7, 3, 7, 3]);

    let summary = evaluate(
        &mut env,
        &mut policy,
        &EvaluationConfig::default(),
        &mut StdRng::seed_from_u64(0),
    )?;
    for metric in &summary.metrics {
        println!("{:<40} mean {:>10.3}  std {:>10.3}", metric.description, metric.mean, metric.std);
    }
    env.close()
}
