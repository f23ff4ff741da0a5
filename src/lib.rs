//! # signal_rl - Reinforcement Learning for Intersection Signal Control
//!
//! signal_rl trains a controller for the signal phases of a single road
//! intersection. An external microscopic traffic simulator supplies per-lane
//! telemetry and accepts phase commands through the [`TrafficSimulator`]
//! trait; an action-value approximator ([`QFunction`]) maps observations to one
//! value per signal action.
//!
//! ## Key Pieces
//!
//! - **Phase state machine**: [`SignalEnvironment`] turns one of four actions
//!   into tick-level phase commands, inserting the mandatory yellow phase
//!   whenever the action changes.
//! - **Pluggable strategies**: observation and reward definitions are trait
//!   objects selected by [`ObservationKind`] / [`RewardKind`] and looked up
//!   through a [`StrategyRegistry`].
//! - **Replay and training**: a fixed-capacity ring [`ReplayBuffer`] and an
//!   epsilon-greedy DQN [`Trainer`] with periodic bootstrapped updates and
//!   episode-keyed checkpoints.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use signal_rl::config::{EnvConfig, TrainerConfig};
//! use signal_rl::environment::SignalEnvironment;
//! use signal_rl::simulator::MockSimulator;
//! use signal_rl::trainer::Trainer;
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! # fn main() -> signal_rl::Result<()> {
//! let env_config = EnvConfig::builder().without_route_file().max_steps(2_000).build()?;
//! let trainer_config = TrainerConfig::builder()
//!     .episodes(5)
//!     .max_steps(250)
//!     .min_buffer_len(100)
//!     .build()?;
//!
//! let mut env = SignalEnvironment::new(MockSimulator::new(), env_config)?;
//! let input = env.reset()?.len();
//! let q = trainer_config.q_network(input, 4, &mut StdRng::seed_from_u64(0))?;
//!
//! let mut trainer = Trainer::new(env, q, trainer_config)?.with_run_dir("runs/demo");
//! let report = trainer.run()?;
//! println!("{} updates", report.total_updates());
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`phase`] - Signal phases, action mapping and the per-episode signal state
//! - [`demand`] - Synthetic route demand and the route file writer
//! - [`simulator`] - Simulator interface and an in-process mock
//! - [`observation`] / [`reward`] - Strategy traits and built-in variants
//! - [`registry`] - String id to strategy constructor lookup
//! - [`environment`] - The signal environment
//! - [`replay_buffer`] - Ring buffer of transitions
//! - [`approximator`] - `QFunction` trait, dense Q-network and Q-table
//! - [`agent`] - Epsilon schedule, DQN agent and policies
//! - [`trainer`] - Training loop, cancellation and persistence
//! - [`checkpoint`] - Episode-keyed approximator checkpoints
//! - [`evaluation`] / [`metrics`] - Policy evaluation and statistics
//! - [`config`] - Configuration and the hyperparameter record
//! - [`error`] - Error type and result alias

pub mod agent;
pub mod approximator;
pub mod checkpoint;
pub mod config;
pub mod demand;
pub mod environment;
pub mod error;
pub mod evaluation;
pub mod metrics;
pub mod observation;
pub mod phase;
pub mod registry;
pub mod replay_buffer;
pub mod reward;
pub mod simulator;
pub mod trainer;

pub use agent::{AlternatingPhases, DqnAgent, EpsilonSchedule, GreedyPolicy, Policy};
pub use approximator::{QFunction, QNetwork, QTable};
pub use config::{EnvConfig, HyperparamRecord, TrainerConfig};
pub use environment::{SignalEnvironment, StepInfo};
pub use error::{Result, SignalError};
pub use observation::{ObservationKind, ObservationStrategy};
pub use phase::Phase;
pub use registry::StrategyRegistry;
pub use replay_buffer::{Batch, ReplayBuffer, SharedReplayBuffer, Transition};
pub use reward::{RewardKind, RewardStrategy};
pub use simulator::{MockSimulator, TrafficSimulator};
pub use trainer::{CancellationFlag, Trainer};

#[cfg(test)]
mod tests;
