//! # Signal Environment
//!
//! [`SignalEnvironment`] turns one discrete action per step into tick-level
//! phase commands on the simulator:
//!
//! ```text
//! action changed:   yellow(last) x Dy ticks, then green(action) x Dg ticks
//! same / first:     green(action) x Dg ticks
//! ```
//!
//! After the ticks it reads the observation and the reward from the active
//! strategies and checks the waiting-time threshold. Exceeding the threshold
//! ends the episode; it is not an error.
//!
//! `reset` regenerates the demand with the environment's own RNG, reloads the
//! simulator and rebuilds both strategies, since they capture the lane set.

use crate::config::EnvConfig;
use crate::demand::{DemandGenerator, DemandSchedule};
use crate::error::{Result, SignalError};
use crate::observation::ObservationStrategy;
use crate::phase::{normalize_action, Phase, SignalState};
use crate::registry::StrategyRegistry;
use crate::reward::RewardStrategy;
use crate::simulator::{waiting_time_exceeded, TrafficSimulator};
use log::{debug, info};
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Details of one step beyond observation, reward and done.
#[derive(Clone, Debug, PartialEq)]
pub struct StepInfo {
    /// Action as passed to `step`
    pub requested_action: usize,
    /// Action actually served after range normalisation
    pub action: usize,
    /// Yellow phase run before the green one, if the action changed
    pub yellow: Option<Phase>,
    pub green: Phase,
    /// Simulator ticks advanced during this step
    pub ticks: usize,
    /// Ticks advanced since the last reset
    pub episode_ticks: usize,
    /// Steps taken since the last reset, including this one
    pub episode_steps: usize,
}

pub type StepResult = (Array1<f32>, f32, bool, StepInfo);

pub struct SignalEnvironment<S: TrafficSimulator> {
    sim: S,
    config: EnvConfig,
    generator: DemandGenerator,
    registry: StrategyRegistry,
    observation: Option<Box<dyn ObservationStrategy>>,
    reward: Option<Box<dyn RewardStrategy>>,
    state: SignalState,
    rng: StdRng,
    demand: DemandSchedule,
    episode_ticks: usize,
    episode_steps: usize,
}

impl<S: TrafficSimulator> SignalEnvironment<S> {
    /// Validates the configuration and starts the simulator. A start failure
    /// is returned as is; nothing retries it.
    pub fn new(sim: S, config: EnvConfig) -> Result<Self> {
        Self::with_registry(sim, config, StrategyRegistry::default())
    }

    pub fn with_registry(mut sim: S, config: EnvConfig, registry: StrategyRegistry) -> Result<Self> {
        config.validate()?;
        registry.validate(config.observation.id(), config.reward.id())?;
        let generator = DemandGenerator::new(config.max_steps, Some(config.route_frequencies.clone()))?;

        sim.start(&config.simulator)?;
        info!(
            "Simulator started (config {}, gui {})",
            config.simulator.config_path.display(),
            config.simulator.gui
        );

        let rng = StdRng::seed_from_u64(config.seed);
        Ok(SignalEnvironment {
            sim,
            config,
            generator,
            registry,
            observation: None,
            reward: None,
            state: SignalState::new(),
            rng,
            demand: DemandSchedule::default(),
            episode_ticks: 0,
            episode_steps: 0,
        })
    }

    /// Starts a new episode and returns its first observation.
    pub fn reset(&mut self) -> Result<Array1<f32>> {
        self.demand = if self.config.write_route_file {
            self.generator
                .generate_route_file(&mut self.rng, &self.config.simulator.route_file)?
        } else {
            self.generator.generate(&mut self.rng)
        };
        debug!("Generated {} vehicle injections", self.demand.len());

        self.sim.load(&self.config.simulator, &self.demand)?;

        let marker = self.config.incoming_marker.as_str();
        let observation = self
            .registry
            .build_observation(self.config.observation.id(), &mut self.sim, marker)?;
        let reward = self
            .registry
            .build_reward(self.config.reward.id(), &mut self.sim, marker)?;

        let initial = observation.get(&mut self.sim)?;
        self.observation = Some(observation);
        self.reward = Some(reward);
        self.state = SignalState::new();
        self.episode_ticks = 0;
        self.episode_steps = 0;
        Ok(initial)
    }

    /// Serves `action` for one step. Actions outside `0..4` are served as
    /// action 1 (north-south left).
    pub fn step(&mut self, action: usize) -> Result<StepResult> {
        if self.observation.is_none() || self.reward.is_none() {
            return Err(not_reset());
        }
        let served = normalize_action(action);
        if served != action {
            debug!("Action {} out of range, serving {}", action, served);
        }
        let (yellow, green) = self.state.plan(served);

        let mut ticks = 0;
        if let Some(yellow) = yellow {
            ticks += self.hold_phase(yellow, self.config.yellow_duration)?;
        }
        ticks += self.hold_phase(green, self.config.green_duration)?;
        self.state.last_action = Some(served);
        self.episode_steps += 1;

        let observation = self.observation.as_ref().ok_or_else(not_reset)?.get(&mut self.sim)?;
        let reward = self.reward.as_mut().ok_or_else(not_reset)?.calculate(&mut self.sim)?;
        let done = waiting_time_exceeded(
            &mut self.sim,
            &self.config.incoming_marker,
            self.config.max_waiting_time,
        )?;
        if done {
            info!(
                "Waiting time above {}s after {} steps, episode done",
                self.config.max_waiting_time, self.episode_steps
            );
        }

        let info = StepInfo {
            requested_action: action,
            action: served,
            yellow,
            green,
            ticks,
            episode_ticks: self.episode_ticks,
            episode_steps: self.episode_steps,
        };
        Ok((observation, reward, done, info))
    }

    fn hold_phase(&mut self, phase: Phase, ticks: usize) -> Result<usize> {
        self.sim.set_signal_phase(&self.config.junction_id, phase.index())?;
        self.state.current_phase = Some(phase);
        self.state.ticks_in_phase = 0;
        for _ in 0..ticks {
            self.sim.advance_one_tick()?;
            self.state.ticks_in_phase += 1;
            self.episode_ticks += 1;
        }
        Ok(ticks)
    }

    /// Releases the simulator. Using the environment afterwards is a caller
    /// error and is not checked.
    pub fn close(&mut self) -> Result<()> {
        info!("Closing simulator");
        self.sim.close()
    }

    /// Observation length, known once the first reset has built the strategy.
    pub fn observation_dim(&self) -> Option<usize> {
        self.observation.as_ref().map(|o| o.dim())
    }

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    pub fn signal_state(&self) -> &SignalState {
        &self.state
    }

    /// Demand schedule generated by the most recent reset.
    pub fn demand(&self) -> &DemandSchedule {
        &self.demand
    }

    pub fn simulator(&self) -> &S {
        &self.sim
    }

    pub fn simulator_mut(&mut self) -> &mut S {
        &mut self.sim
    }

    pub fn into_simulator(self) -> S {
        self.sim
    }
}

fn not_reset() -> SignalError {
    SignalError::TrainingError("step() called before reset()".to_string())
}
