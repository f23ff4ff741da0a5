//! Run configuration and the persisted hyperparameter record.
//!
//! Nothing here is global: an [`EnvConfig`] goes into the environment
//! constructor and a [`TrainerConfig`] into the trainer. Defaults reproduce
//! the reference experiment (10 000-tick episodes, 4-tick yellow and green,
//! 125 episodes, buffer 10 000..50 000, batch 32 every 10 ticks).

use crate::approximator::{ApproximatorSpec, LossKind, OptimizerWrapper, QNetwork, QNetworkBuilder};
use crate::demand::NUM_ROUTES;
use crate::error::{Result, SignalError};
use crate::observation::ObservationKind;
use crate::registry::StrategyRegistry;
use crate::reward::RewardKind;
use crate::simulator::SimulatorConfig;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Right, straight, left frequencies repeated for the four origins.
pub const REFERENCE_ROUTE_FREQUENCIES: [f64; NUM_ROUTES] =
    [0.02, 0.05, 0.01, 0.02, 0.05, 0.01, 0.02, 0.05, 0.01, 0.02, 0.05, 0.01];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnvConfig {
    pub simulator: SimulatorConfig,
    /// Write the generated demand to `simulator.route_file` at every reset
    pub write_route_file: bool,
    pub junction_id: String,
    /// Length of the generated demand schedule, in ticks
    pub max_steps: usize,
    pub yellow_duration: usize,
    pub green_duration: usize,
    pub route_frequencies: Vec<f64>,
    pub observation: ObservationKind,
    pub reward: RewardKind,
    pub max_waiting_time: f32,
    /// Substring identifying incoming lanes and roads
    pub incoming_marker: String,
    /// Seed of the environment RNG used for demand generation
    pub seed: u64,
}

impl Default for EnvConfig {
    fn default() -> Self {
        EnvConfig {
            simulator: SimulatorConfig::default(),
            write_route_file: true,
            junction_id: "0".to_string(),
            max_steps: 10_000,
            yellow_duration: 4,
            green_duration: 4,
            route_frequencies: REFERENCE_ROUTE_FREQUENCIES.to_vec(),
            observation: ObservationKind::QueueLength,
            reward: RewardKind::NegativeQueue,
            max_waiting_time: 90.0,
            incoming_marker: "i".to_string(),
            seed: 0,
        }
    }
}

impl EnvConfig {
    pub fn builder() -> EnvConfigBuilder {
        EnvConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_steps == 0 {
            return Err(SignalError::invalid_parameter("max_steps", "Must be at least 1"));
        }
        if self.green_duration == 0 {
            return Err(SignalError::invalid_parameter("green_duration", "Must be at least 1 tick"));
        }
        if self.route_frequencies.len() != NUM_ROUTES {
            return Err(SignalError::invalid_parameter(
                "route_frequencies".to_string(),
                format!("Expected {} values, got {}", NUM_ROUTES, self.route_frequencies.len()),
            ));
        }
        if self.route_frequencies.iter().any(|f| !(0.0..=1.0).contains(f)) {
            return Err(SignalError::invalid_parameter(
                "route_frequencies",
                "Frequencies must lie in [0, 1]",
            ));
        }
        if !(self.max_waiting_time >= 0.0) {
            return Err(SignalError::invalid_parameter("max_waiting_time", "Must be non-negative"));
        }
        if self.incoming_marker.is_empty() {
            return Err(SignalError::invalid_parameter("incoming_marker", "Must not be empty"));
        }
        Ok(())
    }
}

pub struct EnvConfigBuilder {
    config: EnvConfig,
}

impl EnvConfigBuilder {
    pub fn new() -> Self {
        EnvConfigBuilder {
            config: EnvConfig::default(),
        }
    }

    pub fn simulator_config<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.simulator.config_path = path.into();
        self
    }

    pub fn route_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.simulator.route_file = path.into();
        self.config.write_route_file = true;
        self
    }

    /// Keep the generated demand in memory only.
    pub fn without_route_file(mut self) -> Self {
        self.config.write_route_file = false;
        self
    }

    pub fn gui(mut self, gui: bool) -> Self {
        self.config.simulator.gui = gui;
        self
    }

    pub fn junction_id<S: Into<String>>(mut self, id: S) -> Self {
        self.config.junction_id = id.into();
        self
    }

    pub fn max_steps(mut self, steps: usize) -> Self {
        self.config.max_steps = steps;
        self
    }

    pub fn yellow_duration(mut self, ticks: usize) -> Self {
        self.config.yellow_duration = ticks;
        self
    }

    pub fn green_duration(mut self, ticks: usize) -> Self {
        self.config.green_duration = ticks;
        self
    }

    pub fn route_frequencies(mut self, frequencies: Vec<f64>) -> Self {
        self.config.route_frequencies = frequencies;
        self
    }

    pub fn observation(mut self, kind: ObservationKind) -> Self {
        self.config.observation = kind;
        self
    }

    pub fn reward(mut self, kind: RewardKind) -> Self {
        self.config.reward = kind;
        self
    }

    pub fn max_waiting_time(mut self, seconds: f32) -> Self {
        self.config.max_waiting_time = seconds;
        self
    }

    pub fn incoming_marker<S: Into<String>>(mut self, marker: S) -> Self {
        self.config.incoming_marker = marker.into();
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    pub fn build(self) -> Result<EnvConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for EnvConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainerConfig {
    pub episodes: usize,
    /// Steps (actions) per episode
    pub max_steps: usize,
    /// No updates happen before the buffer holds this many transitions
    pub min_buffer_len: usize,
    pub buffer_capacity: usize,
    /// One update every this many steps
    pub train_frequency: usize,
    pub batch_size: usize,
    pub gamma: f32,
    pub epsilon_max: f32,
    pub epsilon_min: f32,
    pub epsilon_decay: f32,
    /// Checkpoint after every this many completed episodes
    pub checkpoint_every: usize,
    pub hidden_layers: Vec<usize>,
    pub learning_rate: f32,
    /// Seed of the RNG used for action selection and sampling
    pub seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        TrainerConfig {
            episodes: 125,
            max_steps: 10_000,
            min_buffer_len: 10_000,
            buffer_capacity: 50_000,
            train_frequency: 10,
            batch_size: 32,
            gamma: 0.99,
            epsilon_max: 1.0,
            epsilon_min: 0.1,
            epsilon_decay: 0.01,
            checkpoint_every: 25,
            hidden_layers: vec![128, 32, 8],
            learning_rate: 0.0008,
            seed: 0,
        }
    }
}

impl TrainerConfig {
    pub fn builder() -> TrainerConfigBuilder {
        TrainerConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("episodes", self.episodes),
            ("max_steps", self.max_steps),
            ("buffer_capacity", self.buffer_capacity),
            ("train_frequency", self.train_frequency),
            ("batch_size", self.batch_size),
            ("checkpoint_every", self.checkpoint_every),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(SignalError::invalid_parameter(name, "Must be at least 1"));
            }
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(SignalError::invalid_parameter("gamma", "Discount must lie in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.epsilon_min) || !(0.0..=1.0).contains(&self.epsilon_max) {
            return Err(SignalError::invalid_parameter("epsilon", "Epsilon bounds must lie in [0, 1]"));
        }
        if self.epsilon_min > self.epsilon_max {
            return Err(SignalError::invalid_parameter(
                "epsilon_min",
                "Must not exceed epsilon_max",
            ));
        }
        if !(self.epsilon_decay >= 0.0) {
            return Err(SignalError::invalid_parameter("epsilon_decay", "Must be non-negative"));
        }
        if !(self.learning_rate > 0.0) {
            return Err(SignalError::invalid_parameter("learning_rate", "Must be positive"));
        }
        Ok(())
    }

    /// Dense Q-network of the configured shape for `input_size` features,
    /// trained with Adam under the Huber loss.
    pub fn q_network<R: Rng + ?Sized>(&self, input_size: usize, num_actions: usize, rng: &mut R) -> Result<QNetwork> {
        QNetworkBuilder::new()
            .shape(input_size, &self.hidden_layers, num_actions)
            .optimizer(OptimizerWrapper::default())
            .loss(LossKind::Huber { delta: 1.0 })
            .learning_rate(self.learning_rate)
            .build(rng)
    }
}

pub struct TrainerConfigBuilder {
    config: TrainerConfig,
}

impl TrainerConfigBuilder {
    pub fn new() -> Self {
        TrainerConfigBuilder {
            config: TrainerConfig::default(),
        }
    }

    pub fn episodes(mut self, episodes: usize) -> Self {
        self.config.episodes = episodes;
        self
    }

    pub fn max_steps(mut self, steps: usize) -> Self {
        self.config.max_steps = steps;
        self
    }

    pub fn min_buffer_len(mut self, len: usize) -> Self {
        self.config.min_buffer_len = len;
        self
    }

    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.buffer_capacity = capacity;
        self
    }

    pub fn train_frequency(mut self, every: usize) -> Self {
        self.config.train_frequency = every;
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    pub fn gamma(mut self, gamma: f32) -> Self {
        self.config.gamma = gamma;
        self
    }

    pub fn epsilon(mut self, max: f32, min: f32, decay: f32) -> Self {
        self.config.epsilon_max = max;
        self.config.epsilon_min = min;
        self.config.epsilon_decay = decay;
        self
    }

    pub fn checkpoint_every(mut self, episodes: usize) -> Self {
        self.config.checkpoint_every = episodes;
        self
    }

    pub fn hidden_layers(mut self, sizes: &[usize]) -> Self {
        self.config.hidden_layers = sizes.to_vec();
        self
    }

    pub fn learning_rate(mut self, lr: f32) -> Self {
        self.config.learning_rate = lr;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    pub fn build(self) -> Result<TrainerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for TrainerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub const LEARNING_METHOD: &str = "Deep Q-Learning with Replay Buffer";

/// Everything needed to understand and reproduce a run, written as
/// `hyperparams.json` in the run directory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HyperparamRecord {
    pub learning_method: String,
    pub observation: String,
    pub observation_description: String,
    pub reward: String,
    pub reward_description: String,
    pub environment: EnvConfig,
    pub trainer: TrainerConfig,
    pub approximator: ApproximatorSpec,
    #[serde(
        rename = "learning_duration[s]",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub learning_duration_secs: Option<f64>,
}

impl HyperparamRecord {
    pub fn new(environment: &EnvConfig, trainer: &TrainerConfig, approximator: ApproximatorSpec) -> Self {
        HyperparamRecord {
            learning_method: LEARNING_METHOD.to_string(),
            observation: environment.observation.id().to_string(),
            observation_description: environment.observation.description().to_string(),
            reward: environment.reward.id().to_string(),
            reward_description: environment.reward.description().to_string(),
            environment: environment.clone(),
            trainer: trainer.clone(),
            approximator,
            learning_duration_secs: None,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Reads a record and checks that its strategy ids are known to `registry`.
    pub fn load(path: &Path, registry: &StrategyRegistry) -> Result<Self> {
        let record: HyperparamRecord = serde_json::from_str(&fs::read_to_string(path)?)?;
        registry.validate(&record.observation, &record.reward)?;
        record.environment.validate()?;
        record.trainer.validate()?;
        Ok(record)
    }
}
