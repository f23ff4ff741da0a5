//! # Training Loop
//!
//! ```text
//! for each episode:
//!     epsilon = schedule(episode)
//!     state = env.reset()
//!     for t in 0..max_steps:
//!         action = epsilon-greedy(state)
//!         next, reward, done = env.step(action)
//!         buffer.append(state, action, reward, next, done)
//!         if buffer.len() >= min_buffer_len and t % train_frequency == 0:
//!             one update on a sampled batch
//!         state = done ? env.reset() : next
//!     checkpoint every `checkpoint_every` episodes
//! ```
//!
//! A terminated episode is reset in place and keeps its epsilon; stored
//! transitions are never revised. Cancellation is checked after every step:
//! the loop then finishes the episode bookkeeping, checkpoints and returns.
//!
//! With a run directory the trainer writes
//!
//! ```text
//! <run_dir>/hyperparams.json        at start, rewritten with the duration at the end
//! <run_dir>/checkpoints/ep00025.bin
//! <run_dir>/checkpoints/final.bin
//! ```

use crate::agent::DqnAgent;
use crate::approximator::QFunction;
use crate::checkpoint::CheckpointStore;
use crate::config::{HyperparamRecord, TrainerConfig};
use crate::environment::SignalEnvironment;
use crate::error::Result;
use crate::metrics::{EpisodeTracker, TrainingReport};
use crate::replay_buffer::{ReplayBuffer, Transition};
use crate::simulator::TrafficSimulator;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

pub const HYPERPARAMS_FILE: &str = "hyperparams.json";
pub const CHECKPOINT_DIR: &str = "checkpoints";

/// Cooperative stop request, shareable with a signal handler or another thread.
#[derive(Clone, Debug, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct Trainer<S: TrafficSimulator, Q: QFunction> {
    env: SignalEnvironment<S>,
    agent: DqnAgent<Q>,
    buffer: ReplayBuffer,
    config: TrainerConfig,
    rng: StdRng,
    run_dir: Option<PathBuf>,
    cancel: CancellationFlag,
}

impl<S: TrafficSimulator, Q: QFunction> Trainer<S, Q> {
    pub fn new(env: SignalEnvironment<S>, q: Q, config: TrainerConfig) -> Result<Self> {
        config.validate()?;
        let agent = DqnAgent::from_config(q, &config)?;
        let buffer = ReplayBuffer::new(config.buffer_capacity)?;
        let rng = StdRng::seed_from_u64(config.seed);
        Ok(Trainer {
            env,
            agent,
            buffer,
            config,
            rng,
            run_dir: None,
            cancel: CancellationFlag::new(),
        })
    }

    /// Persist the hyperparameter record and checkpoints under `dir`.
    pub fn with_run_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.run_dir = Some(dir.into());
        self
    }

    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancel = flag;
        self
    }

    pub fn cancellation_flag(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    pub fn checkpoint_store(&self) -> Option<CheckpointStore> {
        self.run_dir
            .as_ref()
            .map(|dir| CheckpointStore::new(dir.join(CHECKPOINT_DIR)))
    }

    /// Loads the most recent checkpoint of the run directory, if any. Returns
    /// the loaded file, or `None` when the approximator keeps its
    /// initialisation.
    pub fn resume(&mut self) -> Result<Option<PathBuf>> {
        match self.checkpoint_store() {
            Some(store) => store.load_latest(self.agent.q_mut()),
            None => Ok(None),
        }
    }

    pub fn run(&mut self) -> Result<TrainingReport> {
        let started = Instant::now();
        let mut record = HyperparamRecord::new(self.env.config(), &self.config, self.agent.q().spec());
        let record_path = self.run_dir.as_ref().map(|dir| dir.join(HYPERPARAMS_FILE));
        if let Some(path) = &record_path {
            record.save(path)?;
            info!("Wrote {}", path.display());
        }
        let store = self.checkpoint_store();

        let mut report = TrainingReport::default();
        for episode in 0..self.config.episodes {
            let epsilon = self.agent.begin_episode(episode);
            info!(
                "Episode {}/{} (epsilon {:.2}, observation: {}, reward: {})",
                episode + 1,
                self.config.episodes,
                epsilon,
                self.env.config().observation,
                self.env.config().reward
            );

            let tracker = self.run_episode()?;
            let stats = tracker.finish(episode, epsilon);
            info!(
                "Episode {} done: average reward {:.2}, average loss {}",
                episode + 1,
                stats.average_reward,
                stats
                    .average_loss
                    .map_or_else(|| "n/a".to_string(), |l| format!("{:.4}", l))
            );
            report.episodes.push(stats);

            let completed = episode + 1;
            let interrupted = self.cancel.is_cancelled();
            if let Some(store) = &store {
                if completed % self.config.checkpoint_every == 0 || interrupted {
                    report.checkpoints.push(store.save_episode(self.agent.q(), completed)?);
                }
            }
            if interrupted {
                warn!("Training interrupted after {} episodes", completed);
                report.interrupted = true;
                break;
            }
        }

        if let Some(store) = &store {
            report.checkpoints.push(store.save_final(self.agent.q())?);
        }

        report.duration_secs = started.elapsed().as_secs_f64();
        if let Some(path) = &record_path {
            record.learning_duration_secs = Some(report.duration_secs);
            record.save(path)?;
        }
        info!(
            "Training finished: {} episodes, {} updates in {:.1}s",
            report.episodes.len(),
            report.total_updates(),
            report.duration_secs
        );
        Ok(report)
    }

    fn run_episode(&mut self) -> Result<EpisodeTracker> {
        let mut tracker = EpisodeTracker::new();
        let mut state = self.env.reset()?;

        for t in 0..self.config.max_steps {
            let action = self.agent.select_action(state.view(), &mut self.rng)?;
            let (next_state, reward, done, _) = self.env.step(action)?;
            self.buffer
                .append(Transition::new(state, action, reward, next_state.clone(), done));
            tracker.record_step(reward, done);

            if self.buffer.len() >= self.config.min_buffer_len && t % self.config.train_frequency == 0 {
                let batch = self.buffer.sample(self.config.batch_size, &mut self.rng)?;
                let loss = self.agent.train_step(&batch)?;
                tracker.record_loss(loss);
            }

            state = if done {
                debug!("Episode terminated at step {}, resetting", t);
                self.env.reset()?
            } else {
                next_state
            };

            if self.cancel.is_cancelled() {
                break;
            }
        }
        Ok(tracker)
    }

    /// Closes the simulator.
    pub fn close(&mut self) -> Result<()> {
        self.env.close()
    }

    pub fn agent(&self) -> &DqnAgent<Q> {
        &self.agent
    }

    pub fn buffer(&self) -> &ReplayBuffer {
        &self.buffer
    }

    pub fn environment(&self) -> &SignalEnvironment<S> {
        &self.env
    }

    pub fn environment_mut(&mut self) -> &mut SignalEnvironment<S> {
        &mut self.env
    }

    pub fn run_dir(&self) -> Option<&Path> {
        self.run_dir.as_deref()
    }

    pub fn into_parts(self) -> (SignalEnvironment<S>, DqnAgent<Q>) {
        (self.env, self.agent)
    }
}
