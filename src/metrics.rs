//! Training and evaluation statistics.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Summary of a collection of values. `std` is the population standard
/// deviation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub mean: f32,
    pub std: f32,
    pub min: f32,
    pub max: f32,
    pub count: usize,
}

impl Statistics {
    /// All fields are zero for an empty slice.
    pub fn from_slice(values: &[f32]) -> Self {
        if values.is_empty() {
            return Statistics {
                mean: 0.0,
                std: 0.0,
                min: 0.0,
                max: 0.0,
                count: 0,
            };
        }

        let count = values.len();
        let mean = values.iter().map(|&x| x as f64).sum::<f64>() / count as f64;
        let variance = values
            .iter()
            .map(|&x| (x as f64 - mean).powi(2))
            .sum::<f64>()
            / count as f64;

        Statistics {
            mean: mean as f32,
            std: variance.sqrt() as f32,
            min: values.iter().copied().fold(f32::INFINITY, f32::min),
            max: values.iter().copied().fold(f32::NEG_INFINITY, f32::max),
            count,
        }
    }
}

/// Incremental mean (Welford).
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: usize,
    mean: f64,
    m2: f64,
}

impl RunningStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, value: f32) {
        self.count += 1;
        let delta = value as f64 - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value as f64 - self.mean);
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// `None` until the first update.
    pub fn mean(&self) -> Option<f32> {
        if self.count == 0 {
            None
        } else {
            Some(self.mean as f32)
        }
    }

    /// Population standard deviation.
    pub fn std(&self) -> f32 {
        if self.count == 0 {
            0.0
        } else {
            (self.m2 / self.count as f64).sqrt() as f32
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeStats {
    /// Zero-based episode index
    pub episode: usize,
    pub epsilon: f32,
    pub steps: usize,
    pub average_reward: f32,
    /// `None` when no update ran during the episode
    pub average_loss: Option<f32>,
    pub updates: usize,
    /// Waiting-time terminations (and resets) within the episode
    pub terminations: usize,
}

/// Accumulates the steps and updates of the episode in progress.
#[derive(Debug, Clone, Default)]
pub struct EpisodeTracker {
    rewards: RunningStats,
    losses: RunningStats,
    terminations: usize,
}

impl EpisodeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_step(&mut self, reward: f32, done: bool) {
        self.rewards.update(reward);
        if done {
            self.terminations += 1;
        }
    }

    pub fn record_loss(&mut self, loss: f32) {
        self.losses.update(loss);
    }

    pub fn finish(self, episode: usize, epsilon: f32) -> EpisodeStats {
        EpisodeStats {
            episode,
            epsilon,
            steps: self.rewards.count(),
            average_reward: self.rewards.mean().unwrap_or(0.0),
            average_loss: self.losses.mean(),
            updates: self.losses.count(),
            terminations: self.terminations,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub episodes: Vec<EpisodeStats>,
    /// Stopped early through the cancellation flag
    pub interrupted: bool,
    pub duration_secs: f64,
    pub checkpoints: Vec<PathBuf>,
}

impl TrainingReport {
    pub fn total_updates(&self) -> usize {
        self.episodes.iter().map(|e| e.updates).sum()
    }

    pub fn total_steps(&self) -> usize {
        self.episodes.iter().map(|e| e.steps).sum()
    }

    pub fn average_rewards(&self) -> Vec<f32> {
        self.episodes.iter().map(|e| e.average_reward).collect()
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
