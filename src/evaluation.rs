//! Policy evaluation.
//!
//! Runs a [`Policy`] for a fixed number of steps, resetting the environment
//! whenever an episode terminates, and reads a set of metric rewards after
//! every step independently of the environment's own reward. Metric
//! strategies are rebuilt after every reset, like the environment's own.

use crate::agent::Policy;
use crate::environment::SignalEnvironment;
use crate::error::{Result, SignalError};
use crate::metrics::Statistics;
use crate::reward::{RewardKind, RewardStrategy};
use crate::simulator::TrafficSimulator;
use log::info;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_METRICS: [RewardKind; 4] = [
    RewardKind::NegativeQueue,
    RewardKind::NegativeWait,
    RewardKind::TotalSpeed,
    RewardKind::Throughput,
];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    pub steps: usize,
    pub metrics: Vec<RewardKind>,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        EvaluationConfig {
            steps: 1000,
            metrics: DEFAULT_METRICS.to_vec(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub id: String,
    pub description: String,
    pub mean: f32,
    pub std: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub policy: String,
    pub steps: usize,
    /// Environment reward over all steps
    pub reward: Statistics,
    pub terminations: usize,
    pub metrics: Vec<MetricSummary>,
}

impl EvaluationSummary {
    pub fn metric(&self, kind: RewardKind) -> Option<&MetricSummary> {
        self.metrics.iter().find(|m| m.id == kind.id())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

fn build_metrics<S: TrafficSimulator>(
    env: &mut SignalEnvironment<S>,
    kinds: &[RewardKind],
) -> Result<Vec<Box<dyn RewardStrategy>>> {
    let marker = env.config().incoming_marker.clone();
    kinds
        .iter()
        .map(|kind| kind.build(env.simulator_mut(), &marker))
        .collect()
}

pub fn evaluate<S, P>(
    env: &mut SignalEnvironment<S>,
    policy: &mut P,
    config: &EvaluationConfig,
    rng: &mut dyn RngCore,
) -> Result<EvaluationSummary>
where
    S: TrafficSimulator,
    P: Policy + ?Sized,
{
    if config.steps == 0 {
        return Err(SignalError::invalid_parameter("steps", "Evaluation needs at least one step"));
    }

    let mut observation = env.reset()?;
    policy.reset();
    let mut metrics = build_metrics(env, &config.metrics)?;
    let mut metric_values: Vec<Vec<f32>> = vec![Vec::with_capacity(config.steps); config.metrics.len()];
    let mut rewards = Vec::with_capacity(config.steps);
    let mut terminations = 0;

    for _ in 0..config.steps {
        let action = policy.act(observation.view(), rng)?;
        let (next, reward, done, _) = env.step(action)?;
        for (metric, values) in metrics.iter_mut().zip(metric_values.iter_mut()) {
            values.push(metric.calculate(env.simulator_mut())?);
        }
        rewards.push(reward);

        if done {
            terminations += 1;
            observation = env.reset()?;
            metrics = build_metrics(env, &config.metrics)?;
        } else {
            observation = next;
        }
    }

    let reward = Statistics::from_slice(&rewards);
    let metrics = config
        .metrics
        .iter()
        .zip(&metric_values)
        .map(|(kind, values)| {
            let stats = Statistics::from_slice(values);
            MetricSummary {
                id: kind.id().to_string(),
                description: kind.description().to_string(),
                mean: stats.mean,
                std: stats.std,
            }
        })
        .collect();

    info!(
        "{} over {} steps: average reward {:.4}, {} terminations",
        policy.name(),
        config.steps,
        reward.mean,
        terminations
    );

    Ok(EvaluationSummary {
        policy: policy.name(),
        steps: config.steps,
        reward,
        terminations,
        metrics,
    })
}
