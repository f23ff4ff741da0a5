//! String id → strategy constructor lookup.
//!
//! Hyperparameter records refer to strategies by id; the environment builds
//! its strategies through the registry so a custom strategy registered under a
//! built-in id replaces the built-in one.

use crate::error::{Result, SignalError};
use crate::observation::{ObservationKind, ObservationStrategy};
use crate::reward::{RewardKind, RewardStrategy};
use crate::simulator::TrafficSimulator;
use std::collections::BTreeMap;
use std::fmt;

pub type ObservationFactory =
    Box<dyn Fn(&mut dyn TrafficSimulator, &str) -> Result<Box<dyn ObservationStrategy>> + Send + Sync>;

pub type RewardFactory = Box<dyn Fn(&mut dyn TrafficSimulator, &str) -> Result<Box<dyn RewardStrategy>> + Send + Sync>;

pub struct StrategyRegistry {
    observations: BTreeMap<String, ObservationFactory>,
    rewards: BTreeMap<String, RewardFactory>,
}

impl StrategyRegistry {
    pub fn empty() -> Self {
        StrategyRegistry {
            observations: BTreeMap::new(),
            rewards: BTreeMap::new(),
        }
    }

    /// Registry holding every built-in observation and reward kind.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        for kind in ObservationKind::ALL {
            registry.register_observation(kind.id(), move |sim: &mut dyn TrafficSimulator, marker: &str| {
                kind.build(sim, marker)
            });
        }
        for kind in RewardKind::ALL {
            registry.register_reward(kind.id(), move |sim: &mut dyn TrafficSimulator, marker: &str| {
                kind.build(sim, marker)
            });
        }
        registry
    }

    pub fn register_observation<F>(&mut self, id: &str, factory: F)
    where
        F: Fn(&mut dyn TrafficSimulator, &str) -> Result<Box<dyn ObservationStrategy>> + Send + Sync + 'static,
    {
        self.observations.insert(id.to_string(), Box::new(factory));
    }

    pub fn register_reward<F>(&mut self, id: &str, factory: F)
    where
        F: Fn(&mut dyn TrafficSimulator, &str) -> Result<Box<dyn RewardStrategy>> + Send + Sync + 'static,
    {
        self.rewards.insert(id.to_string(), Box::new(factory));
    }

    pub fn build_observation(
        &self,
        id: &str,
        sim: &mut dyn TrafficSimulator,
        incoming_marker: &str,
    ) -> Result<Box<dyn ObservationStrategy>> {
        let factory = self.observations.get(id).ok_or_else(|| SignalError::UnknownStrategy {
            kind: "observation",
            id: id.to_string(),
        })?;
        factory(sim, incoming_marker)
    }

    pub fn build_reward(
        &self,
        id: &str,
        sim: &mut dyn TrafficSimulator,
        incoming_marker: &str,
    ) -> Result<Box<dyn RewardStrategy>> {
        let factory = self.rewards.get(id).ok_or_else(|| SignalError::UnknownStrategy {
            kind: "reward",
            id: id.to_string(),
        })?;
        factory(sim, incoming_marker)
    }

    pub fn has_observation(&self, id: &str) -> bool {
        self.observations.contains_key(id)
    }

    pub fn has_reward(&self, id: &str) -> bool {
        self.rewards.contains_key(id)
    }

    pub fn validate(&self, observation: &str, reward: &str) -> Result<()> {
        if !self.has_observation(observation) {
            return Err(SignalError::UnknownStrategy {
                kind: "observation",
                id: observation.to_string(),
            });
        }
        if !self.has_reward(reward) {
            return Err(SignalError::UnknownStrategy {
                kind: "reward",
                id: reward.to_string(),
            });
        }
        Ok(())
    }

    pub fn observation_ids(&self) -> impl Iterator<Item = &str> {
        self.observations.keys().map(String::as_str)
    }

    pub fn reward_ids(&self) -> impl Iterator<Item = &str> {
        self.rewards.keys().map(String::as_str)
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("observations", &self.observations.keys().collect::<Vec<_>>())
            .field("rewards", &self.rewards.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::LaneObservation;
    use crate::simulator::MockSimulator;

    #[test]
    fn test_defaults_cover_every_kind() {
        let registry = StrategyRegistry::default();
        assert_eq!(registry.observation_ids().count(), ObservationKind::ALL.len());
        assert_eq!(registry.reward_ids().count(), RewardKind::ALL.len());
        assert!(registry.validate("wait", "throughput").is_ok());
        assert!(registry.validate("wait", "happiness").is_err());
    }

    #[test]
    fn test_unknown_id() {
        let registry = StrategyRegistry::default();
        let mut sim = MockSimulator::new();
        let err = registry.build_reward("nope", &mut sim, "i").err().unwrap();
        assert_eq!(
            err,
            SignalError::UnknownStrategy {
                kind: "reward",
                id: "nope".to_string()
            }
        );
    }

    #[test]
    fn test_custom_strategy_replaces_builtin() {
        let mut registry = StrategyRegistry::default();
        registry.register_observation("queue", |_sim: &mut dyn TrafficSimulator, _marker: &str| {
            let lanes = vec!["1i_0".to_string()];
            Ok(Box::new(LaneObservation::new(ObservationKind::QueueLength, lanes)) as Box<dyn ObservationStrategy>)
        });
        let mut sim = MockSimulator::new();
        let strategy = registry.build_observation("queue", &mut sim, "i").unwrap();
        assert_eq!(strategy.dim(), 1);
    }
}
