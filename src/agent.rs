//! # Agents and Policies
//!
//! [`DqnAgent`] wraps a [`QFunction`] with epsilon-greedy action selection and
//! the bootstrapped update used by the trainer. [`Policy`] is the smaller
//! interface shared with the fixed-time [`AlternatingPhases`] controller so
//! both can be evaluated the same way.
//!
//! ```rust
//! use signal_rl::agent::EpsilonSchedule;
//!
//! let schedule = EpsilonSchedule::new(1.0, 0.1, 0.01).unwrap();
//! assert_eq!(schedule.value(0), 1.0);
//! assert!((schedule.value(50) - 0.5).abs() < 1e-6);
//! assert_eq!(schedule.value(500), 0.1);
//! ```

use crate::approximator::{argmax, QFunction};
use crate::config::TrainerConfig;
use crate::error::{Result, SignalError};
use crate::phase::NUM_ACTIONS;
use crate::replay_buffer::Batch;
use ndarray::{Array1, ArrayView1, Axis};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

/// Linearly decaying exploration rate, floored at `min`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EpsilonSchedule {
    pub max: f32,
    pub min: f32,
    pub decay: f32,
}

impl EpsilonSchedule {
    pub fn new(max: f32, min: f32, decay: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&max) || !(0.0..=1.0).contains(&min) || min > max {
            return Err(SignalError::invalid_parameter(
                "epsilon".to_string(),
                format!("Need 0 <= min <= max <= 1, got min {} max {}", min, max),
            ));
        }
        if !(decay >= 0.0) {
            return Err(SignalError::invalid_parameter("decay", "Decay must be non-negative"));
        }
        Ok(EpsilonSchedule { max, min, decay })
    }

    pub fn from_config(config: &TrainerConfig) -> Result<Self> {
        Self::new(config.epsilon_max, config.epsilon_min, config.epsilon_decay)
    }

    /// `max(max - episode * decay, min)`
    pub fn value(&self, episode: usize) -> f32 {
        (self.max - episode as f32 * self.decay).max(self.min)
    }
}

/// Anything that picks a signal action from an observation.
pub trait Policy {
    /// Called at the start of every episode.
    fn reset(&mut self) {}

    fn act(&mut self, observation: ArrayView1<f32>, rng: &mut dyn RngCore) -> Result<usize>;

    fn name(&self) -> String;
}

/// Epsilon-greedy draw: with probability `epsilon` a uniformly random action,
/// otherwise the first action with the highest value.
pub fn epsilon_greedy<R: Rng + ?Sized>(values: ArrayView1<f32>, epsilon: f32, rng: &mut R) -> Result<usize> {
    if values.is_empty() {
        return Err(SignalError::EmptyBuffer("No action values to choose from".to_string()));
    }
    if rng.gen::<f32>() < epsilon {
        return Ok(rng.gen_range(0..values.len()));
    }
    argmax(values).ok_or_else(|| SignalError::EmptyBuffer("No action values to choose from".to_string()))
}

pub struct DqnAgent<Q: QFunction> {
    q: Q,
    schedule: EpsilonSchedule,
    epsilon: f32,
    gamma: f32,
    train_steps: usize,
}

impl<Q: QFunction> DqnAgent<Q> {
    pub fn new(q: Q, schedule: EpsilonSchedule, gamma: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&gamma) {
            return Err(SignalError::invalid_parameter("gamma", "Discount must lie in [0, 1]"));
        }
        Ok(DqnAgent {
            q,
            epsilon: schedule.value(0),
            schedule,
            gamma,
            train_steps: 0,
        })
    }

    pub fn from_config(q: Q, config: &TrainerConfig) -> Result<Self> {
        Self::new(q, EpsilonSchedule::from_config(config)?, config.gamma)
    }

    /// Sets the exploration rate for `episode` and returns it. The rate stays
    /// fixed for the whole episode, resets included.
    pub fn begin_episode(&mut self, episode: usize) -> f32 {
        self.epsilon = self.schedule.value(episode);
        self.epsilon
    }

    pub fn select_action<R: Rng + ?Sized>(&self, state: ArrayView1<f32>, rng: &mut R) -> Result<usize> {
        if rng.gen::<f32>() < self.epsilon {
            return Ok(rng.gen_range(0..self.q.num_actions()));
        }
        self.greedy_action(state)
    }

    pub fn greedy_action(&self, state: ArrayView1<f32>) -> Result<usize> {
        let values = self.q.predict_one(state)?;
        argmax(values.view()).ok_or_else(|| SignalError::TrainingError("Approximator has no actions".to_string()))
    }

    /// `reward + gamma * max_a Q(next, a)`, without the bootstrap term for
    /// terminal transitions.
    pub fn targets(&self, batch: &Batch) -> Result<Array1<f32>> {
        let next_values = self.q.predict(batch.next_states.view())?;
        let mut targets = batch.rewards.clone();
        for (i, row) in next_values.axis_iter(Axis(0)).enumerate() {
            if !batch.dones[i] {
                let best = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                targets[i] += self.gamma * best;
            }
        }
        Ok(targets)
    }

    /// One parameter update on `batch`. Returns the loss.
    pub fn train_step(&mut self, batch: &Batch) -> Result<f32> {
        let targets = self.targets(batch)?;
        let loss = self
            .q
            .update(batch.states.view(), &batch.actions, targets.view())?;
        self.train_steps += 1;
        Ok(loss)
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    pub fn gamma(&self) -> f32 {
        self.gamma
    }

    pub fn train_steps(&self) -> usize {
        self.train_steps
    }

    pub fn q(&self) -> &Q {
        &self.q
    }

    pub fn q_mut(&mut self) -> &mut Q {
        &mut self.q
    }

    pub fn into_q(self) -> Q {
        self.q
    }
}

/// Always takes the highest-valued action of an approximator.
pub struct GreedyPolicy<'a, Q: QFunction + ?Sized> {
    q: &'a Q,
}

impl<'a, Q: QFunction + ?Sized> GreedyPolicy<'a, Q> {
    pub fn new(q: &'a Q) -> Self {
        GreedyPolicy { q }
    }
}

impl<'a, Q: QFunction + ?Sized> Policy for GreedyPolicy<'a, Q> {
    fn act(&mut self, observation: ArrayView1<f32>, rng: &mut dyn RngCore) -> Result<usize> {
        let values = self.q.predict_one(observation)?;
        epsilon_greedy(values.view(), 0.0, rng)
    }

    fn name(&self) -> String {
        "Greedy".to_string()
    }
}

/// Fixed-time controller cycling through actions 0, 1, 2, 3.
///
/// Every call to `act` counts one step in the current action; once the count
/// exceeds that action's duration the controller moves to the next action and
/// restarts the count at zero. The very first action is therefore held for
/// exactly its duration and every later one for its duration plus one step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlternatingPhases {
    durations: [usize; NUM_ACTIONS],
    current: usize,
    elapsed: usize,
}

impl AlternatingPhases {
    pub fn new(durations: [usize; NUM_ACTIONS]) -> Self {
        AlternatingPhases {
            durations,
            current: 0,
            elapsed: 0,
        }
    }

    pub fn durations(&self) -> [usize; NUM_ACTIONS] {
        self.durations
    }
}

impl Policy for AlternatingPhases {
    fn reset(&mut self) {
        self.current = 0;
        self.elapsed = 0;
    }

    fn act(&mut self, _observation: ArrayView1<f32>, _rng: &mut dyn RngCore) -> Result<usize> {
        self.elapsed += 1;
        if self.elapsed > self.durations[self.current] {
            self.current = (self.current + 1) % NUM_ACTIONS;
            self.elapsed = 0;
        }
        Ok(self.current)
    }

    fn name(&self) -> String {
        format!("Alternating phases {:?}", self.durations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approximator::QTable;
    use crate::replay_buffer::Transition;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn table_agent() -> DqnAgent<QTable> {
        let mut table = QTable::new(2, 1.0).unwrap();
        // Q([1]) = [0, 5]
        table.update(array![[1.0]].view(), &[1], array![5.0].view()).unwrap();
        DqnAgent::new(table, EpsilonSchedule::new(1.0, 0.0, 0.5).unwrap(), 0.9).unwrap()
    }

    #[test]
    fn test_schedule_validation() {
        assert!(EpsilonSchedule::new(0.1, 0.2, 0.01).is_err());
        assert!(EpsilonSchedule::new(1.0, 0.1, -0.5).is_err());
        assert!(EpsilonSchedule::new(1.5, 0.1, 0.1).is_err());
    }

    #[test]
    fn test_greedy_when_epsilon_zero() {
        let mut agent = table_agent();
        assert_eq!(agent.begin_episode(2), 0.0);
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..20 {
            assert_eq!(agent.select_action(array![1.0].view(), &mut rng).unwrap(), 1);
        }
    }

    #[test]
    fn test_random_when_epsilon_one() {
        let agent = table_agent();
        assert_eq!(agent.epsilon(), 1.0);
        let mut rng = StdRng::seed_from_u64(3);
        let picks: Vec<usize> = (0..200)
            .map(|_| agent.select_action(array![1.0].view(), &mut rng).unwrap())
            .collect();
        assert!(picks.contains(&0));
        assert!(picks.contains(&1));
    }

    #[test]
    fn test_targets_bootstrap_and_terminal() {
        let agent = table_agent();
        let live = Transition::new(array![0.0], 0, 1.0, array![1.0], false);
        let terminal = Transition::new(array![0.0], 0, 1.0, array![1.0], true);
        let batch = Batch::from_transitions(&[&live, &terminal]).unwrap();
        let targets = agent.targets(&batch).unwrap();
        assert!((targets[0] - (1.0 + 0.9 * 5.0)).abs() < 1e-6);
        assert_eq!(targets[1], 1.0);
    }

    #[test]
    fn test_train_step_counts_updates() {
        let mut agent = table_agent();
        let t = Transition::new(array![2.0], 0, -1.0, array![2.0], true);
        let batch = Batch::from_transitions(&[&t]).unwrap();
        agent.train_step(&batch).unwrap();
        assert_eq!(agent.train_steps(), 1);
        assert_eq!(agent.q().predict(array![[2.0]].view()).unwrap()[[0, 0]], -1.0);
    }

    #[test]
    fn test_alternating_phases_cycle() {
        let mut policy = AlternatingPhases::new([2, 1, 2, 1]);
        let mut rng = StdRng::seed_from_u64(0);
        let obs = Array1::<f32>::zeros(8);
        let actions: Vec<usize> = (0..12)
            .map(|_| policy.act(obs.view(), &mut rng).unwrap())
            .collect();
        assert_eq!(actions, vec![0, 0, 1, 1, 2, 2, 2, 3, 3, 0, 0, 0]);

        policy.reset();
        assert_eq!(policy.act(obs.view(), &mut rng).unwrap(), 0);
    }

    #[test]
    fn test_epsilon_greedy_ties() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(epsilon_greedy(array![2.0, 2.0, 1.0].view(), 0.0, &mut rng).unwrap(), 0);
        assert!(epsilon_greedy(Array1::<f32>::zeros(0).view(), 0.0, &mut rng).is_err());
    }
}
