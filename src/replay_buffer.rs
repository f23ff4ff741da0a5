//! # Experience Replay
//!
//! [`ReplayBuffer`] is a fixed-capacity ring of [`Transition`] slots. Appends
//! fill free slots in order; once every slot is used, each append overwrites the
//! slot under the write cursor, which always holds the oldest surviving
//! transition, and moves the cursor on (wrapping at the capacity).
//!
//! Indexing (`buffer[i]`) addresses the physical slot `i`, not the i-th
//! transition in insertion order.
//!
//! [`SharedReplayBuffer`] wraps a buffer in a single mutex for setups where the
//! environment stepping and the training updates run on different threads.

use crate::error::{Result, SignalError};
use ndarray::{Array1, Array2};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::ops::Index;
use std::sync::{Arc, Mutex};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub state: Array1<f32>,
    pub action: usize,
    pub reward: f32,
    pub next_state: Array1<f32>,
    pub done: bool,
}

impl Transition {
    pub fn new(state: Array1<f32>, action: usize, reward: f32, next_state: Array1<f32>, done: bool) -> Self {
        Transition {
            state,
            action,
            reward,
            next_state,
            done,
        }
    }
}

/// Sampled transitions grouped by field, row `i` of every member belonging to
/// the same transition.
#[derive(Clone, Debug, PartialEq)]
pub struct Batch {
    pub states: Array2<f32>,
    pub actions: Vec<usize>,
    pub rewards: Array1<f32>,
    pub next_states: Array2<f32>,
    pub dones: Vec<bool>,
}

impl Batch {
    /// Stacks transitions into batch form. All states must share one length.
    pub fn from_transitions(transitions: &[&Transition]) -> Result<Self> {
        let first = transitions
            .first()
            .ok_or_else(|| SignalError::EmptyBuffer("No transitions to batch".to_string()))?;
        let batch_size = transitions.len();
        let state_dim = first.state.len();

        let mut states = Array2::zeros((batch_size, state_dim));
        let mut next_states = Array2::zeros((batch_size, state_dim));
        let mut actions = Vec::with_capacity(batch_size);
        let mut rewards = Array1::zeros(batch_size);
        let mut dones = Vec::with_capacity(batch_size);

        for (i, t) in transitions.iter().enumerate() {
            if t.state.len() != state_dim || t.next_state.len() != state_dim {
                return Err(SignalError::dimension_mismatch(
                    format!("state length {}", state_dim),
                    format!("{} / {}", t.state.len(), t.next_state.len()),
                ));
            }
            states.row_mut(i).assign(&t.state);
            next_states.row_mut(i).assign(&t.next_state);
            actions.push(t.action);
            rewards[i] = t.reward;
            dones.push(t.done);
        }

        Ok(Batch {
            states,
            actions,
            rewards,
            next_states,
            dones,
        })
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct ReplayBuffer {
    slots: Vec<Transition>,
    capacity: usize,
    cursor: usize,
    full: bool,
}

impl ReplayBuffer {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(SignalError::invalid_parameter("capacity", "Capacity must be greater than 0"));
        }
        Ok(ReplayBuffer {
            slots: Vec::with_capacity(capacity),
            capacity,
            cursor: 0,
            full: false,
        })
    }

    pub fn append(&mut self, transition: Transition) {
        if self.full {
            self.slots[self.cursor] = transition;
        } else {
            self.slots.push(transition);
        }
        self.cursor += 1;
        if self.cursor == self.capacity {
            self.full = true;
            self.cursor = 0;
        }
    }

    /// Draws `batch_size` transitions uniformly with replacement. Asking for
    /// more than `len()` transitions yields `len()` of them.
    pub fn sample<R: Rng + ?Sized>(&self, batch_size: usize, rng: &mut R) -> Result<Batch> {
        if self.is_empty() {
            return Err(SignalError::EmptyBuffer("Cannot sample from an empty replay buffer".to_string()));
        }
        let size = batch_size.min(self.len());
        let picked: Vec<&Transition> = (0..size)
            .map(|_| &self.slots[rng.gen_range(0..self.len())])
            .collect();
        Batch::from_transitions(&picked)
    }

    pub fn len(&self) -> usize {
        if self.full {
            self.capacity
        } else {
            self.cursor
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.full
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slot the next append writes to.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Transition stored in physical slot `index`.
    pub fn get(&self, index: usize) -> Option<&Transition> {
        self.slots.get(index)
    }

    /// Stored transitions in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.slots.iter()
    }
}

impl Index<usize> for ReplayBuffer {
    type Output = Transition;

    fn index(&self, index: usize) -> &Transition {
        &self.slots[index]
    }
}

/// A replay buffer behind one mutex.
///
/// Every operation takes the lock for its whole duration, so the cursor and the
/// full flag never change underneath a sampler.
#[derive(Clone, Debug)]
pub struct SharedReplayBuffer {
    inner: Arc<Mutex<ReplayBuffer>>,
}

impl SharedReplayBuffer {
    pub fn new(capacity: usize) -> Result<Self> {
        Ok(SharedReplayBuffer {
            inner: Arc::new(Mutex::new(ReplayBuffer::new(capacity)?)),
        })
    }

    pub fn from_buffer(buffer: ReplayBuffer) -> Self {
        SharedReplayBuffer {
            inner: Arc::new(Mutex::new(buffer)),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ReplayBuffer>> {
        self.inner
            .lock()
            .map_err(|_| SignalError::TrainingError("Replay buffer lock poisoned".to_string()))
    }

    pub fn append(&self, transition: Transition) -> Result<()> {
        self.lock()?.append(transition);
        Ok(())
    }

    pub fn sample<R: Rng + ?Sized>(&self, batch_size: usize, rng: &mut R) -> Result<Batch> {
        self.lock()?.sample(batch_size, rng)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }
}
