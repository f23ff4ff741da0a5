//! # Action-Value Approximators
//!
//! The trainer only talks to a [`QFunction`]: batched prediction of one value
//! per action, a single optimisation step toward bootstrapped targets, and
//! parameter save/load. Two implementations ship with the crate:
//!
//! - [`QNetwork`]: a dense multilayer network (ReLU hidden layers, linear head)
//!   trained with SGD or Adam under a Huber or MSE loss.
//! - [`QTable`]: a tabular approximator keyed by the rounded observation, for
//!   small discrete observation spaces.
//!
//! Parameters are written with `bincode`.

pub mod loss;
pub mod network;
pub mod optimizer;
pub mod qtable;

pub use loss::LossKind;
pub use network::{Activation, DenseLayer, QNetwork, QNetworkBuilder};
pub use optimizer::{Adam, Optimizer, OptimizerKind, OptimizerWrapper, SGD};
pub use qtable::QTable;

use crate::error::Result;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub trait QFunction {
    fn num_actions(&self) -> usize;

    /// One row of action values per row of `states`.
    fn predict(&self, states: ArrayView2<f32>) -> Result<Array2<f32>>;

    /// Applies exactly one optimisation step moving `Q(states[i], actions[i])`
    /// toward `targets[i]`, and returns the loss measured before the step.
    fn update(&mut self, states: ArrayView2<f32>, actions: &[usize], targets: ArrayView1<f32>) -> Result<f32>;

    fn save(&self, path: &Path) -> Result<()>;

    /// Replaces the current parameters with the ones stored at `path`.
    fn load(&mut self, path: &Path) -> Result<()>;

    /// Description recorded in the hyperparameter record.
    fn spec(&self) -> ApproximatorSpec;

    fn predict_one(&self, state: ArrayView1<f32>) -> Result<Array1<f32>> {
        let values = self.predict(state.insert_axis(Axis(0)))?;
        Ok(values.row(0).to_owned())
    }
}

impl<Q: QFunction + ?Sized> QFunction for Box<Q> {
    fn num_actions(&self) -> usize {
        (**self).num_actions()
    }

    fn predict(&self, states: ArrayView2<f32>) -> Result<Array2<f32>> {
        (**self).predict(states)
    }

    fn update(&mut self, states: ArrayView2<f32>, actions: &[usize], targets: ArrayView1<f32>) -> Result<f32> {
        (**self).update(states, actions, targets)
    }

    fn save(&self, path: &Path) -> Result<()> {
        (**self).save(path)
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        (**self).load(path)
    }

    fn spec(&self) -> ApproximatorSpec {
        (**self).spec()
    }
}

/// Serializable description of an approximator, enough to rebuild an
/// untrained instance of the same shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name")]
pub enum ApproximatorSpec {
    Dense {
        layer_sizes: Vec<usize>,
        optimizer: OptimizerKind,
        loss: LossKind,
        learning_rate: f32,
    },
    Table {
        num_actions: usize,
        learning_rate: f32,
    },
}

impl ApproximatorSpec {
    pub fn build<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> Result<Box<dyn QFunction>> {
        match self {
            ApproximatorSpec::Dense {
                layer_sizes,
                optimizer,
                loss,
                learning_rate,
            } => {
                let network = QNetworkBuilder::new()
                    .layer_sizes(layer_sizes)
                    .optimizer(optimizer.build())
                    .loss(*loss)
                    .learning_rate(*learning_rate)
                    .build(rng)?;
                Ok(Box::new(network))
            }
            ApproximatorSpec::Table {
                num_actions,
                learning_rate,
            } => Ok(Box::new(QTable::new(*num_actions, *learning_rate)?)),
        }
    }
}

/// Index of the largest value; the first one wins ties.
pub fn argmax(values: ArrayView1<f32>) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (idx, &value) in values.iter().enumerate() {
        match best {
            Some((_, current)) if !(value > current) => {}
            _ => best = Some((idx, value)),
        }
    }
    best.map(|(idx, _)| idx)
}
