use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

/// Regression loss between predicted action values and their targets.
///
/// Both variants are averaged over the batch. `Mse` is halved so its gradient
/// is `(prediction - target) / n`, which is also the Huber gradient inside
/// `delta`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum LossKind {
    Mse,
    Huber { delta: f32 },
}

impl Default for LossKind {
    fn default() -> Self {
        LossKind::Huber { delta: 1.0 }
    }
}

impl LossKind {
    pub fn compute(&self, predictions: ArrayView1<f32>, targets: ArrayView1<f32>) -> f32 {
        let n = predictions.len().max(1) as f32;
        let diff = &predictions - &targets;
        match *self {
            LossKind::Mse => diff.mapv(|x| 0.5 * x * x).sum() / n,
            LossKind::Huber { delta } => {
                diff.mapv(|x| {
                    let abs_x = x.abs();
                    if abs_x <= delta {
                        0.5 * x * x
                    } else {
                        delta * abs_x - 0.5 * delta * delta
                    }
                })
                .sum()
                    / n
            }
        }
    }

    /// Derivative of [`compute`](Self::compute) with respect to each prediction.
    pub fn gradient(&self, predictions: ArrayView1<f32>, targets: ArrayView1<f32>) -> Array1<f32> {
        let n = predictions.len().max(1) as f32;
        let diff = &predictions - &targets;
        match *self {
            LossKind::Mse => diff / n,
            LossKind::Huber { delta } => diff.mapv(|x| if x.abs() <= delta { x } else { delta * x.signum() }) / n,
        }
    }
}
