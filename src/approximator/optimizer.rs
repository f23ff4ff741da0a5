use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Parameter update rule. `layer` identifies which parameter set is being
/// updated so stateful optimisers can keep one set of moments per layer.
pub trait Optimizer {
    /// Called once before the layers of a single training step are updated.
    fn begin_step(&mut self) {}

    fn update_weights(&mut self, layer: usize, weights: &mut Array2<f32>, gradients: &Array2<f32>, learning_rate: f32);

    fn update_biases(&mut self, layer: usize, biases: &mut Array1<f32>, gradients: &Array1<f32>, learning_rate: f32);

    fn name(&self) -> &'static str;
}

/// Optimizer choice as recorded in a run's hyperparameters. Moments and step
/// counters are not part of it; `build` starts a fresh optimizer.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    Sgd,
    Adam,
}

impl OptimizerKind {
    pub fn build(self) -> OptimizerWrapper {
        match self {
            OptimizerKind::Sgd => OptimizerWrapper::SGD(SGD::new()),
            OptimizerKind::Adam => OptimizerWrapper::Adam(Adam::default()),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub enum OptimizerWrapper {
    SGD(SGD),
    Adam(Adam),
}

impl Default for OptimizerWrapper {
    fn default() -> Self {
        OptimizerWrapper::Adam(Adam::default())
    }
}

impl OptimizerWrapper {
    pub fn kind(&self) -> OptimizerKind {
        match self {
            OptimizerWrapper::SGD(_) => OptimizerKind::Sgd,
            OptimizerWrapper::Adam(_) => OptimizerKind::Adam,
        }
    }
}

impl Optimizer for OptimizerWrapper {
    fn begin_step(&mut self) {
        match self {
            OptimizerWrapper::SGD(optimizer) => optimizer.begin_step(),
            OptimizerWrapper::Adam(optimizer) => optimizer.begin_step(),
        }
    }

    fn update_weights(&mut self, layer: usize, weights: &mut Array2<f32>, gradients: &Array2<f32>, learning_rate: f32) {
        match self {
            OptimizerWrapper::SGD(optimizer) => optimizer.update_weights(layer, weights, gradients, learning_rate),
            OptimizerWrapper::Adam(optimizer) => optimizer.update_weights(layer, weights, gradients, learning_rate),
        }
    }

    fn update_biases(&mut self, layer: usize, biases: &mut Array1<f32>, gradients: &Array1<f32>, learning_rate: f32) {
        match self {
            OptimizerWrapper::SGD(optimizer) => optimizer.update_biases(layer, biases, gradients, learning_rate),
            OptimizerWrapper::Adam(optimizer) => optimizer.update_biases(layer, biases, gradients, learning_rate),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            OptimizerWrapper::SGD(optimizer) => optimizer.name(),
            OptimizerWrapper::Adam(optimizer) => optimizer.name(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SGD;

impl SGD {
    pub fn new() -> SGD {
        SGD
    }
}

impl Default for SGD {
    fn default() -> Self {
        Self::new()
    }
}

impl Optimizer for SGD {
    fn update_weights(&mut self, _layer: usize, weights: &mut Array2<f32>, gradients: &Array2<f32>, learning_rate: f32) {
        weights.zip_mut_with(gradients, |w, &g| *w -= learning_rate * g);
    }

    fn update_biases(&mut self, _layer: usize, biases: &mut Array1<f32>, gradients: &Array1<f32>, learning_rate: f32) {
        biases.zip_mut_with(gradients, |b, &g| *b -= learning_rate * g);
    }

    fn name(&self) -> &'static str {
        "sgd"
    }
}

/// Adam with bias-corrected moments. Moment buffers are sized lazily the first
/// time a layer is seen.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Adam {
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
    m_weights: Vec<Array2<f32>>,
    v_weights: Vec<Array2<f32>>,
    m_biases: Vec<Array1<f32>>,
    v_biases: Vec<Array1<f32>>,
    pub t: u32,
}

impl Adam {
    pub fn new(beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Adam {
            beta1,
            beta2,
            epsilon,
            m_weights: Vec::new(),
            v_weights: Vec::new(),
            m_biases: Vec::new(),
            v_biases: Vec::new(),
            t: 0,
        }
    }

    fn step_size(&self, learning_rate: f32) -> f32 {
        let t = self.t.max(1) as i32;
        learning_rate * (1.0 - self.beta2.powi(t)).sqrt() / (1.0 - self.beta1.powi(t))
    }
}

impl Default for Adam {
    fn default() -> Self {
        Self::new(0.9, 0.999, 1e-8)
    }
}

fn ensure_slot<D: ndarray::Dimension>(slots: &mut Vec<ndarray::Array<f32, D>>, layer: usize, shape: D) {
    while slots.len() <= layer {
        slots.push(ndarray::Array::zeros(shape.clone()));
    }
    if slots[layer].raw_dim() != shape {
        slots[layer] = ndarray::Array::zeros(shape);
    }
}

impl Optimizer for Adam {
    fn begin_step(&mut self) {
        self.t += 1;
    }

    fn update_weights(&mut self, layer: usize, weights: &mut Array2<f32>, gradients: &Array2<f32>, learning_rate: f32) {
        ensure_slot(&mut self.m_weights, layer, weights.raw_dim());
        ensure_slot(&mut self.v_weights, layer, weights.raw_dim());
        let (beta1, beta2, epsilon) = (self.beta1, self.beta2, self.epsilon);
        let step = self.step_size(learning_rate);

        let m = &mut self.m_weights[layer];
        let v = &mut self.v_weights[layer];
        m.zip_mut_with(gradients, |m, &g| *m = beta1 * *m + (1.0 - beta1) * g);
        v.zip_mut_with(gradients, |v, &g| *v = beta2 * *v + (1.0 - beta2) * g * g);

        ndarray::Zip::from(weights)
            .and(&*m)
            .and(&*v)
            .for_each(|w, &m, &v| *w -= step * m / (v.sqrt() + epsilon));
    }

    fn update_biases(&mut self, layer: usize, biases: &mut Array1<f32>, gradients: &Array1<f32>, learning_rate: f32) {
        ensure_slot(&mut self.m_biases, layer, biases.raw_dim());
        ensure_slot(&mut self.v_biases, layer, biases.raw_dim());
        let (beta1, beta2, epsilon) = (self.beta1, self.beta2, self.epsilon);
        let step = self.step_size(learning_rate);

        let m = &mut self.m_biases[layer];
        let v = &mut self.v_biases[layer];
        m.zip_mut_with(gradients, |m, &g| *m = beta1 * *m + (1.0 - beta1) * g);
        v.zip_mut_with(gradients, |v, &g| *v = beta2 * *v + (1.0 - beta2) * g * g);

        ndarray::Zip::from(biases)
            .and(&*m)
            .and(&*v)
            .for_each(|b, &m, &v| *b -= step * m / (v.sqrt() + epsilon));
    }

    fn name(&self) -> &'static str {
        "adam"
    }
}
