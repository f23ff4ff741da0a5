use super::loss::LossKind;
use super::optimizer::{Optimizer, OptimizerWrapper};
use super::{ApproximatorSpec, QFunction};
use crate::error::{Result, SignalError};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use ndarray_rand::RandomExt;
use rand::Rng;
use rand_distr::Uniform;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Activation {
    Relu,
    Linear,
}

impl Activation {
    fn apply(&self, inputs: &mut Array2<f32>) {
        match self {
            Activation::Relu => inputs.mapv_inplace(|v| v.max(0.0)),
            Activation::Linear => {}
        }
    }

    fn derivative(&self, pre_activation: ArrayView2<f32>) -> Array2<f32> {
        match self {
            Activation::Relu => pre_activation.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 }),
            Activation::Linear => Array2::ones(pre_activation.raw_dim()),
        }
    }
}

/// A fully connected layer. Weights are stored `(inputs, outputs)`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DenseLayer {
    pub weights: Array2<f32>,
    pub biases: Array1<f32>,
    pub activation: Activation,
}

impl DenseLayer {
    /// Weights are drawn uniformly from `[-1/sqrt(inputs), 1/sqrt(inputs))`,
    /// biases start at zero.
    pub fn new<R: Rng + ?Sized>(input_size: usize, output_size: usize, activation: Activation, rng: &mut R) -> Self {
        let bound = 1.0 / (input_size.max(1) as f32).sqrt();
        let weights = Array2::random_using((input_size, output_size), Uniform::new(-bound, bound), rng);
        DenseLayer {
            weights,
            biases: Array1::zeros(output_size),
            activation,
        }
    }

    pub fn input_size(&self) -> usize {
        self.weights.nrows()
    }

    pub fn output_size(&self) -> usize {
        self.weights.ncols()
    }

    /// Returns the pre-activation values alongside the activated output.
    fn forward(&self, inputs: ArrayView2<f32>) -> (Array2<f32>, Array2<f32>) {
        let pre_activation = inputs.dot(&self.weights) + &self.biases.view().insert_axis(Axis(0));
        let mut outputs = pre_activation.clone();
        self.activation.apply(&mut outputs);
        (pre_activation, outputs)
    }
}

/// Dense action-value network: ReLU hidden layers and a linear output layer
/// with one unit per action.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QNetwork {
    pub layers: Vec<DenseLayer>,
    optimizer: OptimizerWrapper,
    loss: LossKind,
    learning_rate: f32,
}

impl QNetwork {
    pub fn new<R: Rng + ?Sized>(
        layer_sizes: &[usize],
        optimizer: OptimizerWrapper,
        loss: LossKind,
        learning_rate: f32,
        rng: &mut R,
    ) -> Result<Self> {
        if layer_sizes.len() < 2 {
            return Err(SignalError::invalid_parameter(
                "layer_sizes",
                "At least an input and an output size are required",
            ));
        }
        if layer_sizes.contains(&0) {
            return Err(SignalError::invalid_parameter("layer_sizes", "Layer sizes must be positive"));
        }
        if !(learning_rate > 0.0) {
            return Err(SignalError::invalid_parameter("learning_rate", "Learning rate must be positive"));
        }

        let last = layer_sizes.len() - 2;
        let layers = layer_sizes
            .windows(2)
            .enumerate()
            .map(|(i, pair)| {
                let activation = if i == last { Activation::Linear } else { Activation::Relu };
                DenseLayer::new(pair[0], pair[1], activation, rng)
            })
            .collect();

        Ok(QNetwork {
            layers,
            optimizer,
            loss,
            learning_rate,
        })
    }

    pub fn input_size(&self) -> usize {
        self.layers.first().map_or(0, DenseLayer::input_size)
    }

    pub fn layer_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![self.input_size()];
        sizes.extend(self.layers.iter().map(DenseLayer::output_size));
        sizes
    }

    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    fn check_input(&self, states: &ArrayView2<f32>) -> Result<()> {
        if states.ncols() != self.input_size() {
            return Err(SignalError::dimension_mismatch(
                format!("{} features", self.input_size()),
                format!("{} features", states.ncols()),
            ));
        }
        Ok(())
    }

    /// Forward pass keeping every layer's input and pre-activation for backprop.
    fn forward_cached(&self, states: ArrayView2<f32>) -> (Vec<Array2<f32>>, Vec<Array2<f32>>, Array2<f32>) {
        let mut inputs = Vec::with_capacity(self.layers.len());
        let mut pre_activations = Vec::with_capacity(self.layers.len());
        let mut current = states.to_owned();
        for layer in &self.layers {
            let (pre, out) = layer.forward(current.view());
            inputs.push(current);
            pre_activations.push(pre);
            current = out;
        }
        (inputs, pre_activations, current)
    }
}

impl QFunction for QNetwork {
    fn num_actions(&self) -> usize {
        self.layers.last().map_or(0, DenseLayer::output_size)
    }

    fn predict(&self, states: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_input(&states)?;
        let mut current = states.to_owned();
        for layer in &self.layers {
            current = layer.forward(current.view()).1;
        }
        Ok(current)
    }

    fn update(&mut self, states: ArrayView2<f32>, actions: &[usize], targets: ArrayView1<f32>) -> Result<f32> {
        self.check_input(&states)?;
        let batch_size = states.nrows();
        if actions.len() != batch_size || targets.len() != batch_size {
            return Err(SignalError::dimension_mismatch(
                format!("{} actions and targets", batch_size),
                format!("{} actions, {} targets", actions.len(), targets.len()),
            ));
        }
        let num_actions = self.num_actions();
        if let Some(&bad) = actions.iter().find(|&&a| a >= num_actions) {
            return Err(SignalError::invalid_parameter(
                "action".to_string(),
                format!("action {} outside 0..{}", bad, num_actions),
            ));
        }

        let (inputs, pre_activations, outputs) = self.forward_cached(states);
        let taken: Array1<f32> = actions.iter().enumerate().map(|(row, &a)| outputs[[row, a]]).collect();
        let loss = self.loss.compute(taken.view(), targets);
        let taken_grad = self.loss.gradient(taken.view(), targets);

        // Only the chosen action's output receives an error signal.
        let mut error = Array2::zeros(outputs.raw_dim());
        for (row, &a) in actions.iter().enumerate() {
            error[[row, a]] = taken_grad[row];
        }

        self.optimizer.begin_step();
        for idx in (0..self.layers.len()).rev() {
            let layer = &self.layers[idx];
            let delta = error * &layer.activation.derivative(pre_activations[idx].view());
            let weight_grad = inputs[idx].t().dot(&delta);
            let bias_grad = delta.sum_axis(Axis(0));
            error = delta.dot(&layer.weights.t());

            let layer = &mut self.layers[idx];
            self.optimizer
                .update_weights(idx, &mut layer.weights, &weight_grad, self.learning_rate);
            self.optimizer
                .update_biases(idx, &mut layer.biases, &bias_grad, self.learning_rate);
        }

        Ok(loss)
    }

    fn save(&self, path: &Path) -> Result<()> {
        let encoded = bincode::serialize(self)?;
        fs::write(path, encoded)?;
        Ok(())
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let bytes = fs::read(path)?;
        let loaded: QNetwork = bincode::deserialize(&bytes)?;
        if loaded.layer_sizes() != self.layer_sizes() {
            return Err(SignalError::dimension_mismatch(
                format!("{:?}", self.layer_sizes()),
                format!("{:?}", loaded.layer_sizes()),
            ));
        }
        *self = loaded;
        Ok(())
    }

    fn spec(&self) -> ApproximatorSpec {
        ApproximatorSpec::Dense {
            layer_sizes: self.layer_sizes(),
            optimizer: self.optimizer.kind(),
            loss: self.loss,
            learning_rate: self.learning_rate,
        }
    }
}

pub struct QNetworkBuilder {
    layer_sizes: Vec<usize>,
    optimizer: OptimizerWrapper,
    loss: LossKind,
    learning_rate: f32,
}

impl QNetworkBuilder {
    pub fn new() -> Self {
        QNetworkBuilder {
            layer_sizes: Vec::new(),
            optimizer: OptimizerWrapper::default(),
            loss: LossKind::default(),
            learning_rate: 1e-3,
        }
    }

    pub fn layer_sizes(mut self, sizes: &[usize]) -> Self {
        self.layer_sizes = sizes.to_vec();
        self
    }

    /// Convenience for `[input, hidden..., num_actions]`.
    pub fn shape(mut self, input: usize, hidden: &[usize], num_actions: usize) -> Self {
        self.layer_sizes = std::iter::once(input)
            .chain(hidden.iter().copied())
            .chain(std::iter::once(num_actions))
            .collect();
        self
    }

    pub fn optimizer(mut self, optimizer: OptimizerWrapper) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn loss(mut self, loss: LossKind) -> Self {
        self.loss = loss;
        self
    }

    pub fn learning_rate(mut self, lr: f32) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn build<R: Rng + ?Sized>(self, rng: &mut R) -> Result<QNetwork> {
        QNetwork::new(&self.layer_sizes, self.optimizer, self.loss, self.learning_rate, rng)
    }
}

impl Default for QNetworkBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approximator::SGD;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::tempdir;

    fn network(seed: u64, optimizer: OptimizerWrapper) -> QNetwork {
        QNetworkBuilder::new()
            .shape(3, &[16], 2)
            .optimizer(optimizer)
            .loss(LossKind::Mse)
            .learning_rate(0.01)
            .build(&mut StdRng::seed_from_u64(seed))
            .unwrap()
    }

    #[test]
    fn test_shapes() {
        let net = network(1, OptimizerWrapper::SGD(SGD::new()));
        assert_eq!(net.layer_sizes(), vec![3, 16, 2]);
        assert_eq!(net.num_actions(), 2);
        let out = net.predict(Array2::zeros((5, 3)).view()).unwrap();
        assert_eq!(out.dim(), (5, 2));
        assert!(net.predict(Array2::zeros((1, 4)).view()).is_err());
    }

    #[test]
    fn test_same_seed_same_weights() {
        let a = network(9, OptimizerWrapper::default());
        let b = network(9, OptimizerWrapper::default());
        assert_eq!(a.layers[0].weights, b.layers[0].weights);
    }

    #[test]
    fn test_update_moves_toward_target() {
        for optimizer in [OptimizerWrapper::SGD(SGD::new()), OptimizerWrapper::default()] {
            let mut net = network(3, optimizer);
            let states = array![[1.0, 0.5, -0.5], [0.2, 0.1, 0.9]];
            let targets = array![5.0, -3.0];
            let actions = [0, 1];

            let first = net.update(states.view(), &actions, targets.view()).unwrap();
            let mut last = first;
            for _ in 0..1000 {
                last = net.update(states.view(), &actions, targets.view()).unwrap();
            }
            assert!(last < first * 0.1, "loss {} -> {}", first, last);
        }
    }

    #[test]
    fn test_update_leaves_other_action_alone_at_output() {
        let mut net = QNetworkBuilder::new()
            .shape(2, &[], 2)
            .optimizer(OptimizerWrapper::SGD(SGD::new()))
            .loss(LossKind::Mse)
            .learning_rate(0.1)
            .build(&mut StdRng::seed_from_u64(0))
            .unwrap();
        let before = net.layers[0].weights.column(1).to_owned();
        net.update(array![[1.0, 1.0]].view(), &[0], array![10.0].view()).unwrap();
        assert_eq!(net.layers[0].weights.column(1), before);
    }

    #[test]
    fn test_rejects_bad_actions() {
        let mut net = network(1, OptimizerWrapper::default());
        let result = net.update(array![[0.0, 0.0, 0.0]].view(), &[2], array![1.0].view());
        assert!(matches!(result, Err(SignalError::InvalidParameter { .. })));
    }

    #[test]
    fn test_save_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("net.bin");
        let trained = network(4, OptimizerWrapper::default());
        trained.save(&path).unwrap();

        let mut fresh = network(5, OptimizerWrapper::default());
        fresh.load(&path).unwrap();
        let probe = array![[0.3, -0.2, 0.8]];
        assert_eq!(fresh.predict(probe.view()).unwrap(), trained.predict(probe.view()).unwrap());

        let mut other_shape = QNetworkBuilder::new()
            .shape(3, &[8], 2)
            .build(&mut StdRng::seed_from_u64(0))
            .unwrap();
        assert!(other_shape.load(&path).is_err());
    }
}
