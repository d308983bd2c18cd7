//! Q-network: a small MLP from a feature vector to one score per action
//!
//! # Architecture
//!
//! ```text
//! Input: [batch, input_dim]
//!   ↓ Linear(input_dim → 128) + ReLU + Dropout(0.2)
//!   ↓ Linear(128 → 64) + ReLU + Dropout(0.2)
//!   ↓ Linear(64 → 32) + ReLU
//!   ↓ Linear(32 → 4) + Softmax
//! Output: [batch, 4]
//! ```
//!
//! The softmax head keeps every score in `[0, 1]`, which the decision layer
//! reads as a confidence for the chosen action.

use burn::{
    module::Module,
    nn::{Dropout, DropoutConfig, Linear, LinearConfig},
    tensor::{
        Tensor,
        activation::{relu, softmax},
        backend::Backend,
    },
};
use serde::{Deserialize, Serialize};

use crate::game::NUM_ACTIONS;

/// Layer sizes for [`QNetwork`]
///
/// Serialized next to saved weights so a model can be rebuilt before its
/// record is loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QNetworkConfig {
    /// Feature vector length (13 or 20)
    pub input_dim: usize,
    /// Hidden layer widths, in order
    pub hidden: [usize; 3],
    pub num_actions: usize,
    pub dropout: f64,
}

impl QNetworkConfig {
    pub fn new(input_dim: usize) -> Self {
        Self {
            input_dim,
            hidden: [128, 64, 32],
            num_actions: NUM_ACTIONS,
            dropout: 0.2,
        }
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> QNetwork<B> {
        let [h1, h2, h3] = self.hidden;
        QNetwork {
            fc1: LinearConfig::new(self.input_dim, h1).init(device),
            fc2: LinearConfig::new(h1, h2).init(device),
            fc3: LinearConfig::new(h2, h3).init(device),
            head: LinearConfig::new(h3, self.num_actions).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
        }
    }
}

impl Default for QNetworkConfig {
    fn default() -> Self {
        Self::new(20)
    }
}

#[derive(Module, Debug)]
pub struct QNetwork<B: Backend> {
    fc1: Linear<B>,
    fc2: Linear<B>,
    fc3: Linear<B>,
    head: Linear<B>,
    dropout: Dropout,
}

impl<B: Backend> QNetwork<B> {
    /// `[batch, input_dim]` → `[batch, num_actions]` scores summing to 1 per row
    pub fn forward(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.dropout.forward(relu(self.fc1.forward(features)));
        let x = self.dropout.forward(relu(self.fc2.forward(x)));
        let x = relu(self.fc3.forward(x));
        softmax(self.head.forward(x), 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::Autodiff;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};
    use burn::tensor::{Distribution, TensorData};

    type TestBackend = NdArray<f32>;
    type TestAutodiffBackend = Autodiff<NdArray<f32>>;

    #[test]
    fn test_forward_pass_shapes() {
        let device = NdArrayDevice::default();
        for input_dim in [13, 20] {
            let network = QNetworkConfig::new(input_dim).init::<TestBackend>(&device);
            for batch_size in [1, 4, 32] {
                let input = Tensor::zeros([batch_size, input_dim], &device);
                assert_eq!(network.forward(input).dims(), [batch_size, 4]);
            }
        }
    }

    #[test]
    fn test_outputs_are_probabilities() {
        let device = NdArrayDevice::default();
        let network = QNetworkConfig::new(20).init::<TestBackend>(&device);

        let input = Tensor::random([8, 20], Distribution::Uniform(0.0, 1.0), &device);
        let output: TensorData = network.forward(input).into_data();
        let values = output.as_slice::<f32>().unwrap();

        for row in values.chunks(4) {
            assert!(row.iter().all(|v| v.is_finite() && (0.0..=1.0).contains(v)));
            let sum: f32 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-4, "row sums to {}", sum);
        }
    }

    #[test]
    fn test_gradient_flow() {
        let device = NdArrayDevice::default();
        let network = QNetworkConfig::new(20).init::<TestAutodiffBackend>(&device);

        let input = Tensor::<TestAutodiffBackend, 2>::ones([2, 20], &device).require_grad();
        let output = network.forward(input.clone());
        // Softmax rows always sum to 1, so weight one column to get a non-trivial loss
        let loss = output.slice([0..2, 0..1]).sum();
        let grads = loss.backward();

        assert!(input.grad(&grads).is_some());
    }
}
