//! Backend type aliases and device management
//!
//! - **TrainingBackend**: Autodiff-enabled NdArray backend used while fitting
//! - **InferenceBackend**: plain NdArray backend used for predictions
//!
//! The Q-network is a small MLP over a 13 or 20 float feature vector, so the
//! CPU backend is plenty.

use burn::backend::{
    Autodiff,
    ndarray::{NdArray, NdArrayDevice},
};

/// Backend type for training (with autodiff)
pub type TrainingBackend = Autodiff<NdArray<f32>>;

/// Backend type for inference (without autodiff)
pub type InferenceBackend = NdArray<f32>;

/// Get the default device for computation (CPU)
pub fn default_device() -> NdArrayDevice {
    NdArrayDevice::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::Tensor;

    #[test]
    fn test_feature_batch_on_default_device() {
        let device = default_device();
        let batch = Tensor::<InferenceBackend, 2>::zeros([3, 20], &device);
        assert_eq!(batch.dims(), [3, 20]);

        let tracked = Tensor::<TrainingBackend, 2>::ones([1, 13], &device);
        assert_eq!(tracked.sum().into_scalar(), 13.0);
    }
}
