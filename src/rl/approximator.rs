//! Trainable function approximators behind the policy
//!
//! [`Approximator`] is the seam between the decision/fit logic in
//! [`PolicyModel`](super::PolicyModel) and the numeric kernel. The production
//! implementation is [`BurnApproximator`], an Adam-trained [`QNetwork`].

use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use burn::{
    module::{AutodiffModule, Module},
    optim::{Adam, AdamConfig, GradientsParams, Optimizer, adaptor::OptimizerAdaptor},
    record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder},
    tensor::{
        ElementConversion, Tensor, TensorData,
        backend::{AutodiffBackend, Backend},
    },
};

use super::features::FeatureVector;
use super::network::{QNetwork, QNetworkConfig};
use crate::game::NUM_ACTIONS;

/// One score per action, in action index order
pub type ActionScores = [f32; NUM_ACTIONS];

/// A differentiable map from a feature vector to per-action scores
///
/// Calls are synchronous; every tensor created for a call is dropped before
/// it returns.
pub trait Approximator {
    /// Expected feature vector length
    fn input_len(&self) -> usize;

    fn predict(&self, features: &[f32]) -> Result<ActionScores> {
        let mut scores = self.predict_batch(std::slice::from_ref(&features.to_vec()))?;
        scores.pop().ok_or_else(|| anyhow!("empty prediction"))
    }

    fn predict_batch(&self, batch: &[FeatureVector]) -> Result<Vec<ActionScores>>;

    /// Regress toward `targets` for `epochs` full-batch passes.
    ///
    /// Returns the loss of the first pass.
    fn fit(
        &mut self,
        states: &[FeatureVector],
        targets: &[ActionScores],
        epochs: usize,
        learning_rate: f64,
    ) -> Result<f32>;

    /// Write parameters and architecture next to `stem` (extensions are added)
    fn save(&self, stem: &Path) -> Result<()>;

    /// Replace parameters with the ones saved at `stem`
    fn load(&mut self, stem: &Path) -> Result<()>;

    /// Throw away learned parameters and optimizer state
    fn reinitialize(&mut self);
}

/// [`QNetwork`] trained with Adam on mean squared error
pub struct BurnApproximator<B: AutodiffBackend> {
    config: QNetworkConfig,
    network: QNetwork<B>,
    optim: OptimizerAdaptor<Adam, QNetwork<B>, B>,
    device: B::Device,
}

impl<B: AutodiffBackend> BurnApproximator<B> {
    pub fn new(config: QNetworkConfig, device: B::Device) -> Self {
        let network = config.init::<B>(&device);
        Self {
            config,
            network,
            optim: AdamConfig::new().init(),
            device,
        }
    }

    pub fn config(&self) -> &QNetworkConfig {
        &self.config
    }

    fn check_lengths(&self, batch: &[FeatureVector]) -> Result<()> {
        if let Some(bad) = batch.iter().find(|row| row.len() != self.config.input_dim) {
            bail!(
                "feature vector has length {}, network expects {}",
                bad.len(),
                self.config.input_dim
            );
        }
        Ok(())
    }
}

impl<B: AutodiffBackend> Approximator for BurnApproximator<B> {
    fn input_len(&self) -> usize {
        self.config.input_dim
    }

    fn predict_batch(&self, batch: &[FeatureVector]) -> Result<Vec<ActionScores>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        self.check_lengths(batch)?;

        // Inference runs on the inner backend: no graph, no dropout
        let network = self.network.clone().valid();
        let input = rows_tensor::<B::InnerBackend>(
            batch.iter().flatten().copied().collect(),
            [batch.len(), self.config.input_dim],
            &self.device,
        );
        let output = network.forward(input);

        let values = output
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| anyhow!("failed to read network output: {e:?}"))?;

        Ok(values
            .chunks_exact(NUM_ACTIONS)
            .map(|row| {
                let mut scores = [0.0; NUM_ACTIONS];
                scores.copy_from_slice(row);
                scores
            })
            .collect())
    }

    fn fit(
        &mut self,
        states: &[FeatureVector],
        targets: &[ActionScores],
        epochs: usize,
        learning_rate: f64,
    ) -> Result<f32> {
        if states.len() != targets.len() {
            bail!(
                "{} states but {} targets",
                states.len(),
                targets.len()
            );
        }
        if states.is_empty() || epochs == 0 {
            bail!("nothing to fit");
        }
        self.check_lengths(states)?;

        let n = states.len();
        let inputs = rows_tensor::<B>(
            states.iter().flatten().copied().collect(),
            [n, self.config.input_dim],
            &self.device,
        );
        let targets = rows_tensor::<B>(
            targets.iter().flatten().copied().collect(),
            [n, NUM_ACTIONS],
            &self.device,
        );

        let mut first_loss = None;
        for _epoch in 0..epochs {
            let output = self.network.forward(inputs.clone());
            let diff = output - targets.clone();
            let loss = (diff.clone() * diff).mean();

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &self.network);
            self.network = self
                .optim
                .step(learning_rate, self.network.clone(), grads);

            if first_loss.is_none() {
                first_loss = Some(loss.into_scalar().elem::<f32>());
            }
        }

        first_loss.ok_or_else(|| anyhow!("no epoch ran"))
    }

    fn save(&self, stem: &Path) -> Result<()> {
        let arch_path = stem.with_extension("arch.json");
        let arch_json =
            serde_json::to_string_pretty(&self.config).context("Failed to serialize architecture")?;
        std::fs::write(&arch_path, arch_json)
            .with_context(|| format!("Failed to write architecture to {:?}", arch_path))?;

        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        recorder
            .record(self.network.clone().into_record(), stem.to_path_buf())
            .context("Failed to save network weights")?;

        Ok(())
    }

    fn load(&mut self, stem: &Path) -> Result<()> {
        let arch_path = stem.with_extension("arch.json");
        let arch_json = std::fs::read_to_string(&arch_path)
            .with_context(|| format!("Failed to read architecture from {:?}", arch_path))?;
        let config: QNetworkConfig =
            serde_json::from_str(&arch_json).context("Failed to deserialize architecture")?;

        if config.input_dim != self.config.input_dim || config.num_actions != NUM_ACTIONS {
            bail!(
                "saved network is {}→{}, expected {}→{}",
                config.input_dim,
                config.num_actions,
                self.config.input_dim,
                NUM_ACTIONS
            );
        }

        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        let record = recorder
            .load(stem.to_path_buf(), &self.device)
            .with_context(|| format!("Failed to load network weights from {:?}", stem))?;

        self.network = config.init::<B>(&self.device).load_record(record);
        self.config = config;
        self.optim = AdamConfig::new().init();
        Ok(())
    }

    fn reinitialize(&mut self) {
        self.network = self.config.init::<B>(&self.device);
        self.optim = AdamConfig::new().init();
    }
}

/// Row-major `[rows, cols]` float tensor
fn rows_tensor<BB: Backend>(values: Vec<f32>, shape: [usize; 2], device: &BB::Device) -> Tensor<BB, 2> {
    Tensor::from_data(TensorData::new(values, shape), device)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::rl::{TrainingBackend, default_device};
    use tempfile::TempDir;

    fn approximator(input_dim: usize) -> BurnApproximator<TrainingBackend> {
        BurnApproximator::new(QNetworkConfig::new(input_dim), default_device())
    }

    #[test]
    fn test_predict_shapes() {
        let model = approximator(13);
        let scores = model.predict(&[0.5; 13]).unwrap();
        let sum: f32 = scores.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);

        let batch = model.predict_batch(&vec![vec![0.1; 13]; 5]).unwrap();
        assert_eq!(batch.len(), 5);
    }

    #[test]
    fn test_wrong_length_is_error() {
        let model = approximator(20);
        assert!(model.predict(&[0.0; 13]).is_err());
    }

    #[test]
    fn test_fit_reduces_loss() {
        let mut model = approximator(20);
        let states: Vec<FeatureVector> = (0..16).map(|i| vec![i as f32 / 16.0; 20]).collect();
        let targets: Vec<ActionScores> = (0..16).map(|_| [0.0, 0.0, 1.0, 0.0]).collect();

        let first = model.fit(&states, &targets, 1, 1e-2).unwrap();
        for _ in 0..30 {
            model.fit(&states, &targets, 5, 1e-2).unwrap();
        }
        let later = model.fit(&states, &targets, 1, 1e-2).unwrap();

        assert!(first.is_finite());
        assert!(later < first, "loss did not drop: {} -> {}", first, later);
    }

    #[test]
    fn test_fit_rejects_mismatched_batch() {
        let mut model = approximator(20);
        let states = vec![vec![0.0; 20]; 2];
        let targets = vec![[0.0; 4]];
        assert!(model.fit(&states, &targets, 1, 1e-3).is_err());
    }

    #[test]
    fn test_save_load_restores_predictions() {
        let dir = TempDir::new().unwrap();
        let stem = dir.path().join("model");
        let input = vec![0.3; 20];

        let mut trained = approximator(20);
        let states = vec![input.clone(); 8];
        let targets = vec![[1.0, 0.0, 0.0, 0.0]; 8];
        trained.fit(&states, &targets, 20, 1e-2).unwrap();
        trained.save(&stem).unwrap();

        assert!(stem.with_extension("mpk").exists());
        assert!(stem.with_extension("arch.json").exists());

        let mut restored = approximator(20);
        restored.load(&stem).unwrap();

        let a = trained.predict(&input).unwrap();
        let b = restored.predict(&input).unwrap();
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-5);
        }
    }

    #[test]
    fn test_load_rejects_other_input_size() {
        let dir = TempDir::new().unwrap();
        let stem = dir.path().join("model");
        approximator(13).save(&stem).unwrap();

        let mut model = approximator(20);
        assert!(model.load(&stem).is_err());
    }

    #[test]
    fn test_load_missing_is_error() {
        let dir = TempDir::new().unwrap();
        let mut model = approximator(20);
        assert!(model.load(&dir.path().join("absent")).is_err());
    }
}
