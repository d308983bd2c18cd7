//! Epsilon-greedy action selection and Q-learning fits
//!
//! [`PolicyModel`] wraps an [`Approximator`] with the exploration schedule and
//! the one-step target construction. Targets are sparse: only the slot of the
//! action taken is set, every other slot is 0. That pulls unchosen actions
//! toward 0 instead of leaving them alone, which is a simplification of full
//! Q-learning the rest of the system is tuned around.

use log::{debug, info, warn};
use rand::Rng;
use thiserror::Error;

use super::approximator::{ActionScores, Approximator};
use super::config::{TrainingConfig, TrainingOverrides};
use super::memory::{ReplayMemory, Transition};
use super::persistence::{ModelMetadata, ModelStore};
use crate::game::{Direction, NUM_ACTIONS};

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("approximator not initialized")]
    NotInitialized,

    #[error("feature vector has length {actual}, expected {expected}")]
    FeatureLength { expected: usize, actual: usize },

    #[error("action index {0} out of range")]
    InvalidAction(usize),

    #[error(transparent)]
    Approximator(#[from] anyhow::Error),
}

/// Result of one policy decision
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub action: usize,
    /// Raw approximator score of the chosen action
    pub confidence: f32,
    /// Chosen uniformly at random rather than by argmax
    pub explored: bool,
}

impl Decision {
    pub fn direction(&self) -> Direction {
        Direction::ALL[self.action % NUM_ACTIONS]
    }
}

/// What `PolicyModel::load` ended up with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Parameters and epsilon came from the store
    Restored,
    /// Nothing usable was stored; a fresh approximator is in place
    Fresh,
}

pub struct PolicyModel<A: Approximator> {
    approximator: Option<A>,
    config: TrainingConfig,
    epsilon: f32,
}

impl<A: Approximator> PolicyModel<A> {
    pub fn new(approximator: A, config: TrainingConfig) -> Self {
        Self {
            epsilon: config.epsilon,
            approximator: Some(approximator),
            config,
        }
    }

    /// A policy with no approximator; every decision fails until
    /// [`PolicyModel::initialize`] is called.
    pub fn uninitialized(config: TrainingConfig) -> Self {
        Self {
            epsilon: config.epsilon,
            approximator: None,
            config,
        }
    }

    pub fn initialize(&mut self, approximator: A) {
        self.approximator = Some(approximator);
    }

    pub fn is_initialized(&self) -> bool {
        self.approximator.is_some()
    }

    pub fn approximator(&self) -> Option<&A> {
        self.approximator.as_ref()
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    pub fn set_epsilon(&mut self, epsilon: f32) {
        self.epsilon = epsilon.clamp(0.0, 1.0);
    }

    /// Apply a partial config update. An `epsilon` override also resets the
    /// current exploration rate.
    ///
    /// The merged config is validated first; on error nothing changes.
    pub fn apply_overrides(&mut self, overrides: &TrainingOverrides) -> Result<(), String> {
        let merged = self.config.with_overrides(overrides);
        merged.validate()?;
        self.config = merged;
        if let Some(epsilon) = overrides.epsilon {
            self.epsilon = epsilon;
        }
        Ok(())
    }

    /// Pick an action for `features` and decay epsilon.
    ///
    /// Explores with probability `epsilon`, otherwise takes the first
    /// highest-scoring action. Confidence is the approximator's score for the
    /// chosen action either way.
    pub fn decide<R: Rng + ?Sized>(
        &mut self,
        features: &[f32],
        rng: &mut R,
    ) -> Result<Decision, PolicyError> {
        let approximator = self
            .approximator
            .as_ref()
            .ok_or(PolicyError::NotInitialized)?;

        let expected = approximator.input_len();
        if features.len() != expected {
            return Err(PolicyError::FeatureLength {
                expected,
                actual: features.len(),
            });
        }

        let scores = approximator.predict(features)?;

        let explored = rng.gen::<f32>() < self.epsilon;
        let action = if explored {
            rng.gen_range(0..NUM_ACTIONS)
        } else {
            argmax(&scores)
        };

        self.decay_epsilon();

        Ok(Decision {
            action,
            confidence: scores[action],
            explored,
        })
    }

    fn decay_epsilon(&mut self) {
        if self.epsilon > self.config.epsilon_min {
            self.epsilon = (self.epsilon * self.config.epsilon_decay).max(self.config.epsilon_min);
        }
    }

    /// Fit on `batch` with one-step Q-learning targets.
    ///
    /// Returns the first-epoch loss, or `None` for an empty batch.
    pub fn fit(&mut self, batch: &[Transition]) -> Result<Option<f32>, PolicyError> {
        let approximator = self
            .approximator
            .as_mut()
            .ok_or(PolicyError::NotInitialized)?;

        if batch.is_empty() {
            return Ok(None);
        }
        if let Some(t) = batch.iter().find(|t| t.action >= NUM_ACTIONS) {
            return Err(PolicyError::InvalidAction(t.action));
        }

        let next_states: Vec<_> = batch.iter().map(|t| t.next_state.clone()).collect();
        let next_scores = approximator.predict_batch(&next_states)?;
        let targets = q_targets(batch, &next_scores, self.config.gamma);

        let states: Vec<_> = batch.iter().map(|t| t.state.clone()).collect();
        let loss = approximator.fit(
            &states,
            &targets,
            self.config.epochs,
            self.config.learning_rate,
        )?;

        debug!("Fit on {} transitions, loss {:.5}", batch.len(), loss);
        Ok(Some(loss))
    }

    /// Sample `batch_size` transitions and fit on them.
    ///
    /// A silent no-op returning `None` while the memory holds fewer than
    /// `batch_size` transitions.
    pub fn fit_from_memory<R: Rng + ?Sized>(
        &mut self,
        memory: &ReplayMemory,
        rng: &mut R,
    ) -> Result<Option<f32>, PolicyError> {
        if memory.len() < self.config.batch_size {
            return Ok(None);
        }
        let batch = memory.sample_batch(self.config.batch_size, rng);
        self.fit(&batch)
    }

    /// Persist parameters, architecture, epsilon and config under `key`
    pub fn save(&self, store: &ModelStore, key: &str) -> anyhow::Result<()> {
        let approximator = self
            .approximator
            .as_ref()
            .ok_or(PolicyError::NotInitialized)?;
        let metadata = ModelMetadata::new(approximator.input_len(), self.epsilon, self.config.clone());
        store.save(key, approximator, &metadata)?;
        info!("Saved model {:?} to {:?}", key, store.dir());
        Ok(())
    }

    /// Restore from `key`, falling back to a fresh approximator on any failure.
    ///
    /// On success the saved epsilon replaces the current one. The
    /// hyperparameters in effect are kept; the saved config is informational.
    pub fn load(&mut self, store: &ModelStore, key: &str) -> LoadOutcome {
        let Some(approximator) = self.approximator.as_mut() else {
            warn!("Cannot load model {:?}: approximator not initialized", key);
            return LoadOutcome::Fresh;
        };

        match store.load(key, approximator) {
            Ok(metadata) => {
                self.epsilon = metadata.epsilon;
                info!(
                    "Loaded model {:?} (version {}, epsilon {:.4})",
                    key, metadata.version, metadata.epsilon
                );
                LoadOutcome::Restored
            }
            Err(e) => {
                warn!("No usable saved model {:?} ({:#}), using a new model", key, e);
                approximator.reinitialize();
                LoadOutcome::Fresh
            }
        }
    }
}

/// Index of the first maximum; NaN scores never win
pub fn argmax(scores: &ActionScores) -> usize {
    let mut best = 0;
    for (i, score) in scores.iter().enumerate().skip(1) {
        if *score > scores[best] || scores[best].is_nan() {
            best = i;
        }
    }
    best
}

/// Sparse one-step targets: `r` for terminal transitions, otherwise
/// `r + gamma * max(next)`, placed in the taken action's slot
fn q_targets(batch: &[Transition], next_scores: &[ActionScores], gamma: f32) -> Vec<ActionScores> {
    batch
        .iter()
        .zip(next_scores)
        .map(|(t, next)| {
            let mut target = [0.0; NUM_ACTIONS];
            target[t.action] = if t.done {
                t.reward
            } else {
                t.reward + gamma * next[argmax(next)]
            };
            target
        })
        .collect()
}
