//! Learning hyperparameters

use serde::{Deserialize, Serialize};

/// Hyperparameters for the Q-learning policy
///
/// Values are immutable once handed to a `PolicyModel`; use
/// [`TrainingConfig::with_overrides`] to derive an updated copy.
///
/// # Example
///
/// ```rust
/// use snake_dqn::rl::{TrainingConfig, TrainingOverrides};
///
/// let config = TrainingConfig::default();
/// let tuned = config.with_overrides(&TrainingOverrides {
///     learning_rate: Some(5e-4),
///     ..Default::default()
/// });
/// assert_eq!(tuned.batch_size, config.batch_size);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Learning rate for the Adam optimizer
    ///
    /// Default: 0.001
    pub learning_rate: f64,

    /// Transitions sampled per fit, also the minimum memory size for fitting
    ///
    /// Default: 32
    pub batch_size: usize,

    /// Passes over the sampled batch per fit
    ///
    /// Default: 10
    pub epochs: usize,

    /// Replay memory capacity
    ///
    /// Default: 10000
    pub memory_size: usize,

    /// Initial exploration probability
    ///
    /// Default: 0.1
    pub epsilon: f32,

    /// Multiplicative decay applied to epsilon after each decision
    ///
    /// Default: 0.995
    pub epsilon_decay: f32,

    /// Floor for epsilon
    ///
    /// Default: 0.01
    pub epsilon_min: f32,

    /// Discount factor for the bootstrapped next-state value
    ///
    /// Default: 0.95
    pub gamma: f32,
}

impl TrainingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration parameters
    ///
    /// # Returns
    ///
    /// `Ok(())` if all parameters are valid, `Err(String)` with an error message otherwise.
    pub fn validate(&self) -> Result<(), String> {
        if self.learning_rate <= 0.0 {
            return Err(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            ));
        }

        if self.batch_size == 0 {
            return Err("batch_size must be at least 1".to_string());
        }

        if self.epochs == 0 {
            return Err("epochs must be at least 1".to_string());
        }

        if self.memory_size < self.batch_size {
            return Err(format!(
                "memory_size ({}) cannot be smaller than batch_size ({})",
                self.memory_size, self.batch_size
            ));
        }

        for (name, value) in [
            ("epsilon", self.epsilon),
            ("epsilon_decay", self.epsilon_decay),
            ("epsilon_min", self.epsilon_min),
            ("gamma", self.gamma),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("{} must be in [0, 1], got {}", name, value));
            }
        }

        if self.epsilon_min > self.epsilon {
            return Err(format!(
                "epsilon_min ({}) cannot exceed epsilon ({})",
                self.epsilon_min, self.epsilon
            ));
        }

        Ok(())
    }

    /// Copy of this config with every `Some` field of `overrides` applied
    pub fn with_overrides(&self, overrides: &TrainingOverrides) -> Self {
        Self {
            learning_rate: overrides.learning_rate.unwrap_or(self.learning_rate),
            batch_size: overrides.batch_size.unwrap_or(self.batch_size),
            epochs: overrides.epochs.unwrap_or(self.epochs),
            memory_size: overrides.memory_size.unwrap_or(self.memory_size),
            epsilon: overrides.epsilon.unwrap_or(self.epsilon),
            epsilon_decay: overrides.epsilon_decay.unwrap_or(self.epsilon_decay),
            epsilon_min: overrides.epsilon_min.unwrap_or(self.epsilon_min),
            gamma: overrides.gamma.unwrap_or(self.gamma),
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.001,
            batch_size: 32,
            epochs: 10,
            memory_size: 10000,
            epsilon: 0.1,
            epsilon_decay: 0.995,
            epsilon_min: 0.01,
            gamma: 0.95,
        }
    }
}

/// Partial update for [`TrainingConfig`]; `None` keeps the current value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingOverrides {
    pub learning_rate: Option<f64>,
    pub batch_size: Option<usize>,
    pub epochs: Option<usize>,
    pub memory_size: Option<usize>,
    pub epsilon: Option<f32>,
    pub epsilon_decay: Option<f32>,
    pub epsilon_min: Option<f32>,
    pub gamma: Option<f32>,
}

impl TrainingOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
