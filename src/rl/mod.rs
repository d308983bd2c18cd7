//! Learning engine for the Snake agent
//!
//! Provides:
//! - 13/20-value feature encodings of game snapshots
//! - Shaped rewards and a bounded FIFO replay memory
//! - An epsilon-greedy policy over a trainable approximator with one-step
//!   Q-learning fits
//! - A Burn MLP approximator and on-disk model slots

pub mod approximator;
pub mod backend;
pub mod config;
pub mod features;
pub mod memory;
pub mod network;
pub mod persistence;
pub mod policy;
pub mod reward;

pub use approximator::{ActionScores, Approximator, BurnApproximator};
pub use backend::{InferenceBackend, TrainingBackend, default_device};
pub use config::{TrainingConfig, TrainingOverrides};
pub use features::{FeatureEncoder, FeatureVariant, FeatureVector};
pub use memory::{ReplayMemory, Transition};
pub use network::{QNetwork, QNetworkConfig};
pub use persistence::{DEFAULT_MODEL_KEY, ModelMetadata, ModelStore};
pub use policy::{Decision, LoadOutcome, PolicyError, PolicyModel, argmax};
pub use reward::{RewardConfig, RewardShaper, StepContext};
