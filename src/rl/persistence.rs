//! Named model slots on disk
//!
//! A [`ModelStore`] is a directory. Each key owns three files:
//! - `<key>.mpk` - network weights (Burn record format)
//! - `<key>.arch.json` - network layer sizes
//! - `<key>.meta.json` - [`ModelMetadata`] as JSON
//!
//! Saving overwrites all three. Loading fails if any of them is missing or
//! they disagree with the approximator being loaded into.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use super::approximator::Approximator;
use super::config::TrainingConfig;

/// Default slot name
pub const DEFAULT_MODEL_KEY: &str = "snake-ai-model";

/// Metadata saved with the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Crate version that wrote the model
    pub version: String,

    /// Feature vector length the network was trained on
    pub feature_len: usize,

    /// Exploration rate at save time, restored on load
    pub epsilon: f32,

    /// Hyperparameters in effect at save time
    pub training_config: TrainingConfig,
}

impl ModelMetadata {
    pub fn new(feature_len: usize, epsilon: f32, training_config: TrainingConfig) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            feature_len,
            epsilon,
            training_config,
        }
    }
}

/// Directory of named model slots
#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path without extension shared by all files of a slot
    pub fn stem(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\', '.']) {
            bail!("invalid model key {:?}", key);
        }
        Ok(self.dir.join(key))
    }

    /// True when the metadata file for `key` is present
    pub fn exists(&self, key: &str) -> bool {
        self.stem(key)
            .map(|stem| stem.with_extension("meta.json").exists())
            .unwrap_or(false)
    }

    pub fn save<A: Approximator + ?Sized>(
        &self,
        key: &str,
        approximator: &A,
        metadata: &ModelMetadata,
    ) -> Result<()> {
        let stem = self.stem(key)?;
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create directory: {:?}", self.dir))?;

        approximator.save(&stem)?;

        let meta_path = stem.with_extension("meta.json");
        let meta_json =
            serde_json::to_string_pretty(metadata).context("Failed to serialize metadata")?;
        std::fs::write(&meta_path, meta_json)
            .with_context(|| format!("Failed to write metadata to {:?}", meta_path))?;

        Ok(())
    }

    /// Load the slot into `approximator` and return its metadata.
    ///
    /// `approximator` is left untouched when the metadata does not match.
    pub fn load<A: Approximator + ?Sized>(
        &self,
        key: &str,
        approximator: &mut A,
    ) -> Result<ModelMetadata> {
        let stem = self.stem(key)?;

        let meta_path = stem.with_extension("meta.json");
        let meta_json = std::fs::read_to_string(&meta_path)
            .with_context(|| format!("Failed to read metadata from {:?}", meta_path))?;
        let metadata: ModelMetadata =
            serde_json::from_str(&meta_json).context("Failed to deserialize metadata")?;

        if metadata.feature_len != approximator.input_len() {
            bail!(
                "model {:?} was trained on {} features, expected {}",
                key,
                metadata.feature_len,
                approximator.input_len()
            );
        }

        approximator.load(&stem)?;
        Ok(metadata)
    }
}

impl Default for ModelStore {
    fn default() -> Self {
        Self::new("models")
    }
}
