//! Training mode: episode loop around the grid engine and the policy
//!
//! Each step reads a snapshot, picks a direction, applies it, shapes a reward
//! and stores the transition. Every `fit_interval` episodes the policy is fit
//! on a batch sampled from replay memory, and the model is saved when the run
//! ends, whether it completed or was stopped part way.
//!
//! # Example
//!
//! ```rust,no_run
//! use snake_dqn::modes::{TrainConfig, TrainingOrchestrator};
//! use snake_dqn::rl::{BurnApproximator, QNetworkConfig, TrainingBackend, default_device};
//!
//! let config = TrainConfig::default();
//! let approximator = BurnApproximator::<TrainingBackend>::new(
//!     QNetworkConfig::new(config.feature_variant.len()),
//!     default_device(),
//! );
//! let mut orchestrator = TrainingOrchestrator::new(config, approximator)?;
//! orchestrator.load_model();
//! let summary = orchestrator.run(&mut |pct| println!("{:.0}%", pct));
//! println!("{}", summary.stats.format_summary());
//! # Ok::<(), anyhow::Error>(())
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use log::{debug, info, trace};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};

use crate::game::{Collision, Direction, GameConfig, GameSnapshot, GridEngine, Position};
use crate::logbook::LogBook;
use crate::metrics::PerformanceStats;
use crate::rl::{
    Approximator, DEFAULT_MODEL_KEY, FeatureEncoder, FeatureVariant, LoadOutcome, ModelStore,
    PolicyError, PolicyModel, ReplayMemory, RewardConfig, RewardShaper, StepContext,
    TrainingConfig, TrainingOverrides, Transition,
};

/// Run-level configuration
///
/// Every field has a default, so a TOML file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Number of episodes per run
    pub episodes: usize,

    /// An episode that survives this many steps ends as a win
    pub max_steps: usize,

    /// Fit the policy after every N episodes
    pub fit_interval: usize,

    /// Probability of asking the policy at all; otherwise a uniformly random
    /// direction is used
    pub policy_share: f64,

    /// Policy decisions scoring below this are replaced by a random direction
    pub low_confidence_threshold: Option<f32>,

    /// Pause between steps, 0 for none
    pub step_delay_ms: u64,

    /// Model slot name inside `model_dir`
    pub model_key: String,

    pub model_dir: PathBuf,

    /// Seed for every random source; entropy when unset
    pub seed: Option<u64>,

    pub feature_variant: FeatureVariant,

    pub reward: RewardConfig,

    pub game: GameConfig,

    pub training: TrainingConfig,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            episodes: 1000,
            max_steps: 1000,
            fit_interval: 10,
            policy_share: 0.8,
            low_confidence_threshold: Some(0.1),
            step_delay_ms: 0,
            model_key: DEFAULT_MODEL_KEY.to_string(),
            model_dir: PathBuf::from("models"),
            seed: None,
            feature_variant: FeatureVariant::Extended,
            reward: RewardConfig::shaped(),
            game: GameConfig::default(),
            training: TrainingConfig::default(),
        }
    }
}

impl TrainConfig {
    /// Read a TOML file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        toml::from_str(&text).with_context(|| format!("Failed to parse config file {:?}", path))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.episodes == 0 {
            return Err("episodes must be at least 1".to_string());
        }
        if self.max_steps == 0 {
            return Err("max_steps must be at least 1".to_string());
        }
        if self.fit_interval == 0 {
            return Err("fit_interval must be at least 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.policy_share) {
            return Err(format!(
                "policy_share must be in [0, 1], got {}",
                self.policy_share
            ));
        }
        self.game.validate()?;
        self.training.validate()?;
        Ok(())
    }

    /// Pacer matching `step_delay_ms`
    pub fn pacer(&self) -> Box<dyn Pacer> {
        if self.step_delay_ms == 0 {
            Box::new(NoDelay)
        } else {
            Box::new(FixedDelay(Duration::from_millis(self.step_delay_ms)))
        }
    }

    /// Independent generators for the engine and the agent, derived from `seed`
    pub(crate) fn rngs(&self) -> (Pcg64, Pcg64) {
        match self.seed {
            Some(seed) => (
                Pcg64::seed_from_u64(seed),
                Pcg64::seed_from_u64(seed.wrapping_add(1)),
            ),
            None => (Pcg64::from_entropy(), Pcg64::from_entropy()),
        }
    }
}

/// Shared cooperative cancellation flag
///
/// Cloning shares the flag. The loop polls it before every step and every
/// episode.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Called between steps to pace the loop
pub trait Pacer {
    fn pause(&mut self);
}

/// Never waits
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

impl Pacer for NoDelay {
    fn pause(&mut self) {}
}

/// Sleeps for a fixed duration
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

impl Pacer for FixedDelay {
    fn pause(&mut self) {
        std::thread::sleep(self.0);
    }
}

/// How the direction for a step was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionSource {
    /// The policy's decision (greedy or its own epsilon exploration)
    Policy,
    /// The extra random layer that bypasses the policy
    Exploration,
    /// The policy answered with too little confidence
    LowConfidence,
    /// The policy failed; random direction instead
    Fallback,
}

/// Everything an observer learns about one step
#[derive(Debug, Clone)]
pub struct StepEvent {
    pub episode: usize,
    pub step: usize,
    pub direction: Direction,
    pub source: ActionSource,
    pub reward: f32,
    pub snapshot: GameSnapshot,
    pub path: Vec<Position>,
}

/// Notified after every applied step, e.g. to re-render
pub trait StateObserver {
    fn on_step(&mut self, event: &StepEvent);
}

impl<F: FnMut(&StepEvent)> StateObserver for F {
    fn on_step(&mut self, event: &StepEvent) {
        self(event)
    }
}

/// How an episode ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeOutcome {
    /// Game over. `None` when the board filled up.
    Died(Option<Collision>),
    /// Survived `max_steps`; counts as a win
    StepCap,
    /// Stop flag seen mid-episode; not counted in stats
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpisodeReport {
    pub outcome: EpisodeOutcome,
    pub score: u32,
    pub steps: usize,
    pub total_reward: f32,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub episodes_completed: usize,
    pub cancelled: bool,
    pub model_saved: bool,
    pub stats: PerformanceStats,
}

/// `"Training: NN%"` while a run is in progress, `"AI ready"` otherwise
pub fn training_status(progress: Option<f32>) -> String {
    match progress {
        Some(pct) => format!("Training: {:.0}%", pct),
        None => "AI ready".to_string(),
    }
}

/// Pick a direction with the policy, degrading to a random one.
///
/// Returns the error, if any, so the caller can log it.
pub(crate) fn policy_direction<A: Approximator, R: Rng + ?Sized>(
    policy: &mut PolicyModel<A>,
    features: &[f32],
    low_confidence_threshold: Option<f32>,
    rng: &mut R,
) -> (Direction, ActionSource, Option<PolicyError>) {
    match policy.decide(features, rng) {
        Ok(decision) => match low_confidence_threshold {
            Some(threshold) if decision.confidence < threshold => {
                (random_direction(rng), ActionSource::LowConfidence, None)
            }
            _ => (decision.direction(), ActionSource::Policy, None),
        },
        Err(e) => (random_direction(rng), ActionSource::Fallback, Some(e)),
    }
}

pub(crate) fn random_direction<R: Rng + ?Sized>(rng: &mut R) -> Direction {
    Direction::ALL[rng.gen_range(0..Direction::ALL.len())]
}

/// Drives training episodes
///
/// Owns the engine, the policy, the replay memory and the aggregate stats;
/// nothing else mutates them while a run is in progress.
pub struct TrainingOrchestrator<A: Approximator> {
    config: TrainConfig,
    engine: GridEngine,
    policy: PolicyModel<A>,
    memory: ReplayMemory,
    stats: PerformanceStats,
    shaper: RewardShaper,
    encoder: FeatureEncoder,
    rng: Pcg64,
    stop: StopFlag,
    pacer: Box<dyn Pacer>,
    observer: Option<Box<dyn StateObserver>>,
    logbook: LogBook,
    store: Option<ModelStore>,
    progress: Option<f32>,
    failures_this_episode: usize,
}

impl<A: Approximator> TrainingOrchestrator<A> {
    pub fn new(config: TrainConfig, approximator: A) -> Result<Self> {
        Self::with_policy(config.clone(), PolicyModel::new(approximator, config.training))
    }

    /// Build around an existing policy, e.g. one without an approximator
    pub fn with_policy(mut config: TrainConfig, policy: PolicyModel<A>) -> Result<Self> {
        config.training = policy.config().clone();
        if let Err(e) = config.validate() {
            bail!("invalid training configuration: {}", e);
        }

        let encoder = FeatureEncoder::new(config.feature_variant);
        if let Some(approximator) = policy.approximator() {
            if approximator.input_len() != encoder.feature_len() {
                bail!(
                    "approximator expects {} features but the {:?} encoding has {}",
                    approximator.input_len(),
                    config.feature_variant,
                    encoder.feature_len()
                );
            }
        }

        let (engine_rng, rng) = config.rngs();
        Ok(Self {
            engine: GridEngine::new(config.game.clone(), engine_rng),
            memory: ReplayMemory::new(policy.config().memory_size),
            stats: PerformanceStats::new(),
            shaper: RewardShaper::new(config.reward.clone()),
            encoder,
            rng,
            stop: StopFlag::new(),
            pacer: config.pacer(),
            observer: None,
            logbook: LogBook::new(),
            store: Some(ModelStore::new(config.model_dir.clone())),
            progress: None,
            failures_this_episode: 0,
            policy,
            config,
        })
    }

    pub fn with_pacer(mut self, pacer: Box<dyn Pacer>) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn with_observer(mut self, observer: Box<dyn StateObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Share an externally owned stop flag
    pub fn with_stop_flag(mut self, stop: StopFlag) -> Self {
        self.stop = stop;
        self
    }

    /// Never touch the disk
    pub fn without_persistence(mut self) -> Self {
        self.store = None;
        self
    }

    /// Restore the configured model slot, or start fresh
    pub fn load_model(&mut self) -> LoadOutcome {
        let Some(store) = &self.store else {
            return LoadOutcome::Fresh;
        };
        let outcome = self.policy.load(store, &self.config.model_key);
        match outcome {
            LoadOutcome::Restored => self
                .logbook
                .success(format!("Loaded model {:?}", self.config.model_key)),
            LoadOutcome::Fresh => self.logbook.info("No saved model found, using new model"),
        }
        outcome
    }

    /// Save the configured model slot. Failures are logged and reported as `false`.
    pub fn save_model(&mut self) -> bool {
        let Some(store) = &self.store else {
            return false;
        };
        match self.policy.save(store, &self.config.model_key) {
            Ok(()) => {
                self.logbook
                    .success(format!("Model saved as {:?}", self.config.model_key));
                true
            }
            Err(e) => {
                self.logbook.error(format!("Failed to save model: {:#}", e));
                false
            }
        }
    }

    /// Run `episodes` episodes, reporting progress after each one.
    ///
    /// Memory and stats start empty. Returns early, still saving the model,
    /// when the stop flag is raised. A stop request is consumed by the run
    /// that honours it, so the next call trains again.
    ///
    /// A run stopped before its first episode leaves memory, stats and the
    /// saved slot untouched.
    pub fn run(&mut self, progress: &mut dyn FnMut(f32)) -> RunSummary {
        if self.stop.is_stopped() {
            self.stop.reset();
            self.logbook.info("Training stopped before it started");
            return RunSummary {
                episodes_completed: 0,
                cancelled: true,
                model_saved: false,
                stats: self.stats.clone(),
            };
        }

        self.memory.clear();
        self.stats.reset();
        self.progress = Some(0.0);
        self.log_header();

        let episodes = self.config.episodes;
        let mut completed = 0;
        let mut cancelled = false;

        for episode in 0..episodes {
            if self.stop.is_stopped() {
                cancelled = true;
                break;
            }

            let report = self.run_episode(episode);
            if report.outcome == EpisodeOutcome::Cancelled {
                cancelled = true;
                break;
            }

            self.stats
                .record_game(report.score, report.outcome == EpisodeOutcome::StepCap);
            completed += 1;
            debug!(
                "Episode {} ended {:?}: score {}, {} steps, reward {:.2}",
                episode + 1,
                report.outcome,
                report.score,
                report.steps,
                report.total_reward
            );

            if (episode + 1) % self.config.fit_interval == 0 {
                self.fit();
                info!(
                    "[Episode {}/{}] {}",
                    episode + 1,
                    episodes,
                    self.stats.format_summary()
                );
            }

            let pct = (episode + 1) as f32 * 100.0 / episodes as f32;
            self.progress = Some(pct);
            progress(pct);
        }

        if cancelled {
            self.stop.reset();
            self.logbook
                .info(format!("Training stopped after {} episodes", completed));
        } else {
            self.logbook
                .success(format!("Training complete: {} episodes", completed));
        }

        let model_saved = self.save_model();
        self.progress = None;

        RunSummary {
            episodes_completed: completed,
            cancelled,
            model_saved,
            stats: self.stats.clone(),
        }
    }

    /// Play one episode from a fresh board, storing every transition
    pub fn run_episode(&mut self, episode: usize) -> EpisodeReport {
        self.engine.reset();
        self.shaper.reset();
        self.failures_this_episode = 0;
        debug!("Episode {} started", episode + 1);

        let mut steps = 0;
        let mut total_reward = 0.0;

        let outcome = loop {
            if self.stop.is_stopped() {
                break EpisodeOutcome::Cancelled;
            }

            let before = self.engine.snapshot();
            let state = self.encoder.encode(&before);
            let (direction, source) = self.choose_direction(&state);

            // A reversal is rejected and the snake keeps its heading.
            self.engine.change_direction(direction);
            let moved = self.engine.move_snake();
            let after = self.engine.snapshot();

            let reward = self.shaper.reward(&StepContext {
                current_head: before.head(),
                new_head: before.head().moved_in_direction(after.snake.direction),
                apple: before.apple,
                score_increased: moved.score_increased,
                game_over: moved.game_over,
                collision: moved.collision,
            });

            self.memory.add(Transition {
                state,
                action: direction.index(),
                reward,
                next_state: self.encoder.encode(&after),
                done: moved.game_over,
            });

            steps += 1;
            total_reward += reward;

            if moved.score_increased {
                debug!("Apple eaten, score {}", after.score);
            }
            if steps % 10 == 0 {
                trace!("Episode {} step {}: reward {:.2}", episode + 1, steps, reward);
            }

            if let Some(observer) = self.observer.as_mut() {
                observer.on_step(&StepEvent {
                    episode,
                    step: steps,
                    direction,
                    source,
                    reward,
                    path: self.engine.path(),
                    snapshot: after,
                });
            }

            if moved.game_over {
                debug!("Died after {} steps: {:?}", steps, moved.collision);
                break EpisodeOutcome::Died(moved.collision);
            }
            if steps >= self.config.max_steps {
                break EpisodeOutcome::StepCap;
            }

            self.pacer.pause();
        };

        EpisodeReport {
            outcome,
            score: self.engine.score(),
            steps,
            total_reward,
        }
    }

    fn choose_direction(&mut self, state: &[f32]) -> (Direction, ActionSource) {
        if self.rng.gen::<f64>() >= self.config.policy_share {
            return (random_direction(&mut self.rng), ActionSource::Exploration);
        }

        let (direction, source, error) = policy_direction(
            &mut self.policy,
            state,
            self.config.low_confidence_threshold,
            &mut self.rng,
        );
        if let Some(e) = error {
            self.failures_this_episode += 1;
            // One log book entry per episode is enough
            if self.failures_this_episode == 1 {
                self.logbook
                    .error(format!("Decision failed, using random direction: {}", e));
            } else {
                debug!("Decision failed again: {}", e);
            }
        }
        (direction, source)
    }

    /// Fit once from replay memory if it holds a full batch
    pub fn fit(&mut self) -> Option<f32> {
        match self.policy.fit_from_memory(&self.memory, &mut self.rng) {
            Ok(Some(loss)) => {
                self.stats.record_loss(loss);
                self.logbook.info(format!(
                    "Model fitted on {} transitions, loss {:.4}",
                    self.policy.config().batch_size,
                    loss
                ));
                Some(loss)
            }
            Ok(None) => {
                debug!(
                    "Skipping fit: {} of {} transitions",
                    self.memory.len(),
                    self.policy.config().batch_size
                );
                None
            }
            Err(e) => {
                self.logbook.error(format!("Fit failed: {}", e));
                None
            }
        }
    }

    /// Merge hyperparameter changes; a new `memory_size` resizes the memory.
    ///
    /// An invalid merged config is rejected and the current one kept.
    pub fn apply_overrides(&mut self, overrides: &TrainingOverrides) -> Result<(), String> {
        if let Err(e) = self.policy.apply_overrides(overrides) {
            self.logbook
                .error(format!("Rejected configuration update: {}", e));
            return Err(e);
        }
        self.config.training = self.policy.config().clone();
        self.memory.set_capacity(self.policy.config().memory_size);
        Ok(())
    }

    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    pub fn stop_training(&self) {
        self.stop.stop();
    }

    pub fn training_status(&self) -> String {
        training_status(self.progress)
    }

    pub fn reset_performance(&mut self) {
        self.stats.reset();
    }

    pub fn set_performance(&mut self, stats: PerformanceStats) {
        self.stats = stats;
    }

    pub fn reset_memory(&mut self) {
        self.memory.clear();
    }

    pub fn stats(&self) -> &PerformanceStats {
        &self.stats
    }

    pub fn memory(&self) -> &ReplayMemory {
        &self.memory
    }

    pub fn engine(&self) -> &GridEngine {
        &self.engine
    }

    /// Direct engine access for an external controller between runs
    pub fn engine_mut(&mut self) -> &mut GridEngine {
        &mut self.engine
    }

    pub fn policy(&self) -> &PolicyModel<A> {
        &self.policy
    }

    pub fn logbook(&self) -> &LogBook {
        &self.logbook
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    fn log_header(&mut self) {
        let training = self.policy.config();
        info!("{}", "=".repeat(60));
        info!("Q-learning training - Snake");
        info!("Episodes: {} (step cap {})", self.config.episodes, self.config.max_steps);
        info!(
            "Grid: {0}x{0}, features: {1:?}",
            self.config.game.grid_size, self.config.feature_variant
        );
        info!(
            "lr {} | batch {} | epochs {} | memory {} | gamma {}",
            training.learning_rate,
            training.batch_size,
            training.epochs,
            training.memory_size,
            training.gamma
        );
        info!(
            "epsilon {:.3} (decay {}, min {})",
            self.policy.epsilon(),
            training.epsilon_decay,
            training.epsilon_min
        );
        info!("{}", "=".repeat(60));
        self.logbook.info(format!(
            "Starting training: {} episodes",
            self.config.episodes
        ));
    }
}
