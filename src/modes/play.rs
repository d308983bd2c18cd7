//! AI play mode: watch a trained policy play
//!
//! Games run back to back, restarting after every death, until the requested
//! number of games is reached or the stop flag is raised. Nothing is learned.

use anyhow::{Result, bail};
use log::{debug, info};
use rand_pcg::Pcg64;

use super::train::{
    ActionSource, EpisodeOutcome, EpisodeReport, Pacer, StateObserver, StepEvent, StopFlag,
    TrainConfig, policy_direction,
};
use crate::game::GridEngine;
use crate::logbook::LogBook;
use crate::rl::{Approximator, FeatureEncoder, LoadOutcome, ModelStore, PolicyModel};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaySummary {
    pub games_played: usize,
    pub best_score: u32,
    pub average_score: f64,
    pub cancelled: bool,
}

pub struct AgentPlayer<A: Approximator> {
    config: TrainConfig,
    engine: GridEngine,
    policy: PolicyModel<A>,
    encoder: FeatureEncoder,
    rng: Pcg64,
    stop: StopFlag,
    pacer: Box<dyn Pacer>,
    observer: Option<Box<dyn StateObserver>>,
    logbook: LogBook,
    store: ModelStore,
    games_played: usize,
    best_score: u32,
}

impl<A: Approximator> AgentPlayer<A> {
    /// Uses the game, feature and model-slot settings of `config`
    pub fn new(config: TrainConfig, approximator: A) -> Result<Self> {
        if let Err(e) = config.validate() {
            bail!("invalid play configuration: {}", e);
        }
        let encoder = FeatureEncoder::new(config.feature_variant);
        if approximator.input_len() != encoder.feature_len() {
            bail!(
                "approximator expects {} features but the {:?} encoding has {}",
                approximator.input_len(),
                config.feature_variant,
                encoder.feature_len()
            );
        }

        let (engine_rng, rng) = config.rngs();
        Ok(Self {
            engine: GridEngine::new(config.game.clone(), engine_rng),
            policy: PolicyModel::new(approximator, config.training.clone()),
            encoder,
            rng,
            stop: StopFlag::new(),
            pacer: config.pacer(),
            observer: None,
            logbook: LogBook::new(),
            store: ModelStore::new(config.model_dir.clone()),
            games_played: 0,
            best_score: 0,
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

    pub fn with_stop_flag(mut self, stop: StopFlag) -> Self {
        self.stop = stop;
        self
    }

    /// Restore the model slot; playing a fresh model is allowed
    pub fn load_model(&mut self) -> LoadOutcome {
        let outcome = self.policy.load(&self.store, &self.config.model_key);
        match outcome {
            LoadOutcome::Restored => self.logbook.success(format!(
                "Loaded model {:?} (epsilon {:.4})",
                self.config.model_key,
                self.policy.epsilon()
            )),
            LoadOutcome::Fresh => self
                .logbook
                .error("No saved model found, playing with an untrained model"),
        }
        outcome
    }

    /// Play `games` games, restarting after each one.
    ///
    /// A stop request ends this call and is then cleared.
    pub fn play(&mut self, games: usize) -> PlaySummary {
        self.logbook.info(format!("AI playing {} games", games));
        let mut total_score = 0u64;
        let mut finished = 0;
        let mut cancelled = false;

        while finished < games {
            if self.stop.is_stopped() {
                cancelled = true;
                break;
            }
            let report = self.play_game();
            if report.outcome == EpisodeOutcome::Cancelled {
                cancelled = true;
                break;
            }

            finished += 1;
            self.games_played += 1;
            self.best_score = self.best_score.max(report.score);
            total_score += u64::from(report.score);
            info!(
                "Game {} over ({:?}): score {} | best {}",
                self.games_played, report.outcome, report.score, self.best_score
            );
        }
        if cancelled {
            self.stop.reset();
        }

        PlaySummary {
            games_played: finished,
            best_score: self.best_score,
            average_score: if finished == 0 {
                0.0
            } else {
                total_score as f64 / finished as f64
            },
            cancelled,
        }
    }

    /// One game from a fresh board
    pub fn play_game(&mut self) -> EpisodeReport {
        self.engine.reset();
        let mut steps = 0;
        let mut failed = false;

        let outcome = loop {
            if self.stop.is_stopped() {
                break EpisodeOutcome::Cancelled;
            }

            let features = self.encoder.encode(&self.engine.snapshot());
            let (direction, source, error) = policy_direction(
                &mut self.policy,
                &features,
                self.config.low_confidence_threshold,
                &mut self.rng,
            );
            if let Some(e) = error {
                if !failed {
                    self.logbook
                        .error(format!("AI decision failed, moving randomly: {}", e));
                    failed = true;
                }
            }

            self.engine.change_direction(direction);
            let moved = self.engine.move_snake();
            steps += 1;

            if let Some(observer) = self.observer.as_mut() {
                observer.on_step(&StepEvent {
                    episode: self.games_played,
                    step: steps,
                    direction,
                    source,
                    reward: 0.0,
                    snapshot: self.engine.snapshot(),
                    path: self.engine.path(),
                });
            }
            if source == ActionSource::LowConfidence {
                debug!("Low confidence at step {}, moved {:?}", steps, direction);
            }

            if moved.game_over {
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
            total_reward: 0.0,
        }
    }

    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    pub fn games_played(&self) -> usize {
        self.games_played
    }

    pub fn best_score(&self) -> u32 {
        self.best_score
    }

    pub fn policy(&self) -> &PolicyModel<A> {
        &self.policy
    }

    pub fn engine(&self) -> &GridEngine {
        &self.engine
    }

    pub fn logbook(&self) -> &LogBook {
        &self.logbook
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Direction, GameConfig};
    use crate::logbook::LogLevel;
    use crate::rl::TrainingConfig;
    use crate::rl::approximator::testing::FixedApproximator;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> TrainConfig {
        TrainConfig {
            max_steps: 100,
            seed: Some(5),
            game: GameConfig::small(),
            model_dir: dir.path().to_path_buf(),
            training: TrainingConfig {
                epsilon: 0.0,
                epsilon_min: 0.0,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_plays_requested_games() {
        let dir = TempDir::new().unwrap();
        let approx = FixedApproximator::new([0.9, 0.05, 0.03, 0.02], 20);
        let mut player = AgentPlayer::new(config(&dir), approx).unwrap();

        let summary = player.play(3);

        assert_eq!(summary.games_played, 3);
        assert!(!summary.cancelled);
        assert_eq!(player.games_played(), 3);
        // Heading straight up from the centre hits the top wall every game
        assert!(player.engine().is_game_over());
    }

    #[test]
    fn test_greedy_moves_follow_scores() {
        let dir = TempDir::new().unwrap();
        let approx = FixedApproximator::new([0.9, 0.05, 0.03, 0.02], 20);
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        let mut player = AgentPlayer::new(config(&dir), approx)
            .unwrap()
            .with_observer(Box::new(move |e: &StepEvent| {
                sink.borrow_mut().push((e.direction, e.source))
            }));

        player.play(1);

        let events = events.borrow();
        assert!(!events.is_empty());
        assert!(
            events
                .iter()
                .all(|(d, s)| *d == Direction::Up && *s == ActionSource::Policy)
        );
    }

    #[test]
    fn test_missing_model_is_logged() {
        let dir = TempDir::new().unwrap();
        let approx = FixedApproximator::new([0.25; 4], 20);
        let mut player = AgentPlayer::new(config(&dir), approx).unwrap();

        assert_eq!(player.load_model(), LoadOutcome::Fresh);
        assert_eq!(player.logbook().count(LogLevel::Error), 1);
    }

    #[test]
    fn test_stop_flag_cancels() {
        let dir = TempDir::new().unwrap();
        let approx = FixedApproximator::new([0.25; 4], 20);
        let mut player = AgentPlayer::new(config(&dir), approx).unwrap();
        player.stop_flag().stop();

        let summary = player.play(5);

        assert!(summary.cancelled);
        assert_eq!(summary.games_played, 0);
        assert_eq!(summary.average_score, 0.0);

        let again = player.play(2);
        assert!(!again.cancelled);
        assert_eq!(again.games_played, 2);
    }

    #[test]
    fn test_rejects_wrong_feature_length() {
        let dir = TempDir::new().unwrap();
        let approx = FixedApproximator::new([0.25; 4], 13);
        assert!(AgentPlayer::new(config(&dir), approx).is_err());
    }
}
