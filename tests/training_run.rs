//! End-to-end training run through the public API.
//!
//! Trains a real Burn approximator for a handful of episodes on a small grid,
//! then restores the saved slot into a second orchestrator and an AI player.

use snake_dqn::game::GameConfig;
use snake_dqn::modes::{AgentPlayer, NoDelay, TrainConfig, TrainingOrchestrator};
use snake_dqn::rl::{
    BurnApproximator, LoadOutcome, ModelStore, QNetworkConfig, TrainingBackend, TrainingConfig,
    default_device,
};
use tempfile::TempDir;

fn run_config(dir: &TempDir) -> TrainConfig {
    TrainConfig {
        episodes: 6,
        max_steps: 60,
        fit_interval: 2,
        seed: Some(7),
        model_dir: dir.path().to_path_buf(),
        game: GameConfig::small(),
        training: TrainingConfig {
            batch_size: 8,
            epochs: 2,
            memory_size: 500,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn approximator(config: &TrainConfig) -> BurnApproximator<TrainingBackend> {
    BurnApproximator::new(
        QNetworkConfig::new(config.feature_variant.len()),
        default_device(),
    )
}

#[test]
fn short_run_trains_saves_and_restores() {
    let dir = TempDir::new().unwrap();
    let config = run_config(&dir);

    let mut orchestrator = TrainingOrchestrator::new(config.clone(), approximator(&config))
        .unwrap()
        .with_pacer(Box::new(NoDelay));
    assert_eq!(orchestrator.load_model(), LoadOutcome::Fresh);

    let mut progress = Vec::new();
    let summary = orchestrator.run(&mut |pct| progress.push(pct));

    assert_eq!(summary.episodes_completed, 6);
    assert!(!summary.cancelled);
    assert!(summary.model_saved);
    assert_eq!(summary.stats.games_played, 6);
    assert_eq!(progress.last(), Some(&100.0));
    assert!(!summary.stats.training_loss.is_empty());
    assert!(summary.stats.training_loss.iter().all(|l| l.is_finite()));
    assert!(!orchestrator.memory().is_empty());
    assert!(orchestrator.policy().epsilon() < 0.1);
    assert!(ModelStore::new(dir.path()).exists(&config.model_key));

    let trained_epsilon = orchestrator.policy().epsilon();

    let mut resumed = TrainingOrchestrator::new(config.clone(), approximator(&config)).unwrap();
    assert_eq!(resumed.load_model(), LoadOutcome::Restored);
    assert_eq!(resumed.policy().epsilon(), trained_epsilon);

    let mut player = AgentPlayer::new(config.clone(), approximator(&config)).unwrap();
    assert_eq!(player.load_model(), LoadOutcome::Restored);
    let played = player.play(2);
    assert_eq!(played.games_played, 2);
    assert_eq!(player.games_played(), 2);
}

#[test]
fn stop_before_start_is_consumed() {
    let dir = TempDir::new().unwrap();
    let mut config = run_config(&dir);
    config.episodes = 2;

    let mut orchestrator = TrainingOrchestrator::new(config.clone(), approximator(&config)).unwrap();
    orchestrator.stop_training();
    let stopped = orchestrator.run(&mut |_| {});

    assert!(stopped.cancelled);
    assert_eq!(stopped.episodes_completed, 0);
    assert!(!stopped.model_saved);
    assert!(!ModelStore::new(dir.path()).exists(&config.model_key));
    assert!(orchestrator.training_status().contains("AI ready"));

    let resumed = orchestrator.run(&mut |_| {});

    assert!(!resumed.cancelled);
    assert_eq!(resumed.episodes_completed, 2);
    assert!(resumed.model_saved);
    assert!(ModelStore::new(dir.path()).exists(&config.model_key));
}
