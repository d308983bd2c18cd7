use std::path::PathBuf;

use anyhow::{Result, bail};
use burn::tensor::backend::Backend;
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{info, warn};
use snake_dqn::game::GameConfig;
use snake_dqn::modes::{AgentPlayer, StopFlag, TrainConfig, TrainingOrchestrator};
use snake_dqn::rl::{
    BurnApproximator, FeatureVariant, QNetworkConfig, TrainingBackend, TrainingOverrides,
    default_device,
};

#[derive(Parser)]
#[command(name = "snake_dqn")]
#[command(version, about = "Snake game with an online Q-learning agent")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train the agent and save the model
    Train(TrainArgs),
    /// Load the saved model and watch it play
    Play(PlayArgs),
}

#[derive(Args)]
struct CommonArgs {
    /// TOML file with run settings; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seed for every random source
    #[arg(long)]
    seed: Option<u64>,

    /// Directory holding model slots
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Model slot name
    #[arg(long)]
    model_key: Option<String>,

    /// Grid side length
    #[arg(long)]
    grid_size: Option<usize>,

    /// Feature encoding
    #[arg(long)]
    variant: Option<Variant>,

    /// Pause between steps in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Step cap per episode
    #[arg(long)]
    max_steps: Option<usize>,
}

#[derive(Args)]
struct TrainArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Number of episodes
    #[arg(long)]
    episodes: Option<usize>,

    /// Fit after every N episodes
    #[arg(long)]
    fit_interval: Option<usize>,

    /// Start from a fresh model instead of the saved one
    #[arg(long)]
    fresh: bool,

    #[arg(long)]
    learning_rate: Option<f64>,

    #[arg(long)]
    batch_size: Option<usize>,

    #[arg(long)]
    epochs: Option<usize>,

    #[arg(long)]
    memory_size: Option<usize>,

    #[arg(long)]
    epsilon: Option<f32>,

    #[arg(long)]
    gamma: Option<f32>,
}

#[derive(Args)]
struct PlayArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Number of games to play
    #[arg(long, default_value = "10")]
    games: usize,
}

#[derive(Clone, Copy, ValueEnum)]
enum Variant {
    /// 13 features
    Minimal,
    /// 20 features
    Extended,
}

impl From<Variant> for FeatureVariant {
    fn from(variant: Variant) -> Self {
        match variant {
            Variant::Minimal => FeatureVariant::Minimal,
            Variant::Extended => FeatureVariant::Extended,
        }
    }
}

impl CommonArgs {
    /// File values first, then flags
    fn resolve(&self) -> Result<TrainConfig> {
        let mut config = match &self.config {
            Some(path) => TrainConfig::from_file(path)?,
            None => TrainConfig::default(),
        };
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(dir) = &self.model_dir {
            config.model_dir = dir.clone();
        }
        if let Some(key) = &self.model_key {
            config.model_key = key.clone();
        }
        if let Some(grid_size) = self.grid_size {
            config.game = GameConfig {
                grid_size,
                ..config.game
            };
        }
        if let Some(variant) = self.variant {
            config.feature_variant = variant.into();
        }
        if let Some(delay) = self.delay_ms {
            config.step_delay_ms = delay;
        }
        if let Some(max_steps) = self.max_steps {
            config.max_steps = max_steps;
        }
        Ok(config)
    }
}

impl TrainArgs {
    fn overrides(&self) -> TrainingOverrides {
        TrainingOverrides {
            learning_rate: self.learning_rate,
            batch_size: self.batch_size,
            epochs: self.epochs,
            memory_size: self.memory_size,
            epsilon: self.epsilon,
            gamma: self.gamma,
            ..Default::default()
        }
    }
}

fn approximator(config: &TrainConfig) -> BurnApproximator<TrainingBackend> {
    if let Some(seed) = config.seed {
        TrainingBackend::seed(seed);
    }
    BurnApproximator::new(
        QNetworkConfig::new(config.feature_variant.len()),
        default_device(),
    )
}

fn train(args: TrainArgs, stop: StopFlag) -> Result<()> {
    let mut config = args.common.resolve()?;
    if let Some(episodes) = args.episodes {
        config.episodes = episodes;
    }
    if let Some(interval) = args.fit_interval {
        config.fit_interval = interval;
    }
    let overrides = args.overrides();
    if !overrides.is_empty() {
        config.training = config.training.with_overrides(&overrides);
    }

    let approximator = approximator(&config);
    let mut orchestrator = TrainingOrchestrator::new(config, approximator)?.with_stop_flag(stop);
    if !args.fresh {
        orchestrator.load_model();
        // A restored epsilon must not shadow an explicit flag
        if !overrides.is_empty() {
            if let Err(e) = orchestrator.apply_overrides(&overrides) {
                bail!("invalid training overrides: {}", e);
            }
        }
    }

    let mut last_reported = 0;
    let summary = orchestrator.run(&mut |pct| {
        let tenth = (pct / 10.0) as u32;
        if tenth > last_reported {
            last_reported = tenth;
            info!("{}", snake_dqn::modes::training_status(Some(pct)));
        }
    });

    println!();
    println!("{}", "=".repeat(60));
    if summary.cancelled {
        println!(
            "Training stopped after {} episodes",
            summary.episodes_completed
        );
    } else {
        println!("Training complete");
    }
    println!("{}", summary.stats.format_summary());
    if summary.model_saved {
        println!(
            "Model saved to {:?} as {:?}",
            orchestrator.config().model_dir,
            orchestrator.config().model_key
        );
    }
    println!("{}", "=".repeat(60));

    if !summary.model_saved {
        warn!("Model was not saved");
    }
    Ok(())
}

fn play(args: PlayArgs, stop: StopFlag) -> Result<()> {
    if args.games == 0 {
        bail!("--games must be at least 1");
    }
    let config = args.common.resolve()?;
    let approximator = approximator(&config);
    let mut player = AgentPlayer::new(config, approximator)?.with_stop_flag(stop);
    player.load_model();

    let summary = player.play(args.games);

    println!();
    println!("{}", "=".repeat(60));
    println!(
        "Games: {} | Avg score: {:.2} | Best: {}",
        summary.games_played, summary.average_score, summary.best_score
    );
    println!("{}", "=".repeat(60));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut logger = pretty_env_logger::formatted_builder();
    logger.parse_filters(&std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()));
    logger.init();

    let cli = Cli::parse();

    let stop = StopFlag::new();
    let on_ctrl_c = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Stop requested, finishing the current step");
            on_ctrl_c.stop();
        }
    });

    // The loops are synchronous and hold non-Send state
    tokio::task::block_in_place(|| match cli.command {
        Command::Train(args) => train(args, stop),
        Command::Play(args) => play(args, stop),
    })
}
