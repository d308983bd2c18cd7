//! Run modes driving the game and the learning engine

pub mod play;
pub mod train;

pub use play::{AgentPlayer, PlaySummary};
pub use train::{
    ActionSource, EpisodeOutcome, EpisodeReport, FixedDelay, NoDelay, Pacer, RunSummary,
    StateObserver, StepEvent, StopFlag, TrainConfig, TrainingOrchestrator, training_status,
};
