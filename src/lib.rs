//! Snake DQN - a Snake game with an online Q-learning agent
//!
//! This library provides:
//! - Core game logic with an A* path overlay (game module)
//! - Feature encoding, reward shaping, replay memory and the policy (rl module)
//! - Running performance aggregates (metrics module)
//! - Training and AI play loops (modes module)
//! - A user-facing, timestamped log channel (logbook module)

pub mod game;
pub mod logbook;
pub mod metrics;
pub mod modes;
pub mod rl;
