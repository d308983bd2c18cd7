//! Core game logic module for Snake
//!
//! Grid state machine and path search with no I/O or rendering dependencies.
//! Training and play modes drive it programmatically.

pub mod action;
pub mod config;
pub mod engine;
pub mod pathfinder;
pub mod state;

// Re-export commonly used types
pub use action::{Direction, NUM_ACTIONS};
pub use config::GameConfig;
pub use engine::{GridEngine, MoveOutcome};
pub use pathfinder::find_path;
pub use state::{Collision, GameSnapshot, Position, Snake};
