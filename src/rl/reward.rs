//! Reward shaping for a single transition

use serde::{Deserialize, Serialize};

use crate::game::{Collision, Position};

/// Reward constants
///
/// `shaped()` is the default used for training; `simple()` drops the survival,
/// alignment and stall terms and uses harsher death penalties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    pub apple: f32,
    pub wall_penalty: f32,
    pub self_penalty: f32,
    /// Added when the Manhattan distance to the apple strictly shrinks
    pub closer: f32,
    /// Added when the Manhattan distance to the apple strictly grows (negative)
    pub farther: f32,
    /// Added when the move follows the dominant axis toward the apple
    pub alignment: f32,
    /// Added on every non-terminal step that does not eat
    pub survival: f32,
    /// Added once `steps_since_apple` exceeds `stall_after` (negative)
    pub stall: f32,
    pub stall_after: u32,
}

impl RewardConfig {
    pub fn shaped() -> Self {
        Self {
            apple: 10.0,
            wall_penalty: -8.0,
            self_penalty: -15.0,
            closer: 2.0,
            farther: -1.0,
            alignment: 1.0,
            survival: 0.05,
            stall: -0.2,
            stall_after: 30,
        }
    }

    pub fn simple() -> Self {
        Self {
            apple: 10.0,
            wall_penalty: -10.0,
            self_penalty: -20.0,
            closer: 1.0,
            farther: -1.0,
            alignment: 0.0,
            survival: 0.0,
            stall: 0.0,
            stall_after: u32::MAX,
        }
    }
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self::shaped()
    }
}

/// Everything the shaper needs to know about one move
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepContext {
    pub current_head: Position,
    pub new_head: Position,
    /// Apple position before the move
    pub apple: Position,
    pub score_increased: bool,
    pub game_over: bool,
    pub collision: Option<Collision>,
}

/// Computes per-step rewards
///
/// The only state is the number of steps since the last apple, used for the
/// stall penalty. It resets on every apple and on [`RewardShaper::reset`].
#[derive(Debug, Clone)]
pub struct RewardShaper {
    config: RewardConfig,
    steps_since_apple: u32,
}

impl RewardShaper {
    pub fn new(config: RewardConfig) -> Self {
        Self {
            config,
            steps_since_apple: 0,
        }
    }

    pub fn config(&self) -> &RewardConfig {
        &self.config
    }

    pub fn steps_since_apple(&self) -> u32 {
        self.steps_since_apple
    }

    /// Call at the start of every episode
    pub fn reset(&mut self) {
        self.steps_since_apple = 0;
    }

    pub fn reward(&mut self, step: &StepContext) -> f32 {
        if step.score_increased {
            self.steps_since_apple = 0;
            return self.config.apple;
        }

        self.steps_since_apple = self.steps_since_apple.saturating_add(1);

        if step.game_over {
            return match step.collision {
                Some(Collision::SelfBody) => self.config.self_penalty,
                // Board-full and unspecified endings are treated like a wall.
                Some(Collision::Wall) | None => self.config.wall_penalty,
            };
        }

        let mut reward = self.config.survival;

        let before = step.current_head.manhattan_distance(step.apple);
        let after = step.new_head.manhattan_distance(step.apple);
        if after < before {
            reward += self.config.closer;
        } else if after > before {
            reward += self.config.farther;
        }

        if follows_dominant_axis(step.current_head, step.new_head, step.apple) {
            reward += self.config.alignment;
        }

        if self.steps_since_apple > self.config.stall_after {
            reward += self.config.stall;
        }

        reward
    }
}

/// The move goes toward the apple along the axis with the larger gap.
/// Ties favour the x axis.
fn follows_dominant_axis(current: Position, new: Position, apple: Position) -> bool {
    let (dx, dy) = (apple.x - current.x, apple.y - current.y);
    let (mx, my) = (new.x - current.x, new.y - current.y);
    if dx.abs() >= dy.abs() {
        dx.signum() != 0 && dx.signum() == mx.signum()
    } else {
        dy.signum() == my.signum()
    }
}
