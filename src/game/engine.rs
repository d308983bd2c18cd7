use std::collections::HashSet;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

use super::{
    action::Direction,
    config::GameConfig,
    pathfinder::find_path,
    state::{Collision, GameSnapshot, Position, Snake},
};

/// Result of a single `move_snake` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveOutcome {
    /// The snake actually advanced
    pub success: bool,
    /// The game is over (set by this move or an earlier one)
    pub game_over: bool,
    /// The snake ate the apple on this move
    pub score_increased: bool,
    /// What the head ran into, only set on the move that ended the game
    pub collision: Option<Collision>,
}

impl MoveOutcome {
    fn moved(score_increased: bool) -> Self {
        Self {
            success: true,
            game_over: false,
            score_increased,
            collision: None,
        }
    }

    fn died(collision: Collision) -> Self {
        Self {
            success: false,
            game_over: true,
            score_increased: false,
            collision: Some(collision),
        }
    }

    fn frozen() -> Self {
        Self {
            success: false,
            game_over: true,
            score_increased: false,
            collision: None,
        }
    }
}

/// Authoritative game state machine
///
/// Owns the snake, the apple and the score and is their only writer. Read
/// accessors hand out copies so callers never observe a half-applied move.
pub struct GridEngine {
    config: GameConfig,
    snake: Snake,
    apple: Position,
    game_over: bool,
    score: u32,
    high_score: u32,
    path: Vec<Position>,
    rng: Pcg64,
}

impl GridEngine {
    /// Create a new engine with an explicit random source for apple placement
    pub fn new(config: GameConfig, rng: Pcg64) -> Self {
        let snake = initial_snake(&config);
        let mut engine = Self {
            config,
            apple: snake.head(),
            snake,
            game_over: false,
            score: 0,
            high_score: 0,
            path: Vec::new(),
            rng,
        };
        engine.reset();
        engine
    }

    pub fn with_seed(config: GameConfig, seed: u64) -> Self {
        Self::new(config, Pcg64::seed_from_u64(seed))
    }

    pub fn from_entropy(config: GameConfig) -> Self {
        Self::new(config, Pcg64::from_entropy())
    }

    /// Build an engine around an existing snake and apple.
    ///
    /// The caller is responsible for handing in a consistent position: a
    /// snake without duplicate cells inside the grid and an apple off its body.
    pub fn from_parts(config: GameConfig, snake: Snake, apple: Position, rng: Pcg64) -> Self {
        let mut engine = Self {
            config,
            snake,
            apple,
            game_over: false,
            score: 0,
            high_score: 0,
            path: Vec::new(),
            rng,
        };
        engine.update_path();
        engine
    }

    /// Reinitialize the snake, place a new apple and clear score and game over.
    /// The high score survives.
    pub fn reset(&mut self) {
        self.snake = initial_snake(&self.config);
        self.game_over = false;
        self.score = 0;
        match self.spawn_apple() {
            Some(apple) => self.apple = apple,
            None => self.game_over = true,
        }
        self.update_path();
    }

    /// Change direction unless it is the exact reverse of the current one.
    /// Returns whether the change was applied. Does not move the snake.
    pub fn change_direction(&mut self, direction: Direction) -> bool {
        if self.snake.direction.is_opposite(direction) {
            return false;
        }
        self.snake.direction = direction;
        true
    }

    /// Advance the head one cell in the current direction
    pub fn move_snake(&mut self) -> MoveOutcome {
        if self.game_over {
            return MoveOutcome::frozen();
        }

        let new_head = self.snake.head().moved_in_direction(self.snake.direction);

        if !new_head.is_within(self.config.grid_size) {
            self.game_over = true;
            return MoveOutcome::died(Collision::Wall);
        }

        let is_eating = new_head == self.apple;

        // The tail cell is vacated on this move unless the snake grows.
        let segments = self.snake.body_segments();
        let blocking = if is_eating {
            segments
        } else {
            &segments[..segments.len().saturating_sub(1)]
        };
        if blocking.contains(&new_head) {
            self.game_over = true;
            return MoveOutcome::died(Collision::SelfBody);
        }

        self.snake.body.insert(0, new_head);
        if is_eating {
            self.score += self.config.score_increment;
            self.high_score = self.high_score.max(self.score);
            match self.spawn_apple() {
                Some(apple) => self.apple = apple,
                // Nowhere left to put an apple: the board is full.
                None => self.game_over = true,
            }
        } else {
            self.snake.body.pop();
        }

        self.update_path();

        MoveOutcome {
            game_over: self.game_over,
            ..MoveOutcome::moved(is_eating)
        }
    }

    /// Copy of the full game state
    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            snake: self.snake.clone(),
            apple: self.apple,
            game_over: self.game_over,
            score: self.score,
            high_score: self.high_score,
            grid_size: self.config.grid_size,
        }
    }

    pub fn snake(&self) -> Snake {
        self.snake.clone()
    }

    pub fn apple(&self) -> Position {
        self.apple
    }

    pub fn snake_head(&self) -> Position {
        self.snake.head()
    }

    /// Advisory A* path from head to apple, empty when unreachable
    pub fn path(&self) -> Vec<Position> {
        self.path.clone()
    }

    pub fn current_direction(&self) -> Direction {
        self.snake.direction
    }

    /// Body cells the path search must avoid (everything but the head)
    pub fn obstacles(&self) -> HashSet<Position> {
        self.snake.body_segments().iter().copied().collect()
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn high_score(&self) -> u32 {
        self.high_score
    }

    pub fn grid_size(&self) -> usize {
        self.config.grid_size
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn set_speed(&mut self, speed: u32) {
        self.snake.speed = speed;
    }

    pub fn speed(&self) -> u32 {
        self.snake.speed
    }

    fn update_path(&mut self) {
        let obstacles = self.obstacles();
        self.path = find_path(
            self.snake.head(),
            self.apple,
            &obstacles,
            self.config.grid_size,
        );
    }

    /// Rejection-sample a cell off the outer ring and off the snake.
    ///
    /// Falls back to an exhaustive scan after a bounded number of draws so a
    /// crowded board still terminates; returns `None` when no cell is free.
    fn spawn_apple(&mut self) -> Option<Position> {
        let size = self.config.grid_size as i32;
        let is_free = |pos: Position, snake: &Snake| {
            pos.x > 0 && pos.y > 0 && pos.x < size - 1 && pos.y < size - 1 && !snake.body.contains(&pos)
        };

        let max_draws = self.config.grid_size * self.config.grid_size * 4;
        for _ in 0..max_draws {
            let pos = Position::new(self.rng.gen_range(0..size), self.rng.gen_range(0..size));
            if is_free(pos, &self.snake) {
                return Some(pos);
            }
        }

        let free: Vec<Position> = (1..size - 1)
            .flat_map(|y| (1..size - 1).map(move |x| Position::new(x, y)))
            .filter(|pos| is_free(*pos, &self.snake))
            .collect();
        if free.is_empty() {
            return None;
        }
        Some(free[self.rng.gen_range(0..free.len())])
    }
}

/// Fixed starting snake: head at the grid centre heading left, body trailing right
fn initial_snake(config: &GameConfig) -> Snake {
    let center = (config.grid_size / 2) as i32;
    Snake::new(
        Position::new(center, center),
        Direction::Left,
        config.initial_snake_length,
        config.initial_speed,
    )
}
