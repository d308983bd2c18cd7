//! Game snapshot to feature vector encoding
//!
//! Two fixed layouts are available. Both are deterministic and order-stable,
//! so transitions stored early in a run stay valid for later fits.
//!
//! Minimal (13 values):
//!
//! | idx   | value                                      | range    |
//! |-------|--------------------------------------------|----------|
//! | 0-1   | head x, y / grid                           | [0, 1)   |
//! | 2-3   | apple x, y / grid                          | [0, 1)   |
//! | 4     | Manhattan head->apple / (2 * grid)         | [0, 1)   |
//! | 5-8   | direction one-hot (Up, Down, Left, Right)  | {0, 1}   |
//! | 9-12  | danger per direction                       | {0, 1}   |
//!
//! Extended (20 values):
//!
//! | idx   | value                                      | range        |
//! |-------|--------------------------------------------|--------------|
//! | 0-1   | head x, y / grid                           | [0, 1)       |
//! | 2-3   | apple x, y / grid                          | [0, 1)       |
//! | 4     | Euclidean head->apple / (grid * sqrt 2)    | [0, 1)       |
//! | 5     | Manhattan head->apple / (2 * grid)         | [0, 1)       |
//! | 6-9   | direction one-hot                          | {0, 1}       |
//! | 10-13 | danger per direction                       | {0, 1}       |
//! | 14-17 | free run per direction / grid              | [0, 10/grid] |
//! | 18    | trap risk                                  | [0, 1]       |
//! | 19    | body length / grid^2                       | (0, 1]       |
//!
//! Directions are always in action index order.

use serde::{Deserialize, Serialize};

use crate::game::{Direction, GameSnapshot, Position};

/// Free run scan stops after this many cells
pub const FREE_RUN_CAP: usize = 10;

/// Fixed-length, normalized encoding of a game snapshot
pub type FeatureVector = Vec<f32>;

/// Which feature layout to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureVariant {
    Minimal,
    #[default]
    Extended,
}

impl FeatureVariant {
    pub fn len(&self) -> usize {
        match self {
            FeatureVariant::Minimal => 13,
            FeatureVariant::Extended => 20,
        }
    }
}

/// Stateless encoder for one feature layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeatureEncoder {
    variant: FeatureVariant,
}

impl FeatureEncoder {
    pub fn new(variant: FeatureVariant) -> Self {
        Self { variant }
    }

    pub fn variant(&self) -> FeatureVariant {
        self.variant
    }

    /// Length of every vector this encoder produces
    pub fn feature_len(&self) -> usize {
        self.variant.len()
    }

    pub fn encode(&self, snapshot: &GameSnapshot) -> FeatureVector {
        let grid = snapshot.grid_size as f32;
        let head = snapshot.head();
        let apple = snapshot.apple;

        let mut features = Vec::with_capacity(self.feature_len());

        features.push(head.x as f32 / grid);
        features.push(head.y as f32 / grid);
        features.push(apple.x as f32 / grid);
        features.push(apple.y as f32 / grid);

        if self.variant == FeatureVariant::Extended {
            features.push(head.euclidean_distance(apple) / (grid * std::f32::consts::SQRT_2));
        }
        features.push(head.manhattan_distance(apple) as f32 / (2.0 * grid));

        let direction = snapshot.snake.direction;
        features.extend(Direction::ALL.iter().map(|d| indicator(*d == direction)));

        features.extend(
            Direction::ALL
                .iter()
                .map(|d| indicator(snapshot.is_blocked(head.moved_in_direction(*d)))),
        );

        if self.variant == FeatureVariant::Extended {
            let runs = free_runs(snapshot, head);
            features.extend(runs.iter().map(|run| *run as f32 / grid));
            features.push(trap_risk(&runs, snapshot.grid_size));
            features.push(snapshot.snake.len() as f32 / (grid * grid));
        }

        features
    }
}

fn indicator(flag: bool) -> f32 {
    if flag { 1.0 } else { 0.0 }
}

/// Straight-line free cells from `head` in each direction, capped at [`FREE_RUN_CAP`]
fn free_runs(snapshot: &GameSnapshot, head: Position) -> [usize; 4] {
    let mut runs = [0; 4];
    for (run, direction) in runs.iter_mut().zip(Direction::ALL) {
        let mut cursor = head.moved_in_direction(direction);
        while *run < FREE_RUN_CAP && !snapshot.is_blocked(cursor) {
            *run += 1;
            cursor = cursor.moved_in_direction(direction);
        }
    }
    runs
}

/// `1 - min(total_free / (4 * grid), 1)`: close to 1 when the head is boxed in
fn trap_risk(runs: &[usize; 4], grid_size: usize) -> f32 {
    let total: usize = runs.iter().sum();
    1.0 - (total as f32 / (grid_size * 4) as f32).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{GameConfig, GridEngine, Snake};

    fn snapshot(body: Vec<Position>, direction: Direction, apple: Position) -> GameSnapshot {
        GameSnapshot {
            snake: Snake {
                body,
                direction,
                speed: 200,
            },
            apple,
            game_over: false,
            score: 0,
            high_score: 0,
            grid_size: 20,
        }
    }

    fn start_snapshot() -> GameSnapshot {
        snapshot(
            vec![
                Position::new(10, 10),
                Position::new(11, 10),
                Position::new(12, 10),
            ],
            Direction::Left,
            Position::new(5, 7),
        )
    }

    #[test]
    fn test_lengths() {
        let snap = start_snapshot();
        assert_eq!(FeatureEncoder::new(FeatureVariant::Minimal).encode(&snap).len(), 13);
        assert_eq!(FeatureEncoder::new(FeatureVariant::Extended).encode(&snap).len(), 20);
    }

    #[test]
    fn test_minimal_layout() {
        let v = FeatureEncoder::new(FeatureVariant::Minimal).encode(&start_snapshot());

        assert_eq!(&v[0..4], &[0.5, 0.5, 0.25, 0.35]);
        assert!((v[4] - 8.0 / 40.0).abs() < 1e-6);
        // Heading left
        assert_eq!(&v[5..9], &[0.0, 0.0, 1.0, 0.0]);
        // Only the neck (right) is dangerous
        assert_eq!(&v[9..13], &[0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_extended_layout() {
        let v = FeatureEncoder::new(FeatureVariant::Extended).encode(&start_snapshot());

        let euclid = (25.0f32 + 9.0).sqrt() / (20.0 * std::f32::consts::SQRT_2);
        assert!((v[4] - euclid).abs() < 1e-6);
        assert!((v[5] - 8.0 / 40.0).abs() < 1e-6);
        assert_eq!(&v[6..10], &[0.0, 0.0, 1.0, 0.0]);
        assert_eq!(&v[10..14], &[0.0, 0.0, 0.0, 1.0]);

        // Up and Left hit the cap, Down meets the wall after 9, Right is the neck
        assert_eq!(&v[14..18], &[0.5, 0.45, 0.5, 0.0]);
        let risk = 1.0 - 29.0 / 80.0;
        assert!((v[18] - risk).abs() < 1e-6);
        assert!((v[19] - 3.0 / 400.0).abs() < 1e-6);
    }

    #[test]
    fn test_wall_danger_in_corner() {
        let snap = snapshot(
            vec![Position::new(0, 0), Position::new(1, 0), Position::new(2, 0)],
            Direction::Left,
            Position::new(5, 5),
        );

        let v = FeatureEncoder::new(FeatureVariant::Extended).encode(&snap);

        // Up and Left are walls, Right is the neck, Down is free
        assert_eq!(&v[10..14], &[1.0, 0.0, 1.0, 1.0]);
        assert_eq!(&v[14..18], &[0.0, 0.5, 0.0, 0.0]);
    }

    #[test]
    fn test_free_run_stops_at_body() {
        // Body wraps above the head: (5,5) head, segment at (5,2)
        let snap = snapshot(
            vec![
                Position::new(5, 5),
                Position::new(6, 5),
                Position::new(6, 4),
                Position::new(6, 3),
                Position::new(6, 2),
                Position::new(5, 2),
            ],
            Direction::Left,
            Position::new(15, 15),
        );

        let runs = free_runs(&snap, snap.head());
        assert_eq!(runs[Direction::Up.index()], 2);
        assert_eq!(runs[Direction::Left.index()], 5);
        assert_eq!(runs[Direction::Right.index()], 0);
    }

    #[test]
    fn test_values_bounded_over_play() {
        let encoder = FeatureEncoder::new(FeatureVariant::Extended);
        let mut engine = GridEngine::with_seed(GameConfig::default(), 5);

        for step in 0..200 {
            if engine.is_game_over() {
                engine.reset();
            }
            if step % 7 == 0 {
                engine.change_direction(Direction::ALL[(step / 7) % 4]);
            }
            let v = encoder.encode(&engine.snapshot());
            assert_eq!(v.len(), 20);
            for (i, x) in v.iter().enumerate() {
                assert!((0.0..=1.0).contains(x), "feature {} out of range: {}", i, x);
            }
            assert_eq!(v[6..10].iter().sum::<f32>(), 1.0);
            engine.move_snake();
        }
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let encoder = FeatureEncoder::default();
        let snap = start_snapshot();
        assert_eq!(encoder.encode(&snap), encoder.encode(&snap));
    }
}
