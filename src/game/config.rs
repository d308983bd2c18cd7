use serde::{Deserialize, Serialize};

/// Configuration for the game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Side length of the square game grid
    pub grid_size: usize,
    /// Initial length of the snake
    pub initial_snake_length: usize,
    /// Points added to the score for each apple
    pub score_increment: u32,
    /// Milliseconds per tick, carried on the snake for pacing
    pub initial_speed: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            grid_size: 20,
            initial_snake_length: 3,
            score_increment: 10,
            initial_speed: 200,
        }
    }
}

impl GameConfig {
    /// Create a new configuration with custom grid size
    pub fn new(grid_size: usize) -> Self {
        Self {
            grid_size,
            ..Default::default()
        }
    }

    /// Create a small grid for testing
    pub fn small() -> Self {
        Self::new(10)
    }

    /// Check that the grid can hold the starting snake plus an apple
    /// strictly inside the outer ring.
    pub fn validate(&self) -> Result<(), String> {
        if self.grid_size < 5 {
            return Err(format!("grid_size must be at least 5, got {}", self.grid_size));
        }

        if self.initial_snake_length == 0 {
            return Err("initial_snake_length must be at least 1".to_string());
        }

        // The body extends to the right of the centre cell.
        let center = self.grid_size / 2;
        if center + self.initial_snake_length > self.grid_size {
            return Err(format!(
                "initial_snake_length {} does not fit a {}x{} grid",
                self.initial_snake_length, self.grid_size, self.grid_size
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GameConfig::default();
        assert_eq!(config.grid_size, 20);
        assert_eq!(config.initial_snake_length, 3);
        assert_eq!(config.score_increment, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_custom_config() {
        let config = GameConfig::new(15);
        assert_eq!(config.grid_size, 15);
        assert_eq!(config.score_increment, 10);
    }

    #[test]
    fn test_validation() {
        assert!(GameConfig::new(4).validate().is_err());

        let mut config = GameConfig::small();
        config.initial_snake_length = 6;
        assert!(config.validate().is_err());

        config.initial_snake_length = 5;
        assert!(config.validate().is_ok());
    }
}
