//! Aggregate training performance
//!
//! Averages are running means updated in place at episode end; nothing is
//! recomputed from history.

use serde::{Deserialize, Serialize};

/// Running statistics over finished episodes
///
/// # Example
///
/// ```rust
/// use snake_dqn::metrics::PerformanceStats;
///
/// let mut stats = PerformanceStats::default();
/// stats.record_game(20, false);
/// stats.record_game(40, true);
///
/// assert_eq!(stats.games_played, 2);
/// assert_eq!(stats.average_score, 30.0);
/// assert_eq!(stats.win_rate, 0.5);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceStats {
    pub games_played: u64,
    pub average_score: f64,
    pub best_score: f64,
    /// Share of games that reached the step cap alive
    pub win_rate: f64,
    /// First-epoch loss of every fit, oldest first
    pub training_loss: Vec<f32>,
}

impl PerformanceStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one finished game into the aggregates
    pub fn record_game(&mut self, score: u32, won: bool) {
        self.games_played += 1;
        let n = self.games_played as f64;
        let score = f64::from(score);

        self.average_score += (score - self.average_score) / n;
        self.best_score = self.best_score.max(score);

        let indicator = if won { 1.0 } else { 0.0 };
        self.win_rate += (indicator - self.win_rate) / n;
    }

    pub fn record_loss(&mut self, loss: f32) {
        self.training_loss.push(loss);
    }

    pub fn last_loss(&self) -> Option<f32> {
        self.training_loss.last().copied()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Games: {} | Avg score: {:.2} | Best: {} | Win rate: {:.1}% | Loss: {}",
            self.games_played,
            self.average_score,
            self.best_score,
            self.win_rate * 100.0,
            self.last_loss()
                .map(|l| format!("{:.4}", l))
                .unwrap_or_else(|| "-".to_string()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_average_matches_mean() {
        let scores = [0, 10, 30, 20, 50, 0, 10];
        let mut stats = PerformanceStats::new();
        for s in scores {
            stats.record_game(s, false);
        }

        let mean = scores.iter().sum::<u32>() as f64 / scores.len() as f64;
        assert!((stats.average_score - mean).abs() < 1e-9);
        assert_eq!(stats.best_score, 50.0);
        assert_eq!(stats.games_played, 7);
    }

    #[test]
    fn test_win_rate_counts_losses() {
        let mut stats = PerformanceStats::new();
        stats.record_game(0, true);
        assert_eq!(stats.win_rate, 1.0);

        stats.record_game(0, false);
        stats.record_game(0, false);
        stats.record_game(0, true);
        assert!((stats.win_rate - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_losses_and_reset() {
        let mut stats = PerformanceStats::new();
        assert_eq!(stats.last_loss(), None);
        stats.record_loss(0.3);
        stats.record_loss(0.2);
        assert_eq!(stats.last_loss(), Some(0.2));
        assert_eq!(stats.training_loss.len(), 2);

        stats.record_game(10, false);
        stats.reset();
        assert_eq!(stats, PerformanceStats::default());
    }

    #[test]
    fn test_format_summary() {
        let mut stats = PerformanceStats::new();
        stats.record_game(10, true);
        let summary = stats.format_summary();
        assert!(summary.contains("Games: 1"));
        assert!(summary.contains("Win rate: 100.0%"));
        assert!(summary.contains("Loss: -"));
    }
}
