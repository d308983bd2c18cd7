//! User-facing training log
//!
//! Append-only list of categorized, timestamped messages for whatever front
//! end is showing the run. Every entry is also forwarded to the `log` facade.

use std::time::{SystemTime, UNIX_EPOCH};

use log::{error, info};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Error,
    Success,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: SystemTime,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    /// Milliseconds since the Unix epoch, 0 for clocks set before it
    pub fn unix_millis(&self) -> u128 {
        self.timestamp
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LogBook {
    entries: Vec<LogEntry>,
}

impl LogBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Error => error!("{}", message),
            LogLevel::Info | LogLevel::Success => info!("{}", message),
        }
        self.entries.push(LogEntry {
            timestamp: SystemTime::now(),
            level,
            message,
        });
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Info, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Error, message);
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Success, message);
    }

    /// Oldest first
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn newest_first(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().rev()
    }

    pub fn count(&self, level: LogLevel) -> usize {
        self.entries.iter().filter(|e| e.level == level).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_order() {
        let mut book = LogBook::new();
        book.info("starting");
        book.error("bad step");
        book.success("saved");

        assert_eq!(book.len(), 3);
        let messages: Vec<_> = book.newest_first().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["saved", "bad step", "starting"]);
        assert_eq!(book.entries()[0].level, LogLevel::Info);
        assert_eq!(book.count(LogLevel::Error), 1);
    }

    #[test]
    fn test_entries_keep_insertion_order() {
        let mut book = LogBook::new();
        for i in 0..5 {
            book.info(format!("entry {}", i));
        }
        let messages: Vec<_> = book.entries().iter().map(|e| e.message.clone()).collect();
        let expected: Vec<_> = (0..5).map(|i| format!("entry {}", i)).collect();
        assert_eq!(messages, expected);
    }

    #[test]
    fn test_unix_millis() {
        let entry = LogEntry {
            timestamp: UNIX_EPOCH + std::time::Duration::from_millis(1_500),
            level: LogLevel::Success,
            message: "saved".to_string(),
        };
        assert_eq!(entry.unix_millis(), 1_500);
    }
}
