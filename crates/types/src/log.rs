//! User-visible event log.
//!
//! The log is the only channel through which the simulation reports
//! rejected operations, drops and attack progress to its collaborators.
//! Every entry is mirrored to `tracing` at the matching level.

use crate::DeviceId;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;
use tracing::{error, info, warn};

/// Default number of entries kept.
pub const DEFAULT_LOG_CAPACITY: usize = 1000;

/// Log severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRIT",
        };
        f.write_str(s)
    }
}

/// A single timestamped log record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    /// Simulation time of the event.
    pub timestamp: Duration,
    pub level: LogLevel,
    #[serde(default)]
    pub device: Option<DeviceId>,
    pub message: String,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:>9.3}s] {:<5} {}",
            self.timestamp.as_secs_f64(),
            self.level,
            self.message
        )
    }
}

/// A log record before it is stamped with an id and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub device: Option<DeviceId>,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl LogRecord {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            device: None,
            message: message.into(),
            details: None,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, message)
    }

    pub fn critical(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Critical, message)
    }

    pub fn with_device(mut self, device: DeviceId) -> Self {
        self.device = Some(device);
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Bounded ring of the most recent log entries.
#[derive(Debug, Clone)]
pub struct EventLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    next_id: u64,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_LOG_CAPACITY)),
            capacity: capacity.max(1),
            next_id: 1,
        }
    }

    /// Append a record, evicting the oldest entry when full.
    pub fn push(&mut self, timestamp: Duration, record: LogRecord) -> &LogEntry {
        match record.level {
            LogLevel::Info => info!(device = ?record.device, "{}", record.message),
            LogLevel::Warning => warn!(device = ?record.device, "{}", record.message),
            LogLevel::Error | LogLevel::Critical => {
                error!(device = ?record.device, level = %record.level, "{}", record.message)
            }
        }

        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        let entry = LogEntry {
            id: self.next_id,
            timestamp,
            level: record.level,
            device: record.device,
            message: record.message,
            details: record.details,
        };
        self.next_id += 1;
        self.entries.push_back(entry);
        // Just pushed.
        &self.entries[self.entries.len() - 1]
    }

    /// Restore entries from a persisted tail.
    pub fn restore(&mut self, entries: impl IntoIterator<Item = LogEntry>) {
        self.entries.clear();
        for entry in entries {
            if self.entries.len() == self.capacity {
                self.entries.pop_front();
            }
            self.next_id = self.next_id.max(entry.id + 1);
            self.entries.push_back(entry);
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// The most recent `n` entries, oldest first.
    pub fn tail(&self, n: usize) -> Vec<LogEntry> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_evicts_oldest() {
        let mut log = EventLog::new(3);
        for i in 0..5 {
            log.push(Duration::from_secs(i), LogRecord::info(format!("entry {i}")));
        }
        assert_eq!(log.len(), 3);
        let messages: Vec<_> = log.entries().map(|e| e.message.clone()).collect();
        assert_eq!(messages, vec!["entry 2", "entry 3", "entry 4"]);
        assert_eq!(log.tail(1)[0].id, 5);
    }

    #[test]
    fn test_restore_continues_ids() {
        let mut log = EventLog::new(10);
        log.restore(vec![LogEntry {
            id: 41,
            timestamp: Duration::ZERO,
            level: LogLevel::Warning,
            device: None,
            message: "restored".into(),
            details: None,
        }]);
        let entry = log.push(Duration::from_secs(1), LogRecord::error("next"));
        assert_eq!(entry.id, 42);
    }
}
