//! Bounded per-playlist output log

use bridge_traits::process::OutputStream;
use chrono::{DateTime, SecondsFormat, Utc};
use core_runtime::config::DEFAULT_LOG_CAPACITY;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// One captured line of download tool output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub timestamp: DateTime<Utc>,
    pub stream: OutputStream,
    pub text: String,
}

impl LogLine {
    pub fn new(timestamp: DateTime<Utc>, stream: OutputStream, text: impl Into<String>) -> Self {
        Self {
            timestamp,
            stream,
            text: text.into(),
        }
    }
}

/// Renders as `[<rfc3339>] [<stream>] <text>`
impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] [{}] {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.stream,
            self.text
        )
    }
}

/// FIFO ring of log lines. Once full, each push evicts the oldest line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogBuffer {
    lines: VecDeque<LogLine>,
    capacity: usize,
}

impl LogBuffer {
    /// A capacity of zero is treated as one
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: VecDeque::with_capacity(capacity.min(DEFAULT_LOG_CAPACITY)),
            capacity,
        }
    }

    pub fn push(&mut self, line: LogLine) {
        while self.lines.len() >= self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first
    pub fn iter(&self) -> impl Iterator<Item = &LogLine> {
        self.lines.iter()
    }

    pub fn to_vec(&self) -> Vec<LogLine> {
        self.lines.iter().cloned().collect()
    }

    /// Each line rendered with its timestamp and stream tag
    pub fn rendered(&self) -> Vec<String> {
        self.lines.iter().map(ToString::to_string).collect()
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}
