//! Drainable action log.
//!
//! The action log is the only channel through which callers learn what
//! scripts and lifecycle events did. Each line is buffered for the owning
//! runtime and mirrored to `tracing` so hosts with a subscriber see the same
//! trace.

use tracing::{error, info, warn};

/// Severity of a log line, used only for the `tracing` mirror.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// Ordered buffer of human-readable trace lines for one machine level.
#[derive(Clone, Debug, Default)]
pub struct ActionLog {
    prefix: String,
    lines: Vec<String>,
}

impl ActionLog {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            lines: Vec::new(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn info(&mut self, message: impl AsRef<str>) {
        self.push(LogLevel::Info, message.as_ref());
    }

    pub fn warn(&mut self, message: impl AsRef<str>) {
        self.push(LogLevel::Warn, message.as_ref());
    }

    pub fn error(&mut self, message: impl AsRef<str>) {
        self.push(LogLevel::Error, message.as_ref());
    }

    fn push(&mut self, level: LogLevel, message: &str) {
        let line = format!("{}{}", self.prefix, message);
        match level {
            LogLevel::Info => info!(target: "bsm_engine", "{line}"),
            LogLevel::Warn => warn!(target: "bsm_engine", "{line}"),
            LogLevel::Error => error!(target: "bsm_engine", "{line}"),
        }
        self.lines.push(line);
    }

    /// Append lines that were already prefixed and traced by a child log.
    pub fn absorb(&mut self, lines: Vec<String>) {
        self.lines.extend(lines);
    }

    /// Take every buffered line, leaving the buffer empty.
    pub fn drain(&mut self) -> Vec<String> {
        std::mem::take(&mut self.lines)
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
