//! Session-related types
//!
//! Status state machine, log entries, and the snapshot types handed to callers.
//! Callers never hold a reference to a live session record; every read returns
//! one of the owned snapshots defined here.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a supervised session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Process spawned, still inside the startup grace period
    Starting,
    /// Process is accepting input
    Running,
    /// Process exited or a stop was requested
    Stopped,
    /// Process failed; terminal
    Error,
}

impl SessionStatus {
    /// Get status string for API responses
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Error => "error",
        }
    }

    /// Whether the state machine allows moving from `self` to `next`
    ///
    /// Status only moves forward along `starting -> running -> stopped`.
    /// `error` is reachable from every other state and nothing leaves it.
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        match (self, next) {
            (Self::Error, _) => false,
            (_, Self::Error) => true,
            (Self::Starting, Self::Running) => true,
            (Self::Starting | Self::Running, Self::Stopped) => true,
            _ => false,
        }
    }

    /// Whether the session can no longer make progress
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Stopped | Self::Error)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity assigned to a chunk of process output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a log entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStream {
    Stdout,
    Stderr,
    /// Synthetic entries written by the supervisor itself (exit, error)
    System,
}

/// One buffered chunk of session output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    /// Trimmed text
    pub message: String,
    /// Text exactly as received
    pub raw: String,
    pub stream: LogStream,
}

impl LogEntry {
    /// Create a new entry stamped with the current time
    pub fn new(level: LogLevel, raw: impl Into<String>, stream: LogStream) -> Self {
        let raw = raw.into();
        Self {
            timestamp: Utc::now(),
            level,
            message: raw.trim().to_string(),
            raw,
            stream,
        }
    }

    /// Create a synthetic supervisor entry
    pub fn system(level: LogLevel, message: impl Into<String>) -> Self {
        Self::new(level, message, LogStream::System)
    }
}

/// Full snapshot of a session record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: String,
    pub command: Vec<String>,
    pub working_directory: PathBuf,
    pub start_time: DateTime<Utc>,
    pub status: SessionStatus,
    pub pid: Option<u32>,
    pub log_count: usize,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Row returned by `list_sessions`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: String,
    pub status: SessionStatus,
    pub uptime_ms: u64,
    pub log_count: usize,
}

/// Result of `read_output`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOutput {
    pub logs: Vec<LogEntry>,
    pub status: SessionStatus,
}

/// Result of `get_status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusReport {
    pub status: SessionStatus,
    pub uptime_ms: u64,
    pub log_count: usize,
}
