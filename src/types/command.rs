//! One-shot command options and results

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{LogEntry, LogStream};
use crate::output::classify;

/// Options for a single bounded execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteOptions {
    /// Working directory, defaults to the supervisor's own
    #[serde(default)]
    pub working_directory: Option<PathBuf>,
    /// Variables merged over the inherited environment, highest precedence
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Overall deadline in milliseconds. `Some(0)` disables the deadline,
    /// `None` uses the configured default.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Written to stdin, which is then closed
    #[serde(default)]
    pub stdin: Option<String>,
}

impl ExecuteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_stdin(mut self, payload: impl Into<String>) -> Self {
        self.stdin = Some(payload.into());
        self
    }
}

/// Outcome of a one-shot command
///
/// `exit_code` is `None` exactly when the process was force-terminated, killed by
/// a signal, or never spawned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub timed_out: bool,
    #[serde(default)]
    pub duration_ms: u64,
}

impl ExecuteResult {
    /// Result for a command that never started
    pub fn spawn_failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Classify every non-empty output line, stdout first then stderr
    pub fn log_entries(&self) -> Vec<LogEntry> {
        let lines = |text: &str, stream: LogStream| -> Vec<LogEntry> {
            text.lines()
                .filter(|line| !line.trim().is_empty())
                .map(|line| LogEntry::new(classify(line), line, stream))
                .collect()
        };

        let mut entries = lines(&self.stdout, LogStream::Stdout);
        entries.extend(lines(&self.stderr, LogStream::Stderr));
        entries
    }

    /// First non-empty stdout line, trimmed
    pub fn first_line(&self) -> Option<&str> {
        self.stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
    }
}
