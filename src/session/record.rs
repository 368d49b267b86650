//! Registry-owned session record
//!
//! A record is only ever touched through the registry map. Background tasks look
//! it up by id and compare `instance` before acting, so a stale task never
//! mutates a newer record registered under the same id.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::process::Termination;
use crate::types::{
    LogEntry, SessionInfo, SessionOutput, SessionStatus, SessionStatusReport, SessionSummary,
};

#[derive(Debug)]
pub(crate) struct SessionRecord {
    pub id: String,
    pub instance: Uuid,
    pub command: Vec<String>,
    pub working_directory: PathBuf,
    pub start_time: DateTime<Utc>,
    started_at: Instant,
    status: SessionStatus,
    pub pid: Option<u32>,
    logs: Vec<LogEntry>,
    pub metadata: HashMap<String, serde_json::Value>,
    /// Lines queued for the child's stdin; `None` once the process is gone
    pub input: Option<UnboundedSender<String>>,
    /// Termination requests for the supervising task
    pub control: Option<UnboundedSender<Termination>>,
}

impl SessionRecord {
    pub fn new(
        id: String,
        command: Vec<String>,
        working_directory: PathBuf,
        metadata: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            id,
            instance: Uuid::new_v4(),
            command,
            working_directory,
            start_time: Utc::now(),
            started_at: Instant::now(),
            status: SessionStatus::Starting,
            pid: None,
            logs: Vec::new(),
            metadata,
            input: None,
            control: None,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Move to `next` if the state machine allows it
    ///
    /// Returns whether the status changed.
    pub fn transition(&mut self, next: SessionStatus) -> bool {
        if self.status.can_transition_to(next) {
            self.status = next;
            true
        } else {
            false
        }
    }

    /// Append an entry, trimming to the newest `trim_size` entries once the
    /// buffer exceeds `max_size`
    pub fn append_log(&mut self, entry: LogEntry, max_size: usize, trim_size: usize) {
        self.logs.push(entry);
        if self.logs.len() > max_size {
            let excess = self.logs.len() - trim_size.min(max_size);
            self.logs.drain(..excess);
        }
    }

    pub fn log_count(&self) -> usize {
        self.logs.len()
    }

    /// The last `tail` entries in arrival order, or all of them
    pub fn logs(&self, tail: Option<usize>) -> Vec<LogEntry> {
        let start = tail.map_or(0, |n| self.logs.len().saturating_sub(n));
        self.logs[start..].to_vec()
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn uptime_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id.clone(),
            command: self.command.clone(),
            working_directory: self.working_directory.clone(),
            start_time: self.start_time,
            status: self.status,
            pid: self.pid,
            log_count: self.logs.len(),
            metadata: self.metadata.clone(),
        }
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            status: self.status,
            uptime_ms: self.uptime_ms(),
            log_count: self.logs.len(),
        }
    }

    pub fn status_report(&self) -> SessionStatusReport {
        SessionStatusReport {
            status: self.status,
            uptime_ms: self.uptime_ms(),
            log_count: self.logs.len(),
        }
    }

    pub fn output(&self, tail: Option<usize>) -> SessionOutput {
        SessionOutput {
            logs: self.logs(tail),
            status: self.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LogLevel, LogStream};
    use pretty_assertions::assert_eq;

    fn record() -> SessionRecord {
        SessionRecord::new(
            "s1".to_string(),
            vec!["node".to_string(), "-v".to_string()],
            PathBuf::from("/tmp"),
            HashMap::new(),
        )
    }

    fn entry(n: usize) -> LogEntry {
        LogEntry::new(LogLevel::Info, format!("line {n}"), LogStream::Stdout)
    }

    fn messages(entries: &[LogEntry]) -> Vec<String> {
        entries.iter().map(|e| e.message.clone()).collect()
    }

    #[test]
    fn test_new_record_is_starting() {
        let record = record();
        assert_eq!(record.status(), SessionStatus::Starting);
        assert_eq!(record.log_count(), 0);
        assert_eq!(record.info().command, vec!["node", "-v"]);
    }

    #[test]
    fn test_trim_keeps_most_recent() {
        let mut record = record();
        for n in 0..10 {
            record.append_log(entry(n), 10, 4);
            assert!(record.log_count() <= 10);
        }
        assert_eq!(record.log_count(), 10);

        record.append_log(entry(10), 10, 4);
        assert_eq!(record.log_count(), 4);
        assert_eq!(
            messages(&record.logs(None)),
            vec!["line 7", "line 8", "line 9", "line 10"]
        );
    }

    #[test]
    fn test_buffer_never_exceeds_max() {
        let mut record = record();
        for n in 0..1000 {
            record.append_log(entry(n), 25, 10);
            assert!(record.log_count() <= 25);
        }
    }

    #[test]
    fn test_tail_matches_slice_of_full_buffer() {
        let mut record = record();
        for n in 0..7 {
            record.append_log(entry(n), 100, 50);
        }
        let full = record.logs(None);

        for tail in [0, 1, 3, 7, 20] {
            let expected = &full[full.len().saturating_sub(tail)..];
            assert_eq!(record.logs(Some(tail)), expected.to_vec());
        }
    }

    #[test]
    fn test_transition_respects_state_machine() {
        let mut record = record();
        assert!(record.transition(SessionStatus::Running));
        assert!(record.transition(SessionStatus::Error));
        assert!(!record.transition(SessionStatus::Stopped));
        assert_eq!(record.status(), SessionStatus::Error);
    }
}
