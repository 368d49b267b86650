//! Session registry for supervised long-lived processes
//!
//! Uses DashMap as an id-indexed arena with the entry API for atomic
//! check-and-insert. Public methods are synchronous and never wait on process
//! I/O; they must be called from within a tokio runtime because starting and
//! stopping sessions spawns background tasks.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use super::events::SessionEvent;
use super::record::SessionRecord;
use super::supervisor;
use crate::command::{build_env, forwarded_tokens, sanitize_command};
use crate::output::classify;
use crate::process::{self, Termination};
use crate::types::{
    LogEntry, LogLevel, LogStream, Result, SessionInfo, SessionOutput, SessionStatus,
    SessionStatusReport, SessionSummary, SupervisorConfig, SupervisorError,
};

/// Options for [`SessionRegistry::start_session`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOptions {
    /// Working directory, defaults to the supervisor's own
    #[serde(default)]
    pub working_directory: Option<PathBuf>,
    /// Variables merged over the inherited environment
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Caller annotations stored on the session
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

#[derive(Debug)]
pub(crate) struct RegistryInner {
    /// Live sessions keyed by caller-chosen id
    sessions: DashMap<String, SessionRecord>,
    config: SupervisorConfig,
    events: broadcast::Sender<SessionEvent>,
}

/// Registry of supervised sessions
///
/// Cheap to clone; all clones share the same sessions. Construct one per
/// server and pass it to every caller.
#[derive(Debug, Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(SupervisorConfig::default())
    }
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new(config: SupervisorConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Arc::new(RegistryInner {
                sessions: DashMap::new(),
                config,
                events,
            }),
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.inner.config
    }

    /// Subscribe to session lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Spawn `command` as a new named session
    ///
    /// The session starts in `starting` and is promoted to `running` after the
    /// startup grace delay. If the process cannot be spawned the session is
    /// still registered, in `error` state with the failure in its log, so the
    /// caller can inspect it with [`read_output`](Self::read_output).
    pub fn start_session<S: AsRef<str>>(
        &self,
        id: impl Into<String>,
        command: &[S],
        options: SessionOptions,
    ) -> Result<SessionInfo> {
        let id = id.into();
        let command = sanitize_command(command);
        if command.first().is_none_or(|program| program.is_empty()) {
            return Err(SupervisorError::EmptyCommand);
        }

        let working_directory = options
            .working_directory
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));

        if self.inner.sessions.contains_key(&id) {
            return Err(SupervisorError::session_already_exists(id));
        }

        let mut record = SessionRecord::new(
            id.clone(),
            command.clone(),
            working_directory.clone(),
            options.metadata,
        );

        // Spawn before taking the entry so the shard lock is not held across fork/exec
        let env = build_env(&options.env);
        let spawned = process::spawn_child(&command, Some(&working_directory), &env);

        let dashmap::Entry::Vacant(vacant) = self.inner.sessions.entry(id.clone()) else {
            // A concurrent start claimed the id while we were spawning
            if let Ok(mut child) = spawned {
                drop(child.terminate(Termination::Forced));
            }
            return Err(SupervisorError::session_already_exists(id));
        };

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                let message = e.to_string();
                tracing::error!(
                    session_id = %id,
                    command = ?command,
                    "Session failed to start: {}",
                    message
                );

                record.transition(SessionStatus::Error);
                let entry = LogEntry::system(LogLevel::Error, message.clone());
                record.append_log(
                    entry.clone(),
                    self.inner.config.max_log_buffer,
                    self.inner.config.log_trim_size,
                );
                let info = record.info();
                vacant.insert(record);

                self.inner.emit(SessionEvent::Log {
                    session_id: id.clone(),
                    entry,
                });
                self.inner.emit(SessionEvent::Error {
                    session_id: id,
                    message,
                });
                return Ok(info);
            }
        };

        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        record.pid = Some(child.id()).filter(|pid| *pid > 0);
        record.input = Some(input_tx);
        record.control = Some(control_tx);
        let instance = record.instance;
        let info = record.info();
        vacant.insert(record);

        tracing::info!(
            session_id = %id,
            pid = ?info.pid,
            command = ?command,
            cwd = %working_directory.display(),
            auth_tokens = ?forwarded_tokens(&env),
            "Session started"
        );
        self.inner.emit(SessionEvent::Started {
            session_id: id.clone(),
            command,
            pid: info.pid,
        });

        let registry = Arc::downgrade(&self.inner);
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.take_stdout() {
            readers.push(tokio::spawn(supervisor::pump_output(
                registry.clone(),
                id.clone(),
                instance,
                LogStream::Stdout,
                stdout,
            )));
        }
        if let Some(stderr) = child.take_stderr() {
            readers.push(tokio::spawn(supervisor::pump_output(
                registry.clone(),
                id.clone(),
                instance,
                LogStream::Stderr,
                stderr,
            )));
        }
        if let Some(stdin) = child.take_stdin() {
            tokio::spawn(supervisor::feed_input(id.clone(), stdin, input_rx));
        }
        tokio::spawn(supervisor::watch_process(
            registry.clone(),
            id.clone(),
            instance,
            child,
            control_rx,
            readers,
        ));

        supervisor::schedule(registry, self.inner.config.startup_grace(), move |inner| {
            inner.promote_running(&id, instance);
        });

        Ok(info)
    }

    /// Send one line of input to a running session
    ///
    /// A newline is appended to `text`.
    pub fn send_input(&self, id: &str, text: &str) -> Result<()> {
        let record = self
            .inner
            .sessions
            .get(id)
            .ok_or_else(|| SupervisorError::session_not_found(id))?;

        let status = record.status();
        if status != SessionStatus::Running {
            return Err(SupervisorError::session_not_running(id, status));
        }

        let queued = record
            .input
            .as_ref()
            .is_some_and(|input| input.send(format!("{text}\n")).is_ok());
        drop(record);

        if !queued {
            return Err(SupervisorError::ProcessRuntime(format!(
                "stdin of session {id} is closed"
            )));
        }

        tracing::debug!(session_id = %id, "Session input queued");
        self.inner.emit(SessionEvent::Input {
            session_id: id.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    /// Buffered log entries (all, or the last `tail`) and current status
    pub fn read_output(&self, id: &str, tail: Option<usize>) -> Result<SessionOutput> {
        self.inner
            .sessions
            .get(id)
            .map(|record| record.output(tail))
            .ok_or_else(|| SupervisorError::session_not_found(id))
    }

    /// Status, uptime and log count of a session
    pub fn get_status(&self, id: &str) -> Result<SessionStatusReport> {
        self.inner
            .sessions
            .get(id)
            .map(|record| record.status_report())
            .ok_or_else(|| SupervisorError::session_not_found(id))
    }

    /// Full snapshot of a session
    pub fn get_session(&self, id: &str) -> Option<SessionInfo> {
        self.inner.sessions.get(id).map(|record| record.info())
    }

    /// Attach a caller annotation to a session
    pub fn set_metadata(
        &self,
        id: &str,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Result<()> {
        let mut record = self
            .inner
            .sessions
            .get_mut(id)
            .ok_or_else(|| SupervisorError::session_not_found(id))?;
        record.metadata.insert(key.into(), value);
        Ok(())
    }

    /// Stop a session
    ///
    /// Sends SIGTERM and marks the session `stopped` right away without waiting
    /// for the process. SIGKILL follows after the kill delay if the session is
    /// still registered, and the session is removed after the cleanup delay.
    pub fn stop_session(&self, id: &str) -> Result<()> {
        let instance = {
            let mut record = self
                .inner
                .sessions
                .get_mut(id)
                .ok_or_else(|| SupervisorError::session_not_found(id))?;

            if let Some(control) = &record.control {
                if control.send(Termination::Graceful).is_err() {
                    tracing::debug!(session_id = %id, "Process already exited");
                }
            }
            record.transition(SessionStatus::Stopped);
            record.input = None;
            record.instance
        };

        tracing::info!(session_id = %id, "Session stop requested");
        self.inner.emit(SessionEvent::Stopped {
            session_id: id.to_string(),
        });

        let registry = Arc::downgrade(&self.inner);
        let kill_id = id.to_string();
        supervisor::schedule(
            registry.clone(),
            self.inner.config.session_kill_delay(),
            move |inner| inner.escalate_kill(&kill_id, instance),
        );
        let remove_id = id.to_string();
        supervisor::schedule(registry, self.inner.config.cleanup_delay(), move |inner| {
            inner.remove_session(&remove_id, instance);
        });

        Ok(())
    }

    /// Snapshot of every registered session, including stopped ones pending removal
    pub fn list_sessions(&self) -> Vec<SessionSummary> {
        let mut sessions: Vec<(chrono::DateTime<chrono::Utc>, SessionSummary)> = self
            .inner
            .sessions
            .iter()
            .map(|record| (record.start_time, record.summary()))
            .collect();
        sessions.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id)));
        sessions.into_iter().map(|(_, summary)| summary).collect()
    }

    /// Stop every registered session
    pub fn stop_all_sessions(&self) {
        // Collect first: stop_session takes a write lock on the map
        let ids: Vec<String> = self
            .inner
            .sessions
            .iter()
            .map(|record| record.key().clone())
            .collect();

        for id in ids {
            if let Err(e) = self.stop_session(&id) {
                tracing::debug!(session_id = %id, "Session vanished during stop-all: {}", e);
            }
        }
    }

    /// Number of registered sessions
    pub fn session_count(&self) -> usize {
        self.inner.sessions.len()
    }

    /// Check if a session is registered
    pub fn has_session(&self, id: &str) -> bool {
        self.inner.sessions.contains_key(id)
    }
}

impl RegistryInner {
    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        drop(self.events.send(event));
    }

    /// Run `f` on the record for `id` if it is still the given instance
    fn with_current<R>(
        &self,
        id: &str,
        instance: Uuid,
        f: impl FnOnce(&mut SessionRecord) -> R,
    ) -> Option<R> {
        let mut record = self.sessions.get_mut(id)?;
        if record.instance != instance {
            return None;
        }
        Some(f(&mut *record))
    }

    fn append(&self, id: &str, instance: Uuid, entry: LogEntry) -> bool {
        let (max, trim) = (self.config.max_log_buffer, self.config.log_trim_size);
        let appended = self
            .with_current(id, instance, |record| record.append_log(entry.clone(), max, trim))
            .is_some();
        if appended {
            self.emit(SessionEvent::Log {
                session_id: id.to_string(),
                entry,
            });
        }
        appended
    }

    /// Classify and buffer one chunk of process output
    pub(super) fn record_output(&self, id: &str, instance: Uuid, stream: LogStream, chunk: &[u8]) {
        let raw = String::from_utf8_lossy(chunk).into_owned();
        let entry = LogEntry::new(classify(&raw), raw, stream);
        self.append(id, instance, entry);
    }

    pub(super) fn promote_running(&self, id: &str, instance: Uuid) {
        let promoted = self
            .with_current(id, instance, |record| {
                record.transition(SessionStatus::Running)
            })
            .unwrap_or(false);
        if promoted {
            tracing::debug!(session_id = %id, "Session is running");
        }
    }

    pub(super) fn handle_exit(&self, id: &str, instance: Uuid, status: &ExitStatus) {
        let message = process::describe_exit(status);
        let known = self
            .with_current(id, instance, |record| {
                record.transition(SessionStatus::Stopped);
                record.input = None;
                record.control = None;
            })
            .is_some();
        if !known {
            return;
        }

        tracing::info!(session_id = %id, "{}", message);
        self.append(id, instance, LogEntry::system(LogLevel::Info, message));
        self.emit(SessionEvent::Exit {
            session_id: id.to_string(),
            exit_code: process::exit_code(status),
            signal: process::exit_signal(status),
        });
    }

    pub(super) fn handle_process_error(&self, id: &str, instance: Uuid, message: &str) {
        let known = self
            .with_current(id, instance, |record| {
                record.transition(SessionStatus::Error);
                record.input = None;
                record.control = None;
            })
            .is_some();
        if !known {
            return;
        }

        let message = SupervisorError::ProcessRuntime(message.to_string()).to_string();
        tracing::error!(session_id = %id, "{}", message);
        self.append(id, instance, LogEntry::system(LogLevel::Error, message.clone()));
        self.emit(SessionEvent::Error {
            session_id: id.to_string(),
            message,
        });
    }

    fn escalate_kill(&self, id: &str, instance: Uuid) {
        let sent = self
            .with_current(id, instance, |record| {
                record
                    .control
                    .as_ref()
                    .is_some_and(|control| control.send(Termination::Forced).is_ok())
            })
            .unwrap_or(false);
        if sent {
            tracing::warn!(session_id = %id, "Session did not exit after SIGTERM, sending SIGKILL");
        }
    }

    fn remove_session(&self, id: &str, instance: Uuid) {
        if self
            .sessions
            .remove_if(id, |_, record| record.instance == instance)
            .is_some()
        {
            tracing::info!(session_id = %id, "Session removed");
            self.emit(SessionEvent::Removed {
                session_id: id.to_string(),
            });
        }
    }
}
