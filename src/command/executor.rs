//! One-shot command execution
//!
//! [`Executor::execute`] never fails: spawn errors, runtime errors and timeouts
//! are all folded into the returned [`ExecuteResult`].

use std::io;
use std::process::ExitStatus;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;

use super::{build_env, sanitize_command};
use crate::process::{self, OUTPUT_DRAIN_TIMEOUT, Termination, WrappedChild};
use crate::types::{ExecuteOptions, ExecuteResult, SupervisorConfig, SupervisorError};

/// Runs bounded commands
#[derive(Debug, Clone)]
pub struct Executor {
    default_timeout: Duration,
    kill_delay: Duration,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new(&SupervisorConfig::default())
    }
}

impl Executor {
    /// Create an executor using the timeouts from `config`
    pub fn new(config: &SupervisorConfig) -> Self {
        Self {
            default_timeout: config.default_timeout(),
            kill_delay: config.execute_kill_delay(),
        }
    }

    /// Default deadline applied when options do not name one
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Run `command` to completion or until its deadline
    ///
    /// On timeout the process group receives SIGTERM, then SIGKILL after the
    /// kill delay. A timed-out command is always reported as a failure with no
    /// exit code, even if it managed to exit cleanly after the signal.
    pub async fn execute<S: AsRef<str>>(
        &self,
        command: &[S],
        options: ExecuteOptions,
    ) -> ExecuteResult {
        let started = Instant::now();
        let command = sanitize_command(command);
        let timeout = options
            .timeout_ms
            .map_or(self.default_timeout, Duration::from_millis);

        tracing::debug!(
            command = ?command,
            cwd = ?options.working_directory,
            timeout_ms = timeout.as_millis(),
            "Executing command"
        );

        let env = build_env(&options.env);
        let mut child =
            match process::spawn_child(&command, options.working_directory.as_deref(), &env) {
                Ok(child) => child,
                Err(e) => {
                    tracing::warn!(command = ?command, error = %e, "Command failed to spawn");
                    let mut result = ExecuteResult::spawn_failure(e.to_string());
                    result.duration_ms = elapsed_ms(started);
                    return result;
                }
            };

        let stdout = Arc::new(Mutex::new(Vec::new()));
        let stderr = Arc::new(Mutex::new(Vec::new()));
        let mut readers: Vec<JoinHandle<()>> = Vec::with_capacity(2);
        if let Some(pipe) = child.take_stdout() {
            readers.push(tokio::spawn(process::read_into(pipe, Arc::clone(&stdout))));
        }
        if let Some(pipe) = child.take_stderr() {
            readers.push(tokio::spawn(process::read_into(pipe, Arc::clone(&stderr))));
        }

        // One-shot write; dropping the handle closes stdin
        if let Some(mut stdin) = child.take_stdin() {
            if let Some(payload) = options.stdin {
                tokio::spawn(async move {
                    if let Err(e) = stdin.write_all(payload.as_bytes()).await {
                        tracing::debug!("Failed to write stdin payload: {}", e);
                    }
                    drop(stdin.shutdown().await);
                });
            }
        }

        let (status, timed_out) = wait_bounded(&mut child, timeout, self.kill_delay).await;

        let drain = futures::future::join_all(readers.iter_mut());
        if tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, drain).await.is_err() {
            tracing::debug!("Output pipes still open after exit, collecting partial output");
            for reader in &readers {
                reader.abort();
            }
        }

        let mut result = ExecuteResult {
            stdout: take_text(&stdout),
            stderr: take_text(&stderr),
            timed_out,
            duration_ms: elapsed_ms(started),
            ..Default::default()
        };

        match status {
            _ if timed_out => {
                #[allow(clippy::cast_possible_truncation)]
                let ms = timeout.as_millis() as u64;
                result.error = Some(SupervisorError::CommandTimeout(ms).to_string());
            }
            Ok(status) => {
                result.exit_code = process::exit_code(&status);
                result.success = result.exit_code == Some(0);
                result.error = failure_message(&status);
            }
            Err(e) => {
                result.error = Some(SupervisorError::ProcessRuntime(e.to_string()).to_string());
            }
        }

        tracing::debug!(
            command = ?command,
            success = result.success,
            exit_code = ?result.exit_code,
            timed_out = result.timed_out,
            duration_ms = result.duration_ms,
            "Command finished"
        );

        result
    }
}

/// Wait for exit, escalating SIGTERM then SIGKILL once `timeout` elapses
///
/// A zero timeout waits forever. Returns the wait outcome and whether the
/// deadline was hit.
async fn wait_bounded(
    child: &mut WrappedChild,
    timeout: Duration,
    kill_delay: Duration,
) -> (io::Result<ExitStatus>, bool) {
    if timeout.is_zero() {
        return (child.wait().await, false);
    }

    tokio::select! {
        status = child.wait() => return (status, false),
        () = tokio::time::sleep(timeout) => {}
    }

    tracing::warn!(
        pid = child.id(),
        timeout_ms = timeout.as_millis(),
        "Command timed out, sending SIGTERM"
    );
    if let Err(e) = child.terminate(Termination::Graceful) {
        tracing::debug!("SIGTERM delivery failed: {}", e);
    }

    tokio::select! {
        status = child.wait() => return (status, true),
        () = tokio::time::sleep(kill_delay) => {}
    }

    tracing::warn!(pid = child.id(), "Command ignored SIGTERM, sending SIGKILL");
    if let Err(e) = child.terminate(Termination::Forced) {
        tracing::debug!("SIGKILL delivery failed: {}", e);
    }
    (child.wait().await, true)
}

fn failure_message(status: &ExitStatus) -> Option<String> {
    match process::exit_code(status) {
        Some(0) => None,
        Some(code) => Some(format!("Command failed with exit code {code}")),
        None => Some(process::describe_exit(status)),
    }
}

fn take_text(buffer: &Mutex<Vec<u8>>) -> String {
    buffer
        .lock()
        .map(|buf| String::from_utf8_lossy(&buf).into_owned())
        .unwrap_or_default()
}

#[allow(clippy::cast_possible_truncation)]
fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// Run `command` with a default-configured [`Executor`]
pub async fn execute<S: AsRef<str>>(command: &[S], options: ExecuteOptions) -> ExecuteResult {
    Executor::default().execute(command, options).await
}
