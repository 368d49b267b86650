//! Child process spawning
//!
//! Both the one-shot executor and the session registry spawn through
//! [`spawn_child`]: no shell, piped stdio, an explicit environment, and a fresh
//! process group that is killed if the handle is dropped.

use std::collections::HashMap;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use process_wrap::tokio::{CommandWrap, KillOnDrop};
#[cfg(unix)]
use process_wrap::tokio::ProcessGroup;
#[cfg(windows)]
use process_wrap::tokio::JobObject;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::types::{Result, SupervisorError};

mod wrapped_child;

pub use wrapped_child::WrappedChild;

/// Size of a single read from a child's stdout or stderr
pub(crate) const READ_CHUNK_SIZE: usize = 8192;

/// How long to keep draining pipes after the process itself has exited
///
/// A detached grandchild can hold a pipe open indefinitely.
pub(crate) const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Termination request delivered to a child's process group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// SIGTERM: ask the process to shut down
    Graceful,
    /// SIGKILL: stop it now
    Forced,
}

/// Spawn `command` without a shell
///
/// `command[0]` is the program. The child gets exactly `env` as its environment
/// (callers build it with [`crate::command::build_env`]).
pub fn spawn_child(
    command: &[String],
    working_directory: Option<&Path>,
    env: &HashMap<String, String>,
) -> Result<WrappedChild> {
    let (program, args) = command
        .split_first()
        .filter(|(program, _)| !program.is_empty())
        .ok_or(SupervisorError::EmptyCommand)?;

    let mut wrap = CommandWrap::with_new(program, |cmd| {
        cmd.args(args)
            .env_clear()
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = working_directory {
            cmd.current_dir(dir);
        }
    });

    #[cfg(unix)]
    wrap.wrap(ProcessGroup::leader());
    #[cfg(windows)]
    wrap.wrap(JobObject);
    wrap.wrap(KillOnDrop);

    let child = wrap
        .spawn()
        .map_err(|e| SupervisorError::spawn_failed(format!("{program}: {e}")))?;

    Ok(WrappedChild::new(child))
}

/// Read a pipe to EOF, appending into a shared buffer as data arrives
///
/// The buffer is shared so the caller can still collect partial output if it
/// gives up waiting for EOF.
pub(crate) async fn read_into<R>(mut reader: R, buffer: Arc<Mutex<Vec<u8>>>)
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                if let Ok(mut buf) = buffer.lock() {
                    buf.extend_from_slice(&chunk[..n]);
                }
            }
            Err(e) => {
                tracing::debug!("Pipe read failed: {}", e);
                break;
            }
        }
    }
}

/// Exit code of a normally-exited process
pub fn exit_code(status: &ExitStatus) -> Option<i32> {
    status.code()
}

/// Signal that terminated the process, if any
#[cfg(unix)]
pub fn exit_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

/// Signal that terminated the process, if any
#[cfg(not(unix))]
pub fn exit_signal(_status: &ExitStatus) -> Option<i32> {
    None
}

/// Human-readable description of how a process ended
pub fn describe_exit(status: &ExitStatus) -> String {
    match (exit_code(status), exit_signal(status)) {
        (Some(code), _) => format!("Process exited with code {code}"),
        (None, Some(signal)) => format!("Process terminated by signal {signal}"),
        (None, None) => "Process exited".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spawn_empty_command() {
        let result = spawn_child(&[], None, &HashMap::new());
        assert!(matches!(result, Err(SupervisorError::EmptyCommand)));

        let result = spawn_child(&[String::new()], None, &HashMap::new());
        assert!(matches!(result, Err(SupervisorError::EmptyCommand)));
    }

    #[tokio::test]
    async fn test_spawn_missing_program() {
        let command = vec!["expo-supervisor-no-such-binary".to_string()];
        let err = spawn_child(&command, None, &HashMap::new()).unwrap_err();
        assert!(matches!(err, SupervisorError::ProcessSpawn(_)));
        assert!(err.to_string().contains("expo-supervisor-no-such-binary"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_spawn_and_describe_exit() {
        let env = crate::command::build_env(&HashMap::new());
        let command = vec!["true".to_string()];
        let mut child = spawn_child(&command, None, &env).unwrap();
        assert!(child.id() > 0);

        let status = child.wait().await.unwrap();
        assert_eq!(exit_code(&status), Some(0));
        assert_eq!(describe_exit(&status), "Process exited with code 0");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_terminate_reports_signal() {
        let env = crate::command::build_env(&HashMap::new());
        let command = vec!["sleep".to_string(), "30".to_string()];
        let mut child = spawn_child(&command, None, &env).unwrap();

        child.terminate(Termination::Graceful).unwrap();
        let status = child.wait().await.unwrap();
        assert_eq!(exit_code(&status), None);
        assert_eq!(exit_signal(&status), Some(libc::SIGTERM));
        assert!(describe_exit(&status).contains("signal"));
    }
}
