//! Wrapped child process with process group support
//!
//! Provides a unified interface over process-wrap's ChildWrapper. Signals are
//! delivered to the whole process group so that grandchildren (node processes
//! started through `npx`, bundler workers) go down with the direct child.

use std::io;
use std::pin::Pin;
use std::process::ExitStatus;

use process_wrap::tokio::ChildWrapper;
use tokio::process::{ChildStderr, ChildStdin, ChildStdout};

use super::Termination;

/// Wrapper around Box<dyn ChildWrapper> owned by exactly one supervising task
#[derive(Debug)]
pub struct WrappedChild {
    inner: Box<dyn ChildWrapper>,
}

impl WrappedChild {
    /// Create a new wrapped child from a process-wrap ChildWrapper
    pub fn new(inner: Box<dyn ChildWrapper>) -> Self {
        Self { inner }
    }

    /// Get the process ID (0 once the process has been reaped)
    pub fn id(&self) -> u32 {
        self.inner.id().unwrap_or(0)
    }

    /// Take the stdin pipe, if it was requested and not taken yet
    pub fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.inner.stdin().take()
    }

    /// Take the stdout pipe
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.inner.stdout().take()
    }

    /// Take the stderr pipe
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.inner.stderr().take()
    }

    /// Wait for the process to exit
    pub async fn wait(&mut self) -> io::Result<ExitStatus> {
        Pin::from(self.inner.wait()).await
    }

    /// Deliver a termination request to the process group
    ///
    /// On Unix this sends SIGTERM or SIGKILL. Elsewhere both requests kill the
    /// process immediately.
    pub fn terminate(&mut self, how: Termination) -> io::Result<()> {
        #[cfg(unix)]
        {
            let signal = match how {
                Termination::Graceful => libc::SIGTERM,
                Termination::Forced => libc::SIGKILL,
            };
            self.inner.signal(signal)
        }

        #[cfg(not(unix))]
        {
            match how {
                Termination::Graceful | Termination::Forced => self.inner.start_kill(),
            }
        }
    }
}
