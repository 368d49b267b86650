//! Background tasks attached to a session's child process
//!
//! Every task captures a weak registry handle plus `(id, instance)` and goes
//! through the registry for each mutation. If the registry is gone or the record
//! was replaced, the task's effect is silently dropped.

use std::sync::Weak;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::ChildStdin;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::registry::RegistryInner;
use crate::process::{OUTPUT_DRAIN_TIMEOUT, READ_CHUNK_SIZE, Termination, WrappedChild};
use crate::types::LogStream;

/// Run `action` against the registry after `delay`, if it still exists
pub(super) fn schedule<F>(registry: Weak<RegistryInner>, delay: Duration, action: F)
where
    F: FnOnce(&RegistryInner) + Send + 'static,
{
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if let Some(inner) = registry.upgrade() {
            action(&inner);
        }
    });
}

/// Forward every chunk read from `reader` into the session's log buffer
pub(super) async fn pump_output<R>(
    registry: Weak<RegistryInner>,
    id: String,
    instance: Uuid,
    stream: LogStream,
    mut reader: R,
) where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                let Some(inner) = registry.upgrade() else {
                    break;
                };
                inner.record_output(&id, instance, stream, &chunk[..n]);
            }
            Err(e) => {
                tracing::debug!(session_id = %id, ?stream, "Output read failed: {}", e);
                break;
            }
        }
    }
    tracing::trace!(session_id = %id, ?stream, "Output stream closed");
}

/// Write queued input lines to the child's stdin until the queue closes
pub(super) async fn feed_input(
    id: String,
    mut stdin: ChildStdin,
    mut lines: UnboundedReceiver<String>,
) {
    while let Some(line) = lines.recv().await {
        let written = match stdin.write_all(line.as_bytes()).await {
            Ok(()) => stdin.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            tracing::warn!(session_id = %id, "Failed to write session input: {}", e);
            break;
        }
    }
}

/// Own the child until it exits, delivering termination requests meanwhile
///
/// Output readers are drained (bounded by [`OUTPUT_DRAIN_TIMEOUT`]) before the
/// exit is recorded, so the exit entry is the last one in the buffer.
pub(super) async fn watch_process(
    registry: Weak<RegistryInner>,
    id: String,
    instance: Uuid,
    mut child: WrappedChild,
    mut control: UnboundedReceiver<Termination>,
    mut readers: Vec<JoinHandle<()>>,
) {
    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            Some(request) = control.recv() => {
                tracing::debug!(
                    session_id = %id,
                    pid = child.id(),
                    ?request,
                    "Delivering termination request"
                );
                if let Err(e) = child.terminate(request) {
                    tracing::debug!(session_id = %id, "Termination request failed: {}", e);
                }
            }
        }
    };

    let drain = futures::future::join_all(readers.iter_mut());
    if tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, drain).await.is_err() {
        tracing::debug!(session_id = %id, "Output pipes still open after exit");
        for reader in &readers {
            reader.abort();
        }
    }

    let Some(inner) = registry.upgrade() else {
        return;
    };
    match status {
        Ok(status) => inner.handle_exit(&id, instance, &status),
        Err(e) => inner.handle_process_error(&id, instance, &e.to_string()),
    }
}
