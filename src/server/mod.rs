//! Line-delimited JSON control server
//!
//! Reads one request per line from the input stream and writes responses and
//! session events, one JSON object per line, to the output stream. Requests are
//! handled concurrently, so a long build does not hold up session control.
//! End of input stops every session and ends the server.

mod handlers;
mod protocol;

use std::io;
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;

pub use handlers::{ServerContext, dispatch, handle_line};
pub use protocol::{Request, RequestEnvelope, Response, parse_request};

use crate::session::SessionEvent;
use crate::types::SupervisorError;

/// Maximum accepted request line length (1 MB)
const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// How long in-flight requests may finish after input closes
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Serve the control protocol over the process's stdin and stdout
pub async fn run_stdio(ctx: ServerContext) -> io::Result<()> {
    serve(tokio::io::stdin(), tokio::io::stdout(), ctx).await
}

/// Serve the control protocol until `input` reaches EOF
pub async fn serve<R, W>(input: R, output: W, ctx: ServerContext) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (out_tx, out_rx) = mpsc::unbounded_channel::<String>();
    let writer = tokio::spawn(write_lines(output, out_rx));
    let forwarder = tokio::spawn(forward_events(ctx.registry.subscribe(), out_tx.clone()));

    let mut requests = JoinSet::new();
    let mut lines = BufReader::new(input).lines();
    let mut read_error = None;

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if line.len() > MAX_LINE_LENGTH {
                        let error =
                            SupervisorError::InvalidRequest("request line too large".to_string());
                        drop(out_tx.send(Response::error(Value::Null, &error).to_line()));
                        continue;
                    }
                    let ctx = ctx.clone();
                    let out_tx = out_tx.clone();
                    requests.spawn(async move {
                        if let Some(response) = handle_line(&ctx, &line).await {
                            drop(out_tx.send(response.to_line()));
                        }
                    });
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("Failed to read request: {}", e);
                    read_error = Some(e);
                    break;
                }
            },
            Some(joined) = requests.join_next() => {
                if let Err(e) = joined {
                    if e.is_panic() {
                        tracing::error!("Request handler panicked: {}", e);
                    }
                }
            }
        }
    }

    let drain = async { while requests.join_next().await.is_some() {} };
    if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
        tracing::debug!(in_flight = requests.len(), "Abandoning in-flight requests");
    }

    tracing::info!(
        sessions = ctx.registry.session_count(),
        "Input closed, stopping all sessions"
    );
    ctx.registry.stop_all_sessions();
    requests.shutdown().await;
    forwarder.abort();
    drop(out_tx);

    if let Err(e) = writer.await {
        tracing::warn!("Output writer ended abnormally: {}", e);
    }

    match read_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Write queued lines to `output` until every sender is gone
async fn write_lines<W>(mut output: W, mut lines: mpsc::UnboundedReceiver<String>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(mut line) = lines.recv().await {
        line.push('\n');
        let written = match output.write_all(line.as_bytes()).await {
            Ok(()) => output.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            tracing::error!("Failed to write output line: {}", e);
            break;
        }
    }
}

/// Forward registry events as output lines
async fn forward_events(
    mut events: broadcast::Receiver<SessionEvent>,
    out: mpsc::UnboundedSender<String>,
) {
    loop {
        match events.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(line) => {
                    if out.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(event = event.name(), "Failed to encode event: {}", e);
                }
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event forwarder lagged, events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
