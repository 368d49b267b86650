//! Expo supervisor binary
//!
//! Run with: cargo run
//!
//! For help: cargo run -- --help

use std::io::IsTerminal;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use expo_supervisor::{cli::Cli, run_with_cli, shutdown_otel};
use tokio::signal;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(async {
        let result = run_until_signal(&cli).await;
        // Flush pending spans
        shutdown_otel();
        result
    });

    // Dropping the remaining tasks drops their children, which kills each
    // child's process group
    runtime.shutdown_timeout(Duration::from_secs(1));

    match result {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            // stdout belongs to the control protocol
            eprintln!("Error: {e}");

            if std::io::stdin().is_terminal() {
                eprintln!("\nFor debugging, run with --diagnostic to log to a file.");
                eprintln!("Or use -v/-vv/-vvv for more verbose logging.");
            }

            ExitCode::FAILURE
        }
    }
}

/// Run the CLI with graceful shutdown on SIGTERM/SIGINT
async fn run_until_signal(cli: &Cli) -> anyhow::Result<i32> {
    tokio::select! {
        result = run_with_cli(cli) => result,
        _ = signal::ctrl_c() => {
            eprintln!("Received SIGINT, shutting down...");
            Ok(130)
        }
        () = sigterm() => {
            eprintln!("Received SIGTERM, shutting down...");
            Ok(143)
        }
    }
}

#[cfg(unix)]
async fn sigterm() {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(_) => std::future::pending::<()>().await,
    }
}

#[cfg(not(unix))]
async fn sigterm() {
    std::future::pending::<()>().await;
}
