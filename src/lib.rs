//! Expo process supervisor
//!
//! A supervision layer that drives the Expo dev-server CLI, the EAS build and
//! update CLI, and related device and package-manager tools on behalf of an
//! automated caller.
//!
//! ## Features
//!
//! - Long-lived sessions with input forwarding and bounded, classified logs
//! - Bounded one-shot commands with SIGTERM/SIGKILL escalation
//! - Argument sanitization, no shell in between
//! - Line-delimited JSON control protocol over stdio
//!
//! ## Quick Start
//!
//! ```no_run
//! use expo_supervisor::{ExecuteOptions, Executor, SessionOptions, SessionRegistry};
//!
//! #[tokio::main]
//! async fn main() -> expo_supervisor::Result<()> {
//!     let result = Executor::default()
//!         .execute(&["npx", "expo", "--version"], ExecuteOptions::default())
//!         .await;
//!     println!("expo {}", result.stdout.trim());
//!
//!     let registry = SessionRegistry::default();
//!     registry.start_session("metro", &["npx", "expo", "start"], SessionOptions::default())?;
//!     registry.send_input("metro", "r")?;
//!     registry.stop_session("metro")?;
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Variables
//!
//! Every child gets `FORCE_COLOR=1` and `EXPO_NO_TELEMETRY=1`; `EXPO_TOKEN` and
//! `EAS_TOKEN` are passed through when set.
//!
//! The supervisor itself reads:
//! - `EXPO_SUPERVISOR_MAX_LOG_BUFFER`: session log buffer size (default 1000)
//! - `EXPO_SUPERVISOR_LOG_TRIM_SIZE`: entries kept after trimming (default 500)
//! - `EXPO_SUPERVISOR_STARTUP_GRACE_MS`: delay before a session counts as running
//! - `EXPO_SUPERVISOR_DEFAULT_TIMEOUT_MS`: default one-shot timeout
//! - `RUST_LOG`: log filter, overrides `-v`/`-q`
//!
//! ## Configuration Loading Priority
//!
//! 1. **Environment Variables** - Override all other sources
//! 2. **Config file** - `--config FILE`, or `<config_dir>/expo-supervisor/config.json`
//! 3. **Defaults**
//!
//! ### Example config.json
//!
//! ```json
//! {
//!   "maxLogBuffer": 2000,
//!   "logTrimSize": 1000,
//!   "sessionKillDelayMs": 8000
//! }
//! ```

pub mod cli;
pub mod command;
pub mod output;
pub mod process;
pub mod runner;
pub mod server;
pub mod session;
pub mod tracing;
pub mod types;

pub use cli::Cli;
pub use command::{Executor, Platform, Tool};
pub use runner::run_with_cli;
pub use server::ServerContext;
pub use session::{SessionEvent, SessionOptions, SessionRegistry};
pub use tracing::shutdown_otel;
pub use types::{
    ExecuteOptions, ExecuteResult, LogEntry, LogLevel, Result, SessionStatus, SupervisorConfig,
    SupervisorError,
};
