//! Public types for the process supervisor
//!
//! This module contains all the shared types used across the crate.

mod command;
pub mod config;
mod error;
mod session;

pub use command::{ExecuteOptions, ExecuteResult};
pub use config::SupervisorConfig;
pub use error::{ErrorCode, Result, SupervisorError};
pub use session::{
    LogEntry, LogLevel, LogStream, SessionInfo, SessionOutput, SessionStatus,
    SessionStatusReport, SessionSummary,
};
