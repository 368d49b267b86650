//! Bounded command execution
//!
//! This module handles:
//! - Argument sanitization and package name validation
//! - Child environment construction
//! - One-shot execution with timeout escalation
//! - Expo / EAS wrappers and tool probes

mod env;
mod executor;
mod sanitize;
mod tools;

pub use env::{build_env, build_env_from, forwarded_tokens};
pub use executor::{Executor, execute};
pub use sanitize::{
    PackageNames, contains_shell_metacharacter, sanitize_command, sanitize_package_names,
    sanitize_text, validate_package_name,
};
pub use tools::{EAS_CLI, EXPO_CLI, Platform, Tool, parse_version};
