//! Long-lived process sessions
//!
//! This module handles:
//! - Session lifecycle (start, stop, delayed removal)
//! - Output capture into bounded, classified log buffers
//! - Input forwarding to the child's stdin
//! - Lifecycle event broadcasting

mod events;
mod record;
mod registry;
mod supervisor;

pub use events::SessionEvent;
pub use registry::{SessionOptions, SessionRegistry};
