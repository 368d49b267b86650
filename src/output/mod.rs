//! Output classification and report formatting

mod classifier;
pub mod report;

pub use classifier::{classify, strip_ansi};
