//! Severity classification for process output
//!
//! A chunk of text is matched against a few ordered pattern sets; the first set
//! that matches decides the level. ANSI color sequences are stripped before
//! matching since child processes run with `FORCE_COLOR=1`.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::LogLevel;

static ANSI_ESCAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]").expect("valid ANSI regex"));

static ERROR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\berror\b|(?-i:[A-Z][A-Za-z]*Error\b)|\bERR!|\bfailed\b|\bfailure\b|\bexception\b|\bfatal\b|\bpanic\b|✖|❌|unable to resolve",
    )
    .expect("valid error regex")
});

static WARN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bwarn(ing)?\b|\bdeprecated\b|⚠").expect("valid warn regex")
});

static DEBUG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bdebug\b|\bverbose\b|\btrace\b").expect("valid debug regex"));

/// Remove ANSI escape sequences from `text`
pub fn strip_ansi(text: &str) -> Cow<'_, str> {
    ANSI_ESCAPE.replace_all(text, "")
}

/// Label a chunk of output with a severity level
///
/// Precedence is error, then warn, then debug; anything else is info.
pub fn classify(text: &str) -> LogLevel {
    let plain = strip_ansi(text);

    if ERROR_PATTERN.is_match(&plain) {
        LogLevel::Error
    } else if WARN_PATTERN.is_match(&plain) {
        LogLevel::Warn
    } else if DEBUG_PATTERN.is_match(&plain) {
        LogLevel::Debug
    } else {
        LogLevel::Info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_lines() {
        assert_eq!(classify("ERROR: build failed"), LogLevel::Error);
        assert_eq!(classify("npm ERR! code ENOENT"), LogLevel::Error);
        assert_eq!(classify("Unable to resolve module ./App"), LogLevel::Error);
        assert_eq!(classify("✖ Build failed"), LogLevel::Error);
        assert_eq!(classify("TypeError: undefined is not a function"), LogLevel::Error);
    }

    #[test]
    fn test_warn_lines() {
        assert_eq!(classify("WARNING: deprecated"), LogLevel::Warn);
        assert_eq!(classify("warn Package expo-av is deprecated"), LogLevel::Warn);
        assert_eq!(classify("⚠️ Some dependencies are incompatible"), LogLevel::Warn);
    }

    #[test]
    fn test_error_beats_warn() {
        assert_eq!(
            classify("warning: treating this as an error"),
            LogLevel::Error
        );
    }

    #[test]
    fn test_debug_and_info() {
        assert_eq!(classify("[debug] resolver cache hit"), LogLevel::Debug);
        assert_eq!(classify("Metro waiting on exp://192.168.1.2:8081"), LogLevel::Info);
        assert_eq!(classify(""), LogLevel::Info);
    }

    #[test]
    fn test_word_boundaries() {
        // "error" inside a longer word or path segment is not an error
        assert_eq!(classify("Watching src/terrorform"), LogLevel::Info);
        assert_eq!(classify("Bundling src/errors/index.ts"), LogLevel::Info);
        assert_eq!(classify("0 warnings emitted? no, forewarned"), LogLevel::Info);
    }

    #[test]
    fn test_ansi_is_stripped() {
        assert_eq!(strip_ansi("\x1b[31mred\x1b[0m"), "red");
        assert_eq!(classify("\x1b[33mWARNING\x1b[0m: slow bundler"), LogLevel::Warn);
    }
}
