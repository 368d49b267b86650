//! Argument sanitization
//!
//! Child processes are always spawned without a shell, which is the real defense
//! against injection. Stripping the characters a shell would use to chain or
//! redirect commands is a second layer: `start;rm -rf /` becomes `startrm -rf /`,
//! a single harmless argument.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Characters that let a shell chain, pipe, substitute or redirect commands
const SHELL_METACHARACTERS: &[char] = &[';', '|', '&', '`', '(', ')', '<', '>', '$', '\r', '\n'];

static PACKAGE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(@[A-Za-z0-9][A-Za-z0-9._-]*/)?[A-Za-z0-9][A-Za-z0-9._/-]*$")
        .expect("valid package name regex")
});

/// Check if a string contains any shell metacharacter
///
/// # Examples
///
/// ```
/// use expo_supervisor::command::contains_shell_metacharacter;
///
/// assert!(contains_shell_metacharacter("ls && rm -rf /"));
/// assert!(contains_shell_metacharacter("$(whoami)"));
/// assert!(!contains_shell_metacharacter("expo start --clear"));
/// ```
pub fn contains_shell_metacharacter(text: &str) -> bool {
    text.contains(SHELL_METACHARACTERS)
}

/// Strip shell metacharacters from a single string
pub fn sanitize_text(text: &str) -> String {
    text.chars()
        .filter(|c| !SHELL_METACHARACTERS.contains(c))
        .collect()
}

/// Strip shell metacharacters from every token of a command
///
/// Tokens are kept even if they end up empty so argument positions stay stable.
pub fn sanitize_command<S: AsRef<str>>(tokens: &[S]) -> Vec<String> {
    tokens.iter().map(|t| sanitize_text(t.as_ref())).collect()
}

/// Check a token against the package identifier allow-list
///
/// Accepts letters, digits, `-`, `_`, `.`, `/` and an optional leading `@scope/`.
pub fn validate_package_name(name: &str) -> bool {
    PACKAGE_NAME.is_match(name)
}

/// Package names partitioned by [`validate_package_name`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageNames {
    pub valid: Vec<String>,
    pub invalid: Vec<String>,
}

/// Partition names into valid and invalid, preserving input order in each
pub fn sanitize_package_names<S: AsRef<str>>(names: &[S]) -> PackageNames {
    let (valid, invalid) = names
        .iter()
        .map(|name| name.as_ref().to_string())
        .partition(|name| validate_package_name(name));
    PackageNames { valid, invalid }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_strips_characters_not_phrases() {
        let sanitized = sanitize_command(&["start;rm -rf /"]);
        assert_eq!(sanitized.len(), 1);
        assert!(!sanitized[0].contains(';'));
        assert!(sanitized[0].contains("rm -rf"));
        assert_eq!(sanitized[0], "startrm -rf /");
    }

    #[test]
    fn test_strips_every_metacharacter() {
        let sanitized = sanitize_text("a;b|c&d`e(f)g<h>i$j\r\nk");
        assert_eq!(sanitized, "abcdefghijk");
        assert!(!contains_shell_metacharacter(&sanitized));
    }

    #[test]
    fn test_preserves_ordinary_arguments() {
        let tokens = ["npx", "expo", "start", "--port=8081", "--clear", "-c", "hello world"];
        assert_eq!(sanitize_command(&tokens), tokens.map(String::from).to_vec());
    }

    #[test]
    fn test_metacharacter_detection() {
        assert!(contains_shell_metacharacter("echo a; echo b"));
        assert!(contains_shell_metacharacter("cat file | grep secret"));
        assert!(contains_shell_metacharacter("echo `whoami`"));
        assert!(contains_shell_metacharacter("echo a\necho b"));
        assert!(!contains_shell_metacharacter("eas build --platform ios"));
    }

    #[test]
    fn test_validate_package_name() {
        assert!(validate_package_name("@scope/pkg-name_1"));
        assert!(validate_package_name("react-native"));
        assert!(validate_package_name("lodash.debounce"));
        assert!(validate_package_name("@react-navigation/native"));

        assert!(!validate_package_name("bad;pkg"));
        assert!(!validate_package_name(""));
        assert!(!validate_package_name("@"));
        assert!(!validate_package_name("pkg name"));
        assert!(!validate_package_name("$(whoami)"));
        assert!(!validate_package_name("-rf"));
    }

    #[test]
    fn test_package_name_must_start_alphanumeric() {
        assert!(!validate_package_name("_foo"));
        assert!(!validate_package_name(".hidden"));
        assert!(!validate_package_name("@_scope/pkg"));
        assert!(validate_package_name("foo_"));
    }

    #[test]
    fn test_sanitize_package_names_preserves_order() {
        let result =
            sanitize_package_names(&["expo-av", "bad;pkg", "@expo/vector-icons", "&x", "zod"]);
        assert_eq!(result.valid, vec!["expo-av", "@expo/vector-icons", "zod"]);
        assert_eq!(result.invalid, vec!["bad;pkg", "&x"]);
    }
}
