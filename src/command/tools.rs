//! Wrappers for the Expo and EAS command-line tools
//!
//! Everything here is a thin layer over [`Executor::execute`]: the wrappers only
//! choose the program prefix, the arguments, and the deadline.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::executor::Executor;
use super::sanitize::{sanitize_package_names, sanitize_text};
use crate::types::config::{CLOUD_BUILD_TIMEOUT, LOCAL_BUILD_TIMEOUT, PROBE_TIMEOUT};
use crate::types::{ExecuteOptions, ExecuteResult, SupervisorError};

/// Program prefix for the Expo dev-server CLI
pub const EXPO_CLI: [&str; 2] = ["npx", "expo"];
/// Program prefix for the EAS cloud build/update CLI
pub const EAS_CLI: [&str; 1] = ["eas"];

static VERSION_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+\.\d+\.\d+[0-9A-Za-z.+-]*").expect("valid version regex"));

/// External tools that can be probed for availability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    Expo,
    Eas,
    Adb,
    Npm,
    Yarn,
    Xcrun,
}

impl Tool {
    /// Every known tool, in probe order
    pub const ALL: [Tool; 6] = [
        Tool::Expo,
        Tool::Eas,
        Tool::Adb,
        Tool::Npm,
        Tool::Yarn,
        Tool::Xcrun,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expo => "expo",
            Self::Eas => "eas",
            Self::Adb => "adb",
            Self::Npm => "npm",
            Self::Yarn => "yarn",
            Self::Xcrun => "xcrun",
        }
    }

    /// Command that prints the tool's version
    pub fn version_command(&self) -> Vec<&'static str> {
        match self {
            Self::Expo => vec!["npx", "expo", "--version"],
            Self::Eas => vec!["eas", "--version"],
            Self::Adb => vec!["adb", "version"],
            Self::Npm => vec!["npm", "--version"],
            Self::Yarn => vec!["yarn", "--version"],
            Self::Xcrun => vec!["xcrun", "--version"],
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tool {
    type Err = SupervisorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tool::ALL
            .into_iter()
            .find(|tool| tool.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| SupervisorError::config_error(format!("unknown tool: {s}")))
    }
}

/// Native build target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Android,
    Ios,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Android => "android",
            Self::Ios => "ios",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extract a version number from probe output
///
/// Tools print their version in different shapes (`0.24.13`,
/// `eas-cli/16.3.0 darwin-arm64 node-v20`, `Android Debug Bridge version 1.0.41`).
/// The first dotted triple wins; otherwise the whole first line is returned.
pub fn parse_version(output: &str) -> Option<String> {
    let line = output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())?;
    Some(
        VERSION_NUMBER
            .find(line)
            .map_or(line, |m| m.as_str())
            .to_string(),
    )
}

fn with_prefix(prefix: &[&str], args: &[String]) -> Vec<String> {
    prefix
        .iter()
        .map(|s| (*s).to_string())
        .chain(args.iter().cloned())
        .collect()
}

fn with_default_timeout(
    mut options: ExecuteOptions,
    timeout: std::time::Duration,
) -> ExecuteOptions {
    if options.timeout_ms.is_none() {
        options = options.with_timeout(timeout);
    }
    options
}

impl Executor {
    /// Run `npx expo <args>`
    pub async fn expo(&self, args: &[String], options: ExecuteOptions) -> ExecuteResult {
        self.execute(&with_prefix(&EXPO_CLI, args), options).await
    }

    /// Run `eas <args>`
    pub async fn eas(&self, args: &[String], options: ExecuteOptions) -> ExecuteResult {
        self.execute(&with_prefix(&EAS_CLI, args), options).await
    }

    /// Whether `tool` can be run on this machine
    pub async fn check_installed(&self, tool: Tool) -> bool {
        self.probe(tool).await.success
    }

    /// Version reported by `tool`, if it runs successfully
    pub async fn get_version(&self, tool: Tool) -> Option<String> {
        let result = self.probe(tool).await;
        if result.success {
            parse_version(&result.stdout)
        } else {
            None
        }
    }

    async fn probe(&self, tool: Tool) -> ExecuteResult {
        let options = ExecuteOptions::new().with_timeout(PROBE_TIMEOUT);
        let result = self.execute(&tool.version_command(), options).await;
        tracing::debug!(tool = %tool, success = result.success, "Probed tool");
        result
    }

    /// Build and run the native app locally (`npx expo run:<platform>`)
    pub async fn run_local_build(
        &self,
        platform: Platform,
        options: ExecuteOptions,
    ) -> ExecuteResult {
        let args = vec![format!("run:{platform}")];
        self.expo(&args, with_default_timeout(options, LOCAL_BUILD_TIMEOUT))
            .await
    }

    /// Start a cloud build (`eas build`)
    pub async fn eas_build(
        &self,
        platform: Platform,
        profile: &str,
        options: ExecuteOptions,
    ) -> ExecuteResult {
        let args = vec![
            "build".to_string(),
            "--platform".to_string(),
            platform.to_string(),
            "--profile".to_string(),
            sanitize_text(profile),
            "--non-interactive".to_string(),
        ];
        self.eas(&args, with_default_timeout(options, CLOUD_BUILD_TIMEOUT))
            .await
    }

    /// Publish an over-the-air update (`eas update`)
    ///
    /// `rollout_percentage` is accepted but not forwarded; `eas update` is
    /// always published to the whole branch.
    pub async fn publish_update(
        &self,
        branch: &str,
        message: &str,
        rollout_percentage: Option<u8>,
        options: ExecuteOptions,
    ) -> ExecuteResult {
        if let Some(percentage) = rollout_percentage {
            tracing::warn!(
                rollout_percentage = percentage,
                branch,
                "Rollout percentage is not supported by this update command and will be ignored"
            );
        }

        let args = vec![
            "update".to_string(),
            "--branch".to_string(),
            sanitize_text(branch),
            "--message".to_string(),
            sanitize_text(message),
            "--non-interactive".to_string(),
        ];
        self.eas(&args, with_default_timeout(options, CLOUD_BUILD_TIMEOUT))
            .await
    }

    /// Install packages with version resolution (`npx expo install`)
    ///
    /// Nothing is spawned if any name fails validation.
    pub async fn install_packages<S: AsRef<str>>(
        &self,
        names: &[S],
        options: ExecuteOptions,
    ) -> ExecuteResult {
        let packages = sanitize_package_names(names);
        if !packages.invalid.is_empty() {
            tracing::warn!(
                invalid = ?packages.invalid,
                "Refusing to install invalid package names"
            );
            return ExecuteResult::spawn_failure(
                SupervisorError::InvalidPackageNames(packages.invalid).to_string(),
            );
        }
        if packages.valid.is_empty() {
            return ExecuteResult::spawn_failure("No packages to install");
        }

        let mut args = vec!["install".to_string()];
        args.extend(packages.valid);
        self.expo(&args, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_version_shapes() {
        assert_eq!(parse_version("0.24.13\n"), Some("0.24.13".to_string()));
        assert_eq!(
            parse_version("eas-cli/16.3.0 darwin-arm64 node-v20.11.0\n"),
            Some("16.3.0".to_string())
        );
        assert_eq!(
            parse_version("Android Debug Bridge version 1.0.41\nVersion 35.0.2\n"),
            Some("1.0.41".to_string())
        );
        assert_eq!(
            parse_version("\nxcrun version 70.\n"),
            Some("xcrun version 70.".to_string())
        );
        assert_eq!(parse_version("  \n"), None);
    }

    #[test]
    fn test_tool_from_str() {
        assert_eq!("EAS".parse::<Tool>().unwrap(), Tool::Eas);
        assert_eq!("adb".parse::<Tool>().unwrap(), Tool::Adb);
        assert!("gradle".parse::<Tool>().is_err());
    }

    #[test]
    fn test_version_commands() {
        assert_eq!(Tool::Expo.version_command(), vec!["npx", "expo", "--version"]);
        assert_eq!(Tool::Adb.version_command(), vec!["adb", "version"]);
    }

    #[test]
    fn test_with_prefix() {
        let args = vec!["start".to_string(), "--clear".to_string()];
        assert_eq!(
            with_prefix(&EXPO_CLI, &args),
            vec!["npx", "expo", "start", "--clear"]
        );
    }

    #[test]
    fn test_default_timeout_not_overridden() {
        let options = ExecuteOptions {
            timeout_ms: Some(5),
            ..Default::default()
        };
        let options = with_default_timeout(options, LOCAL_BUILD_TIMEOUT);
        assert_eq!(options.timeout_ms, Some(5));

        let options = with_default_timeout(ExecuteOptions::new(), LOCAL_BUILD_TIMEOUT);
        assert_eq!(options.timeout_ms, Some(600_000));
    }

    #[tokio::test]
    async fn test_install_rejects_invalid_names_without_spawning() {
        let executor = Executor::default();
        let result = executor
            .install_packages(&["expo-av", "bad;pkg"], ExecuteOptions::new())
            .await;

        assert!(!result.success);
        assert_eq!(result.exit_code, None);
        assert_eq!(
            result.error.as_deref(),
            Some("Invalid package names: bad;pkg")
        );
    }

    #[tokio::test]
    async fn test_install_requires_packages() {
        let executor = Executor::default();
        let empty: [&str; 0] = [];
        let result = executor.install_packages(&empty, ExecuteOptions::new()).await;
        assert_eq!(result.error.as_deref(), Some("No packages to install"));
    }

    #[tokio::test]
    async fn test_missing_tool_is_not_installed() {
        // Probing goes through the same executor; a bogus PATH guarantees failure
        let executor = Executor::default();
        let result = executor
            .execute(
                &Tool::Eas.version_command(),
                ExecuteOptions::new()
                    .with_env("PATH", "/expo-supervisor-empty-path")
                    .with_timeout(PROBE_TIMEOUT),
            )
            .await;
        assert!(!result.success);
    }
}
