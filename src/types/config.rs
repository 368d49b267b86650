//! Supervisor configuration
//!
//! Defaults are the constants below. A JSON config file can override them, and
//! `EXPO_SUPERVISOR_*` environment variables override the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{Result, SupervisorError};

/// Default timeout for one-shot commands
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
/// Timeout for availability and version probes
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);
/// Timeout for local native builds (`expo run:<platform>`)
pub const LOCAL_BUILD_TIMEOUT: Duration = Duration::from_secs(10 * 60);
/// Timeout for cloud builds (`eas build`)
pub const CLOUD_BUILD_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Maximum number of log entries a session keeps
pub const MAX_LOG_BUFFER_SIZE: usize = 1000;
/// Number of most recent entries kept once the maximum is exceeded
pub const LOG_TRIM_SIZE: usize = 500;

/// Delay before a new session is promoted from `starting` to `running`
pub const STARTUP_GRACE: Duration = Duration::from_secs(2);
/// Delay between SIGTERM and SIGKILL for timed-out one-shot commands
pub const EXECUTE_KILL_DELAY: Duration = Duration::from_secs(2);
/// Delay between SIGTERM and SIGKILL for stopped sessions
pub const SESSION_KILL_DELAY: Duration = Duration::from_secs(5);
/// Delay between a stop and removal of the session from the registry
pub const SESSION_CLEANUP_DELAY: Duration = Duration::from_secs(6);

/// Environment variable forced on to keep CLI output colored
pub const FORCE_COLOR_VAR: &str = "FORCE_COLOR";
/// Environment variable that disables Expo telemetry
pub const TELEMETRY_DISABLE_VAR: &str = "EXPO_NO_TELEMETRY";
/// Authentication tokens forwarded from the ambient environment
pub const AUTH_TOKEN_VARS: [&str; 2] = ["EXPO_TOKEN", "EAS_TOKEN"];

/// Prefix for environment overrides of [`SupervisorConfig`]
const ENV_PREFIX: &str = "EXPO_SUPERVISOR_";
const CONFIG_DIR: &str = "expo-supervisor";
const CONFIG_FILE: &str = "config.json";

/// Runtime configuration for the executor and session registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SupervisorConfig {
    /// Environment variable: `EXPO_SUPERVISOR_MAX_LOG_BUFFER`
    pub max_log_buffer: usize,
    /// Environment variable: `EXPO_SUPERVISOR_LOG_TRIM_SIZE`
    pub log_trim_size: usize,
    /// Environment variable: `EXPO_SUPERVISOR_STARTUP_GRACE_MS`
    pub startup_grace_ms: u64,
    pub session_kill_delay_ms: u64,
    pub cleanup_delay_ms: u64,
    /// Environment variable: `EXPO_SUPERVISOR_DEFAULT_TIMEOUT_MS`
    pub default_timeout_ms: u64,
    pub execute_kill_delay_ms: u64,
    /// Capacity of the session event broadcast channel
    pub event_capacity: usize,
}

#[allow(clippy::cast_possible_truncation)]
impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_log_buffer: MAX_LOG_BUFFER_SIZE,
            log_trim_size: LOG_TRIM_SIZE,
            startup_grace_ms: STARTUP_GRACE.as_millis() as u64,
            session_kill_delay_ms: SESSION_KILL_DELAY.as_millis() as u64,
            cleanup_delay_ms: SESSION_CLEANUP_DELAY.as_millis() as u64,
            default_timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
            execute_kill_delay_ms: EXECUTE_KILL_DELAY.as_millis() as u64,
            event_capacity: 1024,
        }
    }
}

impl SupervisorConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a file and the environment
    ///
    /// With an explicit `path` the file must exist. Without one, the user config
    /// file (`<config_dir>/expo-supervisor/config.json`) is read if present.
    /// Environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::user_config_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Read configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SupervisorError::config_error(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config = serde_json::from_str(&content).map_err(|e| {
            SupervisorError::config_error(format!("failed to parse {}: {}", path.display(), e))
        })?;
        tracing::debug!(path = %path.display(), "Loaded supervisor config file");
        Ok(config)
    }

    /// Default location of the user config file
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Apply `EXPO_SUPERVISOR_*` overrides using the given variable lookup
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
            value.trim().parse().map_err(|_| {
                SupervisorError::config_error(format!("{key} must be a number, got {value:?}"))
            })
        }

        let var = |name: &str| {
            let key = format!("{ENV_PREFIX}{name}");
            lookup(&key).map(|value| (key, value))
        };

        if let Some((key, value)) = var("MAX_LOG_BUFFER") {
            self.max_log_buffer = parse(&key, &value)?;
        }
        if let Some((key, value)) = var("LOG_TRIM_SIZE") {
            self.log_trim_size = parse(&key, &value)?;
        }
        if let Some((key, value)) = var("STARTUP_GRACE_MS") {
            self.startup_grace_ms = parse(&key, &value)?;
        }
        if let Some((key, value)) = var("DEFAULT_TIMEOUT_MS") {
            self.default_timeout_ms = parse(&key, &value)?;
        }
        Ok(())
    }

    /// Reject settings that would break the log buffer invariant
    pub fn validate(&self) -> Result<()> {
        if self.max_log_buffer == 0 {
            return Err(SupervisorError::config_error(
                "maxLogBuffer must be greater than zero",
            ));
        }
        if self.log_trim_size == 0 || self.log_trim_size > self.max_log_buffer {
            return Err(SupervisorError::config_error(format!(
                "logTrimSize must be between 1 and maxLogBuffer ({}), got {}",
                self.max_log_buffer, self.log_trim_size
            )));
        }
        if self.event_capacity == 0 {
            return Err(SupervisorError::config_error(
                "eventCapacity must be greater than zero",
            ));
        }
        Ok(())
    }

    pub fn startup_grace(&self) -> Duration {
        Duration::from_millis(self.startup_grace_ms)
    }

    pub fn session_kill_delay(&self) -> Duration {
        Duration::from_millis(self.session_kill_delay_ms)
    }

    pub fn cleanup_delay(&self) -> Duration {
        Duration::from_millis(self.cleanup_delay_ms)
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn execute_kill_delay(&self) -> Duration {
        Duration::from_millis(self.execute_kill_delay_ms)
    }
}
