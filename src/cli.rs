//! Command-line interface definitions
//!
//! Provides CLI argument parsing using clap for the expo supervisor.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Expo process supervisor - drive Expo and EAS tooling from an automated caller
#[derive(Parser, Debug, Clone)]
#[command(name = "expo-supervisor")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Configuration file (defaults to <config_dir>/expo-supervisor/config.json)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable diagnostic mode (auto-log to temp file)
    #[arg(short, long, global = true)]
    pub diagnostic: bool,

    /// Log directory (implies diagnostic mode)
    #[arg(short = 'l', long, global = true, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Log file name (implies diagnostic mode)
    #[arg(short = 'f', long, global = true, value_name = "FILE")]
    pub log_file: Option<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    /// Note: RUST_LOG env var takes priority over this flag
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (only errors)
    /// Note: RUST_LOG env var takes priority over this flag
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// OpenTelemetry OTLP endpoint (e.g., http://localhost:4317)
    /// When otel feature is disabled, this argument is accepted but ignored.
    #[arg(long, global = true, value_name = "URL", env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    pub otel_endpoint: Option<String>,

    /// OpenTelemetry service name
    #[arg(long, global = true, value_name = "NAME", default_value = "expo-supervisor")]
    pub otel_service_name: String,
}

/// Subcommands; `serve` runs when none is given
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Serve the line-delimited JSON control protocol over stdin/stdout
    Serve,
    /// Run one bounded command and print its report
    Exec(ExecArgs),
    /// Run a long-lived session in the foreground, forwarding stdin lines to it
    Session(SessionArgs),
    /// Report which tools are installed and their versions
    Doctor {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Options shared by commands that spawn a process
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct SpawnArgs {
    /// Working directory for the child process
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Extra environment variable for the child (repeatable)
    #[arg(short, long = "env", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub env: Vec<(String, String)>,

    /// Program and arguments to run
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ExecArgs {
    /// Timeout in milliseconds (0 disables the timeout)
    #[arg(short, long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Text written to the child's stdin
    #[arg(long, value_name = "TEXT")]
    pub stdin: Option<String>,

    /// Print the result as JSON instead of a report
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub spawn: SpawnArgs,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct SessionArgs {
    /// Session id
    #[arg(long, default_value = "main")]
    pub id: String,

    #[command(flatten)]
    pub spawn: SpawnArgs,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got {raw:?}")),
    }
}

#[allow(clippy::derivable_impls)]
impl Default for Cli {
    fn default() -> Self {
        Self {
            command: None,
            config: None,
            diagnostic: false,
            log_dir: None,
            log_file: None,
            verbose: 0,
            quiet: false,
            otel_endpoint: None,
            otel_service_name: "expo-supervisor".to_string(),
        }
    }
}

impl Cli {
    /// Subcommand to run, defaulting to `serve`
    pub fn command(&self) -> &Command {
        self.command.as_ref().unwrap_or(&Command::Serve)
    }

    /// Check if diagnostic mode is enabled (output to file)
    ///
    /// Returns true if `--diagnostic` is set, or if `--log-dir` or `--log-file` is specified.
    pub fn is_diagnostic(&self) -> bool {
        self.diagnostic || self.log_dir.is_some() || self.log_file.is_some()
    }

    /// Check if OpenTelemetry tracing is enabled
    pub fn is_otel_enabled(&self) -> bool {
        cfg!(feature = "otel") && self.otel_endpoint.is_some()
    }

    /// Get the log level based on CLI arguments
    ///
    /// - `--quiet`: ERROR
    /// - default: INFO
    /// - `-v`: DEBUG
    /// - `-vv` or more: TRACE
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else {
            match self.verbose {
                0 => tracing::Level::INFO,
                1 => tracing::Level::DEBUG,
                _ => tracing::Level::TRACE,
            }
        }
    }

    /// Get the log file path for diagnostic mode
    ///
    /// Uses the specified log directory and file name, or defaults to:
    /// - Directory: system temp directory
    /// - File: `expo-supervisor-{timestamp}.log`
    pub fn log_path(&self) -> PathBuf {
        let dir = self.log_dir.clone().unwrap_or_else(std::env::temp_dir);

        let filename = self.log_file.clone().unwrap_or_else(|| {
            let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
            format!("expo-supervisor-{timestamp}.log")
        });

        dir.join(filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cli() {
        let cli = Cli::default();
        assert!(!cli.is_diagnostic());
        assert_eq!(cli.log_level(), tracing::Level::INFO);
        assert_eq!(cli.command(), &Command::Serve);
    }

    #[test]
    fn test_log_dir_implies_diagnostic() {
        let cli = Cli {
            log_dir: Some(PathBuf::from("/tmp")),
            ..Default::default()
        };
        assert!(cli.is_diagnostic());

        let cli = Cli {
            log_file: Some("test.log".to_string()),
            ..Default::default()
        };
        assert!(cli.is_diagnostic());
    }

    #[test]
    fn test_log_levels() {
        let cli = Cli {
            quiet: true,
            verbose: 2,
            ..Default::default()
        };
        assert_eq!(cli.log_level(), tracing::Level::ERROR);

        let cli = Cli {
            verbose: 1,
            ..Default::default()
        };
        assert_eq!(cli.log_level(), tracing::Level::DEBUG);

        let cli = Cli {
            verbose: 3,
            ..Default::default()
        };
        assert_eq!(cli.log_level(), tracing::Level::TRACE);
    }

    #[test]
    fn test_log_path_custom_dir() {
        let cli = Cli {
            log_dir: Some(PathBuf::from("/var/log")),
            log_file: Some("test.log".to_string()),
            ..Default::default()
        };
        assert_eq!(cli.log_path(), PathBuf::from("/var/log/test.log"));
    }

    #[test]
    fn test_log_path_default_generates_timestamp() {
        let path = Cli::default().log_path();
        assert!(path.starts_with(std::env::temp_dir()));

        let filename = path.file_name().unwrap().to_str().unwrap();
        assert!(filename.starts_with("expo-supervisor-"));
        assert!(filename.ends_with(".log"));
    }

    #[test]
    fn test_parse_exec() {
        let cli = Cli::try_parse_from([
            "expo-supervisor",
            "-v",
            "exec",
            "--timeout-ms",
            "5000",
            "-e",
            "CI=1",
            "npx",
            "expo",
            "--version",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 1);
        let Command::Exec(args) = cli.command() else {
            panic!("expected exec");
        };
        assert_eq!(args.timeout_ms, Some(5000));
        assert_eq!(args.spawn.env, vec![("CI".to_string(), "1".to_string())]);
        assert_eq!(args.spawn.command, vec!["npx", "expo", "--version"]);
    }

    #[test]
    fn test_parse_session_and_doctor() {
        let cli = Cli::try_parse_from([
            "expo-supervisor",
            "session",
            "--id",
            "metro",
            "npx",
            "expo",
            "start",
        ])
        .unwrap();
        let Command::Session(args) = cli.command() else {
            panic!("expected session");
        };
        assert_eq!(args.id, "metro");
        assert_eq!(args.spawn.command, vec!["npx", "expo", "start"]);

        let cli = Cli::try_parse_from(["expo-supervisor", "doctor", "--json"]).unwrap();
        assert_eq!(cli.command(), &Command::Doctor { json: true });
    }

    #[test]
    fn test_env_requires_key_value() {
        assert!(parse_key_value("A=b=c").is_ok_and(|(k, v)| k == "A" && v == "b=c"));
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=x").is_err());
    }
}
