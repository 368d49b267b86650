//! Supervisor runner
//!
//! Entry point for the binary: sets up logging and configuration, then runs the
//! selected subcommand.

use std::io::IsTerminal;
use std::time::Instant;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use crate::cli::{Cli, Command, ExecArgs, SessionArgs, SpawnArgs};
use crate::command::{Executor, Tool};
use crate::output::report;
use crate::server::{self, ServerContext};
use crate::session::{SessionEvent, SessionOptions, SessionRegistry};
use crate::tracing::{ErrorTraceExt, init_logging};
use crate::types::{ExecuteOptions, SessionStatus, SupervisorConfig};

/// Run the supervisor with parsed CLI arguments
///
/// Returns the process exit code.
pub async fn run_with_cli(cli: &Cli) -> anyhow::Result<i32> {
    let startup_time = Instant::now();
    init_logging(cli)?;

    tracing::info!(
        version = %env!("CARGO_PKG_VERSION"),
        pid = %std::process::id(),
        diagnostic = cli.is_diagnostic(),
        "Expo supervisor starting"
    );
    if cli.is_diagnostic() {
        tracing::info!(log_path = %cli.log_path().display(), "Diagnostic mode enabled");
    }

    let config = SupervisorConfig::load(cli.config.as_deref()).map_err(|e| {
        e.trace_error();
        e
    })?;
    tracing::debug!(?config, "Configuration loaded");

    let code = match cli.command() {
        Command::Serve => run_serve(config).await.map(|()| 0)?,
        Command::Exec(args) => run_exec(&config, args).await?,
        Command::Session(args) => run_session(config, args).await?,
        Command::Doctor { json } => run_doctor(&config, *json).await?,
    };

    tracing::info!(
        uptime_ms = startup_time.elapsed().as_millis(),
        exit_code = code,
        "Expo supervisor finished"
    );
    Ok(code)
}

fn execute_options(spawn: &SpawnArgs) -> ExecuteOptions {
    let mut options = ExecuteOptions::new();
    if let Some(cwd) = &spawn.cwd {
        options = options.with_working_directory(cwd);
    }
    for (key, value) in &spawn.env {
        options = options.with_env(key, value);
    }
    options
}

#[tracing::instrument(name = "serve", skip_all)]
async fn run_serve(config: SupervisorConfig) -> anyhow::Result<()> {
    let executor = Executor::new(&config);
    let registry = SessionRegistry::new(config);

    if std::io::stdin().is_terminal() {
        eprintln!("expo-supervisor is serving its control protocol on stdin/stdout.");
        eprintln!("Send one JSON request per line, e.g.:");
        eprintln!(r#"  {{"id":1,"method":"listSessions"}}"#);
        eprintln!("(Press Ctrl+D to stop all sessions and exit)");
    } else {
        tracing::info!("Waiting for control requests on stdin...");
    }

    server::run_stdio(ServerContext::new(registry, executor)).await?;
    Ok(())
}

async fn run_exec(config: &SupervisorConfig, args: &ExecArgs) -> anyhow::Result<i32> {
    let executor = Executor::new(config);

    let mut options = execute_options(&args.spawn);
    options.timeout_ms = args.timeout_ms;
    options.stdin.clone_from(&args.stdin);

    let result = executor.execute(&args.spawn.command, options).await;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", report::format_execute_result(&args.spawn.command, &result));
    }

    Ok(if result.success { 0 } else { 1 })
}

/// Run one session until it exits, forwarding our stdin lines as input
///
/// End of our stdin stops the session.
async fn run_session(config: SupervisorConfig, args: &SessionArgs) -> anyhow::Result<i32> {
    let registry = SessionRegistry::new(config);
    let mut events = registry.subscribe();

    let spawn = execute_options(&args.spawn);
    let options = SessionOptions {
        working_directory: spawn.working_directory,
        env: spawn.env,
        ..Default::default()
    };
    let info = registry.start_session(args.id.clone(), &args.spawn.command, options)?;
    if info.status == SessionStatus::Error {
        let output = registry.read_output(&args.id, None)?;
        eprintln!("{}", report::format_log_entries(&output.logs));
        return Ok(1);
    }

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut exit_code = None;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) if event.session_id() != args.id => {}
                Ok(SessionEvent::Log { entry, .. }) => {
                    println!("{}", report::format_log_entries(std::slice::from_ref(&entry)));
                }
                Ok(SessionEvent::Exit { exit_code: code, .. }) => {
                    exit_code = Some(code.unwrap_or(1));
                    break;
                }
                Ok(SessionEvent::Error { .. } | SessionEvent::Removed { .. }) => break,
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Session output lagged, lines dropped");
                }
                Err(RecvError::Closed) => break,
            },
            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if let Err(e) = registry.send_input(&args.id, &line) {
                        eprintln!("{e}");
                    }
                }
                Ok(None) | Err(_) => {
                    stdin_open = false;
                    registry.stop_session(&args.id)?;
                }
            },
        }
    }

    println!("{}", report::format_session_table(&registry.list_sessions()));
    Ok(exit_code.unwrap_or(1))
}

async fn run_doctor(config: &SupervisorConfig, json: bool) -> anyhow::Result<i32> {
    let executor = Executor::new(config);

    let probes = Tool::ALL.map(|tool| {
        let executor = executor.clone();
        async move { (tool, executor.get_version(tool).await) }
    });
    let tools = futures::future::join_all(probes).await;

    if json {
        let summary: serde_json::Map<String, serde_json::Value> = tools
            .iter()
            .map(|(tool, version)| {
                (
                    tool.to_string(),
                    serde_json::json!({ "installed": version.is_some(), "version": version }),
                )
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", report::format_tool_table(&tools));
    }

    // Everything else is optional, but nothing runs without npm
    let npm_missing = tools
        .iter()
        .any(|(tool, version)| *tool == Tool::Npm && version.is_none());
    Ok(i32::from(npm_missing))
}
