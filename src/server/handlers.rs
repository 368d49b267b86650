//! Request handlers
//!
//! Maps each protocol operation onto the registry or executor.

use serde::Serialize;
use serde_json::{Value, json};

use super::protocol::{Request, Response, parse_request};
use crate::command::Executor;
use crate::session::SessionRegistry;
use crate::tracing::ErrorTraceExt;
use crate::types::Result;

/// Shared state handed to every request
#[derive(Debug, Clone)]
pub struct ServerContext {
    pub registry: SessionRegistry,
    pub executor: Executor,
}

impl ServerContext {
    pub fn new(registry: SessionRegistry, executor: Executor) -> Self {
        Self { registry, executor }
    }
}

fn to_value<T: Serialize>(value: T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Run one decoded request
pub async fn dispatch(ctx: &ServerContext, request: Request) -> Result<Value> {
    match request {
        Request::StartSession(params) => to_value(ctx.registry.start_session(
            params.session_id,
            &params.command,
            params.options,
        )?),
        Request::SendInput(params) => {
            ctx.registry.send_input(&params.session_id, &params.text)?;
            Ok(json!({ "sent": true }))
        }
        Request::ReadOutput(params) => {
            to_value(ctx.registry.read_output(&params.session_id, params.tail)?)
        }
        Request::GetStatus(params) => to_value(ctx.registry.get_status(&params.session_id)?),
        Request::StopSession(params) => {
            ctx.registry.stop_session(&params.session_id)?;
            Ok(json!({ "stopped": true }))
        }
        Request::ListSessions => to_value(ctx.registry.list_sessions()),
        Request::StopAllSessions => {
            let count = ctx.registry.session_count();
            ctx.registry.stop_all_sessions();
            Ok(json!({ "stopped": count }))
        }
        Request::Execute(params) => {
            to_value(ctx.executor.execute(&params.command, params.options).await)
        }
        Request::CheckInstalled(params) => {
            let installed = ctx.executor.check_installed(params.tool).await;
            Ok(json!({ "tool": params.tool, "installed": installed }))
        }
        Request::GetVersion(params) => {
            let version = ctx.executor.get_version(params.tool).await;
            Ok(json!({ "tool": params.tool, "version": version }))
        }
        Request::RunLocalBuild(params) => to_value(
            ctx.executor
                .run_local_build(params.platform, params.options)
                .await,
        ),
        Request::EasBuild(params) => to_value(
            ctx.executor
                .eas_build(params.platform, &params.profile, params.options)
                .await,
        ),
        Request::PublishUpdate(params) => to_value(
            ctx.executor
                .publish_update(
                    &params.branch,
                    &params.message,
                    params.rollout_percentage,
                    params.options,
                )
                .await,
        ),
        Request::InstallPackages(params) => to_value(
            ctx.executor
                .install_packages(&params.packages, params.options)
                .await,
        ),
    }
}

/// Handle one input line, producing the response to write
///
/// Blank lines produce no response.
pub async fn handle_line(ctx: &ServerContext, line: &str) -> Option<Response> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let envelope = match parse_request(line) {
        Ok(envelope) => envelope,
        Err((id, error)) => {
            tracing::warn!(id = %id, "Rejected request: {}", error);
            return Some(Response::error(id, &error));
        }
    };

    let method = envelope.request.method();
    tracing::debug!(id = %envelope.id, method, "Handling request");

    let response = match dispatch(ctx, envelope.request).await {
        Ok(result) => Response::ok(envelope.id, result),
        Err(error) => {
            if error.is_client_error() {
                tracing::debug!(method, "Request failed: {}", error);
            } else {
                error.trace_error();
            }
            Response::error(envelope.id, &error)
        }
    };
    Some(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SupervisorConfig;

    fn context() -> ServerContext {
        let config = SupervisorConfig {
            startup_grace_ms: 50,
            session_kill_delay_ms: 200,
            cleanup_delay_ms: 300,
            ..Default::default()
        };
        ServerContext::new(SessionRegistry::new(config.clone()), Executor::new(&config))
    }

    #[tokio::test]
    async fn test_blank_line_ignored() {
        let ctx = context();
        assert!(handle_line(&ctx, "   ").await.is_none());
    }

    #[tokio::test]
    async fn test_malformed_line_answers_with_null_id() {
        let ctx = context();
        let response = handle_line(&ctx, "not json").await.unwrap();
        assert!(!response.success);
        assert_eq!(response.id, Value::Null);
        assert!(response.error.is_some());
    }

    #[tokio::test]
    async fn test_unknown_session_errors() {
        let ctx = context();
        let response = handle_line(
            &ctx,
            r#"{"id":1,"method":"getStatus","params":{"sessionId":"ghost"}}"#,
        )
        .await
        .unwrap();

        assert_eq!(response.id, json!(1));
        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("Session not found: ghost"));
    }

    #[tokio::test]
    async fn test_list_sessions_empty() {
        let ctx = context();
        let response = handle_line(&ctx, r#"{"id":2,"method":"listSessions"}"#)
            .await
            .unwrap();
        assert!(response.success);
        assert_eq!(response.result, Some(json!([])));
    }

    #[tokio::test]
    async fn test_install_refuses_invalid_names() {
        let ctx = context();
        let response = handle_line(
            &ctx,
            r#"{"id":3,"method":"installPackages","params":{"packages":["react","bad pkg"]}}"#,
        )
        .await
        .unwrap();

        // The operation ran; its outcome is carried in the result
        assert!(response.success);
        let result = response.result.unwrap();
        assert_eq!(result["success"], false);
        assert_eq!(result["error"], "Invalid package names: bad pkg");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_session_round_trip() {
        let ctx = context();

        let started = handle_line(
            &ctx,
            r#"{"id":1,"method":"startSession","params":{"sessionId":"s1","command":["sleep","30"]}}"#,
        )
        .await
        .unwrap();
        assert!(started.success);
        assert_eq!(started.result.as_ref().unwrap()["status"], "starting");

        let duplicate = handle_line(
            &ctx,
            r#"{"id":2,"method":"startSession","params":{"sessionId":"s1","command":["sleep","1"]}}"#,
        )
        .await
        .unwrap();
        assert!(!duplicate.success);

        let listed = handle_line(&ctx, r#"{"id":3,"method":"listSessions"}"#)
            .await
            .unwrap();
        assert_eq!(listed.result.unwrap()[0]["id"], "s1");

        let stopped = handle_line(
            &ctx,
            r#"{"id":4,"method":"stopSession","params":{"sessionId":"s1"}}"#,
        )
        .await
        .unwrap();
        assert!(stopped.success);

        let status = handle_line(
            &ctx,
            r#"{"id":5,"method":"getStatus","params":{"sessionId":"s1"}}"#,
        )
        .await
        .unwrap();
        assert_eq!(status.result.unwrap()["status"], "stopped");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_request() {
        let ctx = context();
        let response = handle_line(
            &ctx,
            r#"{"id":9,"method":"execute","params":{"command":["echo","hi"],"timeoutMs":5000}}"#,
        )
        .await
        .unwrap();

        assert!(response.success);
        let result = response.result.unwrap();
        assert_eq!(result["success"], true);
        assert_eq!(result["stdout"], "hi\n");
        assert_eq!(result["exitCode"], 0);
    }
}
