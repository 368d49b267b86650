//! Wire types for the line-delimited JSON control protocol
//!
//! Each request is one JSON object per line:
//! `{"id": 1, "method": "startSession", "params": {...}}`.
//! Each response echoes the request id:
//! `{"id": 1, "success": true, "result": {...}}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::command::{Platform, Tool};
use crate::session::SessionOptions;
use crate::types::{ErrorCode, ExecuteOptions, SupervisorError};

/// A decoded request line
#[derive(Debug, Clone, PartialEq)]
pub struct RequestEnvelope {
    /// Caller-chosen id, echoed back verbatim (number, string or null)
    pub id: Value,
    pub request: Request,
}

/// Control operations
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "camelCase")]
pub enum Request {
    StartSession(StartSessionParams),
    SendInput(SendInputParams),
    ReadOutput(ReadOutputParams),
    GetStatus(SessionIdParams),
    StopSession(SessionIdParams),
    ListSessions,
    StopAllSessions,
    Execute(ExecuteParams),
    CheckInstalled(ToolParams),
    GetVersion(ToolParams),
    RunLocalBuild(LocalBuildParams),
    EasBuild(EasBuildParams),
    PublishUpdate(PublishUpdateParams),
    InstallPackages(InstallPackagesParams),
}

impl Request {
    /// Method name as used on the wire
    pub fn method(&self) -> &'static str {
        match self {
            Self::StartSession(_) => "startSession",
            Self::SendInput(_) => "sendInput",
            Self::ReadOutput(_) => "readOutput",
            Self::GetStatus(_) => "getStatus",
            Self::StopSession(_) => "stopSession",
            Self::ListSessions => "listSessions",
            Self::StopAllSessions => "stopAllSessions",
            Self::Execute(_) => "execute",
            Self::CheckInstalled(_) => "checkInstalled",
            Self::GetVersion(_) => "getVersion",
            Self::RunLocalBuild(_) => "runLocalBuild",
            Self::EasBuild(_) => "easBuild",
            Self::PublishUpdate(_) => "publishUpdate",
            Self::InstallPackages(_) => "installPackages",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionParams {
    pub session_id: String,
    pub command: Vec<String>,
    #[serde(flatten)]
    pub options: SessionOptions,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendInputParams {
    pub session_id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadOutputParams {
    pub session_id: String,
    #[serde(default)]
    pub tail: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionIdParams {
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteParams {
    pub command: Vec<String>,
    #[serde(flatten)]
    pub options: ExecuteOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ToolParams {
    pub tool: Tool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalBuildParams {
    pub platform: Platform,
    #[serde(flatten)]
    pub options: ExecuteOptions,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EasBuildParams {
    pub platform: Platform,
    pub profile: String,
    #[serde(flatten)]
    pub options: ExecuteOptions,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishUpdateParams {
    pub branch: String,
    pub message: String,
    #[serde(default)]
    pub rollout_percentage: Option<u8>,
    #[serde(flatten)]
    pub options: ExecuteOptions,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallPackagesParams {
    pub packages: Vec<String>,
    #[serde(flatten)]
    pub options: ExecuteOptions,
}

/// Parse one request line
///
/// On failure the error carries whatever id could be recovered, so the caller
/// can still address the error response.
pub fn parse_request(line: &str) -> Result<RequestEnvelope, (Value, SupervisorError)> {
    let raw: Value =
        serde_json::from_str(line).map_err(|e| (Value::Null, SupervisorError::from(e)))?;
    let Value::Object(mut fields) = raw else {
        return Err((
            Value::Null,
            SupervisorError::InvalidRequest("request must be a JSON object".to_string()),
        ));
    };

    let id = fields.remove("id").unwrap_or(Value::Null);
    let Some(method) = fields.remove("method") else {
        return Err((
            id,
            SupervisorError::InvalidRequest("missing \"method\"".to_string()),
        ));
    };

    let mut tagged = serde_json::Map::new();
    tagged.insert("method".to_string(), method);
    // Unit methods carry no content, so an empty params object means none
    match fields.remove("params") {
        Some(Value::Null) | None => {}
        Some(Value::Object(params)) if params.is_empty() => {}
        Some(params) => {
            tagged.insert("params".to_string(), params);
        }
    }

    match serde_json::from_value(Value::Object(tagged)) {
        Ok(request) => Ok(RequestEnvelope { id, request }),
        Err(e) => Err((id, SupervisorError::InvalidRequest(e.to_string()))),
    }
}

/// Reply to a single request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub id: Value,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
}

impl Response {
    pub fn ok(id: Value, result: Value) -> Self {
        Self {
            id,
            success: true,
            result: Some(result),
            error: None,
            code: None,
        }
    }

    pub fn error(id: Value, error: &SupervisorError) -> Self {
        Self {
            id,
            success: false,
            result: None,
            error: Some(error.to_string()),
            code: Some(error.error_code().code()),
        }
    }

    /// Serialize to a single output line (without the trailing newline)
    pub fn to_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                r#"{{"id":null,"success":false,"error":"failed to encode response: {e}","code":{}}}"#,
                ErrorCode::InternalError.code()
            )
        })
    }
}
