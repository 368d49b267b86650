//! Error types for the process supervisor

use thiserror::Error;

use super::SessionStatus;

/// Control protocol error codes
///
/// Standard JSON-RPC error codes and supervisor-specific codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Standard JSON-RPC errors (-32xxx)
    /// Parse error: Invalid JSON
    ParseError = -32700,
    /// Invalid params
    InvalidParams = -32602,
    /// Internal error
    InternalError = -32603,

    // Supervisor-specific errors (-32000 to -32099)
    /// Session not found
    SessionNotFound = -32001,
    /// Session already exists
    SessionAlreadyExists = -32002,
    /// Session is not accepting input
    SessionNotRunning = -32003,
    /// Command exceeded its deadline
    CommandTimeout = -32004,
    /// Process could not be spawned
    ProcessSpawn = -32005,
    /// Process failed while running
    ProcessRuntime = -32006,
    /// Configuration error
    ConfigError = -32010,
}

impl ErrorCode {
    /// Get the error code value
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Main error type for the supervisor
#[derive(Debug, Error)]
pub enum SupervisorError {
    // === Session errors ===
    /// Session not found
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Session already exists
    #[error("Session already exists: {0}")]
    SessionAlreadyExists(String),

    /// Session exists but is not in the running state
    #[error("Session is not running: {id} (status: {status})")]
    SessionNotRunning { id: String, status: SessionStatus },

    // === Process errors ===
    /// Command exceeded its timeout
    #[error("Command timed out after {0}ms")]
    CommandTimeout(u64),

    /// Spawning the child process failed
    #[error("Failed to spawn process: {0}")]
    ProcessSpawn(String),

    /// The child process failed after it was spawned
    #[error("Process error: {0}")]
    ProcessRuntime(String),

    /// Command had no program after sanitization
    #[error("Command is empty")]
    EmptyCommand,

    /// One or more package names failed validation
    #[error("Invalid package names: {}", .0.join(", "))]
    InvalidPackageNames(Vec<String>),

    /// Control request could not be decoded into a known operation
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // === Configuration errors ===
    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // === Wrapped errors ===
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for supervisor operations
pub type Result<T> = std::result::Result<T, SupervisorError>;

impl SupervisorError {
    /// Get the protocol error code for this error
    pub fn error_code(&self) -> ErrorCode {
        match self {
            SupervisorError::SessionNotFound(_) => ErrorCode::SessionNotFound,
            SupervisorError::SessionAlreadyExists(_) => ErrorCode::SessionAlreadyExists,
            SupervisorError::SessionNotRunning { .. } => ErrorCode::SessionNotRunning,
            SupervisorError::CommandTimeout(_) => ErrorCode::CommandTimeout,
            SupervisorError::ProcessSpawn(_) | SupervisorError::EmptyCommand => {
                ErrorCode::ProcessSpawn
            }
            SupervisorError::ProcessRuntime(_) => ErrorCode::ProcessRuntime,
            SupervisorError::InvalidPackageNames(_) | SupervisorError::InvalidRequest(_) => {
                ErrorCode::InvalidParams
            }
            SupervisorError::ConfigError(_) => ErrorCode::ConfigError,
            SupervisorError::Json(_) => ErrorCode::ParseError,
            SupervisorError::Io(_) => ErrorCode::InternalError,
        }
    }

    /// Check if this error is a client error (caused by invalid input)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            SupervisorError::SessionNotFound(_)
                | SupervisorError::SessionAlreadyExists(_)
                | SupervisorError::SessionNotRunning { .. }
                | SupervisorError::EmptyCommand
                | SupervisorError::InvalidPackageNames(_)
                | SupervisorError::InvalidRequest(_)
        )
    }

    // === Constructor helpers ===

    /// Create a session not found error
    pub fn session_not_found(session_id: impl Into<String>) -> Self {
        SupervisorError::SessionNotFound(session_id.into())
    }

    /// Create a session already exists error
    pub fn session_already_exists(session_id: impl Into<String>) -> Self {
        SupervisorError::SessionAlreadyExists(session_id.into())
    }

    /// Create a session not running error
    pub fn session_not_running(session_id: impl Into<String>, status: SessionStatus) -> Self {
        SupervisorError::SessionNotRunning {
            id: session_id.into(),
            status,
        }
    }

    /// Create a spawn error
    pub fn spawn_failed(msg: impl Into<String>) -> Self {
        SupervisorError::ProcessSpawn(msg.into())
    }

    /// Create a configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        SupervisorError::ConfigError(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SupervisorError::session_not_found("dev-1");
        assert_eq!(err.to_string(), "Session not found: dev-1");

        let err = SupervisorError::session_already_exists("dev-1");
        assert_eq!(err.to_string(), "Session already exists: dev-1");

        let err = SupervisorError::session_not_running("dev-1", SessionStatus::Starting);
        assert_eq!(
            err.to_string(),
            "Session is not running: dev-1 (status: starting)"
        );

        let err = SupervisorError::CommandTimeout(100);
        assert_eq!(err.to_string(), "Command timed out after 100ms");
    }

    #[test]
    fn test_invalid_package_names_display() {
        let err = SupervisorError::InvalidPackageNames(vec!["bad;pkg".into(), "$x".into()]);
        assert_eq!(err.to_string(), "Invalid package names: bad;pkg, $x");
    }

    #[test]
    fn test_error_codes() {
        let err = SupervisorError::session_not_found("x");
        assert_eq!(err.error_code(), ErrorCode::SessionNotFound);
        assert_eq!(err.error_code().code(), -32001);

        assert_eq!(
            SupervisorError::EmptyCommand.error_code(),
            ErrorCode::ProcessSpawn
        );
        assert_eq!(
            SupervisorError::config_error("bad").error_code().code(),
            -32010
        );
    }

    #[test]
    fn test_is_client_error() {
        assert!(SupervisorError::session_not_found("x").is_client_error());
        assert!(SupervisorError::session_already_exists("x").is_client_error());
        assert!(
            SupervisorError::session_not_running("x", SessionStatus::Stopped).is_client_error()
        );
        assert!(!SupervisorError::spawn_failed("enoent").is_client_error());
        assert!(!SupervisorError::CommandTimeout(5).is_client_error());
    }
}
