//! Session lifecycle events
//!
//! Published on the registry's broadcast channel. The serialized form carries a
//! `"event": "session:<kind>"` tag, which the control server forwards verbatim.

use serde::Serialize;

use crate::types::LogEntry;

/// Something that happened to a supervised session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all_fields = "camelCase")]
pub enum SessionEvent {
    #[serde(rename = "session:started")]
    Started {
        session_id: String,
        command: Vec<String>,
        pid: Option<u32>,
    },
    #[serde(rename = "session:log")]
    Log { session_id: String, entry: LogEntry },
    #[serde(rename = "session:input")]
    Input { session_id: String, text: String },
    #[serde(rename = "session:stopped")]
    Stopped { session_id: String },
    #[serde(rename = "session:exit")]
    Exit {
        session_id: String,
        exit_code: Option<i32>,
        signal: Option<i32>,
    },
    #[serde(rename = "session:error")]
    Error { session_id: String, message: String },
    #[serde(rename = "session:removed")]
    Removed { session_id: String },
}

impl SessionEvent {
    /// Id of the session this event belongs to
    pub fn session_id(&self) -> &str {
        match self {
            Self::Started { session_id, .. }
            | Self::Log { session_id, .. }
            | Self::Input { session_id, .. }
            | Self::Stopped { session_id }
            | Self::Exit { session_id, .. }
            | Self::Error { session_id, .. }
            | Self::Removed { session_id } => session_id,
        }
    }

    /// Event name as used on the wire
    pub fn name(&self) -> &'static str {
        match self {
            Self::Started { .. } => "session:started",
            Self::Log { .. } => "session:log",
            Self::Input { .. } => "session:input",
            Self::Stopped { .. } => "session:stopped",
            Self::Exit { .. } => "session:exit",
            Self::Error { .. } => "session:error",
            Self::Removed { .. } => "session:removed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = SessionEvent::Exit {
            session_id: "metro".to_string(),
            exit_code: Some(0),
            signal: None,
        };
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["event"], "session:exit");
        assert_eq!(value["sessionId"], "metro");
        assert_eq!(value["exitCode"], 0);
        assert_eq!(event.name(), "session:exit");
        assert_eq!(event.session_id(), "metro");
    }

    #[test]
    fn test_removed_event_name_matches_tag() {
        let event = SessionEvent::Removed {
            session_id: "s1".to_string(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], event.name());
    }
}
