//! Markdown rendering of supervisor results
//!
//! Used by the CLI subcommands to print human-readable summaries.

use crate::command::Tool;
use crate::types::{ExecuteResult, LogEntry, LogLevel, SessionSummary};

/// Maximum characters of a single output stream included in a report
const MAX_SECTION_CHARS: usize = 8_000;

fn truncated(text: &str) -> (&str, bool) {
    if text.len() <= MAX_SECTION_CHARS {
        return (text, false);
    }
    // Cut on a char boundary
    let mut end = MAX_SECTION_CHARS;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    (&text[..end], true)
}

fn push_block(out: &mut String, title: &str, body: &str) {
    let body = body.trim_end();
    if body.is_empty() {
        return;
    }
    let (body, was_truncated) = truncated(body);
    out.push_str(&format!("\n### {title}\n\n```\n{body}\n```\n"));
    if was_truncated {
        out.push_str("\n_(output truncated)_\n");
    }
}

/// Render a one-shot result
pub fn format_execute_result(command: &[String], result: &ExecuteResult) -> String {
    let mut out = String::new();
    let icon = if result.success { "✅" } else { "❌" };
    out.push_str(&format!("## {icon} `{}`\n\n", command.join(" ")));

    let exit = result
        .exit_code
        .map_or_else(|| "none".to_string(), |code| code.to_string());
    out.push_str(&format!("- Exit code: {exit}\n"));
    out.push_str(&format!("- Duration: {}ms\n", result.duration_ms));
    if result.timed_out {
        out.push_str("- Timed out: yes\n");
    }
    if let Some(error) = &result.error {
        out.push_str(&format!("- Error: {error}\n"));
    }

    let problems: Vec<LogEntry> = result
        .log_entries()
        .into_iter()
        .filter(|entry| matches!(entry.level, LogLevel::Error | LogLevel::Warn))
        .collect();
    if !problems.is_empty() {
        out.push_str("\n### Problems\n\n");
        for entry in &problems {
            out.push_str(&format!("- **{}** {}\n", entry.level, entry.message));
        }
    }

    push_block(&mut out, "stdout", &result.stdout);
    push_block(&mut out, "stderr", &result.stderr);
    out
}

/// Render a slice of session log entries, one per line
pub fn format_log_entries(entries: &[LogEntry]) -> String {
    entries
        .iter()
        .map(|entry| {
            format!(
                "[{}] {:<5} {}",
                entry.timestamp.format("%H:%M:%S%.3f"),
                entry.level.as_str().to_uppercase(),
                entry.message
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render a session listing as a markdown table
pub fn format_session_table(sessions: &[SessionSummary]) -> String {
    if sessions.is_empty() {
        return "No active sessions.".to_string();
    }

    let mut out = String::from("| Session | Status | Uptime | Logs |\n|---|---|---|---|\n");
    for session in sessions {
        out.push_str(&format!(
            "| {} | {} | {}s | {} |\n",
            session.id,
            session.status,
            session.uptime_ms / 1000,
            session.log_count
        ));
    }
    out
}

/// Render tool probe results as a markdown table
pub fn format_tool_table(tools: &[(Tool, Option<String>)]) -> String {
    let mut out = String::from("| Tool | Installed | Version |\n|---|---|---|\n");
    for (tool, version) in tools {
        let installed = if version.is_some() { "yes" } else { "no" };
        out.push_str(&format!(
            "| {} | {} | {} |\n",
            tool,
            installed,
            version.as_deref().unwrap_or("-")
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LogStream, SessionStatus};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_success() {
        let result = ExecuteResult {
            success: true,
            stdout: "done\n".to_string(),
            exit_code: Some(0),
            duration_ms: 42,
            ..Default::default()
        };
        let text = format_execute_result(&["eas".into(), "whoami".into()], &result);

        assert!(text.starts_with("## ✅ `eas whoami`"));
        assert!(text.contains("- Exit code: 0"));
        assert!(text.contains("### stdout"));
        assert!(!text.contains("### stderr"));
        assert!(!text.contains("### Problems"));
    }

    #[test]
    fn test_format_timeout_lists_problems() {
        let result = ExecuteResult {
            success: false,
            stderr: "ERROR: build failed\n".to_string(),
            exit_code: None,
            error: Some("Command timed out after 100ms".to_string()),
            timed_out: true,
            ..Default::default()
        };
        let text = format_execute_result(&["sleep".into()], &result);

        assert!(text.contains("- Exit code: none"));
        assert!(text.contains("- Timed out: yes"));
        assert!(text.contains("- **error** ERROR: build failed"));
    }

    #[test]
    fn test_truncation_respects_char_boundary() {
        let long = "é".repeat(MAX_SECTION_CHARS);
        let (cut, was_truncated) = truncated(&long);
        assert!(was_truncated);
        assert!(cut.len() <= MAX_SECTION_CHARS);
    }

    #[test]
    fn test_session_table() {
        assert_eq!(format_session_table(&[]), "No active sessions.");

        let rows = vec![SessionSummary {
            id: "metro".to_string(),
            status: SessionStatus::Running,
            uptime_ms: 12_500,
            log_count: 3,
        }];
        let table = format_session_table(&rows);
        assert!(table.contains("| metro | running | 12s | 3 |"));
    }

    #[test]
    fn test_log_entries_format() {
        let entries = vec![LogEntry::new(LogLevel::Warn, "slow\n", LogStream::Stderr)];
        let text = format_log_entries(&entries);
        assert!(text.contains("WARN  slow"));
    }

    #[test]
    fn test_tool_table() {
        let table = format_tool_table(&[
            (Tool::Eas, Some("16.3.1".to_string())),
            (Tool::Xcrun, None),
        ]);
        let rows: Vec<&str> = table.lines().collect();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[2], "| eas | yes | 16.3.1 |");
        assert_eq!(rows[3], "| xcrun | no | - |");
    }
}
