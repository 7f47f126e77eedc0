//! Events produced while supervising an external process.
//!
//! Every event serializes to `{"type": "...", "data": "..."}`, which is the
//! payload carried by each push-channel frame.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Width of the horizontal rule framing the start and end banners.
const RULE_WIDTH: usize = 80;

/// Kind of relay event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Lifecycle notice (start/end banners, cancellation).
    Info,
    /// A chunk of the child's standard output.
    Stdout,
    /// A chunk of the child's standard error, or a spawn failure.
    Stderr,
}

/// A single event forwarded to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub data: String,
}

impl RelayEvent {
    pub fn info(data: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Info,
            data: data.into(),
        }
    }

    pub fn stdout(data: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Stdout,
            data: data.into(),
        }
    }

    pub fn stderr(data: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Stderr,
            data: data.into(),
        }
    }

    /// Banner emitted once the process has been spawned.
    pub fn start_banner(command_line: &str) -> Self {
        Self::info(format!("▶ Running: {command_line}\n{}", rule()))
    }

    /// Banner emitted after the process exited and its output was drained.
    pub fn end_banner(exit_code: i32) -> Self {
        Self::info(format!(
            "{}\n✔ Process finished with code: {exit_code}",
            rule()
        ))
    }

    /// The single event reported when the executable could not be started.
    pub fn spawn_failure(reason: impl std::fmt::Display) -> Self {
        Self::stderr(format!("Failed to start executable: {reason}"))
    }

    /// Serialize to the JSON payload of a push-channel frame.
    pub fn to_json(&self) -> String {
        // Two string fields cannot fail to serialize.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Render the command line shown in the start banner.
///
/// Only the executable's file name is shown, followed by the arguments
/// joined with single spaces.
pub fn display_command_line(executable: &Path, args: &[String]) -> String {
    let name = executable
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| executable.display().to_string());

    if args.is_empty() {
        name
    } else {
        format!("{name} {}", args.join(" "))
    }
}

fn rule() -> String {
    "─".repeat(RULE_WIDTH)
}
