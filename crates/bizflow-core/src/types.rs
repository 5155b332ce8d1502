//! Agent data model shared across the workspace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One agent-tagged document as stored in the document database.
///
/// `content` holds the serialized step graph; the schedule fields are
/// mutated by the scheduler, `is_started` by user start/stop actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: String,
    pub name: String,
    /// Serialized graph: JSON object with `nodes` and `edges` arrays.
    pub content: String,
    /// Milliseconds between scheduled runs.
    pub period: Option<i64>,
    /// Scheduling enabled.
    pub is_started: bool,
    /// Execution in progress (persisted mutual-exclusion flag).
    pub is_running: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
}

/// Status snapshot of one registered agent, for external reporting.
#[derive(Debug, Clone, Serialize)]
pub struct AgentStatusView {
    pub id: String,
    pub name: String,
    pub is_started: bool,
    pub is_running: bool,
    pub period: Option<i64>,
    pub last_execution: Option<DateTime<Utc>>,
    pub next_execution: Option<DateTime<Utc>>,
    pub content: String,
}

/// Result of one full run of an agent's step sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub success: bool,
    /// Present iff the run failed.
    pub error: Option<String>,
}

impl RunOutcome {
    pub fn ok() -> Self {
        Self { success: true, error: None }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self { success: false, error: Some(error.into()) }
    }
}

/// One append-only log line emitted during a run.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub id: i64,
    pub agent_id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Response of the outbound HTTP collaborator. Never an error: transport
/// failures arrive as a synthetic status 500 with the failure text as data.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub data: String,
}

/// Outcome of a notification send. Never an error: failures are carried in
/// the outcome so the interpreter's control flow stays uniform.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub success: bool,
    pub error: Option<String>,
}

impl SendOutcome {
    pub fn ok() -> Self {
        Self { success: true, error: None }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self { success: false, error: Some(error.into()) }
    }
}
