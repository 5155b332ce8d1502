//! Collaborator traits the agent engine is written against.
//!
//! The engine only ever sees these seams; the concrete implementations live
//! in `bizflow-store` (SQLite), `bizflow-channels` (SMTP), and the engine's
//! own reqwest wrapper. Tests substitute in-memory doubles.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{AgentRecord, HttpResponse, LogEntry, SendOutcome};

/// Read/write access to agent-tagged documents and their run logs.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// All documents tagged as agents, started or not.
    async fn list_agent_documents(&self) -> Result<Vec<AgentRecord>>;

    async fn get_document(&self, id: &str) -> Result<Option<AgentRecord>>;

    /// Persist the execution-in-progress flag.
    async fn set_running(&self, id: &str, running: bool) -> Result<()>;

    /// Persist the scheduling-enabled flag.
    async fn set_started(&self, id: &str, started: bool) -> Result<()>;

    /// Set `last_run_at` to now; returns the stored timestamp.
    async fn set_last_run_at(&self, id: &str) -> Result<DateTime<Utc>>;

    /// Recompute `next_run_at` as last-run + period (last-run defaults to
    /// now when unset, an absent period counts as zero).
    async fn set_next_run_at(&self, id: &str) -> Result<DateTime<Utc>>;

    /// Append one human-readable progress line to the agent's log. Returns
    /// `None` when the agent document no longer exists.
    async fn append_log(&self, id: &str, text: &str) -> Result<Option<LogEntry>>;
}

/// Delivers email notifications for `condition` steps.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_email(&self, to: &str, body: &str) -> SendOutcome;
}

/// Performs the agent's own HTTP steps. Implementations must not fail:
/// transport errors surface as a synthetic status-500 response.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    async fn get(&self, url: &str) -> HttpResponse;
    async fn post(&self, url: &str, body: &str) -> HttpResponse;
}
