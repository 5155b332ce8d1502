//! In-memory collaborator doubles shared by the engine's tests.

use async_trait::async_trait;
use bizflow_core::error::{BizflowError, Result};
use bizflow_core::traits::{DocumentStore, HttpFetcher, Notifier};
use bizflow_core::types::{AgentRecord, HttpResponse, LogEntry, SendOutcome};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// A started agent record with a one-minute period.
pub fn record(id: &str, content: &str) -> AgentRecord {
    AgentRecord {
        id: id.to_string(),
        name: format!("agent-{id}"),
        content: content.to_string(),
        period: Some(60_000),
        is_started: true,
        is_running: false,
        last_run_at: None,
        next_run_at: None,
    }
}

#[derive(Default)]
pub struct MockStore {
    docs: Mutex<HashMap<String, AgentRecord>>,
    logs: Mutex<Vec<(String, String)>>,
}

impl MockStore {
    pub fn with(records: Vec<AgentRecord>) -> Arc<Self> {
        let store = Self::default();
        {
            let mut docs = store.docs.lock().unwrap();
            for r in records {
                docs.insert(r.id.clone(), r);
            }
        }
        Arc::new(store)
    }

    pub fn insert(&self, record: AgentRecord) {
        self.docs.lock().unwrap().insert(record.id.clone(), record);
    }

    pub fn remove(&self, id: &str) {
        self.docs.lock().unwrap().remove(id);
    }

    pub fn get(&self, id: &str) -> Option<AgentRecord> {
        self.docs.lock().unwrap().get(id).cloned()
    }

    pub fn log_lines(&self, id: &str) -> Vec<String> {
        self.logs
            .lock()
            .unwrap()
            .iter()
            .filter(|(agent, _)| agent == id)
            .map(|(_, text)| text.clone())
            .collect()
    }

    fn update<F>(&self, id: &str, f: F) -> Result<AgentRecord>
    where
        F: FnOnce(&mut AgentRecord),
    {
        let mut docs = self.docs.lock().unwrap();
        let doc = docs
            .get_mut(id)
            .ok_or_else(|| BizflowError::Store(format!("No document {id}")))?;
        f(doc);
        Ok(doc.clone())
    }
}

#[async_trait]
impl DocumentStore for MockStore {
    async fn list_agent_documents(&self) -> Result<Vec<AgentRecord>> {
        Ok(self.docs.lock().unwrap().values().cloned().collect())
    }

    async fn get_document(&self, id: &str) -> Result<Option<AgentRecord>> {
        Ok(self.get(id))
    }

    async fn set_running(&self, id: &str, running: bool) -> Result<()> {
        self.update(id, |doc| doc.is_running = running).map(|_| ())
    }

    async fn set_started(&self, id: &str, started: bool) -> Result<()> {
        self.update(id, |doc| doc.is_started = started).map(|_| ())
    }

    async fn set_last_run_at(&self, id: &str) -> Result<DateTime<Utc>> {
        let now = Utc::now();
        self.update(id, |doc| doc.last_run_at = Some(now))?;
        Ok(now)
    }

    async fn set_next_run_at(&self, id: &str) -> Result<DateTime<Utc>> {
        let updated = self.update(id, |doc| {
            let last = doc.last_run_at.unwrap_or_else(Utc::now);
            doc.next_run_at = Some(last + Duration::milliseconds(doc.period.unwrap_or(0)));
        })?;
        Ok(updated.next_run_at.unwrap())
    }

    async fn append_log(&self, id: &str, text: &str) -> Result<Option<LogEntry>> {
        if self.get(id).is_none() {
            return Ok(None);
        }
        let mut logs = self.logs.lock().unwrap();
        logs.push((id.to_string(), text.to_string()));
        Ok(Some(LogEntry {
            id: logs.len() as i64,
            agent_id: id.to_string(),
            text: text.to_string(),
            created_at: Utc::now(),
        }))
    }
}

#[derive(Default)]
pub struct MockHttp {
    statuses: Mutex<HashMap<String, u16>>,
    calls: Mutex<Vec<(String, String)>>,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl MockHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, status: u16) {
        self.statuses.lock().unwrap().insert(url.to_string(), status);
    }

    /// Make every request suspend until the given handle is notified.
    pub fn hold(&self, gate: Arc<Notify>) {
        *self.gate.lock().unwrap() = Some(gate);
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    async fn fetch(&self, method: &str, url: &str) -> HttpResponse {
        self.calls.lock().unwrap().push((method.to_string(), url.to_string()));
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let status = self.statuses.lock().unwrap().get(url).copied().unwrap_or(200);
        HttpResponse { status, data: String::new() }
    }
}

#[async_trait]
impl HttpFetcher for MockHttp {
    async fn get(&self, url: &str) -> HttpResponse {
        self.fetch("GET", url).await
    }

    async fn post(&self, url: &str, _body: &str) -> HttpResponse {
        self.fetch("POST", url).await
    }
}

#[derive(Default)]
pub struct MockNotifier {
    sent: Mutex<Vec<(String, String)>>,
    failure: Mutex<Option<String>>,
}

impl MockNotifier {
    pub fn fail_with(&self, error: &str) {
        *self.failure.lock().unwrap() = Some(error.to_string());
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send_email(&self, to: &str, body: &str) -> SendOutcome {
        if let Some(error) = self.failure.lock().unwrap().clone() {
            return SendOutcome::fail(error);
        }
        self.sent.lock().unwrap().push((to.to_string(), body.to_string()));
        SendOutcome::ok()
    }
}
