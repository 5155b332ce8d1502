//! Agent wrapper: one long-lived handle per registered agent document.
//!
//! The registry keeps wrapper instances alive across reconciliations; only
//! the embedded record snapshot is replaced. Snapshots are copy-on-write
//! `Arc`s — a run keeps the snapshot it read at `execute()` time, so a
//! reconciliation landing mid-run cannot change the content under it.

use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bizflow_core::types::{AgentRecord, AgentStatusView, RunOutcome};

use crate::graph;
use crate::steps::StepRunner;

pub struct Agent {
    record: RwLock<Arc<AgentRecord>>,
    /// In-flight guard: true for the whole duration of exactly one run.
    executing: AtomicBool,
}

impl Agent {
    pub fn new(record: AgentRecord) -> Self {
        Self {
            record: RwLock::new(Arc::new(record)),
            executing: AtomicBool::new(false),
        }
    }

    fn snapshot(&self) -> Arc<AgentRecord> {
        self.record.read().expect("agent record lock poisoned").clone()
    }

    pub fn id(&self) -> String {
        self.snapshot().id.clone()
    }

    pub fn name(&self) -> String {
        self.snapshot().name.clone()
    }

    pub fn is_started(&self) -> bool {
        self.snapshot().is_started
    }

    pub fn period(&self) -> Option<i64> {
        self.snapshot().period
    }

    pub fn content(&self) -> String {
        self.snapshot().content.clone()
    }

    /// Whether a run is in flight right now. The engine owns execution, so
    /// this live guard — not the persisted flag — is the authoritative view.
    pub fn is_executing(&self) -> bool {
        self.executing.load(Ordering::SeqCst)
    }

    /// Combined status view for external reporting.
    pub fn status(&self) -> AgentStatusView {
        let record = self.snapshot();
        AgentStatusView {
            id: record.id.clone(),
            name: record.name.clone(),
            is_started: record.is_started,
            is_running: self.is_executing(),
            period: record.period,
            last_execution: record.last_run_at,
            next_execution: record.next_run_at,
            content: record.content.clone(),
        }
    }

    /// Swap in a fresh record snapshot. In-flight runs are unaffected.
    pub fn update_record(&self, record: AgentRecord) {
        *self.record.write().expect("agent record lock poisoned") = Arc::new(record);
    }

    /// Try to claim the single-flight guard. Returns false when a run is
    /// already in progress.
    pub(crate) fn begin_run(&self) -> bool {
        self.executing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub(crate) fn end_run(&self) {
        self.executing.store(false, Ordering::SeqCst);
    }

    /// Parse the current content and run it. Single-flight is the
    /// manager's job, not this method's.
    pub async fn execute(&self, runner: &StepRunner) -> RunOutcome {
        let record = self.snapshot();
        let steps = graph::parse_content(&record.content);
        runner.run(&record.id, &steps).await
    }
}
