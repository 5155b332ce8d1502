//! Agent registry and scheduler.
//!
//! `AgentManager` owns the in-memory set of agent wrappers and two periodic
//! loops: a scheduling tick that fires due agents and a reconciliation tick
//! that keeps the registry in sync with the document store, so externally
//! created, deleted, or toggled agents become visible without a restart.
//!
//! Execution is serialized per agent id: the guarded path claims the
//! wrapper's atomic in-flight guard before touching anything, and a second
//! trigger for the same agent is a no-op while the first is in flight.
//! Distinct agents overlap freely — dispatch from the tick is
//! fire-and-forget.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex};

use bizflow_core::config::SchedulerConfig;
use bizflow_core::traits::{DocumentStore, HttpFetcher, Notifier};
use bizflow_core::types::AgentStatusView;
use chrono::Utc;
use tokio::sync::{RwLock, broadcast};
use tokio::task::JoinHandle;

use crate::agent::Agent;
use crate::events::{AgentEvent, EventBus};
use crate::steps::StepRunner;

/// Handle to the agent engine. Cheap to clone; all clones share one
/// registry. Constructed explicitly by the process entry point and passed
/// to whatever needs to trigger or query agents.
#[derive(Clone)]
pub struct AgentManager {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn DocumentStore>,
    runner: StepRunner,
    events: EventBus,
    agents: RwLock<HashMap<String, Arc<Agent>>>,
    tick_secs: u64,
    reconcile_secs: u64,
    loops: StdMutex<Vec<JoinHandle<()>>>,
}

impl AgentManager {
    pub fn new(
        config: &SchedulerConfig,
        store: Arc<dyn DocumentStore>,
        http: Arc<dyn HttpFetcher>,
        mailer: Arc<dyn Notifier>,
    ) -> Self {
        let events = EventBus::new(config.event_buffer);
        let runner = StepRunner::new(http, mailer, store.clone(), events.clone());
        Self {
            inner: Arc::new(Inner {
                store,
                runner,
                events,
                agents: RwLock::new(HashMap::new()),
                tick_secs: config.tick_secs.max(1),
                reconcile_secs: config.reconcile_secs.max(1),
                loops: StdMutex::new(Vec::new()),
            }),
        }
    }

    /// Load all agent documents and start the scheduling and reconciliation
    /// loops. Each loop fires one full period after startup.
    pub async fn initialize(&self) {
        self.inner.reconcile().await;
        let count = self.inner.agents.read().await.len();
        tracing::info!("Loaded {count} agents");

        let inner = self.inner.clone();
        let scheduler = tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(inner.tick_secs));
            interval.tick().await; // immediate first tick
            loop {
                interval.tick().await;
                Inner::check_due_agents(&inner).await;
            }
        });

        let inner = self.inner.clone();
        let reconciler = tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(inner.reconcile_secs));
            interval.tick().await;
            loop {
                interval.tick().await;
                inner.reconcile().await;
            }
        });

        self.inner.loops.lock().unwrap().extend([scheduler, reconciler]);
        tracing::info!(
            "⏰ Agent manager started (tick {}s, reconcile {}s)",
            self.inner.tick_secs,
            self.inner.reconcile_secs
        );
    }

    /// Stop both loops and clear the registry. Safe to call repeatedly.
    pub async fn shutdown(&self) {
        for handle in self.inner.loops.lock().unwrap().drain(..) {
            handle.abort();
        }
        self.inner.agents.write().await.clear();
        tracing::info!("Agent manager shutdown");
    }

    /// Enable scheduling for an agent. False when the agent is unknown or
    /// the store rejects the update.
    pub async fn start_agent(&self, id: &str) -> bool {
        self.inner.toggle_started(id, true).await
    }

    /// Disable scheduling for an agent.
    pub async fn stop_agent(&self, id: &str) -> bool {
        self.inner.toggle_started(id, false).await
    }

    /// Run an agent immediately, regardless of due-ness. Returns false when
    /// the agent is unknown or already running. With `one_shot` the
    /// recurring schedule timestamps are left untouched.
    pub async fn execute_agent(&self, id: &str, one_shot: bool) -> bool {
        self.inner.execute_guarded(id, one_shot).await
    }

    /// Status view of every registered agent.
    pub async fn agents_status(&self) -> Vec<AgentStatusView> {
        self.inner
            .agents
            .read()
            .await
            .values()
            .map(|agent| agent.status())
            .collect()
    }

    pub async fn is_agent_executing(&self, id: &str) -> bool {
        self.inner
            .agents
            .read()
            .await
            .get(id)
            .map(|agent| agent.is_executing())
            .unwrap_or(false)
    }

    pub async fn get_agent(&self, id: &str) -> Option<Arc<Agent>> {
        self.inner.agents.read().await.get(id).cloned()
    }

    /// Subscribe to the real-time run event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.inner.events.subscribe()
    }
}

impl Inner {
    /// One scheduling pass: fire every started, idle, due agent.
    /// Dispatch is non-blocking — the tick never waits on a run.
    async fn check_due_agents(inner: &Arc<Inner>) {
        let now = Utc::now();
        let agents: Vec<Arc<Agent>> = inner.agents.read().await.values().cloned().collect();
        for agent in agents {
            let status = agent.status();
            if !status.is_started || status.is_running {
                continue;
            }
            if status.next_execution.is_some_and(|next| next > now) {
                continue;
            }
            tracing::info!("⏰ Scheduler: executing agent {}", status.name);
            let inner = Arc::clone(inner);
            let id = status.id.clone();
            tokio::spawn(async move {
                inner.execute_guarded(&id, false).await;
            });
        }
    }

    /// One reconciliation pass: upsert wrappers for every stored agent
    /// document, then drop wrappers whose document disappeared. Store
    /// errors are logged and retried on the next tick.
    async fn reconcile(&self) {
        let records = match self.store.list_agent_documents().await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!("⚠️ Failed to load agent documents: {e}");
                return;
            }
        };

        let mut agents = self.agents.write().await;
        for record in &records {
            match agents.get(&record.id) {
                Some(agent) => agent.update_record(record.clone()),
                None => {
                    tracing::info!("Registered agent: {} ({})", record.name, record.id);
                    agents.insert(record.id.clone(), Arc::new(Agent::new(record.clone())));
                }
            }
        }

        let current: HashSet<&str> = records.iter().map(|r| r.id.as_str()).collect();
        agents.retain(|id, agent| {
            let keep = current.contains(id.as_str());
            if !keep {
                tracing::info!("Removed agent: {}", agent.name());
            }
            keep
        });
    }

    async fn toggle_started(&self, id: &str, started: bool) -> bool {
        let agent = self.agents.read().await.get(id).cloned();
        let Some(agent) = agent else {
            tracing::debug!("Agent {id} not found");
            return false;
        };
        if let Err(e) = self.store.set_started(id, started).await {
            tracing::warn!("⚠️ Failed to toggle agent {id}: {e}");
            return false;
        }
        if let Ok(Some(updated)) = self.store.get_document(id).await {
            agent.update_record(updated);
        }
        true
    }

    /// The guarded execution path. At most one run per agent id can pass
    /// the guard; everything after the guard is claimed runs to the
    /// unconditional cleanup at the bottom.
    async fn execute_guarded(&self, id: &str, one_shot: bool) -> bool {
        let agent = self.agents.read().await.get(id).cloned();
        let Some(agent) = agent else {
            tracing::debug!("Agent {id} not found");
            return false;
        };
        if !agent.begin_run() {
            tracing::debug!("Agent {} is already running, trigger skipped", agent.name());
            return false;
        }

        // The backing document can vanish between reconciliations.
        match self.store.get_document(id).await {
            Ok(Some(_)) => {}
            _ => {
                agent.end_run();
                return false;
            }
        }

        if let Err(e) = self.store.set_running(id, true).await {
            tracing::warn!("⚠️ Failed to mark agent {id} as running: {e}");
            agent.end_run();
            return false;
        }

        let name = agent.name();
        self.events.publish(AgentEvent::run_started(id));
        self.runner
            .log(id, &format!("-------- ⚙️ Executing agent {name} --------"))
            .await;

        let result = agent.execute(&self.runner).await;

        if result.success {
            self.runner
                .log(id, &format!("-------- ✅ Agent {name} executed successfully --------"))
                .await;
            self.events.publish(AgentEvent::run_succeeded(id));
        } else {
            let error = result.error.unwrap_or_default();
            self.runner
                .log(id, &format!("-------- ⛔ Agent {name} failed --------\n{error}"))
                .await;
            self.events.publish(AgentEvent::run_failed(id, error));
        }

        if !one_shot {
            if let Err(e) = self.store.set_last_run_at(id).await {
                tracing::warn!("⚠️ Failed to update last run for agent {id}: {e}");
            }
            if let Err(e) = self.store.set_next_run_at(id).await {
                tracing::warn!("⚠️ Failed to update next run for agent {id}: {e}");
            }
        }

        match self.store.get_document(id).await {
            Ok(Some(updated)) => agent.update_record(updated),
            Ok(None) => {}
            Err(e) => tracing::warn!("⚠️ Failed to refresh agent {id}: {e}"),
        }

        // Unconditional cleanup: persisted flag and guard always clear.
        if let Err(e) = self.store.set_running(id, false).await {
            tracing::warn!("⚠️ Failed to clear running flag for agent {id}: {e}");
        }
        agent.end_run();
        true
    }
}
