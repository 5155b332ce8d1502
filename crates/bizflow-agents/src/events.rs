//! Real-time run events for live observers.
//!
//! Best-effort by contract: publishing with no subscriber is a no-op, and a
//! lagging subscriber only loses its own backlog. Run correctness never
//! depends on anyone listening.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

/// One progress event for a single agent.
#[derive(Debug, Clone, Serialize)]
pub struct AgentEvent {
    pub agent_id: String,
    #[serde(flatten)]
    pub kind: AgentEventKind,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEventKind {
    Log { text: String },
    RunStarted,
    RunSucceeded,
    RunFailed { error: String },
}

impl AgentEvent {
    fn new(agent_id: &str, kind: AgentEventKind) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            kind,
            timestamp: Utc::now(),
        }
    }

    pub fn log(agent_id: &str, text: impl Into<String>) -> Self {
        Self::new(agent_id, AgentEventKind::Log { text: text.into() })
    }

    pub fn run_started(agent_id: &str) -> Self {
        Self::new(agent_id, AgentEventKind::RunStarted)
    }

    pub fn run_succeeded(agent_id: &str) -> Self {
        Self::new(agent_id, AgentEventKind::RunSucceeded)
    }

    pub fn run_failed(agent_id: &str, error: impl Into<String>) -> Self {
        Self::new(agent_id, AgentEventKind::RunFailed { error: error.into() })
    }
}

/// Broadcast sink for agent events.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AgentEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.tx.subscribe()
    }

    /// Publish an event; silently dropped when nobody is subscribed.
    pub fn publish(&self, event: AgentEvent) {
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_without_subscribers_is_a_noop() {
        let bus = EventBus::new(8);
        bus.publish(AgentEvent::run_started("a1"));
    }

    #[tokio::test]
    async fn subscribers_receive_events() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        bus.publish(AgentEvent::run_failed("a1", "boom"));
        let event = rx.recv().await.unwrap();
        assert_eq!(event.agent_id, "a1");
        assert!(matches!(event.kind, AgentEventKind::RunFailed { ref error } if error == "boom"));
    }
}
