//! Step interpreter.
//!
//! Runs an ordered step chain one node at a time; the first failure aborts
//! the run. Every outcome is a [`RunOutcome`] — the interpreter never
//! returns an error to its caller.
//!
//! Progress lines go through the document store (and the event sink) before
//! each step acts. That is telemetry, not control flow: a failed log append
//! never affects the run.

use std::sync::Arc;

use bizflow_core::traits::{DocumentStore, HttpFetcher, Notifier};
use bizflow_core::types::RunOutcome;
use chrono::Utc;

use crate::events::{AgentEvent, EventBus};
use crate::graph::{self, Step, StepKind};

const LOG_TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S";

/// Executes step chains against the collaborator seams.
pub struct StepRunner {
    http: Arc<dyn HttpFetcher>,
    mailer: Arc<dyn Notifier>,
    store: Arc<dyn DocumentStore>,
    events: EventBus,
}

impl StepRunner {
    pub fn new(
        http: Arc<dyn HttpFetcher>,
        mailer: Arc<dyn Notifier>,
        store: Arc<dyn DocumentStore>,
        events: EventBus,
    ) -> Self {
        Self { http, mailer, store, events }
    }

    /// Append a timestamped progress line to the agent's log, best effort.
    pub(crate) async fn log(&self, agent_id: &str, text: &str) {
        let line = format!("[{}] {text}", Utc::now().format(LOG_TIMESTAMP));
        match self.store.append_log(agent_id, &line).await {
            Ok(Some(entry)) => self.events.publish(AgentEvent::log(agent_id, entry.text)),
            Ok(None) => {}
            Err(e) => tracing::debug!("Log append failed for agent {agent_id}: {e}"),
        }
    }

    /// Run the chain sequentially, stopping at the first failure.
    pub async fn run(&self, agent_id: &str, steps: &[Step]) -> RunOutcome {
        for step in steps {
            match &step.kind {
                StepKind::Request { url, body, continue_status, abort_status } => {
                    if url.is_empty() {
                        return RunOutcome::fail("Request step is missing a URL");
                    }
                    self.log(agent_id, &format!("Sending request to {url}...")).await;

                    let response = if body.is_empty() {
                        self.http.get(url).await
                    } else {
                        self.http.post(url, body).await
                    };

                    if response.status == *continue_status {
                        continue;
                    }
                    if response.status == *abort_status {
                        return RunOutcome::fail(format!(
                            "Request to {url} failed with status {}",
                            response.status
                        ));
                    }
                    // Status matched neither sentinel: note it and move on.
                    self.log(
                        agent_id,
                        &format!(
                            "Request to {url} returned unexpected status {}, continuing",
                            response.status
                        ),
                    )
                    .await;
                }
                StepKind::Email { to, text } => {
                    if to.is_empty() {
                        return RunOutcome::fail("Email step is missing a recipient");
                    }
                    self.log(agent_id, &format!("Sending email to {to}...")).await;

                    let outcome = self.mailer.send_email(to, text).await;
                    if !outcome.success {
                        return RunOutcome::fail(
                            outcome.error.unwrap_or_else(|| "Email send failed".into()),
                        );
                    }
                }
                StepKind::Delay { value, unit } => {
                    let ms = graph::to_milliseconds(*value, *unit);
                    if ms == 0 {
                        continue;
                    }
                    self.log(agent_id, &format!("Waiting {} sec...", ms / 1000)).await;
                    tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
                }
                StepKind::Other => {}
            }
        }
        RunOutcome::ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::DelayUnit;
    use crate::testing::{MockHttp, MockNotifier, MockStore};

    fn runner(
        http: Arc<MockHttp>,
        mailer: Arc<MockNotifier>,
        store: Arc<MockStore>,
    ) -> StepRunner {
        StepRunner::new(http, mailer, store, EventBus::new(16))
    }

    fn request(url: &str, body: &str) -> Step {
        Step {
            id: "r".into(),
            kind: StepKind::Request {
                url: url.into(),
                body: body.into(),
                continue_status: 200,
                abort_status: 500,
            },
        }
    }

    fn email(to: &str) -> Step {
        Step { id: "m".into(), kind: StepKind::Email { to: to.into(), text: "done".into() } }
    }

    #[tokio::test]
    async fn request_with_continue_status_succeeds() {
        let http = Arc::new(MockHttp::new());
        http.respond("http://svc/ping", 200);
        let store = MockStore::with(vec![crate::testing::record("a1", "{}")]);
        let result = runner(http.clone(), Arc::new(MockNotifier::default()), store)
            .run("a1", &[request("http://svc/ping", "")])
            .await;
        assert!(result.success);
        assert_eq!(http.calls(), [("GET".to_string(), "http://svc/ping".to_string())]);
    }

    #[tokio::test]
    async fn request_with_abort_status_fails_naming_it() {
        let http = Arc::new(MockHttp::new());
        http.respond("http://svc/ping", 500);
        let store = MockStore::with(vec![crate::testing::record("a1", "{}")]);
        let result = runner(http, Arc::new(MockNotifier::default()), store)
            .run("a1", &[request("http://svc/ping", "")])
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("500"));
    }

    #[tokio::test]
    async fn request_without_url_fails_before_any_call() {
        let http = Arc::new(MockHttp::new());
        let store = MockStore::with(vec![crate::testing::record("a1", "{}")]);
        let result = runner(http.clone(), Arc::new(MockNotifier::default()), store)
            .run("a1", &[request("", "")])
            .await;
        assert!(!result.success);
        assert!(http.calls().is_empty());
    }

    #[tokio::test]
    async fn request_with_body_uses_post() {
        let http = Arc::new(MockHttp::new());
        http.respond("http://svc/hook", 200);
        let store = MockStore::with(vec![crate::testing::record("a1", "{}")]);
        let result = runner(http.clone(), Arc::new(MockNotifier::default()), store)
            .run("a1", &[request("http://svc/hook", r#"{"k": 1}"#)])
            .await;
        assert!(result.success);
        assert_eq!(http.calls()[0].0, "POST");
    }

    #[tokio::test]
    async fn unexpected_status_continues_to_next_step() {
        let http = Arc::new(MockHttp::new());
        http.respond("http://svc/ping", 404);
        let mailer = Arc::new(MockNotifier::default());
        let store = MockStore::with(vec![crate::testing::record("a1", "{}")]);
        let result = runner(http, mailer.clone(), store)
            .run("a1", &[request("http://svc/ping", ""), email("ops@example.com")])
            .await;
        assert!(result.success);
        assert_eq!(mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn email_without_recipient_fails_without_sending() {
        let mailer = Arc::new(MockNotifier::default());
        let store = MockStore::with(vec![crate::testing::record("a1", "{}")]);
        let result = runner(Arc::new(MockHttp::new()), mailer.clone(), store)
            .run("a1", &[email("")])
            .await;
        assert!(!result.success);
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn email_send_failure_aborts_with_collaborator_error() {
        let mailer = Arc::new(MockNotifier::default());
        mailer.fail_with("relay rejected");
        let store = MockStore::with(vec![crate::testing::record("a1", "{}")]);
        let result = runner(Arc::new(MockHttp::new()), mailer, store)
            .run("a1", &[email("ops@example.com")])
            .await;
        assert!(!result.success);
        assert_eq!(result.error.unwrap(), "relay rejected");
    }

    #[tokio::test]
    async fn failure_stops_later_steps() {
        let http = Arc::new(MockHttp::new());
        http.respond("http://svc/ping", 500);
        let mailer = Arc::new(MockNotifier::default());
        let store = MockStore::with(vec![crate::testing::record("a1", "{}")]);
        let result = runner(http, mailer.clone(), store)
            .run("a1", &[request("http://svc/ping", ""), email("ops@example.com")])
            .await;
        assert!(!result.success);
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn zero_delay_is_a_noop() {
        let store = MockStore::with(vec![crate::testing::record("a1", "{}")]);
        let steps = [Step {
            id: "d".into(),
            kind: StepKind::Delay { value: 0.0, unit: DelayUnit::Seconds },
        }];
        let result = runner(
            Arc::new(MockHttp::new()),
            Arc::new(MockNotifier::default()),
            store.clone(),
        )
        .run("a1", &steps)
        .await;
        assert!(result.success);
        // No "Waiting" line was logged for the skipped delay.
        assert!(store.log_lines("a1").iter().all(|l| !l.contains("Waiting")));
    }

    #[tokio::test(start_paused = true)]
    async fn delay_suspends_for_the_computed_duration() {
        let store = MockStore::with(vec![crate::testing::record("a1", "{}")]);
        let steps = [Step {
            id: "d".into(),
            kind: StepKind::Delay { value: 3.0, unit: DelayUnit::Seconds },
        }];
        let started = tokio::time::Instant::now();
        let result = runner(
            Arc::new(MockHttp::new()),
            Arc::new(MockNotifier::default()),
            store.clone(),
        )
        .run("a1", &steps)
        .await;
        assert!(result.success);
        assert!(started.elapsed() >= std::time::Duration::from_secs(3));
        assert!(store.log_lines("a1").iter().any(|l| l.contains("Waiting 3 sec")));
    }

    #[tokio::test]
    async fn steps_emit_log_lines_through_the_store() {
        let http = Arc::new(MockHttp::new());
        http.respond("http://svc/ping", 200);
        let store = MockStore::with(vec![crate::testing::record("a1", "{}")]);
        runner(http, Arc::new(MockNotifier::default()), store.clone())
            .run("a1", &[request("http://svc/ping", "")])
            .await;
        let lines = store.log_lines("a1");
        assert!(lines.iter().any(|l| l.contains("Sending request to http://svc/ping")));
    }
}
