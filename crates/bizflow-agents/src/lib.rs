//! # Bizflow Agents
//!
//! The agent scheduling and execution engine. Documents tagged as agents
//! carry a step graph (HTTP calls, email notifications, delays); this crate
//! discovers them, decides when each should fire, and executes their steps
//! with at most one run per agent at a time.
//!
//! ## Architecture
//! ```text
//! AgentManager
//!   ├── scheduling tick (60s)   → due agents → guarded execution
//!   ├── reconcile tick  (30s)   → registry ⟷ document store
//!   └── guarded execution
//!         ├── Agent wrapper (copy-on-write record snapshot)
//!         ├── graph::parse_content → ordered Step chain
//!         ├── StepRunner → request / email / delay steps
//!         └── events → broadcast sink for live observers
//! ```

pub mod agent;
pub mod events;
pub mod graph;
pub mod http;
pub mod manager;
pub mod steps;

#[cfg(test)]
pub(crate) mod testing;

pub use agent::Agent;
pub use events::{AgentEvent, AgentEventKind, EventBus};
pub use graph::{DelayUnit, Step, StepKind};
pub use http::ReqwestFetcher;
pub use manager::AgentManager;
pub use steps::StepRunner;
