//! Graph parsing and linearization.
//!
//! A document's `content` is a JSON object with `nodes` and `edges` arrays.
//! The edge set is expected to describe a single path; this module finds the
//! start node, walks the chain, and decodes each node into a typed [`Step`]
//! once, so the interpreter never touches loose JSON fields.
//!
//! Parsing fails open: malformed content yields an empty step sequence, a
//! no-op run, never an error back to the scheduler.

use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// One executable unit of an agent's chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub id: String,
    pub kind: StepKind,
}

/// What a step does, decoded at parse time.
#[derive(Debug, Clone, PartialEq)]
pub enum StepKind {
    /// HTTP call: GET, or POST when `body` is non-empty.
    Request {
        url: String,
        body: String,
        continue_status: u16,
        abort_status: u16,
    },
    /// Email notification (stored node type: `condition`).
    Email { to: String, text: String },
    /// Pause before the next step (stored node type: `middle-process`).
    Delay { value: f64, unit: DelayUnit },
    /// Unrecognized node type: no-op.
    Other,
}

/// Unit of a delay step's value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DelayUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
    /// No recognized unit: the value is already milliseconds.
    Milliseconds,
}

impl DelayUnit {
    fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("seconds") => Self::Seconds,
            Some("minutes") => Self::Minutes,
            Some("hours") => Self::Hours,
            Some("days") => Self::Days,
            _ => Self::Milliseconds,
        }
    }
}

/// Convert a delay value to milliseconds.
pub fn to_milliseconds(value: f64, unit: DelayUnit) -> u64 {
    let ms = match unit {
        DelayUnit::Seconds => value * 1000.0,
        DelayUnit::Minutes => value * 1000.0 * 60.0,
        DelayUnit::Hours => value * 1000.0 * 60.0 * 60.0,
        DelayUnit::Days => value * 1000.0 * 60.0 * 60.0 * 24.0,
        DelayUnit::Milliseconds => value,
    };
    if ms.is_finite() && ms > 0.0 { ms as u64 } else { 0 }
}

#[derive(Debug, Deserialize)]
struct RawContent {
    nodes: Option<Vec<RawNode>>,
    edges: Option<Vec<RawEdge>>,
}

#[derive(Debug, Deserialize)]
struct RawNode {
    id: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct RawEdge {
    source: String,
    target: String,
}

/// Parse a document's content into the ordered step sequence to execute.
/// Any malformed input produces an empty sequence.
pub fn parse_content(content: &str) -> Vec<Step> {
    let raw: RawContent = match serde_json::from_str(content) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::debug!("Unparseable agent content: {e}");
            return Vec::new();
        }
    };
    let (Some(nodes), Some(edges)) = (raw.nodes, raw.edges) else {
        tracing::debug!("Agent content is missing nodes or edges");
        return Vec::new();
    };

    let order = linearize(&edges);
    if order.is_empty() {
        return Vec::new();
    }

    let by_id: HashMap<&str, &RawNode> = nodes.iter().map(|n| (n.id.as_str(), n)).collect();
    order
        .iter()
        .filter_map(|id| by_id.get(id.as_str()))
        .map(|node| Step { id: node.id.clone(), kind: decode(node) })
        .collect()
}

/// Order the node ids described by an edge set.
///
/// The start node is the one source that never appears as a target; from it
/// the unique outgoing edge is followed until the chain ends or would
/// revisit a node. When no start exists (cycle, malformed input) the result
/// degrades to every distinct id referenced by the edges, in first-mention
/// order. Empty input gives an empty order.
fn linearize(edges: &[RawEdge]) -> Vec<String> {
    if edges.is_empty() {
        return Vec::new();
    }

    let targets: HashSet<&str> = edges.iter().map(|e| e.target.as_str()).collect();
    let next_of: HashMap<&str, &str> = edges
        .iter()
        .map(|e| (e.source.as_str(), e.target.as_str()))
        .collect();

    let Some(start) = edges
        .iter()
        .find(|e| !targets.contains(e.source.as_str()))
        .map(|e| e.source.clone())
    else {
        let mut seen = HashSet::new();
        let mut all = Vec::new();
        for edge in edges {
            for id in [edge.source.as_str(), edge.target.as_str()] {
                if seen.insert(id) {
                    all.push(id.to_string());
                }
            }
        }
        return all;
    };

    let mut result = vec![start.clone()];
    let mut current = start;
    while let Some(&next) = next_of.get(current.as_str()) {
        if result.iter().any(|id| id.as_str() == next) {
            break;
        }
        result.push(next.to_string());
        current = next.to_string();
    }
    result
}

/// Decode one node's loose `data` object into a typed step.
fn decode(node: &RawNode) -> StepKind {
    let data = &node.data;
    match node.kind.as_str() {
        "request" => StepKind::Request {
            url: str_field(data, "url"),
            body: str_field(data, "body"),
            continue_status: status_field(data, "continueStatus", 200),
            abort_status: status_field(data, "abortStatus", 500),
        },
        "condition" => StepKind::Email {
            to: str_field(data, "to"),
            text: str_field(data, "text"),
        },
        "middle-process" => StepKind::Delay {
            value: num_field(data, "value"),
            unit: DelayUnit::parse(data.get("type").and_then(Value::as_str)),
        },
        _ => StepKind::Other,
    }
}

fn str_field(data: &Value, key: &str) -> String {
    data.get(key).and_then(Value::as_str).unwrap_or("").to_string()
}

/// Numeric field that may arrive as a JSON number or a numeric string.
fn num_field(data: &Value, key: &str) -> f64 {
    match data.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn status_field(data: &Value, key: &str, default: u16) -> u16 {
    let n = num_field(data, key);
    if n >= 100.0 && n <= 999.0 { n as u16 } else { default }
}
