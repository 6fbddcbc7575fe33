//! Type definitions for agent records.
//!
//! These types form the shared vocabulary between the [`super::Agent`] model,
//! the [`crate::registry::Registry`] and the message fabric in
//! [`crate::orchestration`]. Everything here round-trips through JSON.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for an agent (`agent-<uuid>`).
pub type AgentId = String;

/// Open key/value bag used for agent config and message payloads.
pub type Attributes = BTreeMap<String, AttrValue>;

/// A single value inside an [`Attributes`] bag.
///
/// Serialized untagged, so `{"port": 8080, "debug": true}` reads back as
/// `Integer(8080)` and `Bool(true)`. Variant order matters for decoding:
/// signed integers are tried first, then unsigned ones above `i64::MAX`, then
/// floats. Non-finite floats have no JSON form and are rejected before
/// anything is persisted (see [`find_non_finite`]).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Integer(i64),
    UInteger(u64),
    Float(f64),
    String(String),
    List(Vec<AttrValue>),
    Map(Attributes),
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<u64> for AttrValue {
    fn from(value: u64) -> Self {
        i64::try_from(value).map_or(Self::UInteger(value), Self::Integer)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// Path of the first NaN or infinite float in `attrs`, such as
/// `limits.ratio` or `weights[2]`. `None` when every value can be written as
/// JSON.
pub fn find_non_finite(attrs: &Attributes) -> Option<String> {
    attrs
        .iter()
        .find_map(|(key, value)| non_finite_in(value, key.clone()))
}

fn non_finite_in(value: &AttrValue, path: String) -> Option<String> {
    match value {
        AttrValue::Float(f) if !f.is_finite() => Some(path),
        AttrValue::List(items) => items
            .iter()
            .enumerate()
            .find_map(|(i, item)| non_finite_in(item, format!("{path}[{i}]"))),
        AttrValue::Map(inner) => inner
            .iter()
            .find_map(|(key, item)| non_finite_in(item, format!("{path}.{key}"))),
        _ => None,
    }
}

/// Role of a cognitive agent.
///
/// The built-in roles cover the usual cognitive architecture components.
/// Anything else is kept verbatim in [`AgentType::Other`] so user-defined
/// types survive a save/load cycle.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AgentType {
    AtomSpace,
    Pln,
    Ecan,
    OpenPsi,
    PatternMiner,
    MetaLearning,
    Reflection,
    Orchestrator,
    Broker,
    Custom,
    Other(String),
}

impl AgentType {
    /// All built-in roles, in display order.
    pub const BUILTIN: [AgentType; 10] = [
        AgentType::AtomSpace,
        AgentType::Pln,
        AgentType::Ecan,
        AgentType::OpenPsi,
        AgentType::PatternMiner,
        AgentType::MetaLearning,
        AgentType::Reflection,
        AgentType::Orchestrator,
        AgentType::Broker,
        AgentType::Custom,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            AgentType::AtomSpace => "atomspace",
            AgentType::Pln => "pln",
            AgentType::Ecan => "ecan",
            AgentType::OpenPsi => "openpsi",
            AgentType::PatternMiner => "patternminer",
            AgentType::MetaLearning => "metalearning",
            AgentType::Reflection => "reflection",
            AgentType::Orchestrator => "orchestrator",
            AgentType::Broker => "broker",
            AgentType::Custom => "custom",
            AgentType::Other(name) => name,
        }
    }

    /// Short human-readable description of the role.
    pub fn description(&self) -> &str {
        match self {
            AgentType::AtomSpace => "Knowledge representation and storage",
            AgentType::Pln => "Probabilistic Logic Networks reasoning",
            AgentType::Ecan => "Economic Attention Networks",
            AgentType::OpenPsi => "Goal-driven behavior",
            AgentType::PatternMiner => "Pattern mining and discovery",
            AgentType::MetaLearning => "Meta-learning and optimization",
            AgentType::Reflection => "Self-reflection and monitoring",
            AgentType::Orchestrator => "Multi-agent coordination",
            AgentType::Broker => "Message routing and coordination",
            AgentType::Custom => "User-defined agents",
            AgentType::Other(_) => "User-defined agent type",
        }
    }

    /// True when the type carries no name at all (an empty `Other`).
    pub fn is_blank(&self) -> bool {
        matches!(self, AgentType::Other(name) if name.trim().is_empty())
    }
}

impl From<String> for AgentType {
    fn from(value: String) -> Self {
        Self::BUILTIN
            .iter()
            .find(|t| t.as_str() == value)
            .cloned()
            .unwrap_or(AgentType::Other(value))
    }
}

impl From<AgentType> for String {
    fn from(value: AgentType) -> Self {
        match value {
            AgentType::Other(name) => name,
            builtin => builtin.as_str().to_string(),
        }
    }
}

impl FromStr for AgentType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(AgentType::from(s.to_string()))
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of an agent.
///
/// Canonical flow is `Created -> Starting -> Running -> Paused -> Stopping ->
/// Stopped`, with `Error` reachable from any non-terminal state. The model
/// does not police transitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Created,
    Starting,
    Running,
    Paused,
    Stopping,
    Stopped,
    Error,
}

impl AgentStatus {
    pub const ALL: [AgentStatus; 7] = [
        AgentStatus::Created,
        AgentStatus::Starting,
        AgentStatus::Running,
        AgentStatus::Paused,
        AgentStatus::Stopping,
        AgentStatus::Stopped,
        AgentStatus::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Created => "created",
            AgentStatus::Starting => "starting",
            AgentStatus::Running => "running",
            AgentStatus::Paused => "paused",
            AgentStatus::Stopping => "stopping",
            AgentStatus::Stopped => "stopped",
            AgentStatus::Error => "error",
        }
    }

    /// `Stopped` is the only terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentStatus::Stopped)
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.into_iter().map(|s| s.as_str()).collect();
                format!("unknown status '{s}' (expected one of: {})", known.join(", "))
            })
    }
}

/// Performance and health metrics reported for an agent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentMetrics {
    pub cpu_usage: f64,
    pub memory_usage: i64,
    pub request_count: i64,
    pub error_count: i64,
    pub last_heartbeat: DateTime<Utc>,
    /// Seconds since the agent was last started.
    pub uptime: i64,
}

impl AgentMetrics {
    /// Fresh metrics with only the heartbeat set.
    pub fn with_heartbeat(at: DateTime<Utc>) -> Self {
        Self {
            cpu_usage: 0.0,
            memory_usage: 0,
            request_count: 0,
            error_count: 0,
            last_heartbeat: at,
            uptime: 0,
        }
    }
}
