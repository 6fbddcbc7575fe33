use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::{AgentId, AgentMetrics, AgentStatus, AgentType, Attributes, find_non_finite};
use crate::error::AgentError;

/// Options for creating an agent. Validated by [`Agent::create`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub agent_type: Option<AgentType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub config: Attributes,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl AgentConfig {
    pub fn new(name: impl Into<String>, agent_type: AgentType) -> Self {
        Self {
            name: name.into(),
            agent_type: Some(agent_type),
            ..Default::default()
        }
    }

    /// Check that the name and type are present and non-blank, and that the
    /// config bag can be written as JSON.
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.name.trim().is_empty() {
            return Err(AgentError::Validation("agent name is required".into()));
        }
        match &self.agent_type {
            Some(t) if !t.is_blank() => {}
            _ => {
                return Err(AgentError::Validation(format!(
                    "agent type is required (agent '{}')",
                    self.name
                )));
            }
        }
        check_config(&self.name, &self.config)
    }
}

/// A cognitive agent record as stored in the registry.
///
/// Optional fields are omitted from JSON when absent rather than written as
/// `null`, so `to_json` output stays compact and reads back identically.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    #[serde(rename = "type")]
    pub agent_type: AgentType,
    pub status: AgentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default)]
    pub config: Attributes,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stopped_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<AgentMetrics>,
}

/// Outcome of a lifecycle operation such as [`Agent::start`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// The status changed to the target.
    Changed { from: AgentStatus, to: AgentStatus },
    /// The agent was already in the target status; nothing was touched.
    Unchanged(AgentStatus),
}

impl Transition {
    pub fn changed(&self) -> bool {
        matches!(self, Transition::Changed { .. })
    }
}

impl Agent {
    /// Validate `config` and build a new agent in the `Created` state.
    pub fn create(config: AgentConfig) -> Result<Self, AgentError> {
        config.validate()?;

        let agent_type = config
            .agent_type
            .ok_or_else(|| AgentError::Validation("agent type is required".into()))?;
        let now = Utc::now();

        Ok(Self {
            id: generate_agent_id(),
            name: config.name,
            agent_type,
            status: AgentStatus::Created,
            repository: config.repository.filter(|r| !r.is_empty()),
            branch: config.branch.filter(|b| !b.is_empty()),
            config: config.config,
            created_at: now,
            updated_at: now,
            started_at: None,
            stopped_at: None,
            endpoint: None,
            version: None,
            tags: config.tags,
            metrics: None,
        })
    }

    /// Check that the record can be persisted and read back: every config
    /// value must be representable in JSON.
    pub fn validate(&self) -> Result<(), AgentError> {
        check_config(&self.name, &self.config)
    }

    /// Pretty-printed JSON representation of the full record.
    pub fn to_json(&self) -> Result<String, AgentError> {
        serde_json::to_string_pretty(self).map_err(|source| AgentError::Encode {
            id: self.id.clone(),
            source,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Refresh `updated_at`. Every mutation goes through here.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Set any status directly; legality is the caller's concern.
    pub fn set_status(&mut self, status: AgentStatus) {
        self.status = status;
        self.touch();
    }

    /// Move to `Running`. A no-op if the agent is already running.
    pub fn start(&mut self) -> Transition {
        if self.status == AgentStatus::Running {
            return Transition::Unchanged(self.status);
        }
        let from = self.status;
        let now = Utc::now();
        self.status = AgentStatus::Running;
        self.started_at = Some(now);
        self.updated_at = now;
        Transition::Changed {
            from,
            to: AgentStatus::Running,
        }
    }

    /// Move to `Stopped`. A no-op if the agent is already stopped.
    pub fn stop(&mut self) -> Transition {
        if self.status == AgentStatus::Stopped {
            return Transition::Unchanged(self.status);
        }
        let from = self.status;
        let now = Utc::now();
        self.status = AgentStatus::Stopped;
        self.stopped_at = Some(now);
        self.updated_at = now;
        Transition::Changed {
            from,
            to: AgentStatus::Stopped,
        }
    }

    /// Flag the agent as failed.
    pub fn mark_failed(&mut self) {
        self.set_status(AgentStatus::Error);
    }

    /// Record a liveness signal at `at`, creating metrics on first use.
    pub fn record_heartbeat(&mut self, at: DateTime<Utc>) {
        let uptime = self
            .started_at
            .map(|started| (at - started).num_seconds().max(0))
            .unwrap_or(0);
        let metrics = self
            .metrics
            .get_or_insert_with(|| AgentMetrics::with_heartbeat(at));
        metrics.last_heartbeat = at;
        metrics.uptime = uptime;
        self.touch();
    }

    /// Time since the last heartbeat, or `None` if none was ever recorded.
    pub fn heartbeat_age(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.metrics.as_ref().map(|m| now - m.last_heartbeat)
    }
}

fn check_config(name: &str, config: &Attributes) -> Result<(), AgentError> {
    match find_non_finite(config) {
        Some(key) => Err(AgentError::Validation(format!(
            "config value '{key}' of agent '{name}' is not a finite number"
        ))),
        None => Ok(()),
    }
}

fn generate_agent_id() -> AgentId {
    format!("agent-{}", Uuid::new_v4())
}
