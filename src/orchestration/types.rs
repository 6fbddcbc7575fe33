//! Type definitions for the message fabric.
//!
//! These types form the shared vocabulary between the
//! [`super::orchestrator::Orchestrator`], agent consumer loops reading from a
//! [`super::mailbox::MailboxReceiver`], and the shell. Messages derive
//! [`serde::Serialize`] so they can be logged or printed as JSON.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agent::{AgentId, Attributes};

/// Unique identifier for a message (`msg-<uuid>`).
pub type MessageId = String;

/// Default number of messages a mailbox holds before sends fail.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 100;

/// Default period of the health-check loop.
pub const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_secs(5);

/// Default heartbeat age after which a running agent is marked failed.
pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(30);

/// Kind of inter-agent message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Command,
    Query,
    Response,
    Knowledge,
    Heartbeat,
    Error,
}

/// A unit of inter-agent communication. Lives only in mailboxes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Empty until assigned by `send_message`, unless the caller set one.
    pub id: MessageId,
    pub from: AgentId,
    /// `None` only on a broadcast template before fan-out.
    pub to: Option<AgentId>,
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub payload: Attributes,
    /// Overwritten at send time.
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Build an unsent point-to-point message.
    pub fn new(
        from: impl Into<AgentId>,
        to: impl Into<AgentId>,
        kind: MessageType,
        payload: Attributes,
    ) -> Self {
        Self {
            id: MessageId::new(),
            from: from.into(),
            to: Some(to.into()),
            kind,
            payload,
            timestamp: Utc::now(),
        }
    }

    /// Set the id explicitly instead of letting the orchestrator generate one.
    pub fn with_id(mut self, id: impl Into<MessageId>) -> Self {
        self.id = id.into();
        self
    }
}

pub(crate) fn generate_message_id() -> MessageId {
    format!("msg-{}", Uuid::new_v4())
}

/// Outcome of a best-effort broadcast.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    /// Recipients whose mailbox accepted the message.
    pub delivered: Vec<AgentId>,
    /// Recipients skipped because their mailbox was full or closed.
    pub dropped: Vec<AgentId>,
}

/// Tunables for an [`super::orchestrator::Orchestrator`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrchestratorSettings {
    pub health_interval: Duration,
    pub heartbeat_timeout: Duration,
    pub mailbox_capacity: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            health_interval: DEFAULT_HEALTH_INTERVAL,
            heartbeat_timeout: DEFAULT_HEARTBEAT_TIMEOUT,
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
        }
    }
}
