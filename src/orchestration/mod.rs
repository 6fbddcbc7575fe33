//! Inter-agent messaging and health monitoring.
//!
//! Provides the [`Orchestrator`], which routes [`Message`]s between bounded
//! per-agent mailboxes and runs the periodic liveness sweep over a
//! [`crate::registry::Registry`], along with shared [`types`] used across the
//! message fabric.

pub mod mailbox;
pub mod orchestrator;
pub mod types;

pub use mailbox::MailboxReceiver;
pub use orchestrator::Orchestrator;
pub use types::{BroadcastReport, Message, MessageId, MessageType, OrchestratorSettings};
