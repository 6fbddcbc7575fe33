//! Agent records and their lifecycle rules.
//!
//! An [`Agent`] is a description of one logical worker: identity, role,
//! status, provenance and optional health metrics. Creating or starting an
//! agent only changes this record; no process is spawned.

pub mod model;
pub mod types;

pub use model::{Agent, AgentConfig, Transition};
pub use types::{AgentId, AgentMetrics, AgentStatus, AgentType, AttrValue, Attributes};
