//! Message routing and health monitoring over a [`Registry`].
//!
//! [`Orchestrator`] keeps one bounded [`Mailbox`] per agent id behind an
//! `RwLock`. Sends take the read lock and use `try_send`, so producers never
//! block; registering, unregistering and `stop` take the write lock.
//!
//! **Health loop:** `start` spawns one tokio task that ticks every
//! `health_interval` and runs [`Orchestrator::check_health`] on the blocking
//! pool. The task owns a [`CancellationToken`]; `stop` cancels it, closes every
//! mailbox and clears the table. Agent status changes found by the sweep go
//! through [`Registry::update_with`] so they are persisted and never clobber a
//! concurrent update.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::mailbox::{Mailbox, MailboxReceiver};
use super::types::{
    BroadcastReport, Message, MessageId, MessageType, OrchestratorSettings, generate_message_id,
};
use crate::agent::{AgentId, AgentStatus, Attributes};
use crate::error::OrchestratorError;
use crate::registry::Registry;

#[derive(Default)]
struct State {
    mailboxes: HashMap<AgentId, Mailbox>,
    /// Present while running; cancelling it stops the health loop.
    health_token: Option<CancellationToken>,
}

/// In-memory message router and liveness monitor bound to one registry.
pub struct Orchestrator {
    registry: Arc<Registry>,
    settings: OrchestratorSettings,
    state: RwLock<State>,
}

impl Orchestrator {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self::with_settings(registry, OrchestratorSettings::default())
    }

    pub fn with_settings(registry: Arc<Registry>, settings: OrchestratorSettings) -> Self {
        Self {
            registry,
            settings,
            state: RwLock::new(State::default()),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub fn is_running(&self) -> bool {
        self.read().health_token.is_some()
    }

    /// Mark the orchestrator running and spawn the health loop on the
    /// current tokio runtime. Fails if already running.
    pub fn start(&self) -> Result<(), OrchestratorError> {
        let mut state = self.write();
        if state.health_token.is_some() {
            return Err(OrchestratorError::AlreadyRunning);
        }
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| OrchestratorError::NoRuntime)?;

        let token = CancellationToken::new();
        state.health_token = Some(token.clone());

        let registry = self.registry.clone();
        let settings = self.settings.clone();
        runtime.spawn(health_loop(registry, settings, token));

        tracing::info!(
            interval_secs = self.settings.health_interval.as_secs_f64(),
            timeout_secs = self.settings.heartbeat_timeout.as_secs_f64(),
            "Orchestrator started"
        );
        Ok(())
    }

    /// Stop the health loop and close every mailbox. Fails if not running.
    ///
    /// Consumers still holding a [`MailboxReceiver`] drain what was queued
    /// and then observe closure.
    pub fn stop(&self) -> Result<(), OrchestratorError> {
        let mut state = self.write();
        let token = state
            .health_token
            .take()
            .ok_or(OrchestratorError::NotRunning)?;
        token.cancel();

        let closed = state.mailboxes.len();
        state.mailboxes.clear();

        tracing::info!(closed_mailboxes = closed, "Orchestrator stopped");
        Ok(())
    }

    /// Create a mailbox for `id`. Fails if one already exists.
    pub fn register_agent(&self, id: &str) -> Result<(), OrchestratorError> {
        let mut state = self.write();
        if state.mailboxes.contains_key(id) {
            return Err(OrchestratorError::MailboxExists { id: id.to_string() });
        }
        state
            .mailboxes
            .insert(id.to_string(), Mailbox::new(self.settings.mailbox_capacity));
        tracing::debug!(agent_id = %id, "Mailbox registered");
        Ok(())
    }

    /// Close and remove the mailbox for `id`. Fails if there is none.
    pub fn unregister_agent(&self, id: &str) -> Result<(), OrchestratorError> {
        let mut state = self.write();
        if state.mailboxes.remove(id).is_none() {
            return Err(OrchestratorError::MailboxNotFound { id: id.to_string() });
        }
        tracing::debug!(agent_id = %id, "Mailbox unregistered");
        Ok(())
    }

    /// Receive end of `id`'s mailbox, for the agent's own consumer loop.
    pub fn agent_channel(&self, id: &str) -> Result<MailboxReceiver, OrchestratorError> {
        self.read()
            .mailboxes
            .get(id)
            .map(Mailbox::receiver)
            .ok_or_else(|| OrchestratorError::MailboxNotFound { id: id.to_string() })
    }

    /// Ids that currently have a mailbox.
    pub fn registered_agents(&self) -> Vec<AgentId> {
        self.read().mailboxes.keys().cloned().collect()
    }

    /// Deliver `message` to its recipient without blocking.
    ///
    /// Stamps the send time and generates an id when the message has none.
    /// Returns the message id.
    pub fn send_message(&self, mut message: Message) -> Result<MessageId, OrchestratorError> {
        if message.id.is_empty() {
            message.id = generate_message_id();
        }
        let Some(to) = message.to.clone() else {
            return Err(OrchestratorError::NoRecipient {
                from: message.from,
                message_id: message.id,
            });
        };

        let state = self.read();
        let mailbox = state
            .mailboxes
            .get(&to)
            .ok_or_else(|| OrchestratorError::MailboxNotFound { id: to.clone() })?;

        message.timestamp = Utc::now();
        let id = message.id.clone();

        mailbox.try_deliver(message).map_err(|e| match e {
            TrySendError::Full(_) => OrchestratorError::MailboxFull { id: to.clone() },
            TrySendError::Closed(_) => OrchestratorError::MailboxClosed { id: to.clone() },
        })?;

        tracing::trace!(message_id = %id, to = %to, "Message delivered");
        Ok(id)
    }

    /// Fan a message out to every mailbox except `from`'s own.
    ///
    /// Best effort: a full or closed mailbox drops that one delivery with a
    /// warning and the rest proceed. All copies share one timestamp; each gets
    /// its own id.
    pub fn broadcast_message(
        &self,
        from: &str,
        kind: MessageType,
        payload: Attributes,
    ) -> BroadcastReport {
        let state = self.read();
        let timestamp = Utc::now();
        let mut report = BroadcastReport::default();

        for (agent_id, mailbox) in state.mailboxes.iter() {
            if agent_id == from {
                continue;
            }

            let message = Message {
                id: generate_message_id(),
                from: from.to_string(),
                to: Some(agent_id.clone()),
                kind,
                payload: payload.clone(),
                timestamp,
            };

            match mailbox.try_deliver(message) {
                Ok(()) => report.delivered.push(agent_id.clone()),
                Err(e) => {
                    let reason = match e {
                        TrySendError::Full(_) => "message queue full",
                        TrySendError::Closed(_) => "mailbox closed",
                    };
                    tracing::warn!(agent_id = %agent_id, from = %from, "Broadcast dropped: {reason}");
                    report.dropped.push(agent_id.clone());
                }
            }
        }

        report
    }

    /// Run one health sweep now. Returns the ids flagged as failed.
    pub fn check_health(&self) -> Vec<AgentId> {
        check_health(&self.registry, &self.settings, &CancellationToken::new())
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        if let Some(token) = self.write().health_token.take() {
            token.cancel();
        }
    }
}

/// Periodic sweep until `token` is cancelled. The first tick fires one full
/// period after start.
async fn health_loop(
    registry: Arc<Registry>,
    settings: OrchestratorSettings,
    token: CancellationToken,
) {
    let period = settings.health_interval.max(Duration::from_millis(1));
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    if chrono::Duration::from_std(settings.heartbeat_timeout).is_err() {
        tracing::warn!(
            timeout_secs = settings.heartbeat_timeout.as_secs(),
            "Heartbeat timeout out of range, clamping to the maximum"
        );
    }

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                let registry = registry.clone();
                let settings = settings.clone();
                let sweep_token = token.clone();
                let sweep = tokio::task::spawn_blocking(move || {
                    check_health(&registry, &settings, &sweep_token)
                });
                // The blocking sweep cannot be aborted; it sees the
                // cancellation itself and stops flagging agents.
                tokio::select! {
                    _ = token.cancelled() => break,
                    joined = sweep => {
                        if let Err(e) = joined {
                            tracing::error!("Health sweep panicked: {e}");
                        }
                    }
                }
            }
        }
    }

    tracing::debug!("Health loop exited");
}

/// Flag running agents whose last heartbeat is older than the timeout.
/// Agents that never reported metrics are left alone. Once `token` is
/// cancelled no further agent is flagged.
fn check_health(
    registry: &Registry,
    settings: &OrchestratorSettings,
    token: &CancellationToken,
) -> Vec<AgentId> {
    let timeout = heartbeat_timeout(settings);
    let now = Utc::now();
    let is_stale = |agent: &crate::agent::Agent| {
        agent.status == AgentStatus::Running
            && agent.heartbeat_age(now).is_some_and(|age| age > timeout)
    };

    let mut flagged = Vec::new();
    for candidate in registry.list_by_status(AgentStatus::Running) {
        if token.is_cancelled() {
            tracing::debug!("Health sweep cancelled");
            break;
        }
        if !is_stale(&candidate) {
            continue;
        }

        // Re-check under the registry lock; a heartbeat may have landed since
        // the snapshot was taken, or the orchestrator may have stopped.
        let result = registry.update_with(&candidate.id, |agent| {
            if !token.is_cancelled() && is_stale(&*agent) {
                agent.mark_failed();
                true
            } else {
                false
            }
        });

        match result {
            Ok(true) => {
                tracing::warn!(
                    agent_id = %candidate.id,
                    name = %candidate.name,
                    "Agent heartbeat stale, marking as error"
                );
                flagged.push(candidate.id);
            }
            Ok(false) => {}
            Err(e) if e.is_not_found() => {
                tracing::debug!(agent_id = %candidate.id, "Agent removed during health sweep");
            }
            Err(e) => {
                tracing::error!(agent_id = %candidate.id, "Failed to persist health status: {e}");
            }
        }
    }

    flagged
}

/// The configured timeout as a chrono duration, saturating at the largest
/// representable value.
fn heartbeat_timeout(settings: &OrchestratorSettings) -> chrono::Duration {
    chrono::Duration::from_std(settings.heartbeat_timeout).unwrap_or(chrono::Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Agent, AgentConfig, AgentType};

    fn test_orchestrator() -> (tempfile::TempDir, Orchestrator) {
        let tmp = tempfile::tempdir().expect("failed to create temp dir");
        let registry = Arc::new(Registry::open(Some(tmp.path())).unwrap());
        (tmp, Orchestrator::new(registry))
    }

    fn ping(from: &str, to: &str) -> Message {
        let mut payload = Attributes::new();
        payload.insert("cmd".into(), "ping".into());
        Message::new(from, to, MessageType::Command, payload)
    }

    #[tokio::test]
    async fn start_and_stop_toggle_running() {
        let (_tmp, orch) = test_orchestrator();
        assert!(!orch.is_running());
        orch.start().unwrap();
        assert!(orch.is_running());
        assert!(matches!(orch.start(), Err(OrchestratorError::AlreadyRunning)));
        orch.stop().unwrap();
        assert!(!orch.is_running());
        assert!(matches!(orch.stop(), Err(OrchestratorError::NotRunning)));
    }

    #[tokio::test]
    async fn can_restart_after_stop() {
        let (_tmp, orch) = test_orchestrator();
        orch.start().unwrap();
        orch.stop().unwrap();
        orch.start().unwrap();
        assert!(orch.is_running());
    }

    #[test]
    fn start_outside_runtime_fails() {
        let (_tmp, orch) = test_orchestrator();
        assert!(matches!(orch.start(), Err(OrchestratorError::NoRuntime)));
        assert!(!orch.is_running());
    }

    #[test]
    fn register_agent_twice_fails() {
        let (_tmp, orch) = test_orchestrator();
        orch.register_agent("a").unwrap();
        let err = orch.register_agent("a").unwrap_err();
        assert!(matches!(err, OrchestratorError::MailboxExists { .. }));
    }

    #[test]
    fn unregister_removes_channel() {
        let (_tmp, orch) = test_orchestrator();
        orch.register_agent("a").unwrap();
        orch.unregister_agent("a").unwrap();
        assert!(orch.agent_channel("a").is_err());
        assert!(matches!(
            orch.unregister_agent("a"),
            Err(OrchestratorError::MailboxNotFound { .. })
        ));
    }

    #[test]
    fn send_keeps_caller_supplied_id() {
        let (_tmp, orch) = test_orchestrator();
        orch.register_agent("b").unwrap();
        let id = orch.send_message(ping("a", "b").with_id("custom-1")).unwrap();
        assert_eq!(id, "custom-1");
        let got = orch.agent_channel("b").unwrap().try_recv().unwrap();
        assert_eq!(got.id, "custom-1");
    }

    #[test]
    fn send_without_recipient_names_sender_and_message() {
        let (_tmp, orch) = test_orchestrator();
        let mut message = ping("a", "b").with_id("m-7");
        message.to = None;
        let err = orch.send_message(message).unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::NoRecipient { ref from, ref message_id }
                if from == "a" && message_id == "m-7"
        ));
        assert_eq!(err.to_string(), "message m-7 from a has no recipient");
    }

    #[test]
    fn broadcast_reports_dropped_recipients() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = Arc::new(Registry::open(Some(tmp.path())).unwrap());
        let settings = OrchestratorSettings {
            mailbox_capacity: 1,
            ..Default::default()
        };
        let orch = Orchestrator::with_settings(registry, settings);
        for id in ["x", "full", "open"] {
            orch.register_agent(id).unwrap();
        }
        orch.send_message(ping("x", "full")).unwrap();

        let report = orch.broadcast_message("x", MessageType::Knowledge, Attributes::new());
        assert_eq!(report.delivered, vec!["open".to_string()]);
        assert_eq!(report.dropped, vec!["full".to_string()]);
    }

    #[test]
    fn health_check_skips_agents_without_metrics() {
        let (_tmp, orch) = test_orchestrator();
        let agent = Agent::create(AgentConfig::new("quiet", AgentType::Ecan)).unwrap();
        let id = agent.id.clone();
        orch.registry().register(agent).unwrap();
        orch.registry().update_with(&id, Agent::start).unwrap();

        assert!(orch.check_health().is_empty());
        assert_eq!(orch.registry().get(&id).unwrap().status, AgentStatus::Running);
    }

    fn stale_running(orch: &Orchestrator, name: &str) -> AgentId {
        let agent = Agent::create(AgentConfig::new(name, AgentType::Ecan)).unwrap();
        let id = agent.id.clone();
        orch.registry().register(agent).unwrap();
        orch.registry()
            .update_with(&id, |a| {
                a.start();
                a.record_heartbeat(Utc::now() - chrono::Duration::seconds(120));
            })
            .unwrap();
        id
    }

    #[test]
    fn cancelled_sweep_flags_nothing() {
        let (_tmp, orch) = test_orchestrator();
        let id = stale_running(&orch, "late");

        let token = CancellationToken::new();
        token.cancel();
        let flagged = check_health(orch.registry(), orch.settings(), &token);
        assert!(flagged.is_empty());
        assert_eq!(orch.registry().get(&id).unwrap().status, AgentStatus::Running);

        assert_eq!(orch.check_health(), vec![id]);
    }

    #[test]
    fn oversized_heartbeat_timeout_saturates() {
        let settings = OrchestratorSettings {
            heartbeat_timeout: Duration::MAX,
            ..Default::default()
        };
        assert_eq!(heartbeat_timeout(&settings), chrono::Duration::MAX);
        assert_eq!(
            heartbeat_timeout(&OrchestratorSettings::default()),
            chrono::Duration::seconds(30)
        );

        let tmp = tempfile::tempdir().unwrap();
        let registry = Arc::new(Registry::open(Some(tmp.path())).unwrap());
        let orch = Orchestrator::with_settings(registry, settings);
        let id = stale_running(&orch, "patient");
        assert!(orch.check_health().is_empty());
        assert_eq!(orch.registry().get(&id).unwrap().status, AgentStatus::Running);
    }

    #[test]
    fn health_check_ignores_fresh_and_non_running() {
        let (_tmp, orch) = test_orchestrator();
        let stale_but_paused = Agent::create(AgentConfig::new("p", AgentType::Pln)).unwrap();
        let fresh = Agent::create(AgentConfig::new("f", AgentType::Pln)).unwrap();
        let (p_id, f_id) = (stale_but_paused.id.clone(), fresh.id.clone());
        orch.registry().register(stale_but_paused).unwrap();
        orch.registry().register(fresh).unwrap();

        let old = Utc::now() - chrono::Duration::seconds(120);
        orch.registry()
            .update_with(&p_id, |a| {
                a.record_heartbeat(old);
                a.set_status(AgentStatus::Paused);
            })
            .unwrap();
        orch.registry()
            .update_with(&f_id, |a| {
                a.start();
                a.record_heartbeat(Utc::now());
            })
            .unwrap();

        assert!(orch.check_health().is_empty());
    }
}
