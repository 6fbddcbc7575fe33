//! Persistent, thread-safe registry of agents.
//!
//! [`Registry`] is the single source of truth for agent records. It keeps a
//! `HashMap` keyed by id plus an insertion-order index behind one `RwLock`,
//! and rewrites the backing JSON document (see [`store`]) on every mutation
//! while still holding the write lock. Readers share the lock; writers are
//! exclusive, so two overlapping mutations can never interleave on disk.
//!
//! The registry is an owned value with an explicit [`Registry::open`] /
//! [`Registry::close`] lifecycle. Share it with `Arc` when an
//! [`crate::orchestration::Orchestrator`] needs it too.

pub mod store;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::agent::{Agent, AgentId, AgentStatus, AgentType};
use crate::error::RegistryError;

#[derive(Default)]
struct Inner {
    agents: HashMap<AgentId, Agent>,
    /// Ids in insertion order. Drives `list` and the on-disk array order.
    order: Vec<AgentId>,
}

impl Inner {
    fn iter(&self) -> impl Iterator<Item = &Agent> {
        self.order.iter().filter_map(|id| self.agents.get(id))
    }

    fn insert(&mut self, agent: Agent) {
        if !self.agents.contains_key(&agent.id) {
            self.order.push(agent.id.clone());
        }
        self.agents.insert(agent.id.clone(), agent);
    }
}

/// Durable collection of agents backed by `<dir>/agents.json`.
pub struct Registry {
    inner: RwLock<Inner>,
    file: PathBuf,
}

impl Registry {
    /// Open the registry stored in `config_dir`, or in the platform default
    /// directory when `None`.
    ///
    /// Creates the directory if needed. A missing document yields an empty
    /// registry; an unreadable or corrupt one is an error.
    pub fn open(config_dir: Option<&Path>) -> Result<Self, RegistryError> {
        let dir = match config_dir {
            Some(dir) => dir.to_path_buf(),
            None => store::default_dir().ok_or(RegistryError::NoConfigDir)?,
        };

        std::fs::create_dir_all(&dir).map_err(|source| RegistryError::Io {
            path: dir.clone(),
            source,
        })?;

        let file = dir.join(store::AGENTS_FILE);
        let mut inner = Inner::default();
        for agent in store::load(&file)?.unwrap_or_default() {
            inner.insert(agent);
        }

        tracing::debug!(path = %file.display(), count = inner.order.len(), "Registry opened");
        Ok(Self {
            inner: RwLock::new(inner),
            file,
        })
    }

    /// Path of the backing JSON document.
    pub fn path(&self) -> &Path {
        &self.file
    }

    /// Release the registry. Every successful mutation is already on disk.
    pub fn close(self) {
        tracing::debug!(path = %self.file.display(), "Registry closed");
    }

    /// Add a new agent and persist. Fails if the id is already present or
    /// the record cannot be written as JSON.
    pub fn register(&self, agent: Agent) -> Result<(), RegistryError> {
        agent.validate()?;
        let mut inner = self.write();
        if inner.agents.contains_key(&agent.id) {
            return Err(RegistryError::DuplicateId { id: agent.id });
        }

        tracing::debug!(agent_id = %agent.id, name = %agent.name, "Registering agent");
        inner.insert(agent);
        self.persist(&inner)
    }

    /// Look up an agent by id.
    pub fn get(&self, id: &str) -> Result<Agent, RegistryError> {
        self.read()
            .agents
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound { id: id.to_string() })
    }

    /// Look up an agent by name. With duplicate names, the earliest
    /// registered agent wins.
    pub fn get_by_name(&self, name: &str) -> Result<Agent, RegistryError> {
        self.read()
            .iter()
            .find(|agent| agent.name == name)
            .cloned()
            .ok_or_else(|| RegistryError::NameNotFound {
                name: name.to_string(),
            })
    }

    /// Snapshot of all agents in insertion order.
    pub fn list(&self) -> Vec<Agent> {
        self.read().iter().cloned().collect()
    }

    pub fn list_by_type(&self, agent_type: &AgentType) -> Vec<Agent> {
        self.filtered(|agent| &agent.agent_type == agent_type)
    }

    pub fn list_by_status(&self, status: AgentStatus) -> Vec<Agent> {
        self.filtered(|agent| agent.status == status)
    }

    /// Replace the stored record for `agent.id` wholesale and persist.
    pub fn update(&self, agent: Agent) -> Result<(), RegistryError> {
        agent.validate()?;
        let mut inner = self.write();
        match inner.agents.get_mut(&agent.id) {
            Some(slot) => *slot = agent,
            None => return Err(RegistryError::NotFound { id: agent.id }),
        }
        self.persist(&inner)
    }

    /// Read-modify-write of one record under the exclusive lock.
    ///
    /// `f` sees the current stored value, so concurrent writers cannot lose
    /// each other's changes the way a `get` followed by `update` can. The
    /// record is persisted after `f` returns. If `f` leaves the record
    /// unwritable, the stored value is left as it was.
    pub fn update_with<T>(
        &self,
        id: &str,
        f: impl FnOnce(&mut Agent) -> T,
    ) -> Result<T, RegistryError> {
        let mut inner = self.write();
        let slot = inner
            .agents
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound { id: id.to_string() })?;
        let mut next = slot.clone();
        let out = f(&mut next);
        next.validate()?;
        *slot = next;
        self.persist(&inner)?;
        Ok(out)
    }

    /// Remove an agent and persist.
    pub fn unregister(&self, id: &str) -> Result<(), RegistryError> {
        let mut inner = self.write();
        if inner.agents.remove(id).is_none() {
            return Err(RegistryError::NotFound { id: id.to_string() });
        }
        inner.order.retain(|existing| existing != id);

        tracing::debug!(agent_id = %id, "Unregistered agent");
        self.persist(&inner)
    }

    pub fn count(&self) -> usize {
        self.read().agents.len()
    }

    fn filtered(&self, pred: impl Fn(&Agent) -> bool) -> Vec<Agent> {
        self.read().iter().filter(|a| pred(a)).cloned().collect()
    }

    /// Called with the write guard held.
    fn persist(&self, inner: &Inner) -> Result<(), RegistryError> {
        store::save(&self.file, inner.iter())
    }

    // A panic mid-mutation leaves the map usable; the next successful
    // persist reconciles the document.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
