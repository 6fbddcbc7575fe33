use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::orchestration::OrchestratorSettings;

/// The TOML file structure for cogmesh.toml.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    pub registry: Option<RegistryConfig>,
    pub orchestrator: Option<OrchestratorConfig>,
}

#[derive(Debug, Deserialize)]
pub struct RegistryConfig {
    pub dir: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OrchestratorConfig {
    pub health_interval_secs: Option<u64>,
    pub heartbeat_timeout_secs: Option<u64>,
    pub mailbox_capacity: Option<usize>,
}

/// Fully-resolved runtime configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// `None` only when no platform config directory could be determined.
    pub registry_dir: Option<PathBuf>,
    pub health_interval_secs: u64,
    pub heartbeat_timeout_secs: u64,
    pub mailbox_capacity: usize,
}

impl AppConfig {
    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            health_interval: Duration::from_secs(self.health_interval_secs),
            heartbeat_timeout: Duration::from_secs(self.heartbeat_timeout_secs),
            mailbox_capacity: self.mailbox_capacity,
        }
    }
}

/// Partial config used during merge. All fields are Option so that
/// missing fields don't override lower-priority values.
#[derive(Debug, Clone, Default)]
pub struct PartialConfig {
    pub registry_dir: Option<PathBuf>,
    pub health_interval_secs: Option<u64>,
    pub heartbeat_timeout_secs: Option<u64>,
    pub mailbox_capacity: Option<usize>,
}

impl ConfigFile {
    pub fn to_partial(&self) -> PartialConfig {
        let registry = self.registry.as_ref();
        let orchestrator = self.orchestrator.as_ref();
        PartialConfig {
            registry_dir: registry.and_then(|r| r.dir.as_ref()).map(PathBuf::from),
            health_interval_secs: orchestrator.and_then(|o| o.health_interval_secs),
            heartbeat_timeout_secs: orchestrator.and_then(|o| o.heartbeat_timeout_secs),
            mailbox_capacity: orchestrator.and_then(|o| o.mailbox_capacity),
        }
    }
}
