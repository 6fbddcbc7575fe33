use super::schema::{AppConfig, PartialConfig};
use crate::orchestration::types::{
    DEFAULT_HEALTH_INTERVAL, DEFAULT_HEARTBEAT_TIMEOUT, DEFAULT_MAILBOX_CAPACITY,
};
use crate::registry::store::default_dir;

impl PartialConfig {
    /// Merge self with a lower-priority fallback.
    /// Self's non-None values take precedence.
    pub fn with_fallback(self, fallback: PartialConfig) -> PartialConfig {
        PartialConfig {
            registry_dir: self.registry_dir.or(fallback.registry_dir),
            health_interval_secs: self.health_interval_secs.or(fallback.health_interval_secs),
            heartbeat_timeout_secs: self
                .heartbeat_timeout_secs
                .or(fallback.heartbeat_timeout_secs),
            mailbox_capacity: self.mailbox_capacity.or(fallback.mailbox_capacity),
        }
    }

    /// Convert to AppConfig, filling any remaining gaps with defaults.
    /// Zero interval and capacity are raised to 1.
    pub fn finalize(self) -> AppConfig {
        AppConfig {
            registry_dir: self.registry_dir.or_else(default_dir),
            health_interval_secs: self
                .health_interval_secs
                .unwrap_or(DEFAULT_HEALTH_INTERVAL.as_secs())
                .max(1),
            heartbeat_timeout_secs: self
                .heartbeat_timeout_secs
                .unwrap_or(DEFAULT_HEARTBEAT_TIMEOUT.as_secs()),
            mailbox_capacity: self
                .mailbox_capacity
                .unwrap_or(DEFAULT_MAILBOX_CAPACITY)
                .max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn finalize_applies_defaults() {
        let config = PartialConfig::default().finalize();
        assert_eq!(config.health_interval_secs, 5);
        assert_eq!(config.heartbeat_timeout_secs, 30);
        assert_eq!(config.mailbox_capacity, 100);
    }

    #[test]
    fn higher_layer_wins() {
        let cli = PartialConfig {
            heartbeat_timeout_secs: Some(10),
            ..Default::default()
        };
        let file = PartialConfig {
            registry_dir: Some(PathBuf::from("/srv/agents")),
            heartbeat_timeout_secs: Some(60),
            mailbox_capacity: Some(8),
            ..Default::default()
        };
        let config = cli.with_fallback(file).finalize();
        assert_eq!(config.heartbeat_timeout_secs, 10);
        assert_eq!(config.mailbox_capacity, 8);
        assert_eq!(config.registry_dir, Some(PathBuf::from("/srv/agents")));
    }

    #[test]
    fn zero_interval_is_clamped() {
        let config = PartialConfig {
            health_interval_secs: Some(0),
            mailbox_capacity: Some(0),
            ..Default::default()
        }
        .finalize();
        assert_eq!(config.health_interval_secs, 1);
        assert_eq!(config.mailbox_capacity, 1);
    }
}
