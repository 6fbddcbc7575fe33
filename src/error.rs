use std::path::PathBuf;

/// Errors related to configuration loading and parsing.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error reading config at {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config at {path}: {message}")]
    ParseError { path: PathBuf, message: String },
}

/// Errors raised while building an agent record.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Invalid agent configuration: {0}")]
    Validation(String),

    #[error("Failed to encode agent {id}: {source}")]
    Encode {
        id: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors related to the persistent agent registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("agent with ID {id} not found")]
    NotFound { id: String },

    #[error("agent with name {name} not found")]
    NameNotFound { name: String },

    #[error("agent with ID {id} already exists")]
    DuplicateId { id: String },

    #[error(transparent)]
    InvalidAgent(#[from] AgentError),

    #[error("could not determine a default config directory")]
    NoConfigDir,

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse agents file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode agents for {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl RegistryError {
    /// True for lookup misses by id or by name.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::NameNotFound { .. })
    }
}

/// Errors related to message routing and the orchestrator lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("orchestrator is already running")]
    AlreadyRunning,

    #[error("orchestrator is not running")]
    NotRunning,

    #[error("orchestrator must be started from within a tokio runtime")]
    NoRuntime,

    #[error("agent {id} is already registered")]
    MailboxExists { id: String },

    #[error("agent {id} is not registered")]
    MailboxNotFound { id: String },

    #[error("message {message_id} from {from} has no recipient")]
    NoRecipient { from: String, message_id: String },

    #[error("agent {id} message queue is full")]
    MailboxFull { id: String },

    #[error("agent {id} mailbox is closed")]
    MailboxClosed { id: String },
}
