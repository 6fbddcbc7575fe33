use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::agent::{AgentStatus, AgentType};

#[derive(Parser, Debug)]
#[command(
    name = "cogmesh",
    version,
    about = "Registry and orchestrator for cognitive agents"
)]
pub struct Cli {
    /// Directory holding agents.json and cogmesh.toml
    #[arg(long, global = true)]
    pub config_dir: Option<PathBuf>,

    /// Path to config file (overrides default search)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new cognitive agent
    Create {
        /// Agent name
        #[arg(long)]
        name: String,

        /// Agent type (see `cogmesh types`)
        #[arg(long = "type")]
        agent_type: AgentType,

        /// Git repository URL
        #[arg(long)]
        repo: Option<String>,

        /// Git branch
        #[arg(long, default_value = "main")]
        branch: String,

        /// Tag to attach (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// List registered agents
    #[command(visible_alias = "ls")]
    List {
        /// Only agents of this type
        #[arg(long = "type", conflicts_with = "status")]
        agent_type: Option<AgentType>,

        /// Only agents in this status
        #[arg(long)]
        status: Option<AgentStatus>,

        /// Show id, creation time and repository
        #[arg(short, long)]
        verbose: bool,
    },
    /// Start an agent
    Start { name: String },
    /// Stop an agent
    Stop { name: String },
    /// Show agent status and metrics as JSON
    Status { name: String },
    /// Remove an agent
    #[command(visible_alias = "rm")]
    Remove { name: String },
    /// List available agent types
    Types,
    /// Record a heartbeat for an agent
    Heartbeat { name: String },
    /// Run the health monitor until interrupted
    Watch {
        /// Seconds between health sweeps
        #[arg(long)]
        interval: Option<u64>,

        /// Heartbeat age in seconds after which a running agent is failed
        #[arg(long)]
        timeout: Option<u64>,
    },
}
