//! Subcommand handlers for the `cogmesh` binary.
//!
//! Each handler opens nothing itself: it receives the one [`Registry`] opened
//! for this invocation, calls into the core, and writes human-readable output.
//! Errors propagate to `main`, which prints them and exits non-zero.

use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use comfy_table::Table;
use comfy_table::presets::UTF8_BORDERS_ONLY;

use crate::agent::{Agent, AgentConfig, AgentStatus, AgentType, Transition};
use crate::cli::Commands;
use crate::config::AppConfig;
use crate::orchestration::Orchestrator;
use crate::registry::Registry;

/// Dispatch one subcommand against `registry`, writing output to `out`.
pub async fn run(
    command: &Commands,
    registry: Arc<Registry>,
    config: &AppConfig,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    match command {
        Commands::Create {
            name,
            agent_type,
            repo,
            branch,
            tags,
        } => {
            let agent_config = AgentConfig {
                repository: repo.clone(),
                branch: Some(branch.clone()),
                tags: tags.clone(),
                ..AgentConfig::new(name.clone(), agent_type.clone())
            };
            let agent = Agent::create(agent_config).context("failed to create agent")?;
            let (id, kind) = (agent.id.clone(), agent.agent_type.clone());
            registry
                .register(agent)
                .context("failed to register agent")?;
            writeln!(out, "Created agent: {name} (ID: {id}, Type: {kind})")?;
        }
        Commands::List {
            agent_type,
            status,
            verbose,
        } => {
            let agents = match (agent_type, status) {
                (Some(t), _) => registry.list_by_type(t),
                (None, Some(s)) => registry.list_by_status(*s),
                (None, None) => registry.list(),
            };
            if agents.is_empty() {
                writeln!(out, "No agents found")?;
            } else {
                writeln!(out, "{}", agent_table(&agents, *verbose))?;
            }
        }
        Commands::Start { name } => {
            let transition = transition_by_name(&registry, name, Agent::start)?;
            report_transition(out, name, transition, "Started", "running")?;
        }
        Commands::Stop { name } => {
            let transition = transition_by_name(&registry, name, Agent::stop)?;
            report_transition(out, name, transition, "Stopped", "stopped")?;
        }
        Commands::Status { name } => {
            let agent = registry.get_by_name(name)?;
            writeln!(out, "{}", agent.to_json()?)?;
        }
        Commands::Remove { name } => {
            let agent = registry.get_by_name(name)?;
            registry
                .unregister(&agent.id)
                .context("failed to remove agent")?;
            writeln!(out, "Removed agent: {name}")?;
        }
        Commands::Types => {
            writeln!(out, "{}", types_table())?;
        }
        Commands::Heartbeat { name } => {
            let agent = registry.get_by_name(name)?;
            registry
                .update_with(&agent.id, |a| a.record_heartbeat(Utc::now()))
                .context("failed to record heartbeat")?;
            writeln!(out, "Recorded heartbeat for agent: {name}")?;
        }
        Commands::Watch { .. } => {
            watch(registry, config, out).await?;
        }
    }
    Ok(())
}

/// Apply a lifecycle operation to the agent called `name` and persist it.
fn transition_by_name(
    registry: &Registry,
    name: &str,
    op: fn(&mut Agent) -> Transition,
) -> anyhow::Result<Transition> {
    let agent = registry.get_by_name(name)?;
    registry
        .update_with(&agent.id, op)
        .context("failed to update agent")
}

fn report_transition(
    out: &mut impl Write,
    name: &str,
    transition: Transition,
    verb: &str,
    state: &str,
) -> std::io::Result<()> {
    match transition {
        Transition::Changed { .. } => writeln!(out, "{verb} agent: {name}"),
        Transition::Unchanged(_) => writeln!(out, "Agent {name} is already {state}"),
    }
}

/// Run the health loop in the foreground until Ctrl-C.
async fn watch(
    registry: Arc<Registry>,
    config: &AppConfig,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let orchestrator = Orchestrator::with_settings(registry.clone(), config.orchestrator_settings());
    for agent in registry.list() {
        orchestrator.register_agent(&agent.id)?;
    }
    orchestrator.start()?;

    writeln!(
        out,
        "Watching {} agents (sweep every {}s, heartbeat timeout {}s). Press Ctrl-C to stop.",
        registry.count(),
        config.health_interval_secs,
        config.heartbeat_timeout_secs,
    )?;
    out.flush()?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    orchestrator.stop()?;

    let failed = registry.list_by_status(AgentStatus::Error);
    writeln!(out, "Stopped. {} agents in error state.", failed.len())?;
    Ok(())
}

fn agent_table(agents: &[Agent], verbose: bool) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    if verbose {
        table.set_header(vec!["ID", "Name", "Type", "Status", "Created", "Repository"]);
        for agent in agents {
            table.add_row(vec![
                agent.id.clone(),
                agent.name.clone(),
                agent.agent_type.to_string(),
                agent.status.to_string(),
                agent.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                agent.repository.clone().unwrap_or_else(|| "-".to_string()),
            ]);
        }
    } else {
        table.set_header(vec!["Name", "Type", "Status"]);
        for agent in agents {
            table.add_row(vec![
                agent.name.clone(),
                agent.agent_type.to_string(),
                agent.status.to_string(),
            ]);
        }
    }
    table
}

fn types_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Type", "Description"]);
    for agent_type in AgentType::BUILTIN {
        table.add_row(vec![agent_type.as_str(), agent_type.description()]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PartialConfig;

    struct Shell {
        _tmp: tempfile::TempDir,
        registry: Arc<Registry>,
        config: AppConfig,
    }

    impl Shell {
        fn new() -> Self {
            let tmp = tempfile::tempdir().expect("failed to create temp dir");
            let registry = Arc::new(Registry::open(Some(tmp.path())).unwrap());
            let config = PartialConfig {
                registry_dir: Some(tmp.path().to_path_buf()),
                ..Default::default()
            }
            .finalize();
            Self {
                _tmp: tmp,
                registry,
                config,
            }
        }

        async fn run(&self, command: Commands) -> anyhow::Result<String> {
            let mut out = Vec::new();
            run(&command, self.registry.clone(), &self.config, &mut out).await?;
            Ok(String::from_utf8(out).unwrap())
        }
    }

    fn create(name: &str, agent_type: AgentType) -> Commands {
        Commands::Create {
            name: name.into(),
            agent_type,
            repo: None,
            branch: "main".into(),
            tags: vec![],
        }
    }

    #[tokio::test]
    async fn create_then_status_prints_json() {
        let shell = Shell::new();
        let out = shell.run(create("kb", AgentType::AtomSpace)).await.unwrap();
        assert!(out.starts_with("Created agent: kb (ID: agent-"));
        assert!(out.contains("Type: atomspace"));

        let out = shell.run(Commands::Status { name: "kb".into() }).await.unwrap();
        let agent = Agent::from_json(out.trim()).unwrap();
        assert_eq!(agent.name, "kb");
        assert_eq!(agent.branch.as_deref(), Some("main"));
    }

    #[tokio::test]
    async fn start_twice_reports_already_running() {
        let shell = Shell::new();
        shell.run(create("kb", AgentType::AtomSpace)).await.unwrap();

        let out = shell.run(Commands::Start { name: "kb".into() }).await.unwrap();
        assert_eq!(out.trim(), "Started agent: kb");
        let out = shell.run(Commands::Start { name: "kb".into() }).await.unwrap();
        assert_eq!(out.trim(), "Agent kb is already running");
        assert_eq!(
            shell.registry.get_by_name("kb").unwrap().status,
            AgentStatus::Running
        );
    }

    #[tokio::test]
    async fn list_filters_by_type() {
        let shell = Shell::new();
        shell.run(create("kb", AgentType::AtomSpace)).await.unwrap();
        shell.run(create("reasoner", AgentType::Pln)).await.unwrap();

        let out = shell
            .run(Commands::List {
                agent_type: Some(AgentType::Pln),
                status: None,
                verbose: false,
            })
            .await
            .unwrap();
        assert!(out.contains("reasoner"));
        assert!(!out.contains("kb"));
    }

    #[tokio::test]
    async fn list_empty_registry() {
        let shell = Shell::new();
        let out = shell
            .run(Commands::List {
                agent_type: None,
                status: None,
                verbose: true,
            })
            .await
            .unwrap();
        assert_eq!(out.trim(), "No agents found");
    }

    #[tokio::test]
    async fn remove_unknown_agent_fails_with_name() {
        let shell = Shell::new();
        let err = shell
            .run(Commands::Remove {
                name: "ghost".into(),
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[tokio::test]
    async fn heartbeat_records_metrics() {
        let shell = Shell::new();
        shell.run(create("kb", AgentType::AtomSpace)).await.unwrap();
        shell
            .run(Commands::Heartbeat { name: "kb".into() })
            .await
            .unwrap();
        let agent = shell.registry.get_by_name("kb").unwrap();
        assert!(agent.metrics.is_some());
    }

    #[tokio::test]
    async fn types_lists_every_builtin() {
        let shell = Shell::new();
        let out = shell.run(Commands::Types).await.unwrap();
        for agent_type in AgentType::BUILTIN {
            assert!(out.contains(agent_type.as_str()));
        }
    }
}
