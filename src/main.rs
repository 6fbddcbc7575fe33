use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use cogmesh::registry::Registry;
use cogmesh::{cli, commands, config};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    let config = config::load_config(&cli)?;
    tracing::debug!(
        registry_dir = ?config.registry_dir,
        interval_secs = config.health_interval_secs,
        timeout_secs = config.heartbeat_timeout_secs,
        "Config loaded"
    );

    let registry = Registry::open(config.registry_dir.as_deref())
        .context("failed to open agent registry")?;
    let registry = Arc::new(registry);

    let mut stdout = std::io::stdout().lock();
    commands::run(&cli.command, registry.clone(), &config, &mut stdout).await?;

    if let Ok(registry) = Arc::try_unwrap(registry) {
        registry.close();
    }
    Ok(())
}
