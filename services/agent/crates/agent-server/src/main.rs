//! DevPilot agent entry point.
//!
//! Initialises tracing, loads `agent.config.json` (or the path given on the
//! command line), serves the tool API and optionally announces itself to
//! the controller until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use devpilot_agent::announce::{self, AgentIdentity, HttpAnnouncer};
use devpilot_agent::settings::{Args, EnvOverrides, Settings};
use devpilot_agent::{AppState, router};
use devpilot_common::{AgentConfig, ProjectRegistry};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::resolve(Args::parse(), EnvOverrides::from_env()?);

    let mut config = AgentConfig::load(&settings.config_path).with_context(|| {
        format!("failed to load config from {}", settings.config_path.display())
    })?;
    settings.apply(&mut config);
    config.validate().context("invalid config after environment overrides")?;

    let registry =
        ProjectRegistry::new(&config.projects).context("invalid project definitions")?;
    if registry.is_empty() {
        tracing::warn!("no projects configured; every tool call will return 404");
    }
    for project in registry.iter() {
        tracing::info!(
            id = %project.id,
            root = %project.root.display(),
            allowed_commands = project.allowed_commands.len(),
            "project registered",
        );
    }

    let state = Arc::new(AppState::new(&config, registry));
    let public_url = settings.public_url_for(&config);

    tracing::info!(
        agent_id = %config.agent_id,
        listen = %config.listen.addr(),
        public_url = %public_url,
        announce = config.announce.is_some(),
        "configuration loaded",
    );

    let announcer = match &config.announce {
        Some(announce_config) => {
            let identity = AgentIdentity {
                agent_id: config.agent_id.clone(),
                url: public_url.clone(),
                projects: state.project_summaries(),
            };
            Some(announce::spawn(
                HttpAnnouncer::new(announce_config)?,
                identity,
                Duration::from_secs(announce_config.interval_secs),
            ))
        }
        None => None,
    };

    let listener = tokio::net::TcpListener::bind(config.listen.addr())
        .await
        .with_context(|| format!("failed to bind {}", config.listen.addr()))?;

    tracing::info!("agent ready on http://{}", config.listen.addr());

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    if let Some(handle) = announcer {
        handle.stop().await;
    }

    tracing::info!("agent shut down");
    Ok(())
}

/// Wait for Ctrl-C. If the handler cannot be installed the server keeps
/// running until killed.
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("received shutdown signal");
}
