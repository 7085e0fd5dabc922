//! Process-level settings: command-line arguments and environment
//! overrides layered on top of the JSON config document.
//!
//! Environment variables (prefix `DEVPILOT_AGENT_`):
//!   - `DEVPILOT_AGENT_CONFIG`          path to the config document
//!   - `DEVPILOT_AGENT_PUBLIC_URL`      address announced to the controller
//!   - `DEVPILOT_AGENT_ANNOUNCE_URL`    controller heartbeat endpoint
//!   - `DEVPILOT_AGENT_ANNOUNCE_SECRET` value of the `X-Agent-Secret` header
//!
//! Command-line arguments win over the environment.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;

use devpilot_common::config::DEFAULT_ANNOUNCE_INTERVAL_SECS;
use devpilot_common::{AgentConfig, AnnounceConfig};

const DEFAULT_CONFIG_PATH: &str = "agent.config.json";

#[derive(Debug, Parser)]
#[command(name = "devpilot-agent", version, about = "DevPilot remote execution agent")]
pub struct Args {
    /// Path to the agent config document.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Public URL announced to the controller (e.g. a tunnel address).
    pub public_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EnvOverrides {
    pub config: Option<PathBuf>,
    pub public_url: Option<String>,
    pub announce_url: Option<String>,
    pub announce_secret: Option<String>,
}

impl EnvOverrides {
    /// # Errors
    ///
    /// Fails when a `DEVPILOT_AGENT_*` variable cannot be decoded.
    pub fn from_env() -> Result<Self> {
        envy::prefixed("DEVPILOT_AGENT_")
            .from_env()
            .context("failed to read DEVPILOT_AGENT_* environment variables")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub config_path: PathBuf,
    pub public_url: Option<String>,
    announce_url: Option<String>,
    announce_secret: Option<String>,
}

impl Settings {
    #[must_use]
    pub fn resolve(args: Args, env: EnvOverrides) -> Self {
        Self {
            config_path: args
                .config
                .or(env.config)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
            public_url: args.public_url.or(env.public_url),
            announce_url: env.announce_url,
            announce_secret: env.announce_secret,
        }
    }

    /// Apply announce overrides to a loaded config. An override URL creates
    /// the announce section when the file has none.
    pub fn apply(&self, config: &mut AgentConfig) {
        if let Some(url) = &self.announce_url {
            match &mut config.announce {
                Some(announce) => announce.url.clone_from(url),
                None => {
                    config.announce = Some(AnnounceConfig {
                        url: url.clone(),
                        secret: None,
                        interval_secs: DEFAULT_ANNOUNCE_INTERVAL_SECS,
                    });
                }
            }
        }
        if let (Some(secret), Some(announce)) = (&self.announce_secret, &mut config.announce) {
            announce.secret = Some(secret.clone());
        }
    }

    /// The URL to announce: explicit setting, else the listen address.
    #[must_use]
    pub fn public_url_for(&self, config: &AgentConfig) -> String {
        self.public_url
            .clone()
            .unwrap_or_else(|| format!("http://{}", config.listen.addr()))
    }
}
