//! The agent configuration document.
//!
//! A single JSON file read once at startup:
//!
//! ```json
//! {
//!   "agentId": "laptop",
//!   "listen": { "host": "127.0.0.1", "port": 8787 },
//!   "projects": [
//!     { "id": "web", "name": "Web", "root": "/srv/web", "allowedCommands": ["npm"] }
//!   ]
//! }
//! ```
//!
//! `limits`, `announce` and `redactProjectDetails` are optional.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::command_guard::CommandMatch;

/// Default seconds before a running command is killed.
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 300;

/// Default ceiling for each captured output stream (4 MiB).
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 4 * 1024 * 1024;

/// Default ceiling for `read_file` (10 MiB).
pub const DEFAULT_MAX_READ_BYTES: u64 = 10 * 1024 * 1024;

/// Default seconds between announce heartbeats.
pub const DEFAULT_ANNOUNCE_INTERVAL_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse agent config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid agent config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    pub agent_id: String,

    #[serde(default)]
    pub listen: ListenConfig,

    #[serde(default)]
    pub projects: Vec<ProjectConfig>,

    /// Omit roots and allowlists from `/projects` and announces.
    #[serde(default)]
    pub redact_project_details: bool,

    #[serde(default)]
    pub limits: Limits,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub announce: Option<AnnounceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListenConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl ListenConfig {
    /// `host:port`, suitable for `TcpListener::bind`.
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    pub id: String,
    pub name: String,
    pub root: PathBuf,
    #[serde(default)]
    pub allowed_commands: Vec<String>,
    #[serde(default)]
    pub command_match: CommandMatch,
}

/// Resource ceilings applied to tool calls.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Limits {
    pub command_timeout_secs: u64,
    /// Per stream: stdout and stderr are each capped at this size.
    pub max_output_bytes: usize,
    pub max_read_bytes: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            max_read_bytes: DEFAULT_MAX_READ_BYTES,
        }
    }
}

/// Where and how often to announce this agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AnnounceConfig {
    pub url: String,
    /// Sent as `X-Agent-Secret`. Usually supplied through the environment
    /// rather than the file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(default = "default_announce_interval")]
    pub interval_secs: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8787
}

fn default_announce_interval() -> u64 {
    DEFAULT_ANNOUNCE_INTERVAL_SECS
}

impl AgentConfig {
    /// Read, parse and validate the config file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file is unreadable, not valid JSON,
    /// or fails [`AgentConfig::validate`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Parse and validate a config document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on malformed JSON or invalid values.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values serde cannot express. Project definitions are checked
    /// when the registry is built.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent_id.trim().is_empty() {
            return Err(ConfigError::Invalid("agentId must not be empty".to_string()));
        }
        if self.listen.host.trim().is_empty() {
            return Err(ConfigError::Invalid("listen.host must not be empty".to_string()));
        }
        if self.limits.command_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "limits.commandTimeoutSecs must be positive".to_string(),
            ));
        }
        if self.limits.max_output_bytes == 0 || self.limits.max_read_bytes == 0 {
            return Err(ConfigError::Invalid(
                "limits.maxOutputBytes and limits.maxReadBytes must be positive".to_string(),
            ));
        }
        if let Some(announce) = &self.announce {
            if announce.url.trim().is_empty() {
                return Err(ConfigError::Invalid("announce.url must not be empty".to_string()));
            }
            if announce.interval_secs == 0 {
                return Err(ConfigError::Invalid(
                    "announce.intervalSecs must be positive".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"{
        "agentId": "laptop",
        "listen": { "host": "0.0.0.0", "port": 9000 },
        "projects": [
            { "id": "web", "name": "Web", "root": "/srv/web", "allowedCommands": ["npm", "git status"] }
        ]
    }"#;

    #[test]
    fn parses_minimal_document_shape() {
        let cfg = AgentConfig::from_json(MINIMAL).unwrap();
        assert_eq!(cfg.agent_id, "laptop");
        assert_eq!(cfg.listen.addr(), "0.0.0.0:9000");
        assert_eq!(cfg.projects.len(), 1);
        assert_eq!(cfg.projects[0].allowed_commands, ["npm", "git status"]);
        assert_eq!(cfg.projects[0].command_match, CommandMatch::Prefix);
        assert!(!cfg.redact_project_details);
        assert!(cfg.announce.is_none());
    }

    #[test]
    fn optional_sections_take_defaults() {
        let cfg = AgentConfig::from_json(r#"{"agentId":"a"}"#).unwrap();
        assert_eq!(cfg.listen, ListenConfig::default());
        assert_eq!(cfg.listen.addr(), "127.0.0.1:8787");
        assert_eq!(cfg.limits, Limits::default());
        assert!(cfg.projects.is_empty());
    }

    #[test]
    fn partial_limits_keep_other_defaults() {
        let cfg = AgentConfig::from_json(r#"{"agentId":"a","limits":{"commandTimeoutSecs":5}}"#)
            .unwrap();
        assert_eq!(cfg.limits.command_timeout_secs, 5);
        assert_eq!(cfg.limits.max_output_bytes, DEFAULT_MAX_OUTPUT_BYTES);
        assert_eq!(cfg.limits.max_read_bytes, DEFAULT_MAX_READ_BYTES);
    }

    #[test]
    fn announce_interval_defaults() {
        let cfg = AgentConfig::from_json(
            r#"{"agentId":"a","announce":{"url":"https://brain.example/api/agents/heartbeat"}}"#,
        )
        .unwrap();
        let announce = cfg.announce.unwrap();
        assert_eq!(announce.interval_secs, DEFAULT_ANNOUNCE_INTERVAL_SECS);
        assert!(announce.secret.is_none());
    }

    #[test]
    fn token_command_match_is_accepted() {
        let cfg = AgentConfig::from_json(
            r#"{"agentId":"a","projects":[{"id":"w","name":"W","root":"/w","commandMatch":"token"}]}"#,
        )
        .unwrap();
        assert_eq!(cfg.projects[0].command_match, CommandMatch::Token);
        assert!(cfg.projects[0].allowed_commands.is_empty());
    }

    #[test]
    fn empty_agent_id_is_invalid() {
        let err = AgentConfig::from_json(r#"{"agentId":"  "}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn zero_limits_are_invalid() {
        assert!(AgentConfig::from_json(r#"{"agentId":"a","limits":{"commandTimeoutSecs":0}}"#).is_err());
        assert!(AgentConfig::from_json(r#"{"agentId":"a","limits":{"maxOutputBytes":0}}"#).is_err());
    }

    #[test]
    fn zero_announce_interval_is_invalid() {
        let err = AgentConfig::from_json(
            r#"{"agentId":"a","announce":{"url":"http://x","intervalSecs":0}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("intervalSecs"));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = AgentConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_reads_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();
        let cfg = AgentConfig::load(file.path()).unwrap();
        assert_eq!(cfg.agent_id, "laptop");
    }

    #[test]
    fn load_missing_file_names_the_path() {
        let err = AgentConfig::load(Path::new("/nonexistent/agent.config.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("/nonexistent/agent.config.json"));
    }
}
