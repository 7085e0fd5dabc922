//! Shared types and trust-boundary guards for the DevPilot agent.
//!
//! Nothing here performs network or process I/O; the only filesystem
//! access is reading the config file.

pub mod command_guard;
pub mod config;
pub mod path_guard;
pub mod registry;
pub mod types;

pub use command_guard::{CommandMatch, is_allowed};
pub use config::{AgentConfig, AnnounceConfig, ConfigError, Limits, ListenConfig, ProjectConfig};
pub use path_guard::{PathGuardError, resolve};
pub use registry::{Project, ProjectRegistry, RegistryError};
pub use types::*;
