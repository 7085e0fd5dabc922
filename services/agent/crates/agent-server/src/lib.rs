//! DevPilot agent: serves a fixed set of local projects to a remote
//! controller over HTTP.
//!
//! Four tools are exposed (`list_files`, `read_file`, `apply_patch`,
//! `run_command`). Every path goes through the project's path guard and
//! every command through its allowlist before anything touches the host.

pub mod announce;
pub mod error;
pub mod patch;
pub mod routes;
pub mod runner;
pub mod settings;
pub mod state;
pub mod tools;

pub use error::ToolError;
pub use routes::router;
pub use state::AppState;
