use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::registry::Project;

/// Header carrying the shared secret on announce requests.
pub const AGENT_SECRET_HEADER: &str = "X-Agent-Secret";

/// Public view of a project as returned by `GET /projects` and announced
/// to the controller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_commands: Option<Vec<String>>,
}

impl ProjectSummary {
    /// Build the summary, dropping root and allowlist when `redact` is set.
    #[must_use]
    pub fn from_project(project: &Project, redact: bool) -> Self {
        Self {
            id: project.id.clone(),
            name: project.name.clone(),
            root: (!redact).then(|| project.root.clone()),
            allowed_commands: (!redact).then(|| project.allowed_commands.clone()),
        }
    }
}

// ── list_files ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFilesRequest {
    pub project_id: String,
    /// Directory relative to the project root. Empty lists the root.
    #[serde(default)]
    pub path: String,
    /// Optional glob applied to entry names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub glob: Option<String>,
}

/// One direct child of a listed directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub name: String,
    pub is_dir: bool,
    /// Size in bytes; present for files only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

// ── read_file ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadFileRequest {
    pub project_id: String,
    pub path: String,
}

/// How `ReadFileResponse::content` is encoded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ContentEncoding {
    #[serde(rename = "utf-8")]
    Utf8,
    #[serde(rename = "base64")]
    Base64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReadFileResponse {
    pub content: String,
    pub encoding: ContentEncoding,
}

// ── apply_patch ──────────────────────────────────────────────────────────────

/// The verb of a patch operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchKind {
    Create,
    Update,
    Delete,
}

impl PatchKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for PatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PatchKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(format!("unknown operation: {other}")),
        }
    }
}

/// A single file mutation. `op` stays a string on the wire so an unknown
/// verb fails that operation only, not the whole batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchOperation {
    pub op: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl PatchOperation {
    #[must_use]
    pub fn new(kind: PatchKind, path: impl Into<String>, content: Option<String>) -> Self {
        Self {
            op: kind.as_str().to_string(),
            path: path.into(),
            content,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyPatchRequest {
    pub project_id: String,
    #[serde(default)]
    pub operations: Vec<PatchOperation>,
}

/// Outcome of a patch batch. `applied < operations.len()` means partial
/// application; `errors` lists the failures in submission order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ApplyPatchResponse {
    pub applied: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

// ── run_command ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunCommandRequest {
    pub project_id: String,
    pub command: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RunCommandResponse {
    pub stdout: String,
    pub stderr: String,
    /// Process exit code; `-1` when the process was terminated by a signal.
    pub exit_code: i32,
}

// ── errors & announce ────────────────────────────────────────────────────────

/// Body of every non-2xx response. A command stopped by the timeout or
/// the output ceiling also carries what it printed up to that point.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

impl ErrorBody {
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            stdout: None,
            stderr: None,
        }
    }
}

/// Heartbeat sent to the controller so it can route tool calls here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnouncePayload {
    pub agent_id: String,
    /// Address the controller should use to reach this agent.
    pub url: String,
    pub projects: Vec<ProjectSummary>,
    pub sent_at: DateTime<Utc>,
}
