//! Tool error taxonomy and its HTTP mapping.
//!
//! Every variant reaches the caller as `{"error": "<message>"}` with the
//! status from [`ToolError::status`]. A command stopped by a limit also
//! returns the `stdout` and `stderr` it produced before being killed.
//! Per-operation patch failures are not here: they are collected into the
//! patch response instead.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::response::{IntoResponse, Response};
use devpilot_common::{ErrorBody, PathGuardError};
use http::StatusCode;
use thiserror::Error;

use crate::runner::{PartialOutput, RunError};

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("project not found: {0}")]
    ProjectNotFound(String),

    #[error("path traversal not allowed: {0}")]
    PathTraversal(String),

    #[error("failed to read directory '{path}': {reason}")]
    DirectoryUnreadable { path: String, reason: String },

    #[error("failed to read file '{path}': {reason}")]
    FileUnreadable { path: String, reason: String },

    #[error("file '{path}' is {size} bytes, over the {limit} byte read limit")]
    FileTooLarge { path: String, size: u64, limit: u64 },

    #[error("command not allowed: {0}")]
    CommandNotAllowed(String),

    #[error("failed to start command: {0}")]
    ProcessSpawnFailure(String),

    #[error("command I/O failed: {0}")]
    CommandIo(String),

    #[error("command timed out after {secs}s and was killed")]
    CommandTimedOut { secs: u64, output: PartialOutput },

    #[error("command output exceeded {limit} bytes and the command was killed")]
    OutputLimitExceeded { limit: usize, output: PartialOutput },
}

impl ToolError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::ProjectNotFound(_) => StatusCode::NOT_FOUND,
            Self::PathTraversal(_) | Self::CommandNotAllowed(_) => StatusCode::FORBIDDEN,
            Self::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::CommandTimedOut { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::DirectoryUnreadable { .. }
            | Self::FileUnreadable { .. }
            | Self::ProcessSpawnFailure(_)
            | Self::CommandIo(_)
            | Self::OutputLimitExceeded { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Output captured before a limit stopped the command, if any.
    #[must_use]
    pub fn partial_output(&self) -> Option<&PartialOutput> {
        match self {
            Self::CommandTimedOut { output, .. } | Self::OutputLimitExceeded { output, .. } => {
                Some(output)
            }
            _ => None,
        }
    }
}

impl From<PathGuardError> for ToolError {
    fn from(err: PathGuardError) -> Self {
        match err {
            PathGuardError::Escapes(path) => Self::PathTraversal(path),
            PathGuardError::Malformed(_) => Self::InvalidRequest(err.to_string()),
        }
    }
}

impl From<RunError> for ToolError {
    fn from(err: RunError) -> Self {
        match err {
            RunError::Spawn(e) => Self::ProcessSpawnFailure(e.to_string()),
            RunError::Io(e) => Self::CommandIo(e.to_string()),
            RunError::TimedOut { after, partial } => Self::CommandTimedOut {
                secs: after.as_secs(),
                output: partial,
            },
            RunError::OutputLimit { limit, partial } => Self::OutputLimitExceeded {
                limit,
                output: partial,
            },
        }
    }
}

impl From<JsonRejection> for ToolError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidRequest(rejection.body_text())
    }
}

impl IntoResponse for ToolError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "tool call failed");
        } else {
            tracing::debug!(error = %self, "tool call rejected");
        }
        let mut body = ErrorBody::new(self.to_string());
        if let Some(output) = self.partial_output() {
            body.stdout = Some(String::from_utf8_lossy(&output.stdout).into_owned());
            body.stderr = Some(String::from_utf8_lossy(&output.stderr).into_owned());
        }
        (status, Json(body)).into_response()
    }
}
