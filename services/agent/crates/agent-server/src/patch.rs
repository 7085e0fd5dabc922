//! Multi-file patch application.
//!
//! A batch is applied operation by operation, in order. A failing operation
//! is recorded and skipped; earlier writes are never rolled back and later
//! operations still run. Callers compare `applied` with the number of
//! submitted operations to detect partial application.

use std::path::Path;

use devpilot_common::{
    ApplyPatchResponse, PatchKind, PatchOperation, PathGuardError, Project,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PatchOpError {
    #[error("unknown operation: {0}")]
    UnknownOp(String),

    #[error(transparent)]
    Path(#[from] PathGuardError),

    #[error("target must be a file below the project root")]
    RootTarget,

    #[error("content is required for {0}")]
    MissingContent(PatchKind),

    #[error("failed to create dir: {0}")]
    CreateDir(#[source] std::io::Error),

    #[error("failed to write file: {0}")]
    Write(#[source] std::io::Error),

    #[error("failed to delete: {0}")]
    Delete(#[source] std::io::Error),
}

/// Apply every operation in `operations` against `project`.
pub async fn apply_batch(project: &Project, operations: &[PatchOperation]) -> ApplyPatchResponse {
    let mut response = ApplyPatchResponse::default();

    for (index, op) in operations.iter().enumerate() {
        match apply_one(project, op).await {
            Ok(()) => {
                tracing::debug!(project = %project.id, op = %op.op, path = %op.path, "patch operation applied");
                response.applied += 1;
            }
            Err(err) => {
                tracing::warn!(project = %project.id, index, op = %op.op, path = %op.path, error = %err, "patch operation failed");
                response
                    .errors
                    .push(format!("[{index}] {} {}: {err}", op.op, op.path));
            }
        }
    }

    tracing::info!(
        project = %project.id,
        submitted = operations.len(),
        applied = response.applied,
        failed = response.errors.len(),
        "patch batch finished",
    );
    response
}

async fn apply_one(project: &Project, op: &PatchOperation) -> Result<(), PatchOpError> {
    let kind: PatchKind = op
        .op
        .parse()
        .map_err(|_| PatchOpError::UnknownOp(op.op.clone()))?;
    let target = project.resolve(&op.path)?;
    if project.is_root(&target) {
        return Err(PatchOpError::RootTarget);
    }

    match kind {
        PatchKind::Create | PatchKind::Update => {
            let content = op
                .content
                .as_deref()
                .ok_or(PatchOpError::MissingContent(kind))?;
            write_file(&target, content).await
        }
        PatchKind::Delete => tokio::fs::remove_file(&target)
            .await
            .map_err(PatchOpError::Delete),
    }
}

/// Create parent directories as needed, then write (overwriting).
async fn write_file(target: &Path, content: &str) -> Result<(), PatchOpError> {
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(PatchOpError::CreateDir)?;
    }
    tokio::fs::write(target, content)
        .await
        .map_err(PatchOpError::Write)
}
