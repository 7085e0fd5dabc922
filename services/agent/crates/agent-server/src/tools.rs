//! The four tool operations exposed to the controller.
//!
//! Every call looks the project up first and then goes through the path or
//! command guard before touching the filesystem or spawning anything.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use globset::{GlobBuilder, GlobMatcher};

use devpilot_common::{
    ApplyPatchRequest, ApplyPatchResponse, ContentEncoding, FileEntry, Limits, ListFilesRequest,
    Project, ProjectRegistry, ReadFileRequest, ReadFileResponse, RunCommandRequest,
    RunCommandResponse,
};

use crate::error::ToolError;
use crate::patch;
use crate::runner::{CommandRunner, ShellRunner};

pub struct ToolDispatcher<R = ShellRunner> {
    registry: Arc<ProjectRegistry>,
    limits: Limits,
    runner: R,
}

impl ToolDispatcher<ShellRunner> {
    #[must_use]
    pub fn new(registry: Arc<ProjectRegistry>, limits: Limits) -> Self {
        let runner = ShellRunner::from_limits(&limits);
        Self::with_runner(registry, limits, runner)
    }
}

impl<R: CommandRunner> ToolDispatcher<R> {
    pub fn with_runner(registry: Arc<ProjectRegistry>, limits: Limits, runner: R) -> Self {
        Self {
            registry,
            limits,
            runner,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &ProjectRegistry {
        &self.registry
    }

    fn project(&self, id: &str) -> Result<&Project, ToolError> {
        self.registry
            .find(id)
            .ok_or_else(|| ToolError::ProjectNotFound(id.to_string()))
    }

    /// Direct children of a directory, sorted by name.
    ///
    /// # Errors
    ///
    /// `ProjectNotFound`, `PathTraversal`, `InvalidRequest` for a bad glob,
    /// `DirectoryUnreadable` when the target is missing or not a directory.
    pub async fn list_files(&self, req: &ListFilesRequest) -> Result<Vec<FileEntry>, ToolError> {
        let project = self.project(&req.project_id)?;
        let matcher = req
            .glob
            .as_deref()
            .filter(|g| !g.is_empty())
            .map(compile_glob)
            .transpose()?;
        let dir = project.resolve(&req.path)?;

        let unreadable = |e: std::io::Error| ToolError::DirectoryUnreadable {
            path: req.path.clone(),
            reason: e.to_string(),
        };

        let mut reader = tokio::fs::read_dir(&dir).await.map_err(unreadable)?;
        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await.map_err(unreadable)? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if matcher.as_ref().is_some_and(|m| !m.is_match(&name)) {
                continue;
            }
            // Symlinks are reported as their target. A dangling link falls
            // back to the link itself, without a size.
            let (is_dir, size) = match tokio::fs::metadata(entry.path()).await {
                Ok(meta) if meta.is_dir() => (true, None),
                Ok(meta) => (false, Some(meta.len())),
                Err(err) => {
                    tracing::warn!(project = %project.id, entry = %name, error = %err, "cannot stat directory entry");
                    (entry.file_type().await.map_err(unreadable)?.is_dir(), None)
                }
            };
            entries.push(FileEntry { name, is_dir, size });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        tracing::debug!(project = %project.id, path = %req.path, count = entries.len(), "listed directory");
        Ok(entries)
    }

    /// File content. Valid UTF-8 is returned verbatim, anything else as
    /// base64 so binary files survive the JSON round trip.
    ///
    /// # Errors
    ///
    /// `ProjectNotFound`, `PathTraversal`, `FileUnreadable`, `FileTooLarge`.
    pub async fn read_file(&self, req: &ReadFileRequest) -> Result<ReadFileResponse, ToolError> {
        let project = self.project(&req.project_id)?;
        let path = project.resolve(&req.path)?;

        let unreadable = |reason: String| ToolError::FileUnreadable {
            path: req.path.clone(),
            reason,
        };
        let too_large = |size: u64| ToolError::FileTooLarge {
            path: req.path.clone(),
            size,
            limit: self.limits.max_read_bytes,
        };

        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|e| unreadable(e.to_string()))?;
        if meta.is_dir() {
            return Err(unreadable("is a directory".to_string()));
        }
        if meta.len() > self.limits.max_read_bytes {
            return Err(too_large(meta.len()));
        }

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| unreadable(e.to_string()))?;
        let read_len = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
        if read_len > self.limits.max_read_bytes {
            return Err(too_large(read_len));
        }

        tracing::debug!(project = %project.id, path = %req.path, bytes = read_len, "read file");
        Ok(encode_content(bytes))
    }

    /// Apply a patch batch. Only an unknown project fails the whole call;
    /// everything else is reported per operation.
    ///
    /// # Errors
    ///
    /// `ProjectNotFound`.
    pub async fn apply_patch(&self, req: &ApplyPatchRequest) -> Result<ApplyPatchResponse, ToolError> {
        let project = self.project(&req.project_id)?;
        Ok(patch::apply_batch(project, &req.operations).await)
    }

    /// Run an allowlisted command in the project root. A nonzero exit code
    /// is a successful result.
    ///
    /// # Errors
    ///
    /// `ProjectNotFound`, `CommandNotAllowed` (nothing is spawned),
    /// `ProcessSpawnFailure`, `CommandTimedOut`, `OutputLimitExceeded`.
    pub async fn run_command(&self, req: &RunCommandRequest) -> Result<RunCommandResponse, ToolError> {
        let project = self.project(&req.project_id)?;
        if !project.allows(&req.command) {
            tracing::warn!(project = %project.id, command = %req.command, "command denied by allowlist");
            return Err(ToolError::CommandNotAllowed(req.command.clone()));
        }

        tracing::info!(project = %project.id, command = %req.command, "running command");
        let output = self.runner.run(&req.command, &project.root).await?;
        tracing::info!(project = %project.id, exit_code = output.exit_code, "command finished");

        Ok(RunCommandResponse {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.exit_code,
        })
    }
}

fn compile_glob(pattern: &str) -> Result<GlobMatcher, ToolError> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|e| ToolError::InvalidRequest(format!("invalid glob '{pattern}': {e}")))
}

fn encode_content(bytes: Vec<u8>) -> ReadFileResponse {
    match String::from_utf8(bytes) {
        Ok(content) => ReadFileResponse {
            content,
            encoding: ContentEncoding::Utf8,
        },
        Err(err) => ReadFileResponse {
            content: STANDARD.encode(err.into_bytes()),
            encoding: ContentEncoding::Base64,
        },
    }
}
