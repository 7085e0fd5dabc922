//! The fixed set of projects this agent serves.
//!
//! Built once at startup and never mutated, so request handlers share it
//! behind an `Arc` without locking.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::command_guard::{self, CommandMatch};
use crate::config::ProjectConfig;
use crate::path_guard::{self, PathGuardError};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("project id must not be empty")]
    EmptyId,

    #[error("duplicate project id '{0}'")]
    DuplicateId(String),

    #[error("project '{id}' root must be an absolute path, got '{}'", root.display())]
    RelativeRoot { id: String, root: PathBuf },
}

/// A project root and the commands it permits.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    /// Lexically normalized absolute path.
    pub root: PathBuf,
    pub allowed_commands: Vec<String>,
    pub command_match: CommandMatch,
}

impl Project {
    /// Resolve a caller-supplied path against this project's root.
    ///
    /// # Errors
    ///
    /// See [`path_guard::resolve`].
    pub fn resolve(&self, user_path: &str) -> Result<PathBuf, PathGuardError> {
        path_guard::resolve(&self.root, user_path)
    }

    /// Whether `command` passes this project's allowlist.
    #[must_use]
    pub fn allows(&self, command: &str) -> bool {
        command_guard::is_allowed(self.allowed_commands.as_slice(), command, self.command_match)
    }

    /// True when `path` is the project root itself.
    #[must_use]
    pub fn is_root(&self, path: &Path) -> bool {
        path == self.root
    }
}

#[derive(Debug, Default)]
pub struct ProjectRegistry {
    projects: Vec<Project>,
    index: HashMap<String, usize>,
}

impl ProjectRegistry {
    /// Validate project definitions and build the registry.
    ///
    /// # Errors
    ///
    /// Fails on an empty or duplicate id, or a relative root.
    pub fn new(configs: &[ProjectConfig]) -> Result<Self, RegistryError> {
        let mut projects = Vec::with_capacity(configs.len());
        let mut index = HashMap::with_capacity(configs.len());

        for config in configs {
            if config.id.trim().is_empty() {
                return Err(RegistryError::EmptyId);
            }
            if !config.root.is_absolute() {
                return Err(RegistryError::RelativeRoot {
                    id: config.id.clone(),
                    root: config.root.clone(),
                });
            }
            if index.insert(config.id.clone(), projects.len()).is_some() {
                return Err(RegistryError::DuplicateId(config.id.clone()));
            }
            projects.push(Project {
                id: config.id.clone(),
                name: config.name.clone(),
                root: path_guard::normalize(&config.root),
                allowed_commands: config.allowed_commands.clone(),
                command_match: config.command_match,
            });
        }

        Ok(Self { projects, index })
    }

    #[must_use]
    pub fn find(&self, id: &str) -> Option<&Project> {
        self.index.get(id).map(|&i| &self.projects[i])
    }

    /// Projects in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &Project> {
        self.projects.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.projects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}
