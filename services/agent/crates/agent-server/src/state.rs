//! Shared, read-only state handed to every request handler.

use std::sync::Arc;

use devpilot_common::{AgentConfig, ProjectRegistry, ProjectSummary};

use crate::tools::ToolDispatcher;

pub struct AppState {
    pub agent_id: String,
    pub dispatcher: ToolDispatcher,
    redact_project_details: bool,
}

impl AppState {
    #[must_use]
    pub fn new(config: &AgentConfig, registry: ProjectRegistry) -> Self {
        Self {
            agent_id: config.agent_id.clone(),
            dispatcher: ToolDispatcher::new(Arc::new(registry), config.limits),
            redact_project_details: config.redact_project_details,
        }
    }

    /// Projects as exposed on `/projects` and in announces.
    #[must_use]
    pub fn project_summaries(&self) -> Vec<ProjectSummary> {
        self.dispatcher
            .registry()
            .iter()
            .map(|p| ProjectSummary::from_project(p, self.redact_project_details))
            .collect()
    }
}
