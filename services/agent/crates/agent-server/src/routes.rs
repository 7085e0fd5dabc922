//! HTTP surface: routes, CORS, request tracing and the audit log.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{Method, StatusCode};
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use devpilot_common::{
    ApplyPatchRequest, ApplyPatchResponse, FileEntry, ListFilesRequest, ProjectSummary,
    ReadFileRequest, ReadFileResponse, RunCommandRequest, RunCommandResponse,
};

use crate::error::ToolError;
use crate::state::AppState;

type Shared = State<Arc<AppState>>;

/// Build the agent router. CORS is the outermost layer so preflight
/// requests are answered before auditing.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION]);

    Router::new()
        .route("/health", get(health))
        .route("/projects", get(projects))
        .route("/tools/list_files", post(list_files))
        .route("/tools/read_file", post(read_file))
        .route("/tools/apply_patch", post(apply_patch))
        .route("/tools/run_command", post(run_command))
        .layer(middleware::from_fn_with_state(state.clone(), audit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// One audit line per request, tagged with the agent id. Denials are
/// logged at `warn`.
async fn audit(State(state): Shared, request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();

    let response = next.run(request).await;
    let status = response.status();

    if status == StatusCode::FORBIDDEN {
        tracing::warn!(
            target: "audit",
            agent_id = %state.agent_id,
            %method,
            %path,
            status = status.as_u16(),
            "DENY",
        );
    } else if path == "/health" {
        tracing::debug!(target: "audit", agent_id = %state.agent_id, %method, %path, "health probe");
    } else {
        tracing::info!(
            target: "audit",
            agent_id = %state.agent_id,
            %method,
            %path,
            status = status.as_u16(),
            "ALLOW",
        );
    }
    response
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn projects(State(state): Shared) -> Json<Vec<ProjectSummary>> {
    Json(state.project_summaries())
}

async fn list_files(
    State(state): Shared,
    payload: Result<Json<ListFilesRequest>, JsonRejection>,
) -> Result<Json<Vec<FileEntry>>, ToolError> {
    let Json(req) = payload?;
    Ok(Json(state.dispatcher.list_files(&req).await?))
}

async fn read_file(
    State(state): Shared,
    payload: Result<Json<ReadFileRequest>, JsonRejection>,
) -> Result<Json<ReadFileResponse>, ToolError> {
    let Json(req) = payload?;
    Ok(Json(state.dispatcher.read_file(&req).await?))
}

async fn apply_patch(
    State(state): Shared,
    payload: Result<Json<ApplyPatchRequest>, JsonRejection>,
) -> Result<Json<ApplyPatchResponse>, ToolError> {
    let Json(req) = payload?;
    Ok(Json(state.dispatcher.apply_patch(&req).await?))
}

async fn run_command(
    State(state): Shared,
    payload: Result<Json<RunCommandRequest>, JsonRejection>,
) -> Result<Json<RunCommandResponse>, ToolError> {
    let Json(req) = payload?;
    Ok(Json(state.dispatcher.run_command(&req).await?))
}
