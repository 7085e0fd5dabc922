//! End-to-end tests of the HTTP surface, driven through the router with
//! `tower::ServiceExt::oneshot`.

use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use devpilot_agent::{AppState, router};
use devpilot_common::{AgentConfig, ProjectRegistry};

fn app_with(root: &Path, extra: Value) -> Router {
    let mut doc = json!({
        "agentId": "test-agent",
        "projects": [{
            "id": "web",
            "name": "Web",
            "root": root,
            "allowedCommands": ["echo", "ls", "sh -c"]
        }]
    });
    if let (Some(doc), Some(extra)) = (doc.as_object_mut(), extra.as_object()) {
        for (key, value) in extra {
            doc.insert(key.clone(), value.clone());
        }
    }
    let config = AgentConfig::from_json(&doc.to_string()).unwrap();
    let registry = ProjectRegistry::new(&config.projects).unwrap();
    router(Arc::new(AppState::new(&config, registry)))
}

fn app(root: &Path) -> Router {
    app_with(root, json!({}))
}

async fn post(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn project_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("src")).unwrap();
    std::fs::write(dir.path().join("README.md"), "# hello\n").unwrap();
    std::fs::write(dir.path().join("src/main.rs"), "fn main() {}\n").unwrap();
    dir
}

#[tokio::test]
async fn health_is_ok() {
    let dir = project_dir();
    let (status, body) = get(app(dir.path()), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn projects_lists_configured_projects() {
    let dir = project_dir();
    let (status, body) = get(app(dir.path()), "/projects").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["id"], "web");
    assert_eq!(body[0]["name"], "Web");
    assert_eq!(body[0]["allowedCommands"], json!(["echo", "ls", "sh -c"]));
    assert!(body[0]["root"].is_string());
}

#[tokio::test]
async fn projects_can_be_redacted() {
    let dir = project_dir();
    let app = app_with(dir.path(), json!({ "redactProjectDetails": true }));
    let (_, body) = get(app, "/projects").await;
    assert_eq!(body, json!([{ "id": "web", "name": "Web" }]));
}

#[tokio::test]
async fn list_files_returns_sorted_entries() {
    let dir = project_dir();
    let (status, body) = post(
        app(dir.path()),
        "/tools/list_files",
        json!({ "projectId": "web", "path": "" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!([
            { "name": "README.md", "isDir": false, "size": 8 },
            { "name": "src", "isDir": true }
        ])
    );
}

#[tokio::test]
async fn list_files_applies_glob() {
    let dir = project_dir();
    let (status, body) = post(
        app(dir.path()),
        "/tools/list_files",
        json!({ "projectId": "web", "path": "src", "glob": "*.rs" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([{ "name": "main.rs", "isDir": false, "size": 13 }]));
}

#[tokio::test]
async fn unknown_project_is_404() {
    let dir = project_dir();
    let (status, body) = post(
        app(dir.path()),
        "/tools/read_file",
        json!({ "projectId": "nope", "path": "README.md" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "project not found: nope");
}

#[tokio::test]
async fn traversal_is_403_with_error_body() {
    let dir = project_dir();
    for path in ["../../etc/passwd", "/etc/passwd", "src/..%2f..%2fetc"] {
        let (status, body) = post(
            app(dir.path()),
            "/tools/read_file",
            json!({ "projectId": "web", "path": path }),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{path}");
        assert!(
            body["error"]
                .as_str()
                .unwrap()
                .starts_with("path traversal not allowed: "),
            "{body}"
        );
    }
}

#[tokio::test]
async fn malformed_json_is_400() {
    let dir = project_dir();
    let response = app(dir.path())
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/tools/list_files")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body["error"].as_str().unwrap().starts_with("invalid request: "));
}

#[tokio::test]
async fn missing_field_is_400() {
    let dir = project_dir();
    let (status, _) = post(app(dir.path()), "/tools/run_command", json!({ "projectId": "web" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn reading_a_directory_is_500() {
    let dir = project_dir();
    let (status, body) = post(
        app(dir.path()),
        "/tools/read_file",
        json!({ "projectId": "web", "path": "src" }),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("is a directory"));
}

#[tokio::test]
async fn oversized_read_is_413() {
    let dir = project_dir();
    let app = app_with(dir.path(), json!({ "limits": { "maxReadBytes": 4 } }));
    let (status, _) = post(
        app,
        "/tools/read_file",
        json!({ "projectId": "web", "path": "README.md" }),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn patch_then_read_round_trip() {
    let dir = project_dir();
    let (status, body) = post(
        app(dir.path()),
        "/tools/apply_patch",
        json!({
            "projectId": "web",
            "operations": [
                { "op": "create", "path": "docs/guide.md", "content": "guide" },
                { "op": "update", "path": "README.md", "content": "# updated\n" },
                { "op": "delete", "path": "src/main.rs" }
            ]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "applied": 3 }));

    let (_, body) = post(
        app(dir.path()),
        "/tools/read_file",
        json!({ "projectId": "web", "path": "docs/guide.md" }),
    )
    .await;
    assert_eq!(body, json!({ "content": "guide", "encoding": "utf-8" }));
    assert!(!dir.path().join("src/main.rs").exists());
}

#[tokio::test]
async fn patch_reports_per_operation_errors() {
    let dir = project_dir();
    let (status, body) = post(
        app(dir.path()),
        "/tools/apply_patch",
        json!({
            "projectId": "web",
            "operations": [
                { "op": "create", "path": "a.txt", "content": "a" },
                { "op": "create", "path": "../escape.txt", "content": "x" },
                { "op": "rename", "path": "b.txt" }
            ]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["applied"], 1);
    let errors = body["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 2);
    assert!(errors[0].as_str().unwrap().starts_with("[1] create ../escape.txt: path traversal not allowed: "));
    assert!(errors[1].as_str().unwrap().contains("unknown operation: rename"));
    assert!(dir.path().join("a.txt").exists());
    assert!(!dir.path().parent().unwrap().join("escape.txt").exists());
}

#[tokio::test]
async fn disallowed_command_is_403() {
    let dir = project_dir();
    let (status, body) = post(
        app(dir.path()),
        "/tools/run_command",
        json!({ "projectId": "web", "command": "rm -rf /" }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "command not allowed: rm -rf /");
}

#[cfg(unix)]
#[tokio::test]
async fn allowed_command_runs_in_project_root() {
    let dir = project_dir();
    let (status, body) = post(
        app(dir.path()),
        "/tools/run_command",
        json!({ "projectId": "web", "command": "ls" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["exitCode"], 0);
    assert!(body["stdout"].as_str().unwrap().contains("README.md"));
}

#[cfg(unix)]
#[tokio::test]
async fn nonzero_exit_is_still_200() {
    let dir = project_dir();
    let (status, body) = post(
        app(dir.path()),
        "/tools/run_command",
        json!({ "projectId": "web", "command": "sh -c 'echo oops >&2; exit 2'" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["exitCode"], 2);
    assert_eq!(body["stderr"], "oops\n");
}

#[tokio::test]
async fn cors_preflight_is_answered() {
    let dir = project_dir();
    let response = app(dir.path())
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/tools/list_files")
                .header("origin", "https://brain.example")
                .header("access-control-request-method", "POST")
                .header("access-control-request-headers", "content-type")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers["access-control-allow-origin"], "*");
    let methods = headers["access-control-allow-methods"].to_str().unwrap();
    assert!(methods.contains("POST"), "{methods}");
}

#[cfg(unix)]
#[tokio::test]
async fn timed_out_command_returns_504_with_output_so_far() {
    let dir = project_dir();
    let app = app_with(dir.path(), json!({ "limits": { "commandTimeoutSecs": 1 } }));
    let (status, body) = post(
        app,
        "/tools/run_command",
        json!({ "projectId": "web", "command": "sh -c 'echo started; sleep 30'" }),
    )
    .await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["stdout"], "started\n");
    assert_eq!(body["stderr"], "");
    assert!(body["error"].as_str().unwrap().contains("timed out"));
}

#[cfg(unix)]
#[tokio::test]
async fn output_over_the_ceiling_is_truncated_in_the_error_body() {
    let dir = project_dir();
    let app = app_with(dir.path(), json!({ "limits": { "maxOutputBytes": 10 } }));
    let (status, body) = post(
        app,
        "/tools/run_command",
        json!({ "projectId": "web", "command": "echo 0123456789abcdef" }),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["stdout"], "0123456789");
}

#[cfg(unix)]
#[tokio::test]
async fn symlinked_directory_is_listed_as_directory() {
    let dir = project_dir();
    std::os::unix::fs::symlink(dir.path().join("src"), dir.path().join("code")).unwrap();
    let (status, body) = post(
        app(dir.path()),
        "/tools/list_files",
        json!({ "projectId": "web", "path": "" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[1], json!({ "name": "code", "isDir": true }));
}
