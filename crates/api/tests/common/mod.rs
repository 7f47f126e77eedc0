#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use runcast_api::config::{CorsOrigins, ServerConfig};
use runcast_api::router::build_app_router;
use runcast_api::state::AppState;
use runcast_core::relay::RelayConfig;

/// Executable path that never exists on test machines.
pub const MISSING_EXECUTABLE: &str = "/nonexistent/runcast-runner";

/// Build a test `ServerConfig` with safe defaults.
///
/// Keep-alive comments are disabled so streams only carry relay events.
pub fn test_config(executable: impl Into<PathBuf>, static_dir: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: CorsOrigins::List(vec!["http://localhost:5173".parse().unwrap()]),
        request_timeout_secs: 30,
        static_dir: static_dir.to_path_buf(),
        sse_keep_alive: None,
        relay: RelayConfig::new(executable),
    }
}

/// Build the full application router, the same way `main.rs` does.
pub fn build_test_app(config: ServerConfig) -> Router {
    build_app_router(AppState::new(config))
}

/// App whose executable is `/bin/sh`; the action names a script to run.
pub fn shell_app(static_dir: &Path) -> Router {
    build_test_app(test_config("/bin/sh", static_dir))
}

/// Write a throwaway shell script.
pub fn write_script(body: &str) -> tempfile::NamedTempFile {
    let mut f = tempfile::Builder::new()
        .suffix(".sh")
        .tempfile()
        .expect("create temp file");
    write!(f, "{body}").expect("write body");
    f
}

pub fn script_path(script: &tempfile::NamedTempFile) -> String {
    script.path().to_str().expect("utf-8 path").to_string()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    post_raw(app, uri, body.to_string()).await
}

pub async fn post_raw(app: Router, uri: &str, body: String) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Read an SSE body until the server closes it and return the decoded
/// `data:` payload of every event.
pub async fn sse_events(response: Response<Body>) -> Vec<serde_json::Value> {
    let bytes = tokio::time::timeout(Duration::from_secs(10), response.into_body().collect())
        .await
        .expect("event stream should end")
        .unwrap()
        .to_bytes();
    let text = String::from_utf8(bytes.to_vec()).expect("utf-8 stream");
    parse_sse(&text)
}

fn parse_sse(text: &str) -> Vec<serde_json::Value> {
    text.split("\n\n")
        .filter_map(|block| {
            let data: Vec<&str> = block
                .lines()
                .filter_map(|line| line.strip_prefix("data:"))
                .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
                .collect();
            (!data.is_empty()).then(|| data.join("\n"))
        })
        .map(|data| serde_json::from_str(&data).expect("event payload is json"))
        .collect()
}

/// Poll `GET /api/jobs/{id}` until the job leaves the running states.
pub async fn wait_for_terminal(app: &Router, job_id: &str) -> serde_json::Value {
    let poll = async {
        loop {
            let json = body_json(get(app.clone(), &format!("/api/jobs/{job_id}")).await).await;
            let state = json["data"]["state"].as_str().unwrap_or_default().to_string();
            if state != "starting" && state != "running" {
                return json["data"].clone();
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(10), poll)
        .await
        .expect("job should terminate")
}
