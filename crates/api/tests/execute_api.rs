//! Integration tests for `POST /api/execute`.

mod common;

use axum::http::StatusCode;
use common::{body_json, post_json, post_raw, MISSING_EXECUTABLE};
use serde_json::json;

#[tokio::test]
async fn execute_acknowledges_even_when_executable_is_missing() {
    let static_dir = tempfile::tempdir().unwrap();
    let app = common::build_test_app(common::test_config(MISSING_EXECUTABLE, static_dir.path()));

    let response = post_json(
        app,
        "/api/execute",
        json!({ "action": "build", "params": { "verbose": true } }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["message"], "Process started");
    assert!(json["job_id"].is_string());
}

#[tokio::test]
async fn execute_without_params_is_accepted() {
    let static_dir = tempfile::tempdir().unwrap();
    let app = common::build_test_app(common::test_config(MISSING_EXECUTABLE, static_dir.path()));

    let response = post_json(app, "/api/execute", json!({ "action": "build" })).await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn missing_action_is_rejected() {
    let static_dir = tempfile::tempdir().unwrap();
    let app = common::build_test_app(common::test_config(MISSING_EXECUTABLE, static_dir.path()));

    let response = post_json(app, "/api/execute", json!({ "params": {} })).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn option_like_action_is_rejected() {
    let static_dir = tempfile::tempdir().unwrap();
    let app = common::build_test_app(common::test_config(MISSING_EXECUTABLE, static_dir.path()));

    let response = post_json(app, "/api/execute", json!({ "action": "--help" })).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_json_is_rejected() {
    let static_dir = tempfile::tempdir().unwrap();
    let app = common::build_test_app(common::test_config(MISSING_EXECUTABLE, static_dir.path()));

    let response = post_raw(app, "/api/execute", "{ not json".to_string()).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn numeric_param_value_is_rejected() {
    let static_dir = tempfile::tempdir().unwrap();
    let app = common::build_test_app(common::test_config(MISSING_EXECUTABLE, static_dir.path()));

    let response = post_json(
        app,
        "/api/execute",
        json!({ "action": "build", "params": { "count": 3 } }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
