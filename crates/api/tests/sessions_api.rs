//! Integration tests for session variables and the diagnostics endpoints.

mod common;

use axum::http::StatusCode;
use common::{
    body_json, build_test_app, gated_state, get, new_session, post_json, session_delete,
    session_get, session_patch_json, session_post_json, test_state,
};
use serde_json::json;

const VARIABLES: &str = "/api/v1/session/variables";

#[tokio::test]
async fn create_session_returns_id_and_defaults() {
    let app = build_test_app(test_state());

    let response = post_json(app, "/api/v1/sessions", json!({})).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["session_id"].as_str().unwrap().len(), 36);
    assert_eq!(json["data"]["variables"]["simulation_days"], 180);
    assert_eq!(json["data"]["variables"]["r0"], 2.5);
}

#[tokio::test]
async fn patch_then_reset_variables() {
    let app = build_test_app(test_state());
    let session = new_session(app.clone()).await;

    let response = session_patch_json(
        app.clone(),
        VARIABLES,
        &session,
        json!({"variables": {"r0": 1.8, "population": 5000}}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let patched = body_json(response).await;
    assert_eq!(patched["data"]["r0"], 1.8);
    assert_eq!(patched["data"]["population"], 5000);
    assert_eq!(patched["data"]["simulation_days"], 180, "untouched variables remain");

    let current = body_json(session_get(app.clone(), VARIABLES, &session).await).await;
    assert_eq!(current["data"]["r0"], 1.8);

    let reset = body_json(session_delete(app.clone(), VARIABLES, &session).await).await;
    assert_eq!(reset["data"]["r0"], 2.5);
}

#[tokio::test]
async fn empty_patch_is_rejected() {
    let app = build_test_app(test_state());
    let session = new_session(app.clone()).await;

    let response =
        session_patch_json(app, VARIABLES, &session, json!({"variables": {}})).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn unknown_session_id_starts_with_defaults() {
    let app = build_test_app(test_state());

    let response = session_get(
        app,
        VARIABLES,
        "6f1c3b52-8f63-4d3e-9d0b-1b4f4a2d6c11",
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["simulation_days"], 180);
}

#[tokio::test]
async fn jobs_endpoint_lists_live_runs() {
    let (state, gate) = gated_state();
    let app = build_test_app(state.clone());
    let session = new_session(app.clone()).await;
    let started = body_json(
        session_post_json(app.clone(), "/api/v1/simulations/run", &session, json!({})).await,
    )
    .await;

    // The worker registers on its first scheduling.
    let mut live = json!([]);
    for _ in 0..200 {
        let jobs = body_json(get(app.clone(), "/api/v1/jobs").await).await;
        live = jobs["data"]["live"].clone();
        if !live.as_array().unwrap().is_empty() {
            assert_eq!(jobs["data"]["total_spawned"], 1);
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    assert_eq!(live[0]["job_id"], started["data"]["job_id"]);
    assert_eq!(live[0]["fingerprint"], started["data"]["fingerprint"]);

    gate.open();
}

#[tokio::test]
async fn cache_stats_report_counters() {
    let app = build_test_app(test_state());
    let session = new_session(app.clone()).await;
    session_get(app.clone(), "/api/v1/simulations/poll", &session).await;

    let response = get(app, "/api/v1/cache/stats").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["data"]["entries"].is_u64());
    assert!(json["data"]["hits"].is_u64());
    assert!(json["data"]["misses"].is_u64());
    assert!(json["data"]["writes"].is_u64());
    assert!(json["data"]["hit_rate"].is_f64());
}
