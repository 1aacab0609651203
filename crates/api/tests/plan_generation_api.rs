//! Integration tests for the `/plan-generation` endpoints.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use common::{body_json, build_test_app, get, post_empty, post_json, SLOW_STEP};
use serde_json::json;

const START: &str = "/api/v1/plan-generation";
const PROGRESS: &str = "/api/v1/plan-generation/progress";
const CANCEL: &str = "/api/v1/plan-generation/cancel";
const ACTIVE: &str = "/api/v1/plan-generation/active";

fn params() -> serde_json::Value {
    json!({
        "goal": "muscleBuild",
        "daysPerWeek": 3,
        "equipment": ["dumbbells"],
        "weeklyBudget": 80.0
    })
}

// ---------------------------------------------------------------------------
// Start
// ---------------------------------------------------------------------------

#[tokio::test]
async fn start_returns_pending_snapshot() {
    let (app, _) = build_test_app(SLOW_STEP);

    let response = post_json(&app, START, Some(42), params()).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let json = body_json(response).await;
    assert_eq!(json["progress"]["status"], "pending");
    assert_eq!(json["progress"]["currentStep"], 0);
    assert_eq!(json["progress"]["totalSteps"], 5);
    assert_eq!(json["progress"]["ownerId"], 42);
    assert!(json["progress"].get("result").is_none());
}

#[tokio::test]
async fn second_start_while_active_conflicts() {
    let (app, _) = build_test_app(SLOW_STEP);

    let first = post_json(&app, START, Some(42), params()).await;
    assert_eq!(first.status(), StatusCode::ACCEPTED);

    let second = post_json(&app, START, Some(42), params()).await;
    assert_eq!(second.status(), StatusCode::CONFLICT);

    let json = body_json(second).await;
    assert_eq!(json["code"], "CONFLICT");
    assert_eq!(json["error"], "A plan is already being generated");
}

#[tokio::test]
async fn owners_do_not_block_each_other() {
    let (app, _) = build_test_app(SLOW_STEP);

    let first = post_json(&app, START, Some(1), params()).await;
    let second = post_json(&app, START, Some(2), params()).await;

    assert_eq!(first.status(), StatusCode::ACCEPTED);
    assert_eq!(second.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn invalid_params_are_rejected() {
    let (app, _) = build_test_app(SLOW_STEP);

    let response = post_json(
        &app,
        START,
        Some(42),
        json!({ "goal": "muscleBuild", "daysPerWeek": 9 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");

    // Nothing was started.
    let progress = get(&app, PROGRESS, Some(42)).await;
    assert_eq!(progress.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_body_is_bad_request() {
    let (app, _) = build_test_app(SLOW_STEP);

    let response = post_json(&app, START, Some(42), json!({ "daysPerWeek": 3 })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn requests_without_token_are_unauthorized() {
    let (app, _) = build_test_app(SLOW_STEP);

    let response = post_json(&app, START, None, params()).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = get(&app, PROGRESS, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "UNAUTHORIZED");
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

#[tokio::test]
async fn progress_without_job_is_not_found() {
    let (app, _) = build_test_app(SLOW_STEP);

    let response = get(&app, PROGRESS, Some(7)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], "Plan generation not found for user 7");
}

#[tokio::test(start_paused = true)]
async fn current_step_never_decreases_while_running() {
    let (app, _) = build_test_app(Duration::from_millis(2500));

    post_json(&app, START, Some(5), params()).await;

    let mut last_step = 0;
    let mut final_status = String::new();
    for _ in 0..40 {
        tokio::time::sleep(Duration::from_millis(700)).await;
        let json = body_json(get(&app, PROGRESS, Some(5)).await).await;
        let step = json["currentStep"].as_u64().unwrap();
        assert!(step >= last_step, "step went from {last_step} to {step}");
        last_step = step;

        final_status = json["status"].as_str().unwrap().to_string();
        if final_status == "completed" {
            break;
        }
    }

    assert_eq!(final_status, "completed");
    assert_eq!(last_step, 5);
}

// ---------------------------------------------------------------------------
// Cancel
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_is_idempotent() {
    let (app, _) = build_test_app(SLOW_STEP);
    post_json(&app, START, Some(42), params()).await;

    let first = post_empty(&app, CANCEL, Some(42)).await;
    assert_eq!(first.status(), StatusCode::OK);
    let first = body_json(first).await;

    let snapshot = body_json(get(&app, PROGRESS, Some(42)).await).await;
    assert_eq!(snapshot["status"], "cancelled");

    let second = post_empty(&app, CANCEL, Some(42)).await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(body_json(second).await, first);
    assert_eq!(first, json!({ "message": "cancelled" }));

    let after = body_json(get(&app, PROGRESS, Some(42)).await).await;
    assert_eq!(after, snapshot);
}

#[tokio::test]
async fn cancel_without_job_is_not_found() {
    let (app, _) = build_test_app(SLOW_STEP);

    let response = post_empty(&app, CANCEL, Some(42)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn start_is_allowed_again_after_cancel() {
    let (app, _) = build_test_app(SLOW_STEP);
    post_json(&app, START, Some(42), params()).await;
    post_empty(&app, CANCEL, Some(42)).await;

    let response = post_json(&app, START, Some(42), params()).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(body_json(response).await["progress"]["status"], "pending");
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn start_poll_conflict_cancel_scenario() {
    let (app, _) = build_test_app(Duration::from_millis(2500));

    let started = body_json(post_json(&app, START, Some(42), params()).await).await;
    assert_eq!(started["progress"]["status"], "pending");
    assert_eq!(started["progress"]["currentStep"], 0);
    assert_eq!(started["progress"]["totalSteps"], 5);

    tokio::time::sleep(Duration::from_secs(3)).await;

    let polled = body_json(get(&app, PROGRESS, Some(42)).await).await;
    assert_eq!(polled["status"], "running");
    assert_eq!(polled["currentStep"], 1);
    assert_eq!(polled["totalSteps"], 5);

    let again = post_json(&app, START, Some(42), params()).await;
    assert_eq!(again.status(), StatusCode::CONFLICT);

    let cancelled = body_json(post_empty(&app, CANCEL, Some(42)).await).await;
    assert_eq!(cancelled["message"], "cancelled");

    let polled = body_json(get(&app, PROGRESS, Some(42)).await).await;
    assert_eq!(polled["status"], "cancelled");

    // Advancement has halted: later polls see the same step.
    tokio::time::sleep(Duration::from_secs(10)).await;
    let later = body_json(get(&app, PROGRESS, Some(42)).await).await;
    assert_eq!(later["status"], "cancelled");
    assert_eq!(later["currentStep"], 1);
}

#[tokio::test]
async fn completed_job_exposes_result_and_persisted_plan() {
    let (app, controller) = build_test_app(Duration::ZERO);

    post_json(&app, START, Some(42), params()).await;
    common::wait_for_terminal(&controller, 42).await;

    let snapshot = body_json(get(&app, PROGRESS, Some(42)).await).await;
    assert_eq!(snapshot["status"], "completed");
    assert_eq!(snapshot["currentStep"], 5);
    assert_eq!(snapshot["estimatedSecondsRemaining"], 0);
    assert!(snapshot["result"].is_object());
    assert!(snapshot.get("errorMessage").is_none());

    // Terminal snapshots are immutable.
    let again = body_json(get(&app, PROGRESS, Some(42)).await).await;
    assert_eq!(again, snapshot);

    let active = get(&app, ACTIVE, Some(42)).await;
    assert_eq!(active.status(), StatusCode::OK);
    let active = body_json(active).await;
    assert_eq!(active["data"]["goal"], "muscleBuild");
    assert_eq!(active["data"]["jobId"], snapshot["id"]);
    assert_eq!(active["data"]["plan"], snapshot["result"]);
    assert_eq!(
        active["data"]["plan"]["workouts"].as_array().unwrap().len(),
        3
    );
}

#[tokio::test]
async fn active_plan_without_completed_job_is_not_found() {
    let (app, _) = build_test_app(SLOW_STEP);
    post_json(&app, START, Some(42), params()).await;

    let response = get(&app, ACTIVE, Some(42)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_json(response).await["error"],
        "Active plan not found for user 42"
    );
}

#[tokio::test]
async fn cancel_after_completion_keeps_completed_state() {
    let (app, controller) = build_test_app(Duration::ZERO);
    post_json(&app, START, Some(42), params()).await;
    common::wait_for_terminal(&controller, 42).await;

    let response = post_empty(&app, CANCEL, Some(42)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["message"], "cancelled");

    let snapshot = body_json(get(&app, PROGRESS, Some(42)).await).await;
    assert_eq!(snapshot["status"], "completed");
}
