#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use fitplan_core::plan_generation::GenerationJob;
use fitplan_core::types::DbId;
use http_body_util::BodyExt;
use tower::ServiceExt;

use fitplan_api::auth::jwt::{generate_access_token, JwtConfig};
use fitplan_api::config::{GenerationConfig, ServerConfig};
use fitplan_api::engine::generator::TemplatePlanGenerator;
use fitplan_api::engine::plans::InMemoryPlanStore;
use fitplan_api::engine::store::InMemoryJobStore;
use fitplan_api::engine::JobController;
use fitplan_api::router::build_app_router;
use fitplan_api::state::AppState;

/// Pacing that keeps a job active for the whole test.
pub const SLOW_STEP: Duration = Duration::from_secs(60);

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config(step_delay: Duration) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        jwt: JwtConfig {
            secret: "test-secret".to_string(),
            access_token_expiry_mins: 15,
        },
        generation: GenerationConfig {
            step_delay,
            max_duration: None,
            ..GenerationConfig::default()
        },
    }
}

/// Controller over in-memory stores and the template generator.
pub fn test_controller(step_delay: Duration) -> Arc<JobController> {
    Arc::new(JobController::new(
        Arc::new(InMemoryJobStore::new()),
        Arc::new(InMemoryPlanStore::new()),
        Arc::new(TemplatePlanGenerator),
        step_delay,
    ))
}

/// Build the full application router with the production middleware stack.
pub fn build_test_app(step_delay: Duration) -> (Router, Arc<JobController>) {
    let config = test_config(step_delay);
    let controller = test_controller(step_delay);

    let state = AppState {
        config: Arc::new(config),
        controller: Arc::clone(&controller),
    };

    (build_app_router(state), controller)
}

/// Bearer token for `user_id`, signed with the test secret.
pub fn token_for(user_id: DbId) -> String {
    let config = test_config(SLOW_STEP);
    generate_access_token(user_id, &config.jwt).expect("token generation")
}

pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    user_id: Option<DbId>,
    body: Option<serde_json::Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(id) = user_id {
        builder = builder.header("authorization", format!("Bearer {}", token_for(id)));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    app.clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap()
}

pub async fn get(app: &Router, uri: &str, user_id: Option<DbId>) -> Response<Body> {
    send(app, Method::GET, uri, user_id, None).await
}

pub async fn post_json(
    app: &Router,
    uri: &str,
    user_id: Option<DbId>,
    body: serde_json::Value,
) -> Response<Body> {
    send(app, Method::POST, uri, user_id, Some(body)).await
}

pub async fn post_empty(app: &Router, uri: &str, user_id: Option<DbId>) -> Response<Body> {
    send(app, Method::POST, uri, user_id, None).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Poll the controller (real time) until the owner's job is terminal.
pub async fn wait_for_terminal(controller: &JobController, owner_id: DbId) -> GenerationJob {
    for _ in 0..400 {
        let job = controller.get_progress(owner_id).await.unwrap();
        if job.is_terminal() {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("job for owner {owner_id} did not finish in time");
}
