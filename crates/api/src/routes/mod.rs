pub mod health;
pub mod plan_generation;

use axum::Router;

use crate::state::AppState;

/// Routes nested under `/api/v1`.
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/plan-generation", plan_generation::router())
}
