//! Route definitions for the `/plan-generation` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::plan_generation;
use crate::state::AppState;

/// Routes mounted at `/plan-generation`.
///
/// ```text
/// POST   /            -> start_generation
/// GET    /progress    -> get_progress
/// POST   /cancel      -> cancel_generation
/// GET    /active      -> get_active_plan
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(plan_generation::start_generation))
        .route("/progress", get(plan_generation::get_progress))
        .route("/cancel", post(plan_generation::cancel_generation))
        .route("/active", get(plan_generation::get_active_plan))
}
