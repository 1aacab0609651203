//! Handlers for the `/plan-generation` resource.
//!
//! All endpoints require authentication via [`AuthUser`]; the caller's user
//! id is the job owner.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use fitplan_core::plan_generation::GenerationParams;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::{DataResponse, MessageResponse, StartResponse};
use crate::state::AppState;

/// POST /api/v1/plan-generation
///
/// Start generating a plan. Returns 202 with the initial `pending` snapshot,
/// or 409 if the caller already has a job in progress.
pub async fn start_generation(
    auth: AuthUser,
    State(state): State<AppState>,
    input: Result<Json<GenerationParams>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(params) = input?;
    let progress = state.controller.start(auth.user_id, params).await?;

    Ok((StatusCode::ACCEPTED, Json(StartResponse { progress })))
}

/// GET /api/v1/plan-generation/progress
///
/// Current snapshot of the caller's job. 404 if none was ever started.
pub async fn get_progress(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let job = state.controller.get_progress(auth.user_id).await?;
    Ok(Json(job))
}

/// POST /api/v1/plan-generation/cancel
///
/// Cancel the caller's job. Already finished jobs are left untouched and
/// the same confirmation is returned.
pub async fn cancel_generation(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let message = state.controller.cancel(auth.user_id).await?;
    Ok(Json(MessageResponse {
        message: message.to_string(),
    }))
}

/// GET /api/v1/plan-generation/active
///
/// The plan persisted by the caller's last completed job.
pub async fn get_active_plan(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let plan = state.controller.active_plan(auth.user_id).await?;
    Ok(Json(DataResponse { data: plan }))
}
