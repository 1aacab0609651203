//! Response bodies for the plan generation endpoints.
//!
//! Each endpoint has a fixed JSON shape that the polling client depends on,
//! so the shapes are typed here instead of built with `json!`.

use fitplan_core::plan_generation::GenerationJob;
use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

/// `{ "progress": GenerationJob }`, returned by `start`.
#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub progress: GenerationJob,
}

/// `{ "message": "..." }`, returned by `cancel`.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}
