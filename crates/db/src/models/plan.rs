//! Fitness plan rows produced by completed generation jobs.

use fitplan_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// A row from the `fitness_plans` table.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FitnessPlan {
    pub id: DbId,
    pub owner_id: DbId,
    pub job_id: Uuid,
    pub goal: String,
    pub days_per_week: i16,
    pub parameters: serde_json::Value,
    pub plan: serde_json::Value,
    pub is_active: bool,
    pub created_at: Timestamp,
}

/// DTO for inserting a freshly generated plan.
#[derive(Debug)]
pub struct CreateFitnessPlan<'a> {
    pub owner_id: DbId,
    pub job_id: Uuid,
    pub goal: &'a str,
    pub days_per_week: i16,
    pub parameters: &'a serde_json::Value,
    pub plan: &'a serde_json::Value,
}
