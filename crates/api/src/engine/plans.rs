//! Persistence of generated plans.
//!
//! Once a job completes, its plan belongs to a [`PlanStore`]. The in-memory
//! store is used by default and in tests; [`PgPlanStore`] writes through to
//! the `fitness_plans` table when a database is configured.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use fitplan_core::error::CoreError;
use fitplan_core::plan_generation::GenerationJob;
use fitplan_core::types::{DbId, Timestamp};
use fitplan_db::models::plan::{CreateFitnessPlan, FitnessPlan};
use fitplan_db::repositories::PlanRepo;
use fitplan_db::DbPool;
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Entity name used in `NotFound` errors for plan lookups.
pub const PLAN_ENTITY: &str = "Active plan";

/// A persisted plan as returned by `GET /plan-generation/active`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredPlan {
    pub id: DbId,
    pub owner_id: DbId,
    pub job_id: Uuid,
    pub goal: String,
    pub days_per_week: u8,
    pub plan: serde_json::Value,
    pub created_at: Timestamp,
}

impl From<FitnessPlan> for StoredPlan {
    fn from(row: FitnessPlan) -> Self {
        Self {
            id: row.id,
            owner_id: row.owner_id,
            job_id: row.job_id,
            goal: row.goal,
            days_per_week: u8::try_from(row.days_per_week).unwrap_or_default(),
            plan: row.plan,
            created_at: row.created_at,
        }
    }
}

/// Storage contract for generated plans. Each owner has one active plan.
#[async_trait]
pub trait PlanStore: Send + Sync {
    /// Persist the plan produced by `job` as the owner's active plan.
    async fn save(
        &self,
        job: &GenerationJob,
        plan: &serde_json::Value,
    ) -> Result<StoredPlan, CoreError>;

    /// The owner's active plan, if one was ever generated.
    async fn find_active(&self, owner_id: DbId) -> Result<Option<StoredPlan>, CoreError>;
}

/// Process-local [`PlanStore`].
pub struct InMemoryPlanStore {
    plans: RwLock<HashMap<DbId, StoredPlan>>,
    next_id: AtomicI64,
}

impl InMemoryPlanStore {
    pub fn new() -> Self {
        Self {
            plans: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for InMemoryPlanStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlanStore for InMemoryPlanStore {
    async fn save(
        &self,
        job: &GenerationJob,
        plan: &serde_json::Value,
    ) -> Result<StoredPlan, CoreError> {
        let stored = StoredPlan {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            owner_id: job.owner_id,
            job_id: job.id,
            goal: job.params.goal.clone(),
            days_per_week: job.params.days_per_week,
            plan: plan.clone(),
            created_at: Utc::now(),
        };
        self.plans
            .write()
            .await
            .insert(job.owner_id, stored.clone());
        Ok(stored)
    }

    async fn find_active(&self, owner_id: DbId) -> Result<Option<StoredPlan>, CoreError> {
        Ok(self.plans.read().await.get(&owner_id).cloned())
    }
}

/// [`PlanStore`] backed by Postgres via [`PlanRepo`].
pub struct PgPlanStore {
    pool: DbPool,
}

impl PgPlanStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn database_error(err: sqlx::Error) -> CoreError {
    tracing::error!(error = %err, "Plan store database error");
    CoreError::Internal(format!("Plan store unavailable: {err}"))
}

#[async_trait]
impl PlanStore for PgPlanStore {
    async fn save(
        &self,
        job: &GenerationJob,
        plan: &serde_json::Value,
    ) -> Result<StoredPlan, CoreError> {
        let parameters = serde_json::to_value(&job.params)
            .map_err(|e| CoreError::Internal(format!("Failed to encode parameters: {e}")))?;

        let input = CreateFitnessPlan {
            owner_id: job.owner_id,
            job_id: job.id,
            goal: &job.params.goal,
            days_per_week: i16::from(job.params.days_per_week),
            parameters: &parameters,
            plan,
        };

        let row = PlanRepo::create(&self.pool, &input)
            .await
            .map_err(database_error)?;
        Ok(row.into())
    }

    async fn find_active(&self, owner_id: DbId) -> Result<Option<StoredPlan>, CoreError> {
        let row = PlanRepo::find_active_by_owner(&self.pool, owner_id)
            .await
            .map_err(database_error)?;
        Ok(row.map(StoredPlan::from))
    }
}
