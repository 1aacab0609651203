//! Repository for the `fitness_plans` table.

use fitplan_core::types::DbId;
use sqlx::PgPool;

use crate::models::plan::{CreateFitnessPlan, FitnessPlan};

/// Column list for `fitness_plans` queries.
const COLUMNS: &str = "\
    id, owner_id, job_id, goal, days_per_week, parameters, plan, \
    is_active, created_at";

/// Stores generated plans. Each owner has at most one active plan.
pub struct PlanRepo;

impl PlanRepo {
    /// Insert a plan and make it the owner's active plan.
    ///
    /// The previous active plan is deactivated in the same transaction so the
    /// `uq_fitness_plans_active_owner` index never sees two active rows.
    pub async fn create(
        pool: &PgPool,
        input: &CreateFitnessPlan<'_>,
    ) -> Result<FitnessPlan, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query(
            "UPDATE fitness_plans SET is_active = FALSE \
             WHERE owner_id = $1 AND is_active",
        )
        .bind(input.owner_id)
        .execute(&mut *tx)
        .await?;

        let query = format!(
            "INSERT INTO fitness_plans \
                 (owner_id, job_id, goal, days_per_week, parameters, plan, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6, TRUE) \
             RETURNING {COLUMNS}"
        );
        let plan = sqlx::query_as::<_, FitnessPlan>(&query)
            .bind(input.owner_id)
            .bind(input.job_id)
            .bind(input.goal)
            .bind(input.days_per_week)
            .bind(input.parameters)
            .bind(input.plan)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(plan)
    }

    /// The owner's active plan, if any.
    pub async fn find_active_by_owner(
        pool: &PgPool,
        owner_id: DbId,
    ) -> Result<Option<FitnessPlan>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM fitness_plans \
             WHERE owner_id = $1 AND is_active"
        );
        sqlx::query_as::<_, FitnessPlan>(&query)
            .bind(owner_id)
            .fetch_optional(pool)
            .await
    }
}
