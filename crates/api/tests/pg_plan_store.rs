//! Integration tests for the Postgres-backed `PlanStore`.

use chrono::Utc;
use fitplan_core::plan_generation::{GenerationJob, GenerationParams, GOAL_MUSCLE_BUILD};
use fitplan_core::types::DbId;
use serde_json::json;
use sqlx::PgPool;

use fitplan_api::engine::plans::{PgPlanStore, PlanStore};

fn job(owner_id: DbId) -> GenerationJob {
    GenerationJob::new_pending(
        owner_id,
        GenerationParams::new(GOAL_MUSCLE_BUILD, 5),
        5,
        "Queued",
        0,
        Utc::now(),
    )
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn save_maps_job_fields_onto_the_active_plan(pool: PgPool) {
    let store = PgPlanStore::new(pool);
    let job = job(7);
    let body = json!({ "goal": GOAL_MUSCLE_BUILD, "days": [] });

    let saved = store.save(&job, &body).await.unwrap();
    assert_eq!(saved.owner_id, 7);
    assert_eq!(saved.job_id, job.id);
    assert_eq!(saved.goal, GOAL_MUSCLE_BUILD);
    assert_eq!(saved.days_per_week, 5);
    assert_eq!(saved.plan, body);

    let found = store.find_active(7).await.unwrap().expect("active plan");
    assert_eq!(found.id, saved.id);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn newer_job_replaces_the_active_plan(pool: PgPool) {
    let store = PgPlanStore::new(pool);

    let first = store.save(&job(7), &json!({ "version": 1 })).await.unwrap();
    let second = store.save(&job(7), &json!({ "version": 2 })).await.unwrap();
    assert_ne!(first.id, second.id);

    let found = store.find_active(7).await.unwrap().expect("active plan");
    assert_eq!(found.job_id, second.job_id);
    assert_eq!(found.plan, json!({ "version": 2 }));

    assert!(store.find_active(8).await.unwrap().is_none());
}
