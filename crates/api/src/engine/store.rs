//! Keyed store holding each owner's current generation job.
//!
//! The owner slot is the only shared mutable resource of the engine. Every
//! [`JobStore`] operation that reads and then writes a slot must do so
//! atomically so that two concurrent `start` calls cannot both succeed.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use fitplan_core::error::CoreError;
use fitplan_core::plan_generation::{GenerationJob, JobUpdate};
use fitplan_core::types::DbId;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Entity name used in `NotFound` errors for job lookups.
pub const JOB_ENTITY: &str = "Plan generation";

/// Message surfaced when an owner already has an active job.
pub const ACTIVE_JOB_CONFLICT: &str = "A plan is already being generated";

/// Storage contract for generation jobs, one slot per owner.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Place `job` in its owner's slot unless the slot holds an active job.
    ///
    /// A terminal job in the slot is replaced.
    async fn insert_if_idle(&self, job: GenerationJob) -> Result<GenerationJob, CoreError>;

    /// The owner's current job, active or terminal.
    async fn get(&self, owner_id: DbId) -> Option<GenerationJob>;

    /// Apply `update` to job `job_id` in the owner's slot.
    ///
    /// Fails with `Conflict` when the slot has since been taken by a newer job.
    async fn apply(
        &self,
        owner_id: DbId,
        job_id: Uuid,
        update: JobUpdate,
    ) -> Result<GenerationJob, CoreError>;

    /// Cancel whatever job currently occupies the owner's slot.
    ///
    /// Idempotent for terminal jobs.
    async fn cancel(&self, owner_id: DbId) -> Result<GenerationJob, CoreError>;

    /// Snapshot of every job that is still pending or running.
    async fn active_jobs(&self) -> Vec<GenerationJob>;
}

/// Process-local [`JobStore`] backed by a `RwLock<HashMap>`.
///
/// Each check-and-write happens under a single write guard.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<DbId, GenerationJob>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert_if_idle(&self, job: GenerationJob) -> Result<GenerationJob, CoreError> {
        let mut jobs = self.jobs.write().await;

        if let Some(existing) = jobs.get(&job.owner_id) {
            if existing.status.is_active() {
                return Err(CoreError::Conflict(ACTIVE_JOB_CONFLICT.to_string()));
            }
        }

        jobs.insert(job.owner_id, job.clone());
        Ok(job)
    }

    async fn get(&self, owner_id: DbId) -> Option<GenerationJob> {
        self.jobs.read().await.get(&owner_id).cloned()
    }

    async fn apply(
        &self,
        owner_id: DbId,
        job_id: Uuid,
        update: JobUpdate,
    ) -> Result<GenerationJob, CoreError> {
        let mut jobs = self.jobs.write().await;

        let job = jobs.get_mut(&owner_id).ok_or(CoreError::NotFound {
            entity: JOB_ENTITY,
            owner_id,
        })?;

        if job.id != job_id {
            return Err(CoreError::Conflict(format!(
                "Job {job_id} has been superseded by job {}",
                job.id
            )));
        }

        job.apply(update, Utc::now())?;
        Ok(job.clone())
    }

    async fn cancel(&self, owner_id: DbId) -> Result<GenerationJob, CoreError> {
        let mut jobs = self.jobs.write().await;

        let job = jobs.get_mut(&owner_id).ok_or(CoreError::NotFound {
            entity: JOB_ENTITY,
            owner_id,
        })?;

        job.apply(JobUpdate::Cancelled, Utc::now())?;
        Ok(job.clone())
    }

    async fn active_jobs(&self) -> Vec<GenerationJob> {
        self.jobs
            .read()
            .await
            .values()
            .filter(|job| job.status.is_active())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;
    use fitplan_core::plan_generation::{GenerationParams, JobStatus, GOAL_ENDURANCE};

    use super::*;

    fn pending(owner_id: DbId) -> GenerationJob {
        GenerationJob::new_pending(
            owner_id,
            GenerationParams::new(GOAL_ENDURANCE, 4),
            5,
            "Queued",
            10,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn second_insert_for_active_owner_conflicts() {
        let store = InMemoryJobStore::new();
        store.insert_if_idle(pending(1)).await.unwrap();

        assert_matches!(
            store.insert_if_idle(pending(1)).await,
            Err(CoreError::Conflict(_))
        );
        // Other owners are unaffected.
        assert!(store.insert_if_idle(pending(2)).await.is_ok());
    }

    #[tokio::test]
    async fn terminal_job_is_replaced() {
        let store = InMemoryJobStore::new();
        let first = store.insert_if_idle(pending(1)).await.unwrap();
        store.cancel(1).await.unwrap();

        let second = store.insert_if_idle(pending(1)).await.unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(store.get(1).await.unwrap().id, second.id);
    }

    #[tokio::test]
    async fn concurrent_inserts_admit_exactly_one() {
        let store = Arc::new(InMemoryJobStore::new());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.insert_if_idle(pending(7)).await.is_ok() })
            })
            .collect();

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 1);
    }

    #[tokio::test]
    async fn apply_to_superseded_job_conflicts() {
        let store = InMemoryJobStore::new();
        let stale = store.insert_if_idle(pending(1)).await.unwrap();
        store.cancel(1).await.unwrap();
        store.insert_if_idle(pending(1)).await.unwrap();

        let result = store
            .apply(
                1,
                stale.id,
                JobUpdate::Started {
                    step_message: "Analyzing".into(),
                    estimated_seconds_remaining: 5,
                },
            )
            .await;
        assert_matches!(result, Err(CoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn cancel_without_job_is_not_found() {
        let store = InMemoryJobStore::new();
        assert_matches!(store.cancel(9).await, Err(CoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn active_jobs_excludes_terminal() {
        let store = InMemoryJobStore::new();
        store.insert_if_idle(pending(1)).await.unwrap();
        store.insert_if_idle(pending(2)).await.unwrap();
        store.cancel(2).await.unwrap();

        let active = store.active_jobs().await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].owner_id, 1);
        assert_eq!(active[0].status, JobStatus::Pending);
    }
}
