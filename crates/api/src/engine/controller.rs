//! Job controller: start, poll, cancel and advance plan generation jobs.
//!
//! Each started job gets its own Tokio task that walks the generator's steps.
//! Cancellation is cooperative: the task re-reads the job status before every
//! step and its pacing delay is interruptible through a [`CancellationToken`].
//! Failures are terminal; callers retry by starting a new job.
//!
//! Publishing a plan (save, then `running -> completed`) holds the job's
//! publish lock. Cancellation and the timeout sweep take the same lock
//! before changing the job, so a job never ends `cancelled` or `failed`
//! with its plan already persisted.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use fitplan_core::error::CoreError;
use fitplan_core::plan_generation::{
    validate_generation_params, FailureKind, GenerationJob, GenerationParams, JobStatus,
    JobUpdate, CANCELLED_MESSAGE,
};
use fitplan_core::types::DbId;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::generator::{GenerationError, PlanDraft, PlanGenerator};
use super::plans::{PlanStore, StoredPlan, PLAN_ENTITY};
use super::store::{JobStore, JOB_ENTITY};

/// Owns the authoritative state of every owner's generation job.
pub struct JobController {
    store: Arc<dyn JobStore>,
    plans: Arc<dyn PlanStore>,
    generator: Arc<dyn PlanGenerator>,
    step_delay: Duration,
    /// Jobs whose advancement task is still alive.
    tasks: Mutex<HashMap<Uuid, JobTask>>,
}

/// Handles shared between a job's advancement task and its controller.
struct JobTask {
    token: CancellationToken,
    /// Held while the job's plan is being published.
    publish: Arc<Mutex<()>>,
}

impl JobController {
    pub fn new(
        store: Arc<dyn JobStore>,
        plans: Arc<dyn PlanStore>,
        generator: Arc<dyn PlanGenerator>,
        step_delay: Duration,
    ) -> Self {
        Self {
            store,
            plans,
            generator,
            step_delay,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Start a new job for `owner_id` and return its initial snapshot.
    ///
    /// Returns immediately; advancement runs on a spawned task. Fails with
    /// `Conflict` if the owner already has a pending or running job.
    pub async fn start(
        self: &Arc<Self>,
        owner_id: DbId,
        params: GenerationParams,
    ) -> Result<GenerationJob, CoreError> {
        validate_generation_params(&params)?;

        let total_steps = self.generator.total_steps();
        let job = GenerationJob::new_pending(
            owner_id,
            params,
            total_steps,
            self.generator.step_message(1),
            self.initial_estimate_secs(total_steps),
            Utc::now(),
        );
        let job = self.store.insert_if_idle(job).await?;

        let token = CancellationToken::new();
        let publish = Arc::new(Mutex::new(()));
        self.tasks.lock().await.insert(
            job.id,
            JobTask {
                token: token.clone(),
                publish: Arc::clone(&publish),
            },
        );

        tracing::info!(
            owner_id,
            job_id = %job.id,
            goal = %job.params.goal,
            total_steps,
            "Plan generation started",
        );

        let controller = Arc::clone(self);
        let snapshot = job.clone();
        tokio::spawn(async move {
            controller.advance(job, token, publish).await;
        });

        Ok(snapshot)
    }

    /// Current snapshot of the owner's job, active or terminal.
    pub async fn get_progress(&self, owner_id: DbId) -> Result<GenerationJob, CoreError> {
        self.store.get(owner_id).await.ok_or(CoreError::NotFound {
            entity: JOB_ENTITY,
            owner_id,
        })
    }

    /// Cancel the owner's job. Repeated calls return the same confirmation.
    ///
    /// Waits for a plan that is being published to land; the job then stays
    /// `completed`.
    pub async fn cancel(&self, owner_id: DbId) -> Result<&'static str, CoreError> {
        let publish = match self.store.get(owner_id).await {
            Some(current) => self.publish_lock(current.id).await,
            None => None,
        };
        let _guard = match publish.as_ref() {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        let job = self.store.cancel(owner_id).await?;

        if job.status != JobStatus::Cancelled {
            return Ok(CANCELLED_MESSAGE);
        }

        if let Some(task) = self.tasks.lock().await.remove(&job.id) {
            task.token.cancel();
            tracing::info!(owner_id, job_id = %job.id, "Plan generation cancelled");
        }

        Ok(CANCELLED_MESSAGE)
    }

    /// The plan persisted by the owner's most recent completed job.
    pub async fn active_plan(&self, owner_id: DbId) -> Result<StoredPlan, CoreError> {
        self.plans
            .find_active(owner_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: PLAN_ENTITY,
                owner_id,
            })
    }

    /// Force-fail every active job that has been running longer than
    /// `max_duration`. Returns the number of jobs failed.
    pub async fn force_fail_expired(&self, max_duration: Duration) -> usize {
        let now = Utc::now();
        let mut failed = 0;

        for job in self.store.active_jobs().await {
            let since = job.started_at.unwrap_or(job.created_at);
            let age = (now - since).to_std().unwrap_or_default();
            if age <= max_duration {
                continue;
            }

            let publish = self.publish_lock(job.id).await;
            let _guard = match publish.as_ref() {
                Some(lock) => Some(lock.lock().await),
                None => None,
            };

            let update = JobUpdate::Failed {
                kind: FailureKind::TimedOut,
                message: format!(
                    "Plan generation exceeded the maximum duration of {} seconds",
                    max_duration.as_secs()
                ),
            };
            match self.store.apply(job.owner_id, job.id, update).await {
                Ok(_) => {
                    failed += 1;
                    if let Some(task) = self.tasks.lock().await.remove(&job.id) {
                        task.token.cancel();
                    }
                    tracing::warn!(
                        owner_id = job.owner_id,
                        job_id = %job.id,
                        age_secs = age.as_secs(),
                        "Plan generation timed out",
                    );
                }
                Err(e) => {
                    // The job finished or was replaced since the scan.
                    tracing::debug!(job_id = %job.id, error = %e, "Skipped expired job");
                }
            }
        }

        failed
    }

    /// Cancel the tokens of all live advancement tasks.
    pub async fn shutdown(&self) {
        let mut tasks = self.tasks.lock().await;
        for task in tasks.values() {
            task.token.cancel();
        }
        tracing::info!(count = tasks.len(), "Stopped plan generation tasks");
        tasks.clear();
    }

    async fn publish_lock(&self, job_id: Uuid) -> Option<Arc<Mutex<()>>> {
        self.tasks
            .lock()
            .await
            .get(&job_id)
            .map(|task| Arc::clone(&task.publish))
    }

    fn initial_estimate_secs(&self, total_steps: u32) -> u64 {
        (self.step_delay * total_steps).as_secs_f64().ceil() as u64
    }

    // -----------------------------------------------------------------------
    // Background advancement
    // -----------------------------------------------------------------------

    async fn advance(
        self: Arc<Self>,
        job: GenerationJob,
        token: CancellationToken,
        publish: Arc<Mutex<()>>,
    ) {
        match self.run_steps(&job, &token).await {
            Ok(Some(plan)) => {
                let _guard = publish.lock().await;
                self.complete(&job, plan).await;
            }
            Ok(None) => {
                tracing::debug!(job_id = %job.id, "Plan generation stopped before completion");
            }
            Err(e) => {
                tracing::error!(
                    owner_id = job.owner_id,
                    job_id = %job.id,
                    error = %e,
                    "Plan generation step failed",
                );
                self.fail(&job, e.to_string()).await;
            }
        }

        self.tasks.lock().await.remove(&job.id);
    }

    /// Walk every generator step. `Ok(None)` means the job stopped being
    /// `running` (cancelled, timed out or superseded) before finishing.
    async fn run_steps(
        &self,
        job: &GenerationJob,
        token: &CancellationToken,
    ) -> Result<Option<serde_json::Value>, GenerationError> {
        let total = job.total_steps;
        let started = Instant::now();

        let begin = JobUpdate::Started {
            step_message: self.generator.step_message(1),
            estimated_seconds_remaining: self.initial_estimate_secs(total),
        };
        if !self.try_apply(job, begin).await {
            return Ok(None);
        }

        let mut draft = PlanDraft::default();

        for step in 1..=total {
            if !self.is_running(job).await {
                return Ok(None);
            }

            tokio::select! {
                _ = token.cancelled() => return Ok(None),
                _ = tokio::time::sleep(self.step_delay) => {}
            }

            if !self.is_running(job).await {
                return Ok(None);
            }

            self.generator
                .run_step(step, &job.params, &mut draft)
                .await?;
            tracing::debug!(job_id = %job.id, step, total, "Plan generation step finished");

            if step < total {
                let update = JobUpdate::Step {
                    step,
                    message: self.generator.step_message(step + 1),
                    estimated_seconds_remaining: estimate_remaining_secs(
                        started.elapsed(),
                        step,
                        total,
                    ),
                };
                if !self.try_apply(job, update).await {
                    return Ok(None);
                }
            }
        }

        Ok(Some(self.generator.finish(&job.params, draft)))
    }

    /// Persist the plan and mark the job `completed`. Caller holds the
    /// publish lock.
    async fn complete(&self, job: &GenerationJob, plan: serde_json::Value) {
        if !self.is_running(job).await {
            return;
        }

        let stored = match self.plans.save(job, &plan).await {
            Ok(stored) => stored,
            Err(e) => {
                self.fail(job, format!("Failed to save generated plan: {e}"))
                    .await;
                return;
            }
        };

        if self
            .try_apply(job, JobUpdate::Completed { result: plan })
            .await
        {
            tracing::info!(
                owner_id = job.owner_id,
                job_id = %job.id,
                plan_id = stored.id,
                "Plan generation completed",
            );
        }
    }

    async fn fail(&self, job: &GenerationJob, message: String) {
        let update = JobUpdate::Failed {
            kind: FailureKind::GenerationFailure,
            message,
        };
        self.try_apply(job, update).await;
    }

    /// Apply an update, returning `false` if the job no longer accepts it.
    async fn try_apply(&self, job: &GenerationJob, update: JobUpdate) -> bool {
        let name = update.name();
        match self.store.apply(job.owner_id, job.id, update).await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(job_id = %job.id, update = name, error = %e, "Job update rejected");
                false
            }
        }
    }

    async fn is_running(&self, job: &GenerationJob) -> bool {
        matches!(
            self.store.get(job.owner_id).await,
            Some(current) if current.id == job.id && current.status == JobStatus::Running
        )
    }
}

/// Remaining seconds, extrapolated from the mean duration of finished steps.
pub fn estimate_remaining_secs(elapsed: Duration, finished_steps: u32, total_steps: u32) -> u64 {
    if finished_steps == 0 || finished_steps >= total_steps {
        return 0;
    }
    let per_step = elapsed.as_secs_f64() / f64::from(finished_steps);
    (per_step * f64::from(total_steps - finished_steps)).ceil() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_extrapolates_mean_step() {
        assert_eq!(estimate_remaining_secs(Duration::from_secs(4), 2, 5), 6);
    }

    #[test]
    fn estimate_rounds_up() {
        assert_eq!(estimate_remaining_secs(Duration::from_millis(2500), 1, 5), 10);
        assert_eq!(estimate_remaining_secs(Duration::from_millis(100), 1, 3), 1);
    }

    #[test]
    fn estimate_is_zero_at_bounds() {
        assert_eq!(estimate_remaining_secs(Duration::from_secs(3), 0, 5), 0);
        assert_eq!(estimate_remaining_secs(Duration::from_secs(3), 5, 5), 0);
    }
}
