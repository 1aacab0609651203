//! Plan generation job model.
//!
//! A [`GenerationJob`] tracks one user's request to generate a fitness plan
//! from `pending` through `running` to exactly one terminal status. All state
//! changes go through [`GenerationJob::apply`], which enforces the legal
//! transitions and keeps terminal jobs immutable.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Parameter vocabularies
// ---------------------------------------------------------------------------

pub const GOAL_MUSCLE_BUILD: &str = "muscleBuild";
pub const GOAL_WEIGHT_LOSS: &str = "weightLoss";
pub const GOAL_ENDURANCE: &str = "endurance";
pub const GOAL_GENERAL_FITNESS: &str = "generalFitness";
pub const GOAL_FLEXIBILITY: &str = "flexibility";

/// All goals the generator knows how to plan for.
pub const VALID_GOALS: &[&str] = &[
    GOAL_MUSCLE_BUILD,
    GOAL_WEIGHT_LOSS,
    GOAL_ENDURANCE,
    GOAL_GENERAL_FITNESS,
    GOAL_FLEXIBILITY,
];

pub const LEVEL_BEGINNER: &str = "beginner";
pub const LEVEL_INTERMEDIATE: &str = "intermediate";
pub const LEVEL_ADVANCED: &str = "advanced";

pub const VALID_EXPERIENCE_LEVELS: &[&str] = &[LEVEL_BEGINNER, LEVEL_INTERMEDIATE, LEVEL_ADVANCED];

pub const MIN_DAYS_PER_WEEK: u8 = 1;
pub const MAX_DAYS_PER_WEEK: u8 = 7;
pub const MIN_SESSION_MINUTES: u16 = 15;
pub const MAX_SESSION_MINUTES: u16 = 180;
pub const MIN_BODY_WEIGHT_KG: f64 = 20.0;
pub const MAX_BODY_WEIGHT_KG: f64 = 400.0;

// ---------------------------------------------------------------------------
// Job defaults
// ---------------------------------------------------------------------------

/// Number of steps the built-in generator runs through.
pub const DEFAULT_TOTAL_STEPS: u32 = 5;

/// Confirmation returned by every cancel call, including repeated ones.
pub const CANCELLED_MESSAGE: &str = "cancelled";

const MESSAGE_COMPLETED: &str = "Your plan is ready";
const MESSAGE_CANCELLED: &str = "Generation cancelled";

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of a generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// `completed`, `failed` and `cancelled` admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// An active job occupies its owner's slot.
    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a job ended in `failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A generation step raised an error.
    GenerationFailure,
    /// The job exceeded the configured maximum duration.
    TimedOut,
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

fn default_experience_level() -> String {
    LEVEL_BEGINNER.to_string()
}

/// Request body of `POST /plan-generation`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParams {
    pub goal: String,
    pub days_per_week: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_minutes: Option<u16>,
    #[serde(default = "default_experience_level")]
    pub experience_level: String,
    #[serde(default)]
    pub equipment: Vec<String>,
    #[serde(default)]
    pub dietary_preferences: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekly_budget: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_weight_kg: Option<f64>,
}

impl GenerationParams {
    /// Parameters with only the required fields set.
    pub fn new(goal: impl Into<String>, days_per_week: u8) -> Self {
        Self {
            goal: goal.into(),
            days_per_week,
            session_minutes: None,
            experience_level: default_experience_level(),
            equipment: Vec::new(),
            dietary_preferences: Vec::new(),
            weekly_budget: None,
            body_weight_kg: None,
        }
    }
}

/// Validate generation parameters before a job is created.
pub fn validate_generation_params(params: &GenerationParams) -> Result<(), CoreError> {
    if !VALID_GOALS.contains(&params.goal.as_str()) {
        return Err(CoreError::Validation(format!(
            "Invalid goal '{}'. Must be one of: {}",
            params.goal,
            VALID_GOALS.join(", ")
        )));
    }

    if !(MIN_DAYS_PER_WEEK..=MAX_DAYS_PER_WEEK).contains(&params.days_per_week) {
        return Err(CoreError::Validation(format!(
            "daysPerWeek must be between {MIN_DAYS_PER_WEEK} and {MAX_DAYS_PER_WEEK}"
        )));
    }

    if let Some(minutes) = params.session_minutes {
        if !(MIN_SESSION_MINUTES..=MAX_SESSION_MINUTES).contains(&minutes) {
            return Err(CoreError::Validation(format!(
                "sessionMinutes must be between {MIN_SESSION_MINUTES} and {MAX_SESSION_MINUTES}"
            )));
        }
    }

    if !VALID_EXPERIENCE_LEVELS.contains(&params.experience_level.as_str()) {
        return Err(CoreError::Validation(format!(
            "Invalid experienceLevel '{}'. Must be one of: {}",
            params.experience_level,
            VALID_EXPERIENCE_LEVELS.join(", ")
        )));
    }

    if let Some(budget) = params.weekly_budget {
        if !budget.is_finite() || budget < 0.0 {
            return Err(CoreError::Validation(
                "weeklyBudget must be a non-negative number".to_string(),
            ));
        }
    }

    if let Some(weight) = params.body_weight_kg {
        if !(MIN_BODY_WEIGHT_KG..=MAX_BODY_WEIGHT_KG).contains(&weight) {
            return Err(CoreError::Validation(format!(
                "bodyWeightKg must be between {MIN_BODY_WEIGHT_KG} and {MAX_BODY_WEIGHT_KG}"
            )));
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Job snapshot
// ---------------------------------------------------------------------------

/// Authoritative state of one plan generation job.
///
/// Serialized as the progress snapshot returned by polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationJob {
    pub id: Uuid,
    pub owner_id: DbId,
    pub status: JobStatus,
    pub current_step: u32,
    pub total_steps: u32,
    pub step_message: String,
    pub estimated_seconds_remaining: u64,
    /// Present only when `status == failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Present only when `status == failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,
    /// The generated plan. Present only when `status == completed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    pub params: GenerationParams,
    pub created_at: Timestamp,
    #[serde(default)]
    pub started_at: Option<Timestamp>,
    pub updated_at: Timestamp,
    #[serde(default)]
    pub finished_at: Option<Timestamp>,
}

/// A state change requested by the controller or the watchdog.
#[derive(Debug, Clone, PartialEq)]
pub enum JobUpdate {
    /// Background work has begun.
    Started {
        step_message: String,
        estimated_seconds_remaining: u64,
    },
    /// Step `step` has finished; `message` describes what runs next.
    Step {
        step: u32,
        message: String,
        estimated_seconds_remaining: u64,
    },
    Completed {
        result: serde_json::Value,
    },
    Failed {
        kind: FailureKind,
        message: String,
    },
    Cancelled,
}

impl JobUpdate {
    /// Short name used in error messages and logs.
    pub fn name(&self) -> &'static str {
        match self {
            JobUpdate::Started { .. } => "start",
            JobUpdate::Step { .. } => "step",
            JobUpdate::Completed { .. } => "completion",
            JobUpdate::Failed { .. } => "failure",
            JobUpdate::Cancelled => "cancellation",
        }
    }
}

impl GenerationJob {
    /// Create a job in `pending` with no progress.
    pub fn new_pending(
        owner_id: DbId,
        params: GenerationParams,
        total_steps: u32,
        step_message: impl Into<String>,
        estimated_seconds_remaining: u64,
        now: Timestamp,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            status: JobStatus::Pending,
            current_step: 0,
            total_steps: total_steps.max(1),
            step_message: step_message.into(),
            estimated_seconds_remaining,
            error_message: None,
            failure_kind: None,
            result: None,
            params,
            created_at: now,
            started_at: None,
            updated_at: now,
            finished_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply a state change.
    ///
    /// Cancelling an already terminal job is accepted and changes nothing.
    /// Every other update on a terminal job fails with
    /// [`CoreError::InvalidTransition`].
    pub fn apply(&mut self, update: JobUpdate, now: Timestamp) -> Result<(), CoreError> {
        let from = self.status;
        let attempted = update.name();

        match update {
            JobUpdate::Started {
                step_message,
                estimated_seconds_remaining,
            } if from == JobStatus::Pending => {
                self.status = JobStatus::Running;
                self.started_at = Some(now);
                self.step_message = step_message;
                self.estimated_seconds_remaining = estimated_seconds_remaining;
            }

            JobUpdate::Step {
                step,
                message,
                estimated_seconds_remaining,
            } if from == JobStatus::Running => {
                if step < self.current_step {
                    return Err(CoreError::Validation(format!(
                        "Step {step} would move progress backwards from step {}",
                        self.current_step
                    )));
                }
                if step > self.total_steps {
                    return Err(CoreError::Validation(format!(
                        "Step {step} exceeds total of {} steps",
                        self.total_steps
                    )));
                }
                self.current_step = step;
                self.step_message = message;
                self.estimated_seconds_remaining = estimated_seconds_remaining;
            }

            JobUpdate::Completed { result } if from == JobStatus::Running => {
                self.status = JobStatus::Completed;
                self.current_step = self.total_steps;
                self.step_message = MESSAGE_COMPLETED.to_string();
                self.estimated_seconds_remaining = 0;
                self.result = Some(result);
                self.finished_at = Some(now);
            }

            JobUpdate::Failed { kind, message } if from.is_active() => {
                self.status = JobStatus::Failed;
                self.estimated_seconds_remaining = 0;
                self.error_message = Some(message);
                self.failure_kind = Some(kind);
                self.finished_at = Some(now);
            }

            JobUpdate::Cancelled if from.is_active() => {
                self.status = JobStatus::Cancelled;
                self.step_message = MESSAGE_CANCELLED.to_string();
                self.estimated_seconds_remaining = 0;
                self.finished_at = Some(now);
            }

            JobUpdate::Cancelled => return Ok(()),

            _ => return Err(CoreError::InvalidTransition { from, attempted }),
        }

        self.updated_at = now;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
