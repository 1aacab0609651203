//! Presentation projection of a job snapshot.
//!
//! [`compute_display_progress`] is a pure function so clients can call it on
//! every poll without side effects.

use serde::Serialize;

use crate::plan_generation::{GenerationJob, JobStatus};

/// Highest percentage shown while a job has not completed.
pub const MAX_INCOMPLETE_PERCENT: u8 = 99;

/// Presentation-ready view of a [`GenerationJob`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayProgress {
    pub status: JobStatus,
    pub percent_complete: u8,
    pub step_label: String,
    pub remaining_text: String,
    pub is_complete: bool,
    pub has_failed: bool,
    pub is_cancelled: bool,
}

/// Map a raw job snapshot to its display shape.
pub fn compute_display_progress(job: &GenerationJob) -> DisplayProgress {
    let percent_complete = percent_complete(job.current_step, job.total_steps, job.status);

    let step_label = match job.status {
        JobStatus::Pending | JobStatus::Running => {
            let shown = (job.current_step + 1).min(job.total_steps.max(1));
            format!(
                "Step {shown} of {}: {}",
                job.total_steps.max(1),
                job.step_message
            )
        }
        JobStatus::Failed => job
            .error_message
            .clone()
            .unwrap_or_else(|| job.step_message.clone()),
        JobStatus::Completed | JobStatus::Cancelled => job.step_message.clone(),
    };

    let remaining_text = match job.status {
        JobStatus::Pending => "Waiting to start".to_string(),
        JobStatus::Running => format_remaining(job.estimated_seconds_remaining),
        JobStatus::Completed => "Plan ready".to_string(),
        JobStatus::Failed => "Generation failed".to_string(),
        JobStatus::Cancelled => "Generation cancelled".to_string(),
    };

    DisplayProgress {
        status: job.status,
        percent_complete,
        step_label,
        remaining_text,
        is_complete: job.status == JobStatus::Completed,
        has_failed: job.status == JobStatus::Failed,
        is_cancelled: job.status == JobStatus::Cancelled,
    }
}

/// `floor(current / total * 100)`, held below 100 until the job completes.
pub fn percent_complete(current_step: u32, total_steps: u32, status: JobStatus) -> u8 {
    if status == JobStatus::Completed {
        return 100;
    }
    if total_steps == 0 {
        return 0;
    }
    let raw = u64::from(current_step.min(total_steps)) * 100 / u64::from(total_steps);
    (raw as u8).min(MAX_INCOMPLETE_PERCENT)
}

/// Human-readable remaining time, e.g. `"about 2 min 5 s remaining"`.
pub fn format_remaining(seconds: u64) -> String {
    match seconds {
        0 => "Almost done".to_string(),
        1 => "about 1 second remaining".to_string(),
        2..=59 => format!("about {seconds} seconds remaining"),
        _ => {
            let minutes = seconds / 60;
            let rest = seconds % 60;
            if rest == 0 {
                format!("about {minutes} min remaining")
            } else {
                format!("about {minutes} min {rest} s remaining")
            }
        }
    }
}
