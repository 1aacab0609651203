//! `fitplan-watch` -- start a plan generation and follow it to the end.
//!
//! Starts a job with parameters taken from the environment (or attaches to
//! the job already running), logs its display progress on every poll and
//! prints the persisted plan once it completes. Ctrl-C cancels the remote
//! job before exiting.
//!
//! # Environment variables
//!
//! | Variable                  | Required | Default                 |
//! |---------------------------|----------|-------------------------|
//! | `FITPLAN_API_URL`         | no       | `http://localhost:3000` |
//! | `FITPLAN_TOKEN`           | yes      | --                      |
//! | `PLAN_GOAL`               | no       | `muscleBuild`           |
//! | `PLAN_DAYS_PER_WEEK`      | no       | `3`                     |
//! | `POLL_INTERVAL_MS`        | no       | `3000`                  |
//! | `POLL_BACKOFF_MULTIPLIER` | no       | `2.0`                   |

use std::sync::Arc;

use fitplan_client::api::{ClientError, PlanGenerationClient};
use fitplan_client::poller::{self, PollOutcome, PollUpdate, PollerConfig};
use fitplan_core::plan_generation::{GenerationParams, JobStatus, GOAL_MUSCLE_BUILD};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_API_URL: &str = "http://localhost:3000";
const DEFAULT_DAYS_PER_WEEK: u8 = 3;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fitplan_watch=info,fitplan_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let api_url = std::env::var("FITPLAN_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.into());

    let token = std::env::var("FITPLAN_TOKEN").unwrap_or_else(|_| {
        tracing::error!("FITPLAN_TOKEN environment variable is required");
        std::process::exit(1);
    });

    let goal = std::env::var("PLAN_GOAL").unwrap_or_else(|_| GOAL_MUSCLE_BUILD.into());
    let days_per_week: u8 = std::env::var("PLAN_DAYS_PER_WEEK")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_DAYS_PER_WEEK);

    let client = Arc::new(PlanGenerationClient::new(api_url.clone(), token));
    let params = GenerationParams::new(goal, days_per_week);

    tracing::info!(
        api_url = %api_url,
        goal = %params.goal,
        days_per_week,
        "Starting fitplan-watch",
    );

    match client.start(&params).await {
        Ok(job) => tracing::info!(job_id = %job.id, "Plan generation started"),
        Err(ClientError::Conflict(message)) => {
            tracing::info!(reason = %message, "Following the job already in progress");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to start plan generation");
            std::process::exit(1);
        }
    }

    let handle = poller::subscribe(client.clone(), PollerConfig::from_env(), render);
    let local = handle.cancellation_token();
    let join = handle.join();
    tokio::pin!(join);

    let outcome = tokio::select! {
        outcome = &mut join => outcome,
        _ = tokio::signal::ctrl_c() => {
            local.cancel();
            match client.cancel().await {
                Ok(message) => tracing::info!(message = %message, "Plan generation cancelled"),
                Err(e) => tracing::warn!(error = %e, "Failed to cancel plan generation"),
            }
            join.await
        }
    };

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(error = %e, "Polling task aborted");
            std::process::exit(1);
        }
    };

    match outcome {
        PollOutcome::Finished(job) if job.status == JobStatus::Completed => {
            match client.get_result().await {
                Ok(plan) => match serde_json::to_string_pretty(&plan.plan) {
                    Ok(text) => println!("{text}"),
                    Err(e) => tracing::error!(error = %e, "Failed to render plan"),
                },
                Err(e) => {
                    tracing::error!(error = %e, "Failed to fetch generated plan");
                    std::process::exit(1);
                }
            }
        }
        PollOutcome::Finished(job) => {
            tracing::warn!(
                job_id = %job.id,
                status = %job.status,
                "Plan generation ended without a plan",
            );
            std::process::exit(1);
        }
        PollOutcome::NotStarted => {
            tracing::warn!("No plan generation job exists");
            std::process::exit(1);
        }
        PollOutcome::Failed(e) => {
            tracing::error!(error = %e, "Stopped following plan generation");
            std::process::exit(1);
        }
        PollOutcome::Cancelled => {}
    }
}

fn render(update: PollUpdate) {
    match update {
        PollUpdate::Progress { display: view, .. } => tracing::info!(
            status = %view.status,
            percent = view.percent_complete,
            remaining = %view.remaining_text,
            "{}",
            view.step_label,
        ),
        PollUpdate::TransportError { message, retry_in } => tracing::warn!(
            error = %message,
            retry_in_ms = retry_in.as_millis() as u64,
            "Connection problem, retrying",
        ),
        PollUpdate::NotStarted => tracing::warn!("Plan generation has not been started"),
        PollUpdate::Error(message) => tracing::error!(error = %message, "Progress unavailable"),
    }
}
