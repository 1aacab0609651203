//! Fixed-interval progress polling with backoff on transient failures.
//!
//! [`subscribe`] spawns a task that fetches the job snapshot, reports it
//! through a callback and re-arms a single timer once the fetch settles, so
//! at most one request is ever in flight. Polling stops on a terminal
//! status, on a non-transient error, or when the [`PollHandle`] is
//! cancelled. Cancelling the handle never cancels the remote job.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fitplan_core::display::{compute_display_progress, DisplayProgress};
use fitplan_core::plan_generation::GenerationJob;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::api::{ClientError, PlanGenerationClient};

/// Default delay between successful polls.
const DEFAULT_INTERVAL_MS: u64 = 3000;
/// Default factor applied to the interval after a transient failure.
const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Anything that can report the current job snapshot.
#[async_trait]
pub trait ProgressSource: Send + Sync {
    async fn fetch_progress(&self) -> Result<GenerationJob, ClientError>;
}

#[async_trait]
impl ProgressSource for PlanGenerationClient {
    async fn fetch_progress(&self) -> Result<GenerationJob, ClientError> {
        self.get_progress().await
    }
}

/// Polling cadence.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Delay after a successful poll.
    pub interval: Duration,
    /// Factor applied to `interval` after a transient failure.
    pub backoff_multiplier: f64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_INTERVAL_MS),
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

impl PollerConfig {
    /// Load the cadence from environment variables with defaults.
    ///
    /// | Env Var                   | Default |
    /// |---------------------------|---------|
    /// | `POLL_INTERVAL_MS`        | `3000`  |
    /// | `POLL_BACKOFF_MULTIPLIER` | `2.0`   |
    ///
    /// A multiplier below `1.0` falls back to the default.
    pub fn from_env() -> Self {
        let interval_ms: u64 = std::env::var("POLL_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_INTERVAL_MS);

        let backoff_multiplier: f64 = std::env::var("POLL_BACKOFF_MULTIPLIER")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|m: &f64| *m >= 1.0)
            .unwrap_or(DEFAULT_BACKOFF_MULTIPLIER);

        Self {
            interval: Duration::from_millis(interval_ms),
            backoff_multiplier,
        }
    }

    /// Delay before the poll following a transient failure.
    pub fn backoff_delay(&self) -> Duration {
        let ms = (self.interval.as_millis() as f64 * self.backoff_multiplier) as u64;
        Duration::from_millis(ms)
    }
}

/// What the callback is told after each poll.
#[derive(Debug, Clone, PartialEq)]
pub enum PollUpdate {
    /// A snapshot was fetched.
    Progress {
        job: GenerationJob,
        display: DisplayProgress,
    },
    /// The user has never started a job. Polling stops.
    NotStarted,
    /// The poll failed transiently; the next poll runs after `retry_in`.
    TransportError { message: String, retry_in: Duration },
    /// A non-retryable error. Polling stops.
    Error(String),
}

/// Why a polling task ended.
#[derive(Debug)]
pub enum PollOutcome {
    /// A terminal snapshot was observed.
    Finished(GenerationJob),
    /// The server reported no job for the user.
    NotStarted,
    /// A non-retryable error ended polling.
    Failed(ClientError),
    /// The handle was cancelled.
    Cancelled,
}

/// Handle to a running subscription.
pub struct PollHandle {
    cancel: CancellationToken,
    task: JoinHandle<PollOutcome>,
}

impl PollHandle {
    /// Stop local polling. The remote job keeps running.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that stops this subscription when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the polling task to end.
    pub async fn join(self) -> Result<PollOutcome, JoinError> {
        self.task.await
    }
}

/// Start polling `source`, reporting every result to `on_update`.
///
/// The first poll is issued immediately.
pub fn subscribe<F>(
    source: Arc<dyn ProgressSource>,
    config: PollerConfig,
    on_update: F,
) -> PollHandle
where
    F: FnMut(PollUpdate) + Send + 'static,
{
    let cancel = CancellationToken::new();
    let task = tokio::spawn(poll_loop(source, config, on_update, cancel.clone()));
    PollHandle { cancel, task }
}

async fn poll_loop<F>(
    source: Arc<dyn ProgressSource>,
    config: PollerConfig,
    mut on_update: F,
    cancel: CancellationToken,
) -> PollOutcome
where
    F: FnMut(PollUpdate) + Send + 'static,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        let result = tokio::select! {
            _ = cancel.cancelled() => return PollOutcome::Cancelled,
            result = source.fetch_progress() => result,
        };

        let delay = match result {
            Ok(job) => {
                let display = compute_display_progress(&job);
                let terminal = job.is_terminal();
                tracing::debug!(
                    job_id = %job.id,
                    status = %job.status,
                    step = job.current_step,
                    total = job.total_steps,
                    "Polled plan generation progress",
                );
                on_update(PollUpdate::Progress {
                    job: job.clone(),
                    display,
                });
                if terminal {
                    return PollOutcome::Finished(job);
                }
                config.interval
            }
            Err(e) if e.is_transient() => {
                let retry_in = config.backoff_delay();
                tracing::warn!(
                    attempt,
                    error = %e,
                    retry_in_ms = retry_in.as_millis() as u64,
                    "Progress poll failed",
                );
                on_update(PollUpdate::TransportError {
                    message: e.to_string(),
                    retry_in,
                });
                retry_in
            }
            Err(ClientError::NotFound(_)) => {
                on_update(PollUpdate::NotStarted);
                return PollOutcome::NotStarted;
            }
            Err(e) => {
                tracing::error!(attempt, error = %e, "Progress poll rejected");
                on_update(PollUpdate::Error(e.to_string()));
                return PollOutcome::Failed(e);
            }
        };

        // Re-arm only while the subscription is live.
        tokio::select! {
            _ = cancel.cancelled() => return PollOutcome::Cancelled,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cadence() {
        let config = PollerConfig::default();
        assert_eq!(config.interval, Duration::from_millis(3000));
        assert_eq!(config.backoff_delay(), Duration::from_millis(6000));
    }

    #[test]
    fn custom_multiplier() {
        let config = PollerConfig {
            interval: Duration::from_millis(500),
            backoff_multiplier: 3.0,
        };
        assert_eq!(config.backoff_delay(), Duration::from_millis(1500));
    }
}
