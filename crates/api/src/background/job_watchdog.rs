//! Maximum-duration safeguard for plan generation jobs.
//!
//! Periodically force-fails jobs that have been active longer than the
//! configured bound. Such jobs end in `failed` with
//! [`FailureKind::TimedOut`](fitplan_core::plan_generation::FailureKind),
//! distinct from a step failure.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::engine::JobController;

/// Run the watchdog loop until `cancel` is triggered.
pub async fn run(
    controller: Arc<JobController>,
    max_duration: Duration,
    interval: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(
        max_duration_secs = max_duration.as_secs(),
        interval_secs = interval.as_secs(),
        "Job watchdog started"
    );

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Job watchdog stopping");
                break;
            }
            _ = ticker.tick() => {
                let failed = controller.force_fail_expired(max_duration).await;
                if failed > 0 {
                    tracing::warn!(failed, "Job watchdog: force-failed expired jobs");
                } else {
                    tracing::debug!("Job watchdog: no expired jobs");
                }
            }
        }
    }
}
