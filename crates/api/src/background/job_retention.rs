//! Periodic removal of terminated jobs from the relay's registry.

use std::time::Duration;

use runcast_core::relay::ProcessRelay;
use tokio_util::sync::CancellationToken;

/// How often the sweep runs.
const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Run the job retention loop until `cancel` is triggered.
pub async fn run(relay: ProcessRelay, cancel: CancellationToken) {
    tracing::info!(
        retention_secs = relay.config().job_retention.as_secs(),
        interval_secs = SWEEP_INTERVAL.as_secs(),
        "Job retention sweeper started"
    );

    let mut interval = tokio::time::interval(SWEEP_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Job retention sweeper stopping");
                break;
            }
            _ = interval.tick() => {
                let removed = relay.sweep_finished();
                if removed > 0 {
                    tracing::info!(removed, "Job retention: dropped finished jobs");
                } else {
                    tracing::debug!("Job retention: nothing to drop");
                }
            }
        }
    }
}
