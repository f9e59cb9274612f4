use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::modules::dubbing::repository::JobRepository;
use crate::state::AppState;

/// Hourly cleanup of completed jobs past the retention window. Failed jobs
/// are kept for inspection.
pub async fn run(state: AppState) {
    let mut ticker = tokio::time::interval(Duration::from_secs(3600));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match JobRepository::reap_completed(&state.db, state.config.job_retention_hours).await {
            Ok(0) => {}
            Ok(reaped) => info!("🧹 Reaped {} completed dub jobs", reaped),
            Err(e) => error!("Job reaper failed: {}", e),
        }
    }
}
