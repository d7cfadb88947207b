//! Background scheduler for periodic snapshot runs.
//!
//! Disabled unless a period is configured; the HTTP trigger remains the
//! primary entry point. Each tick is one independent job run.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tracing::{info, warn};

use crate::main_lib::AppState;

/// Delay before the first run so the server finishes starting up.
const INITIAL_DELAY_SECS: u64 = 10;

pub fn start_snapshot_scheduler(state: Arc<AppState>, period: Duration) {
    tokio::spawn(async move {
        info!("Snapshot scheduler started, period {period:?}");
        tokio::time::sleep(Duration::from_secs(INITIAL_DELAY_SECS)).await;

        let mut ticker = interval(period);
        loop {
            ticker.tick().await;
            match state.snapshots.run().await {
                Ok(outcome) => info!("Scheduled snapshot run finished: {outcome:?}"),
                Err(e) => warn!("Scheduled snapshot run failed: {e}"),
            }
        }
    });
}
