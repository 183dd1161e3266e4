use std::sync::Arc;

use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::engine::dispatch::sweep_expired;
use crate::state::AppState;

/// Expires lapsed offers on a fixed cadence, independent of request traffic.
pub async fn run_expiry_sweeper(state: Arc<AppState>) {
    let period = Duration::from_secs(state.config.sweep_interval_secs.max(1));
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(interval_secs = period.as_secs(), "offer expiry sweeper started");

    loop {
        ticker.tick().await;
        match sweep_expired(&state).await {
            Ok(0) => {}
            Ok(expired) => debug!(expired, "expired lapsed offers"),
            Err(err) => error!(error = %err, "offer expiry sweep failed"),
        }
    }
}
