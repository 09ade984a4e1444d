//! Background task that times out overdue questions.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::host::QuestifyHost;

/// Spawns a task that sweeps `host` for expired questions every `interval`
/// until it is aborted.
///
/// The sweep reads the host's clock, so with a manual clock it only fires
/// once the clock has been moved past a deadline.
pub fn spawn_deadline_sweeper(host: Arc<QuestifyHost>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match host.sweep_expired(host.now()) {
                Ok(expired) if !expired.is_empty() => {
                    debug!(count = expired.len(), "deadline sweep expired questions");
                }
                Ok(_) => {}
                Err(e) => error!(error = %e, "deadline sweep failed"),
            }
        }
    })
}
