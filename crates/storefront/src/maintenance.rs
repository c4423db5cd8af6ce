//! Periodic cleanup of expired access tokens and idle guest sessions.

use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::db::carts::CartRepository;
use crate::db::tokens::TokenRepository;
use crate::state::AppState;

/// How often the cleanup pass runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Spawn the background cleanup loop.
///
/// Failures are logged and retried on the next tick.
pub fn spawn_cleanup(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            run_cleanup(&state).await;
        }
    })
}

/// Run one cleanup pass.
pub async fn run_cleanup(state: &AppState) {
    match TokenRepository::new(state.pool()).purge_expired().await {
        Ok(0) => {}
        Ok(purged) => tracing::info!(purged, "expired access tokens purged"),
        Err(e) => tracing::warn!(error = %e, "failed to purge expired access tokens"),
    }

    let cutoff = Utc::now() - state.config().guest_session_ttl;
    match CartRepository::new(state.pool())
        .purge_idle_guest_sessions(cutoff)
        .await
    {
        Ok(0) => {}
        Ok(purged) => tracing::info!(purged, %cutoff, "idle guest sessions purged"),
        Err(e) => tracing::warn!(error = %e, "failed to purge idle guest sessions"),
    }
}
