use std::time::Duration;
use tracing::{info, warn};

use stratus_api::AppState;

/// Background task that prunes expired sessions.
///
/// Runs on an interval and deletes session rows past their `expires_at`
/// timestamp. Cached session state rows go with them.
pub async fn run_cleanup_loop(state: AppState, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        match state.db.prune_expired_sessions() {
            Ok(count) => {
                if count > 0 {
                    info!("Cleanup: pruned {} expired sessions", count);
                }
            }
            Err(e) => {
                warn!("Cleanup error: {}", e);
            }
        }
    }
}
