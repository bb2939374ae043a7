use std::sync::Arc;

use chrono::Duration;
use log::*;
use psd2_payment_engine::{MemorySessionStore, ProcessingApi, SessionStore};
use tokio::task::JoinHandle;

/// Starts the expiry worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Two things age out of the gateway: Open-Banking sessions that were never completed (or whose
/// token is no longer worth keeping), and idempotency-cache entries whose replay window has
/// passed.
pub fn start_expiry_worker(
    store: MemorySessionStore,
    processing: Arc<ProcessingApi>,
    session_timeout: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(std::time::Duration::from_secs(60));
        info!("🕰️ Session and replay-cache expiry worker started");
        loop {
            timer.tick().await;
            let sessions = store.purge_expired(session_timeout).await;
            let entries = processing.cache().purge_stale().await;
            if sessions + entries > 0 {
                info!("🕰️ Expired {sessions} sessions and {entries} replay-cache entries");
            } else {
                trace!("🕰️ Nothing to expire");
            }
        }
    })
}
