//! Periodic TTL sweep over the message store.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use txtline_store::MessageStore;

/// One pass: drop messages older than `ttl`. Returns how many went.
pub fn sweep_once(store: &dyn MessageStore, ttl: Duration) -> Result<usize> {
    let removed = store.clean_expired(ttl)?;
    if removed > 0 {
        let stats = store.stats();
        tracing::info!(
            removed,
            remaining = stats.total_messages,
            chunks = stats.total_chunks,
            "expired messages swept"
        );
    }
    Ok(removed)
}

/// Sweep every `every` until the task is dropped. A failed pass is logged
/// and the loop keeps going.
pub async fn sweep_loop(store: Arc<dyn MessageStore>, every: Duration, ttl: Duration) -> Result<()> {
    let mut interval = tokio::time::interval(every);
    // the first tick fires immediately
    interval.tick().await;

    loop {
        interval.tick().await;
        if let Err(e) = sweep_once(store.as_ref(), ttl) {
            tracing::warn!(error = %e, "sweep failed");
        }
    }
}
