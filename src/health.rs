//! # Health Checker
//!
//! Purpose: Probe the oldest idle connection on a fixed interval and discard
//! it when the probe fails, so stale connections are reaped before a caller
//! trips over them.

use tokio::time::{interval_at, Instant};
use tracing::debug;

use crate::client::Client;

/// Background loop spawned at client construction. Runs until the shutdown
/// token fires; the client awaits the task's join handle during `close`.
pub(crate) async fn run(client: Client) {
    let period = client.check_interval();
    let shutdown = client.shutdown_token();
    // First tick after one full period, not immediately.
    let mut ticker = interval_at(Instant::now() + period, period);

    loop {
        tokio::select! {
            _ = ticker.tick() => check_idle(&client).await,
            _ = shutdown.cancelled() => break,
        }
    }
    debug!("health checker stopped");
}

/// One tick: pop the least recently used idle connection, PING it outside the
/// lock, and either discard it or release it back through the normal
/// front-insertion path. An empty pool is a no-op.
async fn check_idle(client: &Client) {
    let Some(mut conn) = client.pop_oldest_idle() else {
        return;
    };
    match conn.execute(&[b"PING"]).await {
        Ok(_) => client.release(conn),
        Err(err) => {
            debug!(error = %err, "discarding idle connection that failed liveness probe");
            conn.close();
        }
    }
}
