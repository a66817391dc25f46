//! Keepalive timer.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::ws::frame::HEARTBEAT;
use crate::ws::transport::Transport;

/// Periodic heartbeat sender bound to one open connection.
///
/// Send failures are ignored; the session notices a dead connection through
/// the transport's close signal.
pub struct Keepalive {
    handle: Option<JoinHandle<()>>,
}

impl Keepalive {
    /// Spawn the timer. The first heartbeat goes out one `interval` after start.
    pub fn start<T: Transport>(transport: Arc<T>, interval: Duration) -> Self {
        let interval = interval.max(Duration::from_millis(1));
        tracing::debug!("Keepalive started ({}ms)", interval.as_millis());
        Self {
            handle: Some(tokio::spawn(run(transport, interval))),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the timer and wait until it can no longer send.
    pub async fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
            tracing::debug!("Keepalive stopped");
        }
    }
}

impl Drop for Keepalive {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn run<T: Transport>(transport: Arc<T>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.reset(); // skip immediate first tick

    loop {
        ticker.tick().await;
        if let Err(e) = transport.send(HEARTBEAT.to_string()).await {
            tracing::debug!("Heartbeat not sent: {}", e);
        }
    }
}
