//! Heartbeat ping/pong liveness monitoring.
//!
//! Each cycle first evicts every connection that did not answer the previous
//! cycle's ping, then disarms and pings the rest. A silent connection is thus
//! reaped one full interval after the ping it ignored, never on the cycle that
//! sent it.

use std::sync::Arc;
use std::time::Duration;

use matchcast_core::ids::ConnectionId;
use metrics::counter;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::registry::ConnectionRegistry;
use crate::metrics::WS_EVICTIONS_TOTAL;

/// Outcome of one heartbeat cycle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Connections that were sent a ping.
    pub pinged: usize,
    /// Connections whose ping could not be queued (left for next cycle's eviction).
    pub ping_failures: usize,
    /// Connections evicted this cycle.
    pub evicted: Vec<ConnectionId>,
}

/// Periodic ping/evict sweep over a [`ConnectionRegistry`].
pub struct HeartbeatMonitor {
    registry: Arc<ConnectionRegistry>,
    interval: Duration,
}

impl HeartbeatMonitor {
    /// Create a monitor over `registry` ticking every `interval`.
    pub fn new(registry: Arc<ConnectionRegistry>, interval: Duration) -> Self {
        Self { registry, interval }
    }

    /// Configured tick interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one cycle synchronously.
    pub fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();
        let mut unresponsive = Vec::new();

        self.registry.for_each(|conn| {
            if !conn.disarm() {
                unresponsive.push(Arc::clone(conn));
                return;
            }
            // A closing connection stays disarmed and goes next cycle.
            if !conn.is_open() {
                return;
            }
            match conn.ping() {
                Ok(()) => report.pinged += 1,
                Err(e) => {
                    report.ping_failures += 1;
                    warn!(conn_id = %conn.id, error = %e, "failed to send ping");
                }
            }
        });

        // Evict outside the iteration: the registry is read-locked inside for_each.
        for conn in unresponsive {
            if self.registry.unregister(&conn) {
                counter!(WS_EVICTIONS_TOTAL).increment(1);
                info!(
                    conn_id = %conn.id,
                    silent_ms = conn.last_pong_elapsed().as_millis() as u64,
                    "evicted unresponsive connection"
                );
                report.evicted.push(conn.id.clone());
            }
        }

        debug!(
            pinged = report.pinged,
            ping_failures = report.ping_failures,
            evicted = report.evicted.len(),
            "heartbeat cycle"
        );
        report
    }

    /// Run cycles every interval until `cancel` fires.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // consume first immediate tick
            let _ = ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let _ = self.run_cycle();
                    }
                    () = cancel.cancelled() => {
                        debug!("heartbeat stopped");
                        break;
                    }
                }
            }
        })
    }
}
