//! Event fan-out to connected WebSocket clients.

use std::sync::Arc;
use std::time::Duration;

use matchcast_core::codec;
use matchcast_core::errors::CodecError;
use matchcast_core::events::HubEvent;
use matchcast_core::ids::ConnectionId;
use matchcast_core::matches::Match;
use metrics::counter;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::connection::ClientConnection;
use super::heartbeat::HeartbeatMonitor;
use super::registry::ConnectionRegistry;
use crate::metrics::{WS_BROADCASTS_TOTAL, WS_BROADCAST_DROPS_TOTAL, WS_CONNECTIONS_TOTAL};

/// Delivery tally for one [`BroadcastHub::publish`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Connections the message was queued for.
    pub delivered: usize,
    /// Registered connections skipped because they were not open.
    pub skipped: usize,
    /// Open connections whose queue refused the message.
    pub failed: usize,
}

/// The single entry point producers and the transport use.
///
/// Owns the [`ConnectionRegistry`] and the heartbeat task. Shared as
/// `Arc<BroadcastHub>` with whoever needs to publish.
pub struct BroadcastHub {
    registry: Arc<ConnectionRegistry>,
    heartbeat: Arc<HeartbeatMonitor>,
    cancel: CancellationToken,
    heartbeat_task: Mutex<Option<JoinHandle<()>>>,
}

impl BroadcastHub {
    /// Create a hub without starting the heartbeat timer.
    ///
    /// Cycles can still be driven by hand through [`BroadcastHub::heartbeat`].
    pub fn new(heartbeat_interval: Duration) -> Self {
        Self::with_token(heartbeat_interval, CancellationToken::new())
    }

    /// Create a hub and start its heartbeat task.
    ///
    /// The task stops on [`BroadcastHub::shutdown`] or when `parent` is cancelled.
    pub fn start(heartbeat_interval: Duration, parent: &CancellationToken) -> Self {
        let hub = Self::with_token(heartbeat_interval, parent.child_token());
        let handle = Arc::clone(&hub.heartbeat).spawn(hub.cancel.clone());
        *hub.heartbeat_task.lock() = Some(handle);
        info!(
            interval_ms = heartbeat_interval.as_millis() as u64,
            "broadcast hub started"
        );
        hub
    }

    fn with_token(heartbeat_interval: Duration, cancel: CancellationToken) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let heartbeat = Arc::new(HeartbeatMonitor::new(
            Arc::clone(&registry),
            heartbeat_interval,
        ));
        Self {
            registry,
            heartbeat,
            cancel,
            heartbeat_task: Mutex::new(None),
        }
    }

    /// The connection registry.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// The heartbeat monitor.
    pub fn heartbeat(&self) -> &HeartbeatMonitor {
        &self.heartbeat
    }

    /// Register a freshly upgraded connection and greet it.
    ///
    /// Welcome delivery is best-effort; a failure never aborts setup.
    pub fn on_connect(&self, connection: Arc<ClientConnection>) -> ConnectionId {
        let id = self.registry.register(Arc::clone(&connection));
        counter!(WS_CONNECTIONS_TOTAL).increment(1);

        match codec::encode(&HubEvent::Welcome) {
            Ok(text) => {
                if let Err(e) = connection.send_text(Arc::new(text)) {
                    debug!(conn_id = %id, error = %e, "welcome not delivered");
                }
            }
            Err(e) => error!(conn_id = %id, error = %e, "failed to encode welcome"),
        }
        id
    }

    /// Encode `event` once and queue it for every open connection.
    ///
    /// Per-connection failures are logged and counted, never returned; only an
    /// encode failure fails the call.
    pub fn publish(&self, event: &HubEvent) -> Result<PublishReport, CodecError> {
        let event_type = event.event_type();
        let text = match codec::encode(event) {
            Ok(text) => Arc::new(text),
            Err(e) => {
                error!(event_type, error = %e, "failed to encode event");
                return Err(e);
            }
        };

        let mut report = PublishReport::default();
        self.registry.for_each(|conn| {
            if !conn.is_open() {
                report.skipped += 1;
                return;
            }
            match conn.send_text(Arc::clone(&text)) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    counter!(WS_BROADCAST_DROPS_TOTAL).increment(1);
                    warn!(
                        conn_id = %conn.id,
                        event_type,
                        error = %e,
                        total_drops = conn.drop_count(),
                        "failed to send event to client"
                    );
                }
            }
        });

        counter!(WS_BROADCASTS_TOTAL, "event_type" => event_type).increment(1);
        debug!(
            event_type,
            recipients = report.delivered,
            skipped = report.skipped,
            failed = report.failed,
            "broadcast event"
        );
        Ok(report)
    }

    /// Publish `MatchCreated` for a committed match.
    pub fn broadcast_match_created(&self, record: Match) -> Result<PublishReport, CodecError> {
        self.publish(&HubEvent::MatchCreated(record))
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    /// Whether shutdown has been requested.
    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stop the heartbeat and close every connection.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        let closed = self.registry.clear();
        info!(closed, "broadcast hub shut down");
    }

    /// Whether the heartbeat task is still running.
    pub fn heartbeat_running(&self) -> bool {
        self.heartbeat_task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Take the heartbeat task handle, e.g. to await it during graceful shutdown.
    pub fn take_heartbeat_task(&self) -> Option<JoinHandle<()>> {
        self.heartbeat_task.lock().take()
    }
}

impl Drop for BroadcastHub {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
