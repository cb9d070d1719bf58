//! `/health` report built from live hub state.
//!
//! The hub is healthy while its heartbeat task runs: without it dead sockets
//! are never reaped. Connections are broken down by lifecycle state so a
//! pile-up of half-closed sockets is visible.

use std::time::Instant;

use serde::Serialize;

use crate::websocket::broadcast::BroadcastHub;
use crate::websocket::connection::ConnectionState;

/// Overall verdict.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Heartbeat running, accepting connections.
    Ok,
    /// Heartbeat stopped or hub shut down.
    Degraded,
}

/// Registered connections by state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionBreakdown {
    /// Accepting frames.
    pub open: usize,
    /// Tearing down, removal pending.
    pub closing: usize,
}

/// Heartbeat task state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct HeartbeatHealth {
    /// Whether the ping/evict task is alive.
    pub running: bool,
    /// Cycle interval.
    pub interval_ms: u64,
}

/// `/health` body.
#[derive(Clone, Debug, Serialize)]
pub struct HealthReport {
    /// Overall verdict.
    pub status: HealthStatus,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Connection counts.
    pub connections: ConnectionBreakdown,
    /// Heartbeat state.
    pub heartbeat: HeartbeatHealth,
}

impl HealthReport {
    /// Inspect `hub` and build a report.
    pub fn collect(hub: &BroadcastHub, start_time: Instant) -> Self {
        let mut connections = ConnectionBreakdown::default();
        hub.registry().for_each(|conn| match conn.state() {
            ConnectionState::Open => connections.open += 1,
            ConnectionState::Closing => connections.closing += 1,
            // removal takes it out of the registry
            ConnectionState::Closed => {}
        });

        let running = hub.heartbeat_running() && !hub.is_shut_down();
        Self {
            status: if running {
                HealthStatus::Ok
            } else {
                HealthStatus::Degraded
            },
            uptime_secs: start_time.elapsed().as_secs(),
            connections,
            heartbeat: HeartbeatHealth {
                running,
                interval_ms: hub.heartbeat().interval().as_millis() as u64,
            },
        }
    }

    /// Whether the report should be served as a success.
    pub fn is_ok(&self) -> bool {
        self.status == HealthStatus::Ok
    }
}
