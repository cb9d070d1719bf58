//! Server shutdown: cancel, close the hub, drain background tasks.
//!
//! Tasks spawned by the server (the HTTP serve loop, the hub heartbeat) are
//! tracked by name. [`ShutdownCoordinator::drain`] gives them one shared
//! deadline and aborts whatever is still running when it passes.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::websocket::broadcast::BroadcastHub;

/// Drain deadline when none is given.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of [`ShutdownCoordinator::drain`].
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Tasks that finished before the deadline.
    pub completed: Vec<&'static str>,
    /// Tasks aborted at the deadline.
    pub aborted: Vec<&'static str>,
}

impl DrainReport {
    /// Whether every task finished on its own.
    pub fn is_clean(&self) -> bool {
        self.aborted.is_empty()
    }
}

/// Owns the server's root token and its background tasks.
#[derive(Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    tasks: Mutex<Vec<(&'static str, JoinHandle<()>)>>,
}

impl ShutdownCoordinator {
    /// Fresh coordinator with nothing tracked.
    pub fn new() -> Self {
        Self::default()
    }

    /// Root token. Server tasks watch this or a child of it.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cancel the root token without waiting.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether shutdown has started.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Track `handle` so [`drain`](Self::drain) awaits it.
    pub fn track(&self, name: &'static str, handle: JoinHandle<()>) {
        self.tasks.lock().push((name, handle));
    }

    /// Number of tracked tasks not yet drained.
    pub fn tracked(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Cancel, shut `hub` down, then wait for every tracked task plus the
    /// hub heartbeat until `timeout` (default [`DEFAULT_DRAIN_TIMEOUT`]).
    pub async fn drain(&self, hub: &BroadcastHub, timeout: Option<Duration>) -> DrainReport {
        let timeout = timeout.unwrap_or(DEFAULT_DRAIN_TIMEOUT);
        self.shutdown();
        hub.shutdown();

        let mut tasks = std::mem::take(&mut *self.tasks.lock());
        if let Some(heartbeat) = hub.take_heartbeat_task() {
            tasks.push(("heartbeat", heartbeat));
        }
        info!(
            tasks = tasks.len(),
            timeout_ms = timeout.as_millis() as u64,
            "draining server tasks"
        );

        let deadline = Instant::now() + timeout;
        let mut report = DrainReport::default();
        for (name, mut handle) in tasks {
            if time::timeout_at(deadline, &mut handle).await.is_ok() {
                debug!(task = name, "task finished");
                report.completed.push(name);
            } else {
                warn!(task = name, "task still running at drain deadline, aborting");
                handle.abort();
                report.aborted.push(name);
            }
        }
        report
    }
}
