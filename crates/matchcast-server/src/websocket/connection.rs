//! WebSocket client connection state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use matchcast_core::ids::ConnectionId;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A frame queued for the connection's writer task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outbound {
    /// Encoded event text, shared across every recipient of a broadcast.
    Text(Arc<String>),
    /// Heartbeat ping control frame.
    Ping,
}

/// Transport-level state of a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// Accepting frames.
    Open = 0,
    /// Peer or transport started tearing down; removal pending.
    Closing = 1,
    /// Removed from the registry and transport released.
    Closed = 2,
}

impl ConnectionState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Open,
            1 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// Why a frame could not be queued for a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum SendError {
    /// The connection is closing or closed.
    #[error("connection is not open")]
    NotOpen,
    /// The outbound queue is full (slow reader).
    #[error("outbound queue full")]
    QueueFull,
    /// The writer task has gone away.
    #[error("transport disconnected")]
    Disconnected,
}

/// Represents a connected WebSocket client.
///
/// Frames are never written to the socket from here: they go through a
/// bounded queue drained by the connection's single writer task, so writes to
/// one transport are serialized no matter how many producers call in.
pub struct ClientConnection {
    /// Unique connection ID.
    pub id: ConnectionId,
    /// Send channel to the client's WebSocket write task.
    tx: mpsc::Sender<Outbound>,
    /// Current [`ConnectionState`] as `u8`.
    state: AtomicU8,
    /// Whether the client has responded to the last ping.
    is_alive: AtomicBool,
    /// When the last pong was received.
    last_pong: Mutex<Instant>,
    /// When this connection was established.
    connected_at: Instant,
    /// Count of messages dropped due to a full or closed channel.
    dropped_messages: AtomicU64,
    /// Tells the writer task to send Close and release the socket.
    close: CancellationToken,
}

impl ClientConnection {
    /// Create a new open connection with a fresh ID.
    pub fn new(tx: mpsc::Sender<Outbound>) -> Self {
        Self::with_id(ConnectionId::new(), tx)
    }

    /// Create a new open connection with a given ID.
    pub fn with_id(id: ConnectionId, tx: mpsc::Sender<Outbound>) -> Self {
        let now = Instant::now();
        Self {
            id,
            tx,
            state: AtomicU8::new(ConnectionState::Open as u8),
            is_alive: AtomicBool::new(true),
            last_pong: Mutex::new(now),
            connected_at: now,
            dropped_messages: AtomicU64::new(0),
            close: CancellationToken::new(),
        }
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether frames may still be queued.
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// `Open → Closing`. Returns `false` if the connection was not open.
    pub fn begin_close(&self) -> bool {
        self.state
            .compare_exchange(
                ConnectionState::Open as u8,
                ConnectionState::Closing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Final transition: mark closed and signal the writer task to release the socket.
    ///
    /// Only the registry calls this, as part of removal.
    pub(crate) fn close(&self) {
        self.state
            .store(ConnectionState::Closed as u8, Ordering::Release);
        self.close.cancel();
    }

    /// Token cancelled once the connection is closed.
    pub fn close_token(&self) -> CancellationToken {
        self.close.clone()
    }

    /// Queue encoded text for the client.
    pub fn send_text(&self, message: Arc<String>) -> Result<(), SendError> {
        self.enqueue(Outbound::Text(message))
    }

    /// Queue a heartbeat ping.
    pub fn ping(&self) -> Result<(), SendError> {
        self.enqueue(Outbound::Ping)
    }

    fn enqueue(&self, frame: Outbound) -> Result<(), SendError> {
        if !self.is_open() {
            return Err(SendError::NotOpen);
        }
        self.tx.try_send(frame).map_err(|e| {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            match e {
                mpsc::error::TrySendError::Full(_) => SendError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => SendError::Disconnected,
            }
        })
    }

    /// Total messages dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Set the liveness flag. `true` also records the pong time.
    pub fn set_alive(&self, alive: bool) {
        if alive {
            *self.last_pong.lock() = Instant::now();
        }
        self.is_alive.store(alive, Ordering::Release);
    }

    /// Whether the client answered the most recent ping.
    pub fn is_alive(&self) -> bool {
        self.is_alive.load(Ordering::Acquire)
    }

    /// Check and reset the alive flag for heartbeat.
    ///
    /// Returns `true` if the connection was alive since the last check.
    pub fn disarm(&self) -> bool {
        self.is_alive.swap(false, Ordering::AcqRel)
    }

    /// Duration since the last pong (or connection establishment).
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl std::fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConnection")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("is_alive", &self.is_alive())
            .finish_non_exhaustive()
    }
}
