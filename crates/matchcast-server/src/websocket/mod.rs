//! WebSocket connection management, heartbeat, and broadcasting.
//!
//! ## Submodules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `connection` | Per-socket state: lifecycle, liveness flag, outbound queue |
//! | `registry` | Concurrent set of live connections |
//! | `heartbeat` | Periodic ping/evict cycle |
//! | `broadcast` | `BroadcastHub`: connect handling and event fan-out |
//! | `handler` | Upgrade endpoint and per-socket read/write loops |
//! | `slots` | Semaphore-backed admission limit for upgrades |
//!
//! ## Data Flow
//!
//! `handler` → `broadcast::on_connect` → `registry`.
//! Producers → `broadcast::publish` → each connection's queue → `handler` writer task.

pub mod broadcast;
pub mod connection;
pub mod handler;
pub mod heartbeat;
pub mod registry;
pub mod slots;
