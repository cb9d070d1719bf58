//! # matchcast-server
//!
//! Axum HTTP + WebSocket server for live match notifications.
//!
//! - **WebSocket**: `GET /ws` upgrades into a registered connection that
//!   receives a `Welcome` and every subsequent broadcast
//! - **Heartbeat**: periodic ping/evict cycle reaping unresponsive clients
//! - **Matches**: `POST /matches` persists then broadcasts `MatchCreated`;
//!   `GET /matches` lists newest first
//! - **Ops**: `/health`, Prometheus `/metrics`, graceful shutdown

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod matches;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod store;
pub mod websocket;
