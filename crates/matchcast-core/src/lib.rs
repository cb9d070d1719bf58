//! # matchcast-core
//!
//! Foundation types shared by the matchcast crates:
//!
//! - **IDs**: [`ids::ConnectionId`], a branded newtype for socket handles
//! - **Matches**: the persisted [`matches::Match`] record and create-payload validation
//! - **Events**: [`events::HubEvent`], the server→client notification set
//! - **Codec**: [`codec::encode`] / [`codec::decode`] for the JSON wire format
//! - **Logging**: [`logging::init_subscriber`] for the global `tracing` subscriber

#![deny(unsafe_code)]

pub mod codec;
pub mod errors;
pub mod events;
pub mod ids;
pub mod logging;
pub mod matches;
