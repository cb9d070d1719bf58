//! Server→client notifications.

use serde::{Deserialize, Serialize};

use crate::matches::Match;

/// An event fanned out to connected clients.
///
/// Adjacently tagged so the wire shape is `{"type": ..., "data": ...}`;
/// variants without a payload omit `data`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum HubEvent {
    /// Sent once to each client right after it connects.
    Welcome,
    /// A match was committed by the write path.
    MatchCreated(Match),
}

impl HubEvent {
    /// Wire discriminator, for logs and metrics labels.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Welcome => "Welcome",
            Self::MatchCreated(_) => "MatchCreated",
        }
    }
}
