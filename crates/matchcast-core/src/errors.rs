//! Error types shared across matchcast crates.
//!
//! - [`CodecError`]: wire encode/decode failures
//! - [`ValidationError`]: rejected producer payloads, with per-field issues

use serde::Serialize;
use thiserror::Error;

/// Failure to convert between a [`HubEvent`](crate::events::HubEvent) and its wire text.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The event payload could not be represented as JSON.
    ///
    /// Well-formed producer input never hits this; it indicates a programming error.
    #[error("failed to encode {event_type} event: {source}")]
    Encode {
        /// Discriminator of the event that failed.
        event_type: &'static str,
        /// Underlying serializer error.
        #[source]
        source: serde_json::Error,
    },

    /// Inbound text was not a known event.
    #[error("failed to decode message: {0}")]
    Decode(#[source] serde_json::Error),
}

/// A single rejected field in a payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    /// Wire name of the offending field (camelCase).
    pub field: String,
    /// Human-readable reason.
    pub message: String,
}

impl FieldIssue {
    /// Build an issue for `field`.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// A payload that failed validation. Carries every issue found, not just the first.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("invalid payload: {} issue(s)", .issues.len())]
pub struct ValidationError {
    /// All field issues, in field order.
    pub issues: Vec<FieldIssue>,
}

impl ValidationError {
    /// Wrap a single issue.
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            issues: vec![FieldIssue::new(field, message)],
        }
    }

    /// Whether any issue concerns `field`.
    pub fn has_field(&self, field: &str) -> bool {
        self.issues.iter().any(|i| i.field == field)
    }
}
