//! JSON wire codec for [`HubEvent`].
//!
//! Frames are UTF-8 text: `{"type": "<Variant>", "data": <payload>}`.
//! Ping/pong are transport control frames and never pass through here.

use crate::errors::CodecError;
use crate::events::HubEvent;

/// Encode an event into its wire text.
pub fn encode(event: &HubEvent) -> Result<String, CodecError> {
    serde_json::to_string(event).map_err(|source| CodecError::Encode {
        event_type: event.event_type(),
        source,
    })
}

/// Decode wire text back into an event.
pub fn decode(text: &str) -> Result<HubEvent, CodecError> {
    serde_json::from_str(text).map_err(CodecError::Decode)
}
