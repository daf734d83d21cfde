use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use persub_core::Position;

/// An event exactly as the store delivered it on a persistent subscription.
///
/// The payload is opaque bytes; only the store-level metadata (type tag,
/// position, JSON flag) is trusted. Owned by the connection that produced it
/// until it is handed to the [`Adapter`](crate::Adapter).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Store-assigned identifier, used to ack/park the event.
    pub event_id: String,
    pub event_type: String,
    /// Stream the event was originally written to.
    pub stream: String,
    pub position: Position,
    pub created: DateTime<Utc>,

    /// Whether the producer declared `data`/`metadata` as JSON.
    pub is_json: bool,
    pub data: Vec<u8>,
    pub metadata: Vec<u8>,

    /// How many times the server already tried to deliver this event.
    pub retry_count: u32,
}

impl RawEvent {
    /// A JSON event with no metadata, as produced by most writers.
    pub fn json(
        event_id: impl Into<String>,
        stream: impl Into<String>,
        position: Position,
        event_type: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            stream: stream.into(),
            position,
            created: Utc::now(),
            is_json: true,
            data: data.into(),
            metadata: Vec::new(),
            retry_count: 0,
        }
    }

    pub fn with_metadata(mut self, metadata: impl Into<Vec<u8>>) -> Self {
        self.metadata = metadata.into();
        self
    }

    pub fn binary(mut self) -> Self {
        self.is_json = false;
        self
    }
}
