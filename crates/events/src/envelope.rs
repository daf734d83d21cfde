use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use persub_core::Position;

/// Envelope handed to the router: a decoded event plus its store metadata.
///
/// Notes:
/// - `subject` is the event type; routers dispatch on it.
/// - `position` is the store's log position, monotonically increasing per
///   subscription.
/// - The adapter gives up ownership on creation; the dispatcher consumes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutedMessage {
    event_id: String,
    subject: String,
    stream: String,
    position: Position,
    created: DateTime<Utc>,
    retry_count: u32,

    data: JsonValue,
    metadata: JsonValue,
}

impl RoutedMessage {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        event_id: impl Into<String>,
        subject: impl Into<String>,
        stream: impl Into<String>,
        position: Position,
        created: DateTime<Utc>,
        retry_count: u32,
        data: JsonValue,
        metadata: JsonValue,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            subject: subject.into(),
            stream: stream.into(),
            position,
            created,
            retry_count,
            data,
            metadata,
        }
    }

    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn data(&self) -> &JsonValue {
        &self.data
    }

    pub fn metadata(&self) -> &JsonValue {
        &self.metadata
    }
}
