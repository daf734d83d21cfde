//! Raw event → routed message adaptation.
//!
//! Adaptation is a pure mapping. A failure here means the event data itself is
//! bad, which is a different class of problem from a broken connection or a
//! failing handler: it is returned to the caller and never swallowed by the
//! dispatcher.

use serde_json::Value as JsonValue;
use thiserror::Error;

use persub_core::Position;

use crate::{RawEvent, RoutedMessage};

/// The event could not be turned into a [`RoutedMessage`].
#[derive(Debug, Error)]
pub enum AdaptError {
    #[error("event {event_id} at {position} has no event type")]
    MissingSubject { event_id: String, position: Position },

    #[error("event {event_id} ({subject}) is not JSON")]
    NotJson { event_id: String, subject: String },

    #[error("event {event_id} ({subject}) has malformed data: {source}")]
    InvalidData {
        event_id: String,
        subject: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("event {event_id} ({subject}) has malformed metadata: {source}")]
    InvalidMetadata {
        event_id: String,
        subject: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Turns store events into router messages.
pub trait Adapter {
    fn adapt(&self, event: RawEvent) -> Result<RoutedMessage, AdaptError>;
}

impl<A> Adapter for &A
where
    A: Adapter + ?Sized,
{
    fn adapt(&self, event: RawEvent) -> Result<RoutedMessage, AdaptError> {
        (**self).adapt(event)
    }
}

/// Default adapter: JSON data and metadata, subject taken from the event type.
///
/// Empty data or metadata decodes to `null`. Events flagged as binary are
/// rejected unless both payloads are empty.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonAdapter;

impl JsonAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Adapter for JsonAdapter {
    fn adapt(&self, event: RawEvent) -> Result<RoutedMessage, AdaptError> {
        let RawEvent {
            event_id,
            event_type,
            stream,
            position,
            created,
            is_json,
            data,
            metadata,
            retry_count,
        } = event;

        if event_type.trim().is_empty() {
            return Err(AdaptError::MissingSubject { event_id, position });
        }

        if !is_json && !(data.is_empty() && metadata.is_empty()) {
            return Err(AdaptError::NotJson {
                event_id,
                subject: event_type,
            });
        }

        let data = match decode(&data) {
            Ok(v) => v,
            Err(source) => {
                return Err(AdaptError::InvalidData {
                    event_id,
                    subject: event_type,
                    source,
                });
            }
        };

        let metadata = match decode(&metadata) {
            Ok(v) => v,
            Err(source) => {
                return Err(AdaptError::InvalidMetadata {
                    event_id,
                    subject: event_type,
                    source,
                });
            }
        };

        Ok(RoutedMessage::new(
            event_id,
            event_type,
            stream,
            position,
            created,
            retry_count,
            data,
            metadata,
        ))
    }
}

fn decode(bytes: &[u8]) -> Result<JsonValue, serde_json::Error> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(JsonValue::Null);
    }
    serde_json::from_slice(bytes)
}
