//! The competing-consumer group being drained.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// `(stream, group)` pair identifying one persistent subscription.
///
/// Fixed for the lifetime of a logical subscription; reconnections reuse it
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionTarget {
    stream: String,
    group: String,
}

impl SubscriptionTarget {
    pub fn new(stream: impl Into<String>, group: impl Into<String>) -> CoreResult<Self> {
        let stream = stream.into();
        let group = group.into();

        if stream.trim().is_empty() {
            return Err(CoreError::EmptyStream);
        }
        if group.trim().is_empty() {
            return Err(CoreError::EmptyGroup);
        }

        Ok(Self { stream, group })
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    pub fn group(&self) -> &str {
        &self.group
    }
}

impl core::fmt::Display for SubscriptionTarget {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}::{}", self.stream, self.group)
    }
}
