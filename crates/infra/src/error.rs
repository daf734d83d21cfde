use thiserror::Error;

use persub_events::AdaptError;

use crate::store::StoreError;

/// Why a subscription pipeline stopped.
///
/// Not-primary errors never show up here unless a configured redirect cap was
/// exhausted; they are handled by following the primary.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("event store connection failed: {0}")]
    Connection(#[from] StoreError),

    #[error("event could not be adapted: {0}")]
    Adaptation(#[from] AdaptError),

    #[error("gave up following the primary after {attempts} consecutive redirects: {last}")]
    RedirectLimit { attempts: u32, last: StoreError },
}

impl SubscriptionError {
    /// The store error behind a connection failure, if any.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::Connection(err) | Self::RedirectLimit { last: err, .. } => Some(err),
            Self::Adaptation(_) => None,
        }
    }
}
