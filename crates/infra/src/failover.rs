//! Following the cluster primary.
//!
//! A not-primary reply is the one transient failure worth healing without an
//! operator: the primary can move at any time and the subscription has to
//! follow it. Every other failure (bad credentials, missing stream, node down
//! with no known primary) is returned as-is; retrying those would only loop
//! against a broken configuration.
//!
//! The resolver is a pure decision. Re-establishing the subscription with the
//! returned descriptor is the caller's side of the deal.

use std::time::Duration;

use persub_core::DataSourceDescriptor;

use crate::error::SubscriptionError;
use crate::store::StoreError;

/// How far to chase redirects.
///
/// The default follows not-primary replies indefinitely and immediately.
/// `max_redirects` caps *consecutive* redirects; the count resets once an
/// event has been delivered on the new connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailoverPolicy {
    pub max_redirects: Option<u32>,
    pub backoff: Duration,
}

impl FailoverPolicy {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_max_redirects(mut self, max: u32) -> Self {
        self.max_redirects = Some(max);
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }
}

/// Decides whether a store error can be healed by reconnecting elsewhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailoverResolver {
    policy: FailoverPolicy,
}

impl FailoverResolver {
    pub fn new(policy: FailoverPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &FailoverPolicy {
        &self.policy
    }

    /// Next descriptor to connect to, or the error to propagate.
    ///
    /// `consecutive_redirects` is how many redirects were already followed
    /// without delivering an event.
    pub fn resolve(
        &self,
        error: StoreError,
        current: &DataSourceDescriptor,
        consecutive_redirects: u32,
    ) -> Result<DataSourceDescriptor, SubscriptionError> {
        let Some(signal) = error.failover_signal() else {
            return Err(SubscriptionError::Connection(error));
        };

        if let Some(max) = self.policy.max_redirects {
            if consecutive_redirects >= max {
                return Err(SubscriptionError::RedirectLimit {
                    attempts: consecutive_redirects,
                    last: error,
                });
            }
        }

        Ok(current.relocated(&signal))
    }
}
