//! Self-healing event source.
//!
//! [`ReconnectingSubscription`] composes the [`ConnectionFactory`] and the
//! [`FailoverResolver`] into one unbroken sequence of raw events. When the
//! current connection (or the connect attempt itself) reports that the node is
//! not the primary, the connection is retired and a new one is established
//! against the primary it named. Anything else ends the sequence with an
//! error.
//!
//! The retry is an explicit loop: one reconnect per not-primary failure, and a
//! second failure from the new node simply goes around the loop again.

use tracing::warn;

use persub_core::{DataSourceDescriptor, SubscriptionTarget};
use persub_events::RawEvent;

use crate::connection::{ConnectionFactory, ConnectionOutcome};
use crate::error::SubscriptionError;
use crate::failover::FailoverResolver;
use crate::store::{EventStream, StoreClient, StoreError};

/// Lazy, unbounded event source that follows the cluster primary.
///
/// Nothing is opened until the first [`next_event`](Self::next_event). At most
/// one stream is alive at a time; a retired stream is dropped before its
/// replacement is opened.
pub struct ReconnectingSubscription<C>
where
    C: StoreClient,
{
    factory: ConnectionFactory<C>,
    resolver: FailoverResolver,
    target: SubscriptionTarget,
    descriptor: DataSourceDescriptor,
    stream: Option<C::Stream>,
    consecutive_redirects: u32,
    redirects: u64,
}

impl<C> ReconnectingSubscription<C>
where
    C: StoreClient,
{
    pub fn new(
        factory: ConnectionFactory<C>,
        resolver: FailoverResolver,
        descriptor: DataSourceDescriptor,
        target: SubscriptionTarget,
    ) -> Self {
        Self {
            factory,
            resolver,
            target,
            descriptor,
            stream: None,
            consecutive_redirects: 0,
            redirects: 0,
        }
    }

    /// Data source currently in use (or the next one to be tried).
    pub fn descriptor(&self) -> &DataSourceDescriptor {
        &self.descriptor
    }

    pub fn target(&self) -> &SubscriptionTarget {
        &self.target
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Total not-primary redirects followed so far.
    pub fn redirects(&self) -> u64 {
        self.redirects
    }

    /// Next event from the current primary, reconnecting as needed.
    pub async fn next_event(&mut self) -> Result<RawEvent, SubscriptionError> {
        loop {
            let error = match self.stream.as_mut() {
                Some(stream) => match stream.next_event().await {
                    Ok(event) => {
                        self.consecutive_redirects = 0;
                        return Ok(event);
                    }
                    Err(error) => error,
                },
                None => {
                    self.wait_before_reconnect().await;
                    match self.factory.establish(&self.descriptor, &self.target).await {
                        ConnectionOutcome::Connected(stream) => {
                            self.stream = Some(stream);
                            continue;
                        }
                        ConnectionOutcome::NotPrimary(signal) => StoreError::from(signal),
                        ConnectionOutcome::Fatal(error) => error,
                    }
                }
            };

            self.recover(error)?;
        }
    }

    /// Acknowledge an event on the current stream.
    ///
    /// A not-primary failure retires the stream; the next
    /// [`next_event`](Self::next_event) reconnects to the primary.
    pub async fn ack(&mut self, event_id: &str) -> Result<(), SubscriptionError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(not_connected("ack", event_id));
        };
        match stream.ack(event_id).await {
            Ok(()) => Ok(()),
            Err(error) => self.recover(error),
        }
    }

    /// Park an event on the current stream. Failures are handled like
    /// [`ack`](Self::ack).
    pub async fn park(&mut self, event_id: &str, reason: &str) -> Result<(), SubscriptionError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(not_connected("park", event_id));
        };
        match stream.park(event_id, reason).await {
            Ok(()) => Ok(()),
            Err(error) => self.recover(error),
        }
    }

    /// Retire the current stream and either point at the primary or give up.
    fn recover(&mut self, error: StoreError) -> Result<(), SubscriptionError> {
        self.stream = None;

        let next = self
            .resolver
            .resolve(error, &self.descriptor, self.consecutive_redirects)?;

        self.consecutive_redirects += 1;
        self.redirects += 1;
        warn!(
            from = %self.descriptor,
            to = %next,
            attempt = self.consecutive_redirects,
            "node is not the primary; reconnecting"
        );
        self.descriptor = next;
        Ok(())
    }

    async fn wait_before_reconnect(&self) {
        let backoff = self.resolver.policy().backoff;
        if self.consecutive_redirects > 0 && !backoff.is_zero() {
            tokio::time::sleep(backoff).await;
        }
    }
}

/// Settling is only valid for an event read from the stream that is still live.
fn not_connected(operation: &str, event_id: &str) -> SubscriptionError {
    SubscriptionError::Connection(StoreError::Protocol(format!(
        "{operation} of {event_id} without a live subscription"
    )))
}

impl<C> core::fmt::Debug for ReconnectingSubscription<C>
where
    C: StoreClient,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ReconnectingSubscription")
            .field("target", &self.target)
            .field("descriptor", &self.descriptor.to_string())
            .field("connected", &self.stream.is_some())
            .field("consecutive_redirects", &self.consecutive_redirects)
            .field("redirects", &self.redirects)
            .finish()
    }
}
