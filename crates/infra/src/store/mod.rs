//! Store client seam.
//!
//! The subscription pipeline never speaks a wire protocol itself. It talks to
//! a [`StoreClient`] that can open a connection to one node and, on top of it,
//! a persistent subscription yielding [`RawEvent`]s through an [`EventStream`].
//!
//! Implementations:
//! - [`memory::InMemoryCluster`]: a simulated cluster (tests/dev)
//! - `redis_streams::RedisStreamsClient`: Redis Streams consumer groups
//!   (feature `redis`)

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use persub_core::{DataSourceDescriptor, FailoverSignal, SubscriptionTarget};
use persub_events::RawEvent;

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis_streams;

pub use memory::InMemoryCluster;
#[cfg(feature = "redis")]
pub use redis_streams::RedisStreamsClient;

/// Default per-operation timeout (milliseconds).
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Default number of events fetched per read.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Store operation error (typed connection error).
///
/// `NotPrimary` is the only variant the pipeline recovers from on its own;
/// everything else is visible to the application.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The node is not the cluster primary and named the node that is.
    #[error("node is not the primary; primary is at {master_host}:{master_port}")]
    NotPrimary { master_host: String, master_port: u16 },

    #[error("cannot reach {address}: {reason}")]
    Unreachable { address: String, reason: String },

    #[error("authentication failed for user `{user}`")]
    Authentication { user: String },

    #[error("stream `{0}` not found")]
    StreamNotFound(String),

    #[error("persistent subscription group `{group}` not found on stream `{stream}`")]
    GroupNotFound { stream: String, group: String },

    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("subscription dropped by the server: {0}")]
    Dropped(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl StoreError {
    /// Primary location carried by a not-primary error.
    pub fn failover_signal(&self) -> Option<FailoverSignal> {
        match self {
            Self::NotPrimary {
                master_host,
                master_port,
            } => Some(FailoverSignal::new(master_host.clone(), *master_port)),
            _ => None,
        }
    }

    pub fn is_not_primary(&self) -> bool {
        matches!(self, Self::NotPrimary { .. })
    }
}

impl From<FailoverSignal> for StoreError {
    fn from(signal: FailoverSignal) -> Self {
        Self::NotPrimary {
            master_host: signal.master_host().to_string(),
            master_port: signal.master_port(),
        }
    }
}

/// Settings passed to the persistent subscription call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionSettings {
    /// Upper bound for a single store operation (connect, subscribe, ack,
    /// one blocking read).
    pub timeout: Duration,
    pub batch_size: usize,
}

impl Default for SubscriptionSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl SubscriptionSettings {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

/// Client library for one kind of store.
///
/// Stateless between calls: every `connect` opens a fresh connection and the
/// caller owns whatever comes back.
#[async_trait]
pub trait StoreClient: Send + Sync {
    type Connection: Send;
    type Stream: EventStream;

    /// Open a connection to the node named by `descriptor`.
    async fn connect(&self, descriptor: &DataSourceDescriptor) -> Result<Self::Connection, StoreError>;

    /// Open a persistent subscription on an established connection.
    async fn subscribe(
        &self,
        connection: Self::Connection,
        target: &SubscriptionTarget,
        settings: &SubscriptionSettings,
    ) -> Result<Self::Stream, StoreError>;
}

/// A live persistent subscription.
///
/// The sequence is unbounded: `next_event` waits until the server delivers
/// something, and a closed subscription is reported as an error
/// ([`StoreError::Dropped`]), never as an end of stream. A node that stops
/// answering mid-read is reported as [`StoreError::Timeout`].
#[async_trait]
pub trait EventStream: Send {
    async fn next_event(&mut self) -> Result<RawEvent, StoreError>;

    /// Tell the server the event was handled.
    async fn ack(&mut self, event_id: &str) -> Result<(), StoreError>;

    /// Negative acknowledgement with the park action: the server keeps the
    /// event aside for replay and does not redeliver it on this subscription.
    async fn park(&mut self, event_id: &str, reason: &str) -> Result<(), StoreError>;
}
