//! Infrastructure layer: store connections, failover, and the subscription
//! driver loop.

pub mod connection;
pub mod error;
pub mod failover;
pub mod source;
pub mod store;
pub mod workers;

pub use connection::{ConnectionFactory, ConnectionOutcome};
pub use error::SubscriptionError;
pub use failover::{FailoverPolicy, FailoverResolver};
pub use source::ReconnectingSubscription;
pub use store::{EventStream, InMemoryCluster, StoreClient, StoreError, SubscriptionSettings};
pub use workers::subscription_worker::{RunConfig, RunSummary, SubscriptionWorker, run};
