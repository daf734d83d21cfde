//! `persub-core`: connection and subscription building blocks.
//!
//! This crate contains **pure values** (no I/O, no async): where to connect,
//! what to drain, and where the cluster says the primary lives.

pub mod descriptor;
pub mod error;
pub mod failover;
pub mod position;
pub mod target;

pub use descriptor::{Credentials, DataSourceDescriptor, DEFAULT_SCHEME};
pub use error::{CoreError, CoreResult};
pub use failover::FailoverSignal;
pub use position::Position;
pub use target::SubscriptionTarget;
