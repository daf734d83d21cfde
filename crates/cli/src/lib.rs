//! `persub` command line: configuration and wiring of the subscription
//! pipeline against a Redis Streams store.

pub mod app;
pub mod config;

pub use config::{Cli, ConfigError, SubscriberConfig};
