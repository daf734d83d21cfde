//! Subscription pipeline mechanics (no I/O).
//!
//! Raw events come in from a store connection, the [`Adapter`] turns them into
//! [`RoutedMessage`]s, and the [`IsolatedDispatcher`] hands each one to a
//! [`Router`] without letting a handler failure escape.

pub mod adapter;
pub mod dispatcher;
pub mod envelope;
pub mod middleware;
pub mod raw;
pub mod router;

pub use adapter::{AdaptError, Adapter, JsonAdapter};
pub use dispatcher::{DispatchOutcome, DispatchStats, IsolatedDispatcher};
pub use envelope::RoutedMessage;
pub use middleware::{
    LogMiddleware, Middleware, MiddlewareRegistry, RejectEmptyMiddleware, UnknownMiddleware,
};
pub use raw::RawEvent;
pub use router::{Handler, Router, SubjectRouter};
