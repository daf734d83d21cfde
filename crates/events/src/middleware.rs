//! Named hooks that run before a message reaches its handler.
//!
//! Middlewares are configured by name (`--middlewares log,reject-empty`) and
//! resolved through a [`MiddlewareRegistry`]. The pipeline itself never
//! interprets them; they are part of the router.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::RoutedMessage;

/// A hook run by the router before dispatching to a handler.
///
/// Returning an error fails the message the same way a handler error would.
pub trait Middleware: Send + Sync {
    fn name(&self) -> &str;

    fn before(&self, message: &RoutedMessage) -> anyhow::Result<()>;
}

/// Emits a debug record for every message.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMiddleware;

impl Middleware for LogMiddleware {
    fn name(&self) -> &str {
        "log"
    }

    fn before(&self, message: &RoutedMessage) -> anyhow::Result<()> {
        debug!(
            event_id = message.event_id(),
            subject = message.subject(),
            stream = message.stream(),
            position = %message.position(),
            retry_count = message.retry_count(),
            "routing message"
        );
        Ok(())
    }
}

/// Fails messages that carry no data.
#[derive(Debug, Default, Clone, Copy)]
pub struct RejectEmptyMiddleware;

impl Middleware for RejectEmptyMiddleware {
    fn name(&self) -> &str {
        "reject-empty"
    }

    fn before(&self, message: &RoutedMessage) -> anyhow::Result<()> {
        if message.data().is_null() {
            anyhow::bail!("message {} ({}) has no data", message.event_id(), message.subject());
        }
        Ok(())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown middleware `{0}`")]
pub struct UnknownMiddleware(pub String);

/// Name → middleware lookup used when building a router from configuration.
#[derive(Clone, Default)]
pub struct MiddlewareRegistry {
    middlewares: HashMap<String, Arc<dyn Middleware>>,
}

impl MiddlewareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with `log` and `reject-empty`.
    pub fn with_builtins() -> Self {
        Self::new()
            .register(Arc::new(LogMiddleware))
            .register(Arc::new(RejectEmptyMiddleware))
    }

    pub fn register(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middlewares.insert(middleware.name().to_string(), middleware);
        self
    }

    /// Resolve names in order; the first unknown name is an error.
    pub fn resolve<S>(&self, names: &[S]) -> Result<Vec<Arc<dyn Middleware>>, UnknownMiddleware>
    where
        S: AsRef<str>,
    {
        names
            .iter()
            .map(|name| {
                let name = name.as_ref().trim();
                self.middlewares
                    .get(name)
                    .cloned()
                    .ok_or_else(|| UnknownMiddleware(name.to_string()))
            })
            .collect()
    }
}

impl core::fmt::Debug for MiddlewareRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut names: Vec<&str> = self.middlewares.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("MiddlewareRegistry").field("middlewares", &names).finish()
    }
}
