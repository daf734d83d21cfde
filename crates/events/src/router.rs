//! Subject-based routing of adapted messages to application handlers.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::middleware::Middleware;
use crate::RoutedMessage;

/// Routes a message to whatever application code handles its subject.
///
/// The router is an external collaborator of the subscription pipeline: it
/// may fail for any reason, and the [`IsolatedDispatcher`](crate::IsolatedDispatcher)
/// contains every such failure. Errors are plain `anyhow` errors because they
/// come from application handlers the pipeline knows nothing about.
pub trait Router: Send + Sync {
    fn route(&self, message: &RoutedMessage) -> anyhow::Result<()>;
}

impl<R> Router for Arc<R>
where
    R: Router + ?Sized,
{
    fn route(&self, message: &RoutedMessage) -> anyhow::Result<()> {
        (**self).route(message)
    }
}

/// Application handler for one subject (or subject pattern).
pub type Handler = Box<dyn Fn(&RoutedMessage) -> anyhow::Result<()> + Send + Sync>;

/// Router that looks handlers up by message subject.
///
/// Lookup order: exact subject, then `prefix.*` category patterns (longest
/// prefix wins), then the `*` catch-all. Messages nobody handles are skipped.
/// Middlewares run in registration order before the handler; the first one
/// that fails stops the message.
#[derive(Default)]
pub struct SubjectRouter {
    handlers: HashMap<String, Handler>,
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl SubjectRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a subject, a `prefix.*` pattern, or `*`.
    pub fn on<F>(mut self, pattern: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&RoutedMessage) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.handlers.insert(pattern.into(), Box::new(handler));
        self
    }

    pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    pub fn with_middlewares(mut self, middlewares: impl IntoIterator<Item = Arc<dyn Middleware>>) -> Self {
        self.middlewares.extend(middlewares);
        self
    }

    pub fn middleware_names(&self) -> Vec<&str> {
        self.middlewares.iter().map(|m| m.name()).collect()
    }

    fn handler_for(&self, subject: &str) -> Option<&Handler> {
        if let Some(h) = self.handlers.get(subject) {
            return Some(h);
        }

        let category = self
            .handlers
            .iter()
            .filter_map(|(pattern, handler)| {
                let prefix = pattern.strip_suffix(".*")?;
                let rest = subject.strip_prefix(prefix)?;
                rest.starts_with('.').then_some((prefix.len(), handler))
            })
            .max_by_key(|(len, _)| *len)
            .map(|(_, handler)| handler);
        if category.is_some() {
            return category;
        }

        self.handlers.get("*")
    }
}

impl core::fmt::Debug for SubjectRouter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut patterns: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        patterns.sort_unstable();
        f.debug_struct("SubjectRouter")
            .field("handlers", &patterns)
            .field("middlewares", &self.middleware_names())
            .finish()
    }
}

impl Router for SubjectRouter {
    fn route(&self, message: &RoutedMessage) -> anyhow::Result<()> {
        for middleware in &self.middlewares {
            middleware.before(message)?;
        }

        match self.handler_for(message.subject()) {
            Some(handler) => handler(message),
            None => {
                debug!(subject = message.subject(), "no handler registered; skipping");
                Ok(())
            }
        }
    }
}
