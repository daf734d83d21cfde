//! Fault-isolated dispatch of routed messages.
//!
//! The subscription is a long-running consumer: one bad message (or one buggy
//! handler) must not take the whole loop down. The [`IsolatedDispatcher`]
//! wraps every router call in a failure boundary that catches errors *and*
//! panics, logs them, and reports the outcome so the caller can park the
//! event and move on to the next one.
//!
//! Only router/handler failures are contained here. Adaptation failures never
//! reach the dispatcher, and stream-level failures are merely recorded through
//! [`IsolatedDispatcher::on_stream_error`]; deciding what happens next is the
//! driver loop's job.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::error;

use crate::{RoutedMessage, Router};

/// How a single dispatch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The router returned normally.
    Delivered,
    /// The router (or a handler/middleware it called) failed; the failure was
    /// logged and swallowed.
    RouterFailed { reason: String },
}

impl DispatchOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

/// Dispatcher counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub delivered: u64,
    pub router_failures: u64,
    pub stream_failures: u64,
}

/// Hands messages to a [`Router`] one at a time, in arrival order, containing
/// every routing failure.
#[derive(Debug)]
pub struct IsolatedDispatcher<R> {
    router: R,
    stats: DispatchStats,
}

impl<R> IsolatedDispatcher<R>
where
    R: Router,
{
    pub fn new(router: R) -> Self {
        Self {
            router,
            stats: DispatchStats::default(),
        }
    }

    pub fn router(&self) -> &R {
        &self.router
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Route one message. Always returns; failures become
    /// [`DispatchOutcome::RouterFailed`].
    pub fn dispatch(&mut self, message: RoutedMessage) -> DispatchOutcome {
        let result = match catch_unwind(AssertUnwindSafe(|| self.router.route(&message))) {
            Ok(result) => result,
            Err(panic) => Err(anyhow::anyhow!("handler panicked: {}", panic_message(panic.as_ref()))),
        };

        match result {
            Ok(()) => {
                self.stats.delivered += 1;
                DispatchOutcome::Delivered
            }
            Err(err) => {
                self.stats.router_failures += 1;
                let reason = format!("{err:#}");
                error!(
                    event_id = message.event_id(),
                    subject = message.subject(),
                    position = %message.position(),
                    exception = %reason,
                    "router failure"
                );
                DispatchOutcome::RouterFailed { reason }
            }
        }
    }

    /// Record a failure of the underlying event stream.
    pub fn on_stream_error(&mut self, error: &(dyn std::error::Error + 'static)) {
        self.stats.stream_failures += 1;
        error!(exception = %error, "event store connection failure");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::SubjectRouter;
    use chrono::Utc;
    use persub_core::Position;
    use serde_json::json;

    fn message(n: u64) -> RoutedMessage {
        RoutedMessage::new(
            format!("e-{n}"),
            format!("M{n}"),
            "orders",
            Position::from_event_number(n),
            Utc::now(),
            0,
            json!({ "n": n }),
            json!(null),
        )
    }

    fn failing_on(subject: &'static str, seen: Arc<Mutex<Vec<String>>>) -> SubjectRouter {
        SubjectRouter::new().on("*", move |m| {
            seen.lock().unwrap().push(m.subject().to_string());
            if m.subject() == subject {
                anyhow::bail!("cannot process {}", m.subject());
            }
            Ok(())
        })
    }

    #[test]
    fn router_failure_does_not_stop_later_messages() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = IsolatedDispatcher::new(failing_on("M3", seen.clone()));

        let outcomes: Vec<DispatchOutcome> = (1..=5).map(|n| dispatcher.dispatch(message(n))).collect();

        assert_eq!(*seen.lock().unwrap(), vec!["M1", "M2", "M3", "M4", "M5"]);
        assert!(outcomes[0].is_delivered());
        assert!(outcomes[1].is_delivered());
        assert_eq!(
            outcomes[2],
            DispatchOutcome::RouterFailed {
                reason: "cannot process M3".into()
            }
        );
        assert!(outcomes[3].is_delivered());
        assert!(outcomes[4].is_delivered());
        assert_eq!(
            dispatcher.stats(),
            DispatchStats {
                delivered: 4,
                router_failures: 1,
                stream_failures: 0
            }
        );
    }

    #[test]
    fn handler_panics_are_contained() {
        let router = SubjectRouter::new().on("M2", |_| panic!("handler bug"));
        let mut dispatcher = IsolatedDispatcher::new(router);

        assert!(dispatcher.dispatch(message(1)).is_delivered());
        let outcome = dispatcher.dispatch(message(2));
        assert_eq!(
            outcome,
            DispatchOutcome::RouterFailed {
                reason: "handler panicked: handler bug".into()
            }
        );
        assert!(dispatcher.dispatch(message(3)).is_delivered());
        assert_eq!(dispatcher.stats().router_failures, 1);
    }

    #[test]
    fn error_context_is_kept_in_the_reason() {
        let router = SubjectRouter::new().on("*", |_| {
            Err(anyhow::anyhow!("connection refused").context("writing projection"))
        });
        let mut dispatcher = IsolatedDispatcher::new(router);

        match dispatcher.dispatch(message(1)) {
            DispatchOutcome::RouterFailed { reason } => {
                assert_eq!(reason, "writing projection: connection refused");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn stream_errors_are_counted() {
        let mut dispatcher = IsolatedDispatcher::new(SubjectRouter::new());
        let err = std::io::Error::other("socket closed");
        dispatcher.on_stream_error(&err);
        assert_eq!(dispatcher.stats().stream_failures, 1);
    }
}
