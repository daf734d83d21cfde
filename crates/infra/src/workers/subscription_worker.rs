use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use persub_core::{DataSourceDescriptor, SubscriptionTarget};
use persub_events::{Adapter, DispatchOutcome, IsolatedDispatcher, Router};

use crate::connection::ConnectionFactory;
use crate::error::SubscriptionError;
use crate::failover::{FailoverPolicy, FailoverResolver};
use crate::source::ReconnectingSubscription;
use crate::store::{StoreClient, SubscriptionSettings};

/// Everything the driver needs to start a subscription.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub target: SubscriptionTarget,
    pub descriptor: DataSourceDescriptor,
    pub settings: SubscriptionSettings,
    pub failover: FailoverPolicy,
}

impl RunConfig {
    pub fn new(target: SubscriptionTarget, descriptor: DataSourceDescriptor) -> Self {
        Self {
            target,
            descriptor,
            settings: SubscriptionSettings::default(),
            failover: FailoverPolicy::default(),
        }
    }

    /// Per-operation timeout handed to the store client.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.settings = self.settings.with_timeout(timeout);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.settings = self.settings.with_batch_size(batch_size);
        self
    }

    pub fn with_failover(mut self, failover: FailoverPolicy) -> Self {
        self.failover = failover;
        self
    }
}

/// What a subscription did before it was cancelled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub delivered: u64,
    pub router_failures: u64,
    pub redirects: u64,
}

/// Driver loop: pulls raw events from a self-healing source, adapts them and
/// hands them to an isolated dispatcher, strictly one at a time.
///
/// - Router failures are logged by the dispatcher and the event is parked.
/// - Delivered events are acked.
/// - Adaptation failures and non-recoverable store failures end the run.
pub struct SubscriptionWorker<C, A, R>
where
    C: StoreClient,
{
    source: ReconnectingSubscription<C>,
    adapter: A,
    dispatcher: IsolatedDispatcher<R>,
}

impl<C, A, R> SubscriptionWorker<C, A, R>
where
    C: StoreClient,
    A: Adapter,
    R: Router,
{
    pub fn new(source: ReconnectingSubscription<C>, adapter: A, router: R) -> Self {
        Self {
            source,
            adapter,
            dispatcher: IsolatedDispatcher::new(router),
        }
    }

    /// Build the whole pipeline from a client and a [`RunConfig`].
    pub fn from_config(client: C, config: RunConfig, adapter: A, router: R) -> Self {
        let source = ReconnectingSubscription::new(
            ConnectionFactory::new(client, config.settings),
            FailoverResolver::new(config.failover),
            config.descriptor,
            config.target,
        );
        Self::new(source, adapter, router)
    }

    pub fn source(&self) -> &ReconnectingSubscription<C> {
        &self.source
    }

    pub fn dispatcher(&self) -> &IsolatedDispatcher<R> {
        &self.dispatcher
    }

    pub fn summary(&self) -> RunSummary {
        let stats = self.dispatcher.stats();
        RunSummary {
            delivered: stats.delivered,
            router_failures: stats.router_failures,
            redirects: self.source.redirects(),
        }
    }

    /// Consume events until `cancel` fires or the pipeline fails.
    ///
    /// Cancellation is only observed while waiting for the next event (which
    /// includes connecting and redirect backoff); an event already being
    /// handled is finished and settled first.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<RunSummary, SubscriptionError> {
        info!(
            subscription = %self.source.target(),
            data_source = %self.source.descriptor(),
            "subscription worker started"
        );

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                next = self.source.next_event() => Some(next),
            };

            let Some(next) = next else {
                let summary = self.summary();
                info!(
                    delivered = summary.delivered,
                    router_failures = summary.router_failures,
                    redirects = summary.redirects,
                    "subscription worker cancelled"
                );
                return Ok(summary);
            };

            let event = next.map_err(|err| self.stream_failed(err))?;

            let event_id = event.event_id.clone();
            let position = event.position;
            let message = self.adapter.adapt(event).map_err(|err| {
                error!(event_id, %position, error = %err, "event adaptation failure");
                SubscriptionError::from(err)
            })?;

            let settled = match self.dispatcher.dispatch(message) {
                DispatchOutcome::Delivered => self.source.ack(&event_id).await,
                DispatchOutcome::RouterFailed { reason } => {
                    self.source
                        .park(&event_id, &format!("router failure: {reason}"))
                        .await
                }
            };
            settled.map_err(|err| self.stream_failed(err))?;
        }
    }

    fn stream_failed(&mut self, err: SubscriptionError) -> SubscriptionError {
        self.dispatcher.on_stream_error(&err);
        err
    }
}

impl<C, A, R> core::fmt::Debug for SubscriptionWorker<C, A, R>
where
    C: StoreClient,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SubscriptionWorker")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// Run a subscription pipeline until cancelled or failed.
pub async fn run<C, A, R>(
    client: C,
    config: RunConfig,
    adapter: A,
    router: R,
    cancel: CancellationToken,
) -> Result<RunSummary, SubscriptionError>
where
    C: StoreClient,
    A: Adapter,
    R: Router,
{
    SubscriptionWorker::from_config(client, config, adapter, router)
        .run(cancel)
        .await
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::store::{InMemoryCluster, StoreError};
    use persub_events::{JsonAdapter, SubjectRouter};
    use serde_json::json;

    fn cluster() -> InMemoryCluster {
        InMemoryCluster::new()
            .with_node("node1", 1113)
            .with_stream("orders")
            .with_group("orders", "billing")
    }

    fn config() -> RunConfig {
        RunConfig::new(
            SubscriptionTarget::new("orders", "billing").unwrap(),
            "esdb://u:p@node1:1113".parse().unwrap(),
        )
    }

    #[tokio::test]
    async fn cancelled_before_start_returns_an_empty_summary() {
        let cluster = cluster();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = run(cluster.clone(), config(), JsonAdapter, SubjectRouter::new(), cancel)
            .await
            .unwrap();

        assert_eq!(summary, RunSummary::default());
        assert!(cluster.connection_attempts().is_empty());
    }

    #[tokio::test]
    async fn acks_delivered_events_and_parks_failed_ones() {
        let cluster = cluster();
        cluster.append("orders", "OrderPlaced", json!({"n": 1}));
        cluster.append("orders", "OrderRejected", json!({"n": 2}));
        cluster.append("orders", "OrderShipped", json!({"n": 3}));
        let ids = cluster.event_ids("orders");

        let cancel = CancellationToken::new();
        let stop = cancel.clone();
        let router = SubjectRouter::new()
            .on("OrderRejected", |_| anyhow::bail!("no stock"))
            .on("OrderShipped", move |_| {
                stop.cancel();
                Ok(())
            });

        let summary = run(cluster.clone(), config(), JsonAdapter, router, cancel)
            .await
            .unwrap();

        assert_eq!(
            summary,
            RunSummary {
                delivered: 2,
                router_failures: 1,
                redirects: 0
            }
        );
        assert_eq!(cluster.acked("orders", "billing"), vec![ids[0].clone(), ids[2].clone()]);
        assert_eq!(
            cluster.parked("orders", "billing"),
            vec![(ids[1].clone(), "router failure: no stock".to_string())]
        );
    }

    #[tokio::test]
    async fn stream_failure_is_recorded_and_ends_the_run() {
        let cluster = cluster();
        cluster.fail_next_connect(StoreError::Unreachable {
            address: "node1:1113".into(),
            reason: "connection refused".into(),
        });
        let mut worker = SubscriptionWorker::from_config(cluster, config(), JsonAdapter, SubjectRouter::new());

        let err = worker.run(CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, SubscriptionError::Connection(StoreError::Unreachable { .. })));
        assert_eq!(worker.dispatcher().stats().stream_failures, 1);
    }

    #[tokio::test]
    async fn malformed_event_stops_dispatch() {
        let cluster = cluster();
        cluster.append("orders", "OrderPlaced", json!({}));
        cluster.append_raw("orders", "OrderPlaced", "{not json", true);
        cluster.append("orders", "OrderPlaced", json!({}));

        let seen = Arc::new(Mutex::new(0));
        let counter = seen.clone();
        let router = SubjectRouter::new().on("*", move |_| {
            *counter.lock().unwrap() += 1;
            Ok(())
        });

        let err = run(cluster.clone(), config(), JsonAdapter, router, CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, SubscriptionError::Adaptation(_)));
        assert_eq!(*seen.lock().unwrap(), 1);
        assert_eq!(cluster.acked("orders", "billing").len(), 1);
    }
}
