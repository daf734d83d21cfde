//! Connection factory: descriptor + target → live persistent subscription.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, info};

use persub_core::{DataSourceDescriptor, FailoverSignal, SubscriptionTarget};

use crate::store::{StoreClient, StoreError, SubscriptionSettings};

/// Result of one attempt to establish a subscription.
#[derive(Debug)]
pub enum ConnectionOutcome<S> {
    Connected(S),
    /// The node is not the primary; the signal says where the primary is.
    NotPrimary(FailoverSignal),
    Fatal(StoreError),
}

impl<S> ConnectionOutcome<S> {
    pub fn from_result(result: Result<S, StoreError>) -> Self {
        match result {
            Ok(stream) => Self::Connected(stream),
            Err(error) => match error.failover_signal() {
                Some(signal) => Self::NotPrimary(signal),
                None => Self::Fatal(error),
            },
        }
    }
}

/// Opens a fresh connection and persistent subscription per call.
///
/// Holds no connection state between calls; whatever stream it returns is
/// owned by the caller.
#[derive(Debug, Clone)]
pub struct ConnectionFactory<C> {
    client: C,
    settings: SubscriptionSettings,
}

impl<C> ConnectionFactory<C>
where
    C: StoreClient,
{
    pub fn new(client: C, settings: SubscriptionSettings) -> Self {
        Self { client, settings }
    }

    /// Connect to `descriptor` and subscribe to `target`.
    ///
    /// Each step is bounded by the configured timeout.
    pub async fn establish(
        &self,
        descriptor: &DataSourceDescriptor,
        target: &SubscriptionTarget,
    ) -> ConnectionOutcome<C::Stream> {
        ConnectionOutcome::from_result(self.try_establish(descriptor, target).await)
    }

    async fn try_establish(
        &self,
        descriptor: &DataSourceDescriptor,
        target: &SubscriptionTarget,
    ) -> Result<C::Stream, StoreError> {
        let timeout = self.settings.timeout;

        debug!(data_source = %descriptor, "connecting to event store");
        let connection = bounded("connect", timeout, self.client.connect(descriptor)).await?;

        let stream = bounded(
            "subscribe",
            timeout,
            self.client.subscribe(connection, target, &self.settings),
        )
        .await?;

        info!(
            data_source = %descriptor,
            stream = target.stream(),
            group = target.group(),
            "persistent subscription established"
        );
        Ok(stream)
    }
}

async fn bounded<T>(
    operation: &'static str,
    timeout: Duration,
    fut: impl Future<Output = Result<T, StoreError>>,
) -> Result<T, StoreError> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout { operation, timeout }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryCluster;

    fn target() -> SubscriptionTarget {
        SubscriptionTarget::new("orders", "billing").unwrap()
    }

    fn factory(cluster: &InMemoryCluster) -> ConnectionFactory<InMemoryCluster> {
        ConnectionFactory::new(cluster.clone(), SubscriptionSettings::default())
    }

    fn cluster() -> InMemoryCluster {
        InMemoryCluster::new()
            .with_node("node1", 1113)
            .with_node("node2", 1113)
            .with_stream("orders")
            .with_group("orders", "billing")
    }

    #[tokio::test]
    async fn connects_to_primary() {
        let cluster = cluster();
        let outcome = factory(&cluster)
            .establish(&"esdb://u:p@node1:1113".parse().unwrap(), &target())
            .await;
        assert!(matches!(outcome, ConnectionOutcome::Connected(_)));
    }

    #[tokio::test]
    async fn classifies_not_primary() {
        let cluster = cluster();
        let outcome = factory(&cluster)
            .establish(&"esdb://u:p@node2:1113".parse().unwrap(), &target())
            .await;
        match outcome {
            ConnectionOutcome::NotPrimary(signal) => assert_eq!(signal, FailoverSignal::new("node1", 1113)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn every_call_opens_a_new_connection() {
        let cluster = cluster();
        let factory = factory(&cluster);
        let descriptor = "esdb://u:p@node1:1113".parse().unwrap();

        factory.establish(&descriptor, &target()).await;
        factory.establish(&descriptor, &target()).await;

        assert_eq!(cluster.connection_attempts(), vec![descriptor.clone(), descriptor]);
    }

    #[tokio::test]
    async fn subscribe_failures_are_fatal() {
        let cluster = cluster();
        let missing = SubscriptionTarget::new("payments", "billing").unwrap();
        let outcome = factory(&cluster)
            .establish(&"esdb://u:p@node1:1113".parse().unwrap(), &missing)
            .await;
        assert!(matches!(
            outcome,
            ConnectionOutcome::Fatal(StoreError::StreamNotFound(ref s)) if s == "payments"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_operations_time_out() {
        let result = bounded("connect", Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<(), StoreError>(())
        })
        .await;

        assert_eq!(
            result,
            Err(StoreError::Timeout {
                operation: "connect",
                timeout: Duration::from_millis(50)
            })
        );
    }
}
