//! Wiring: router, store client, driver loop.

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::info;

use persub_events::{JsonAdapter, MiddlewareRegistry, RoutedMessage, SubjectRouter, UnknownMiddleware};
use persub_infra::store::RedisStreamsClient;
use persub_infra::RunSummary;

use crate::config::SubscriberConfig;

/// Router used by the binary: the configured middlewares, then a catch-all
/// handler that records each event.
pub fn build_router(
    config: &SubscriberConfig,
    registry: &MiddlewareRegistry,
) -> Result<SubjectRouter, UnknownMiddleware> {
    let middlewares = registry.resolve(&config.middlewares)?;
    Ok(SubjectRouter::new()
        .with_middlewares(middlewares)
        .on("*", record_event))
}

fn record_event(message: &RoutedMessage) -> anyhow::Result<()> {
    info!(
        event_id = message.event_id(),
        subject = message.subject(),
        stream = message.stream(),
        position = %message.position(),
        "event received"
    );
    Ok(())
}

pub fn store_client(config: &SubscriberConfig) -> RedisStreamsClient {
    match &config.consumer {
        Some(consumer) => RedisStreamsClient::new().with_consumer(consumer.clone()),
        None => RedisStreamsClient::new(),
    }
}

/// Run the subscription until `cancel` fires or the pipeline fails.
pub async fn run(config: SubscriberConfig, cancel: CancellationToken) -> anyhow::Result<RunSummary> {
    let router = build_router(&config, &MiddlewareRegistry::with_builtins())?;
    let client = store_client(&config);

    info!(
        subscription = %config.target,
        data_source = %config.descriptor,
        consumer = client.consumer(),
        middlewares = ?router.middleware_names(),
        "starting persistent subscription"
    );

    persub_infra::run(client, config.run_config(), JsonAdapter, router, cancel)
        .await
        .context("subscription terminated")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Cli;
    use chrono::Utc;
    use clap::Parser;
    use persub_core::Position;
    use persub_events::Router;
    use serde_json::json;

    fn config(middlewares: &str) -> SubscriberConfig {
        let cli = Cli::try_parse_from([
            "persub",
            "orders",
            "billing",
            "--dsn",
            "u:p@localhost:6379",
            "--middlewares",
            middlewares,
            "--consumer",
            "worker-1",
        ])
        .unwrap();
        SubscriberConfig::from_cli(cli, &MiddlewareRegistry::with_builtins()).unwrap()
    }

    fn message(data: serde_json::Value) -> RoutedMessage {
        RoutedMessage::new("1-0", "OrderPlaced", "orders", Position::START, Utc::now(), 0, data, json!(null))
    }

    #[test]
    fn router_runs_configured_middlewares_in_order() {
        let config = config("log,reject-empty");
        let router = build_router(&config, &MiddlewareRegistry::with_builtins()).unwrap();

        assert_eq!(router.middleware_names(), vec!["log", "reject-empty"]);
        assert!(router.route(&message(json!({"n": 1}))).is_ok());
        assert!(router.route(&message(json!(null))).is_err());
    }

    #[test]
    fn consumer_name_is_taken_from_the_config() {
        assert_eq!(store_client(&config("log")).consumer(), "worker-1");
    }
}
