use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use persub_cli::{Cli, SubscriberConfig};
use persub_events::MiddlewareRegistry;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    persub_observability::init(cli.log_format);

    let config = SubscriberConfig::from_cli(cli, &MiddlewareRegistry::with_builtins())
        .context("invalid configuration")?;

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_shutdown(cancel.clone()));

    match persub_cli::app::run(config, cancel).await {
        Ok(summary) => {
            info!(
                delivered = summary.delivered,
                router_failures = summary.router_failures,
                redirects = summary.redirects,
                "subscription stopped"
            );
            Ok(())
        }
        Err(err) => {
            error!(error = %format!("{err:#}"), "subscriber stopped");
            Err(err)
        }
    }
}

async fn cancel_on_shutdown(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown requested");
    cancel.cancel();
}
