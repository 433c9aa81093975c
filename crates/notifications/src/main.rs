use std::sync::Arc;

use anyhow::Context;
use structopt::StructOpt;
use tracing::info;

use catalog_infra::config::{self, NotificationsServiceConfig};
use catalog_infra::{QueueConsumer, Shutdown, SqsQueue};
use catalog_notifications::{NotificationService, app, registry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    catalog_observability::init();

    let cli = config::CliOptions::from_args();
    let config: NotificationsServiceConfig =
        config::load(cli.config.as_deref()).context("failed to load configuration")?;

    let queue = SqsQueue::connect(&config.broker)
        .await
        .context("failed to connect to SQS")?;
    let registry = Arc::new(registry(Arc::new(NotificationService::new())));
    let consumer = QueueConsumer::new(Arc::new(queue), registry, config.broker.consumer_config());

    let shutdown = Shutdown::new();
    shutdown.listen_for_signals();

    let listener = tokio::net::TcpListener::bind(&config.http.listen_address)
        .await
        .with_context(|| format!("failed to bind {}", config.http.listen_address))?;
    info!(address = %listener.local_addr()?, service = app::SERVICE_NAME, "listening");

    // Both workers watch the same signal; the process exits once both stopped.
    let http = async {
        let res = catalog_infra::http::serve(
            listener,
            app::build_app(),
            shutdown.subscribe(),
            config.http.graceful_timeout(),
        )
        .await;
        // A dead HTTP worker takes the consumer down with it.
        shutdown.trigger();
        res
    };
    let (http, report) = tokio::join!(http, consumer.run(shutdown.subscribe()));

    info!(
        service = app::SERVICE_NAME,
        completed = report.completed,
        redelivered = report.redelivered,
        "stopped"
    );
    http.context("http server failed")?;
    Ok(())
}
