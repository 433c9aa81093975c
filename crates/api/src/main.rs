use std::sync::Arc;

use anyhow::Context;
use structopt::StructOpt;
use tracing::info;

use catalog_api::app::{self, services};
use catalog_infra::Shutdown;
use catalog_infra::config::{self, ProductsServiceConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    catalog_observability::init();

    let cli = config::CliOptions::from_args();
    let config: ProductsServiceConfig =
        config::load(cli.config.as_deref()).context("failed to load configuration")?;

    let services = Arc::new(services::build_services(&config).await?);
    let app = app::build_app(services, &config.http);

    let shutdown = Shutdown::new();
    shutdown.listen_for_signals();

    let listener = tokio::net::TcpListener::bind(&config.http.listen_address)
        .await
        .with_context(|| format!("failed to bind {}", config.http.listen_address))?;
    info!(address = %listener.local_addr()?, service = app::SERVICE_NAME, "listening");

    catalog_infra::http::serve(
        listener,
        app,
        shutdown.subscribe(),
        config.http.graceful_timeout(),
    )
    .await?;

    info!(service = app::SERVICE_NAME, "stopped");
    Ok(())
}
