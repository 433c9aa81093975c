//! HTTP server bootstrap with bounded graceful shutdown, shared by both services.

use std::future::IntoFuture;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::shutdown::stopped;

/// Serve `app` until `shutdown` flips, then stop accepting and wait up to
/// `grace` for open requests before returning.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: watch::Receiver<bool>,
    grace: Duration,
) -> std::io::Result<()> {
    let mut signal = shutdown.clone();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move { stopped(&mut signal).await })
        .into_future();
    tokio::pin!(server);

    let mut shutdown = shutdown;
    let deadline = async move {
        stopped(&mut shutdown).await;
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        res = &mut server => {
            info!("http server stopped");
            res
        }
        _ = deadline => {
            warn!(grace_ms = grace.as_millis() as u64, "graceful shutdown timed out; dropping open connections");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;

    use crate::Shutdown;

    #[tokio::test]
    async fn returns_after_shutdown_signal() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let app = Router::new().route("/", get(|| async { "ok" }));
        let shutdown = Shutdown::new();

        let server = tokio::spawn(serve(
            listener,
            app,
            shutdown.subscribe(),
            Duration::from_secs(5),
        ));
        shutdown.trigger();

        tokio::time::timeout(Duration::from_secs(2), server)
            .await
            .expect("server did not stop")
            .unwrap()
            .unwrap();
    }
}
