//! Process-wide shutdown signal.
//!
//! One [`Shutdown`] per process; every worker holds a `watch::Receiver<bool>`
//! obtained from [`Shutdown::subscribe`] and stops once it reads `true`.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Trigger on the first SIGINT/SIGTERM; exit the process on the second.
    pub fn listen_for_signals(&self) -> tokio::task::JoinHandle<()> {
        let shutdown = self.clone();
        tokio::spawn(async move {
            if let Err(err) = wait_for_signal().await {
                error!(error = %err, "failed to install signal handler");
                return;
            }
            info!("shutdown signal received; stopping gracefully");
            shutdown.trigger();

            if wait_for_signal().await.is_ok() {
                warn!("second shutdown signal received; exiting immediately");
                std::process::exit(1);
            }
        })
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve once shutdown was requested (or the sender is gone).
pub async fn stopped(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res,
        _ = term.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn subscribers_observe_trigger() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();

        let waiter = tokio::spawn(async move { stopped(&mut rx).await });
        shutdown.trigger();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn late_subscribers_see_an_earlier_trigger() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        let mut rx = shutdown.subscribe();
        tokio::time::timeout(Duration::from_millis(100), stopped(&mut rx))
            .await
            .unwrap();
    }
}
