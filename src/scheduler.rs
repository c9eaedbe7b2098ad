use crate::ingest::Ingester;
use chrono::Utc;
use ingester_prometheus::QueryBackend;
use ingester_storage::MetricSink;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Drives recurring runs from a single loop, so a run never overlaps with the next one. A slow run only delays the
/// following tick.
pub struct Scheduler {
    interval: Duration,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Runs immediately, then once per interval until `cancel` fires. Returns the number of runs started.
    pub async fn run<B, S>(&self, ingester: &Ingester<B, S>, cancel: CancellationToken) -> usize
    where
        B: QueryBackend,
        S: MetricSink,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval = ?self.interval, "Starting metrics collection, press Ctrl+C to exit");

        let mut runs = 0;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(runs, "Shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    runs += 1;
                    ingester.run(Utc::now(), &cancel).await;
                }
            }
        }
        runs
    }
}

/// Resolves on SIGINT, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            error!(%error, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{
            signal,
            SignalKind,
        };
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(error) => {
                error!(%error, "Failed to listen for SIGTERM");
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
}

/// Cancels `cancel` once a termination signal arrives.
pub fn spawn_signal_listener(cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Termination signal received");
        cancel.cancel();
    })
}
