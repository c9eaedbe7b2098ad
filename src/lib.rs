#[macro_use]
extern crate tracing;

pub mod args;
pub mod ingest;
mod logging;
pub mod scheduler;

pub use args::Args;
use chrono::Utc;
use color_eyre::{
    eyre::WrapErr,
    Result,
};
use ingester_config::Config;
use ingester_prometheus::PrometheusClient;
use ingester_storage::ParquetSink;
pub use ingest::{
    Ingester,
    RunOutcome,
    RunReport,
};
pub use logging::{
    init_errors,
    init_logging,
};
pub use scheduler::Scheduler;
use tokio_util::sync::CancellationToken;

/// Builds the client and sink from a loaded configuration, then collects once or on the configured schedule until a
/// termination signal arrives.
pub async fn run(args: &Args, config: Config) -> Result<()> {
    let client = PrometheusClient::new(&config.prometheus).wrap_err("Failed to create Prometheus client")?;
    let sink = ParquetSink::new(&config.storage).wrap_err("Failed to initialize storage")?;
    let ingester = Ingester::new(&config, client, sink);

    let cancel = CancellationToken::new();
    let signals = scheduler::spawn_signal_listener(cancel.clone());

    if args.once {
        // Unit failures are logged by the run; only startup errors end the process with a failure.
        let report = ingester.run(Utc::now(), &cancel).await;
        signals.abort();
        if report.outcome() == RunOutcome::PartiallyFailed {
            warn!(failed = report.failed, written = report.written, "Single collection finished with failures");
        }
        return Ok(());
    }

    Scheduler::new(config.collection_interval()).run(&ingester, cancel).await;
    Ok(())
}
