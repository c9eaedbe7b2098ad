//! The collection driver. One run walks the configured API proxies in order and, per proxy, either takes one instant
//! snapshot or walks the planned batches of the global window. Every failure is logged and counted, never propagated.

use chrono::{
    DateTime,
    Utc,
};
use ingester_config::{
    CollectionWindow,
    Config,
    MetricConfig,
};
use ingester_prometheus::{
    batch,
    QueryBackend,
    QueryExecutor,
    QueryWindow,
    Sample,
    TargetCollector,
    TimeRange,
    DEFAULT_BATCH_SPAN,
};
use ingester_storage::{
    MetricSink,
    OutputKey,
};
use std::time::{
    Duration,
    Instant,
};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Succeeded,
    PartiallyFailed,
}

/// Tally of one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// Units durably written, including empty instant snapshots.
    pub written: usize,
    /// Range batches skipped because the backend returned no samples.
    pub empty: usize,
    /// Units whose collection or write failed.
    pub failed: usize,
    /// The run stopped early because shutdown was requested.
    pub cancelled: bool,
}

impl RunReport {
    pub fn outcome(&self) -> RunOutcome {
        if self.failed == 0 {
            RunOutcome::Succeeded
        } else {
            RunOutcome::PartiallyFailed
        }
    }
}

pub struct Ingester<B, S> {
    collector: TargetCollector<B>,
    sink: S,
    api_proxies: Vec<String>,
    metrics: Vec<MetricConfig>,
    range_step: Duration,
    window: Option<CollectionWindow>,
}

impl<B: QueryBackend, S: MetricSink> Ingester<B, S> {
    pub fn new(config: &Config, backend: B, sink: S) -> Self {
        let window = config.range_window();
        if config.prometheus.use_range_query && window.is_none() {
            warn!("Range queries requested without --start/--end, collecting instant snapshots instead");
        }

        Self {
            collector: TargetCollector::new(QueryExecutor::new(backend, config.prometheus.timeout)),
            sink,
            api_proxies: config.api_proxies.clone(),
            metrics: config.prometheus.metrics.clone(),
            range_step: config.prometheus.range_step,
            window,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Runs one full collection. `now` is the evaluation time of instant queries and the partition date of their units.
    pub async fn run(&self, now: DateTime<Utc>, cancel: &CancellationToken) -> RunReport {
        let started = Instant::now();
        let mut report = RunReport::default();
        let mode = if self.window.is_some() { "range" } else { "instant" };
        info!(api_proxies = ?self.api_proxies, mode, "Collecting metrics");

        for api_proxy in &self.api_proxies {
            let finished = match self.window {
                Some(window) => self.collect_range(api_proxy, window, cancel, &mut report).await,
                None => self.collect_instant(api_proxy, now, cancel, &mut report).await,
            };
            if !finished {
                break;
            }
        }

        let elapsed = started.elapsed();
        match report.outcome() {
            RunOutcome::Succeeded => info!(
                written = report.written,
                empty = report.empty,
                cancelled = report.cancelled,
                ?elapsed,
                "Collection finished"
            ),
            RunOutcome::PartiallyFailed => warn!(
                written = report.written,
                empty = report.empty,
                failed = report.failed,
                cancelled = report.cancelled,
                ?elapsed,
                "Collection finished with failures"
            ),
        }
        report
    }

    /// Returns `false` if shutdown was requested before the unit started.
    async fn collect_instant(
        &self,
        api_proxy: &str,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
        report: &mut RunReport,
    ) -> bool {
        if stop_requested(cancel, report) {
            return false;
        }

        let started = Instant::now();
        let collected = self
            .collector
            .collect(api_proxy, &self.metrics, QueryWindow::Instant(now))
            .await;
        let elapsed = started.elapsed();
        debug!(api_proxy, ?elapsed, "Instant query finished");

        match collected {
            Ok(samples) => self.store(api_proxy, samples, OutputKey::instant(api_proxy, now), report).await,
            Err(error) => {
                error!(api_proxy, %error, "Failed to collect metrics, skipping");
                report.failed += 1;
            }
        }
        true
    }

    async fn collect_range(
        &self,
        api_proxy: &str,
        window: CollectionWindow,
        cancel: &CancellationToken,
        report: &mut RunReport,
    ) -> bool {
        let range = TimeRange::new(window.start, window.end, self.range_step);
        info!(api_proxy, %range, step = ?self.range_step, "Collecting range");

        let mut batches = batch::plan(&range, DEFAULT_BATCH_SPAN).peekable();
        while let Some(batch) = batches.next() {
            if stop_requested(cancel, report) {
                return false;
            }

            let started = Instant::now();
            let collected = self
                .collector
                .collect(api_proxy, &self.metrics, QueryWindow::Range(batch))
                .await;
            let elapsed = started.elapsed();
            debug!(api_proxy, batch_start = %batch.start, batch_end = %batch.end, ?elapsed, "Range query finished");

            match collected {
                Ok(samples) if samples.is_empty() => {
                    info!(api_proxy, batch_start = %batch.start, batch_end = %batch.end, "No samples in batch");
                    report.empty += 1;
                }
                Ok(samples) => self.store(api_proxy, samples, OutputKey::batch(api_proxy, &batch), report).await,
                Err(error) => {
                    error!(
                        api_proxy,
                        batch_start = %batch.start,
                        batch_end = %batch.end,
                        %error,
                        "Failed to collect batch, continuing with the next one"
                    );
                    report.failed += 1;
                }
            }

            match batches.peek() {
                Some(next) => debug!(api_proxy, next_batch_start = %next.start, "Next batch"),
                None => debug!(api_proxy, "All batches processed"),
            }
        }
        true
    }

    async fn store(&self, api_proxy: &str, samples: Vec<Sample>, key: OutputKey, report: &mut RunReport) {
        let started = Instant::now();
        match self.sink.store(samples, &key).await {
            Ok(unit) => {
                info!(api_proxy, path = ?unit.path, rows = unit.rows, elapsed = ?started.elapsed(), "Stored metrics");
                report.written += 1;
            }
            Err(error) => {
                error!(api_proxy, unit = %key, %error, "Failed to store metrics");
                report.failed += 1;
            }
        }
    }
}

fn stop_requested(cancel: &CancellationToken, report: &mut RunReport) -> bool {
    if cancel.is_cancelled() {
        info!("Shutdown requested, stopping the run before the next unit");
        report.cancelled = true;
    }
    report.cancelled
}
