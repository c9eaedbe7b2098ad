use crate::{
    AggregateError,
    MetricFailure,
    QueryBackend,
    QueryExecutor,
    QueryWindow,
    Sample,
};
use futures::future::join_all;
use ingester_config::MetricConfig;
use std::time::Instant;

/// Collects every configured metric for one API proxy.
///
/// All metric queries run concurrently and are joined before returning. A single failing metric fails the whole
/// collection so a window is never stored with only part of its metrics.
pub struct TargetCollector<B> {
    executor: QueryExecutor<B>,
}

impl<B: QueryBackend> TargetCollector<B> {
    pub fn new(executor: QueryExecutor<B>) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &QueryExecutor<B> {
        &self.executor
    }

    pub async fn collect(
        &self,
        api_proxy: &str,
        metrics: &[MetricConfig],
        window: QueryWindow,
    ) -> Result<Vec<Sample>, AggregateError> {
        let outcomes = join_all(metrics.iter().map(|metric| async move {
            let started = Instant::now();
            let outcome = self.executor.execute(metric, api_proxy, window).await;
            (metric, started.elapsed(), outcome)
        }))
        .await;

        let mut samples = Vec::new();
        let mut failures = Vec::new();
        for (metric, elapsed, outcome) in outcomes {
            match outcome {
                Ok(metric_samples) => {
                    debug!(api_proxy, metric = %metric.name, samples = metric_samples.len(), ?elapsed, "Metric collected");
                    samples.extend(metric_samples);
                }
                Err(error) => {
                    debug!(api_proxy, metric = %metric.name, %error, ?elapsed, "Metric failed");
                    failures.push(MetricFailure {
                        metric: metric.name.clone(),
                        error,
                    });
                }
            }
        }

        if !failures.is_empty() {
            return Err(AggregateError {
                target: api_proxy.to_string(),
                total: metrics.len(),
                failures,
            });
        }
        Ok(samples)
    }
}
