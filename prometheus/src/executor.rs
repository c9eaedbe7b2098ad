use crate::{
    response::{
        matrix_to_samples,
        vector_to_samples,
    },
    template::render_query,
    QueryBackend,
    QueryError,
    QueryResult,
    QueryWindow,
    Sample,
};
use ingester_config::MetricConfig;
use std::time::Duration;

/// Runs one metric query for one API proxy and flattens the result into samples.
pub struct QueryExecutor<B> {
    backend: B,
    timeout: Duration,
}

impl<B: QueryBackend> QueryExecutor<B> {
    pub fn new(backend: B, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Instant windows only accept vector results, range windows only matrix results.
    ///
    /// Prometheus evaluates a range query up to and including its end, so range points at or past `range.end` are
    /// dropped to keep batches half-open. A zero-length range keeps its single point.
    pub async fn execute(
        &self,
        metric: &MetricConfig,
        api_proxy: &str,
        window: QueryWindow,
    ) -> Result<Vec<Sample>, QueryError> {
        let query = render_query(&metric.query, api_proxy)?;
        trace!(api_proxy, metric = %metric.name, %query, mode = window.kind(), "Executing query");

        let call = async {
            match window {
                QueryWindow::Instant(at) => self.backend.instant_query(&query, at).await,
                QueryWindow::Range(range) => self.backend.range_query(&query, range).await,
            }
        };
        let response = tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| QueryError::Timeout { timeout: self.timeout })??;

        if !response.warnings.is_empty() {
            warn!(api_proxy, metric = %metric.name, warnings = ?response.warnings, "Prometheus returned warnings");
        }

        match (window, &response.result) {
            (QueryWindow::Instant(_), QueryResult::Vector(vector)) => vector_to_samples(&metric.name, vector),
            (QueryWindow::Range(range), QueryResult::Matrix(matrix)) => {
                let mut samples = matrix_to_samples(&metric.name, matrix)?;
                if range.start < range.end {
                    samples.retain(|sample| sample.timestamp < range.end);
                }
                Ok(samples)
            }
            (window, other) => Err(QueryError::UnsupportedResultShape {
                mode: window.kind(),
                expected: match window {
                    QueryWindow::Instant(_) => "vector",
                    QueryWindow::Range(_) => "matrix",
                },
                actual: other.kind().to_string(),
            }),
        }
    }
}
