use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum QueryError {
    #[error("Malformed query template '{template}': {reason}")]
    MalformedQuery { template: String, reason: String },
    #[error("Prometheus at {url} is unreachable: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Query did not complete within {timeout:?}")]
    Timeout { timeout: Duration },
    #[error("Prometheus rejected the query ({error_type}): {message}")]
    Rejected { error_type: String, message: String },
    #[error("Unsupported result type '{actual}' for {mode} query, expected '{expected}'")]
    UnsupportedResultShape {
        mode: &'static str,
        expected: &'static str,
        actual: String,
    },
    #[error("Failed to decode Prometheus response: {0}")]
    Decode(String),
    #[error("Failed to set up Prometheus client: {0}")]
    Setup(String),
}

/// A failed query for one metric.
#[derive(thiserror::Error, Debug)]
#[error("metric '{metric}': {error}")]
pub struct MetricFailure {
    pub metric: String,
    #[source]
    pub error: QueryError,
}

/// Every metric failure of a single target collection. Results of the metrics that did succeed are discarded.
#[derive(thiserror::Error, Debug)]
#[error("{} of {total} metrics failed for '{target}': {}", .failures.len(), render_failures(.failures))]
pub struct AggregateError {
    pub target: String,
    pub total: usize,
    pub failures: Vec<MetricFailure>,
}

impl AggregateError {
    pub fn failed_metrics(&self) -> impl Iterator<Item = &str> {
        self.failures.iter().map(|failure| failure.metric.as_str())
    }
}

fn render_failures(failures: &[MetricFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
