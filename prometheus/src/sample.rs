use chrono::{
    DateTime,
    Utc,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    collections::BTreeMap,
    time::Duration,
};

/// A single collected observation.
///
/// Samples do not know which API proxy or batch they belong to; that association is carried by the output key they
/// are stored under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub metric_name: String,
    /// Millisecond resolution, UTC.
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    /// Every label of the series the point came from, verbatim.
    pub labels: BTreeMap<String, String>,
}

impl Sample {
    pub fn new(metric_name: impl Into<String>, timestamp: DateTime<Utc>, value: f64) -> Self {
        Self {
            metric_name: metric_name.into(),
            timestamp,
            value,
            labels: BTreeMap::new(),
        }
    }

    pub fn with_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(name.into(), value.into());
        self
    }
}

/// Half open `[start, end)` interval sampled every `step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub step: Duration,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, step: Duration) -> Self {
        Self { start, end, step }
    }

    pub fn span(&self) -> chrono::TimeDelta {
        self.end - self.start
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// Where a query is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryWindow {
    Instant(DateTime<Utc>),
    Range(TimeRange),
}

impl QueryWindow {
    pub fn kind(&self) -> &'static str {
        match self {
            QueryWindow::Instant(_) => "instant",
            QueryWindow::Range(_) => "range",
        }
    }
}
