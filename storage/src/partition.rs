//! Hive style partition layout: `year=YYYY/month=MM/day=DD/app=<api proxy>/<file>`.

use chrono::{
    DateTime,
    NaiveDate,
    Utc,
};
use ingester_prometheus::TimeRange;
use std::path::{
    Path,
    PathBuf,
};

pub const INSTANT_FILE_NAME: &str = "metrics.parquet";

/// Identifies one output unit. The API proxy and the partition date are explicit so nothing has to be parsed back out
/// of a formatted path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputKey {
    pub api_proxy: String,
    pub window: UnitWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitWindow {
    /// Instant collection, partitioned by the day it was taken.
    Instant { collected_at: DateTime<Utc> },
    /// One batch of a range collection, partitioned by the day the batch starts.
    Batch { start: DateTime<Utc>, end: DateTime<Utc> },
}

impl OutputKey {
    pub fn instant(api_proxy: impl Into<String>, collected_at: DateTime<Utc>) -> Self {
        Self {
            api_proxy: api_proxy.into(),
            window: UnitWindow::Instant { collected_at },
        }
    }

    pub fn batch(api_proxy: impl Into<String>, range: &TimeRange) -> Self {
        Self {
            api_proxy: api_proxy.into(),
            window: UnitWindow::Batch {
                start: range.start,
                end: range.end,
            },
        }
    }

    pub fn partition_date(&self) -> NaiveDate {
        match self.window {
            UnitWindow::Instant { collected_at } => collected_at.date_naive(),
            UnitWindow::Batch { start, .. } => start.date_naive(),
        }
    }

    /// Value of the `date` column, `YYYY-MM-DD`.
    pub fn date_label(&self) -> String {
        self.partition_date().format("%Y-%m-%d").to_string()
    }

    pub fn file_name(&self) -> String {
        match self.window {
            UnitWindow::Instant { .. } => INSTANT_FILE_NAME.to_string(),
            UnitWindow::Batch { start, end } => {
                format!("metrics_{}_{}.parquet", start.format("%H%M%S"), end.format("%H%M%S"))
            }
        }
    }

    pub fn relative_path(&self) -> PathBuf {
        let date = self.partition_date();
        PathBuf::from(date.format("year=%Y").to_string())
            .join(date.format("month=%m").to_string())
            .join(date.format("day=%d").to_string())
            .join(format!("app={}", self.api_proxy))
            .join(self.file_name())
    }

    pub fn path_in(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(self.relative_path())
    }
}

impl std::fmt::Display for OutputKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.relative_path().display())
    }
}
