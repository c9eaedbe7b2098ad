use chrono::{
    DateTime,
    Utc,
};
use clap::Parser;
use ingester_config::Overrides;
use std::path::PathBuf;

/// Collects Prometheus metrics per API proxy and stores them as date partitioned Parquet files.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the configuration file (yaml).
    #[arg(long, env = "INGESTER_CONFIG", default_value = "config.yaml")]
    pub config: PathBuf,

    /// Start of the collection window (RFC3339, e.g. 2025-04-07T00:00:00Z). Implies --range.
    #[arg(long, requires = "end", value_parser = parse_rfc3339)]
    pub start: Option<DateTime<Utc>>,

    /// End of the collection window (RFC3339, e.g. 2025-04-08T00:00:00Z).
    #[arg(long, requires = "start", value_parser = parse_rfc3339)]
    pub end: Option<DateTime<Utc>>,

    /// Use range queries instead of instant queries.
    #[arg(long)]
    pub range: bool,

    /// Run a single collection and exit instead of collecting on a schedule.
    #[arg(long)]
    pub once: bool,
}

impl Args {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            use_range_query: self.range,
            start: self.start,
            end: self.end,
        }
    }
}

fn parse_rfc3339(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|time| time.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC3339 timestamp like 2025-04-07T00:00:00Z: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["prom-parquet-ingester"]).unwrap();
        assert_eq!(args.config, PathBuf::from("config.yaml"));
        assert!(!args.range && !args.once);
        assert_eq!(args.start, None);
    }

    #[test]
    fn window_flags() {
        let args = Args::try_parse_from([
            "prom-parquet-ingester",
            "--config",
            "/etc/ingester.yaml",
            "--start",
            "2025-04-07T00:00:00Z",
            "--end",
            "2025-04-08T02:00:00+02:00",
            "--once",
        ])
        .unwrap();

        let overrides = args.overrides();
        assert_eq!(overrides.start, Some("2025-04-07T00:00:00Z".parse().unwrap()));
        assert_eq!(overrides.end, Some("2025-04-08T00:00:00Z".parse().unwrap()));
        assert!(!overrides.use_range_query);
        assert!(args.once);
    }

    #[test]
    fn start_requires_end() {
        assert!(Args::try_parse_from(["prom-parquet-ingester", "--start", "2025-04-07T00:00:00Z"]).is_err());
        assert!(Args::try_parse_from(["prom-parquet-ingester", "--end", "2025-04-07T00:00:00Z"]).is_err());
    }

    #[test]
    fn rejects_non_rfc3339_times() {
        let err = Args::try_parse_from([
            "prom-parquet-ingester",
            "--start",
            "2025-04-07",
            "--end",
            "2025-04-08T00:00:00Z",
        ])
        .unwrap_err();
        assert!(err.to_string().contains("RFC3339"), "{err}");
    }
}
