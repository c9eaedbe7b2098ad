#[macro_use]
extern crate tracing;

pub mod duration;
mod error;
mod prometheus_config;
mod storage_config;

use chrono::{
    DateTime,
    Utc,
};
pub use error::ConfigError;
pub use prometheus_config::{
    MetricConfig,
    PrometheusConfig,
    DEFAULT_RANGE_STEP,
    DEFAULT_TIMEOUT,
};
use serde::{
    Deserialize,
    Serialize,
};
pub use storage_config::{
    Compression,
    StorageConfig,
    DEFAULT_ROW_GROUP_SIZE,
    DEFAULT_WRITE_STOP_TIMEOUT,
};
use std::{
    collections::HashSet,
    path::Path,
    time::Duration,
};

pub const COLLECTION_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEBUG_COLLECTION_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Shortens the collection interval and raises the default log level.
    #[serde(default)]
    pub debug: bool,

    /// API proxies to collect metrics for, processed in this order.
    #[serde(default)]
    pub api_proxies: Vec<String>,

    #[serde(default)]
    pub prometheus: PrometheusConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// Global window for range collection, only settable from the command line.
    #[serde(skip)]
    pub window: Option<CollectionWindow>,
}

/// Requested `[start, end)` window for a backfill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Command line values layered on top of the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub use_range_query: bool,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl Config {
    /// Reads, parses and validates the YAML file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, Overrides::default())
    }

    pub fn load_with(path: impl AsRef<Path>, overrides: Overrides) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = serde_yml::from_str::<Self>(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.apply_overrides(overrides)?;
        config.validate()?;
        debug!(path = %path.display(), ?config, "Loaded configuration");
        Ok(config)
    }

    /// Parses a YAML document without touching the file system. Not validated.
    pub fn from_yaml_str(content: &str) -> Result<Self, serde_yml::Error> {
        serde_yml::from_str(content)
    }

    pub fn apply_overrides(&mut self, overrides: Overrides) -> Result<(), ConfigError> {
        if overrides.use_range_query {
            self.prometheus.use_range_query = true;
        }
        match (overrides.start, overrides.end) {
            (Some(start), Some(end)) => {
                if start > end {
                    return Err(ConfigError::Invalid(format!(
                        "start time {} is after end time {}",
                        start.to_rfc3339(),
                        end.to_rfc3339()
                    )));
                }
                self.prometheus.use_range_query = true;
                self.window = Some(CollectionWindow { start, end });
            }
            (None, None) => {}
            _ => {
                return Err(ConfigError::Invalid(
                    "start and end times must be provided together".to_string(),
                ))
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: &str| Err(ConfigError::Invalid(message.to_string()));

        if self.prometheus.url.trim().is_empty() {
            return invalid("prometheus.url is required");
        }
        if let Err(e) = url::Url::parse(&self.prometheus.url) {
            return Err(ConfigError::Invalid(format!(
                "prometheus.url '{}' is not a valid URL: {e}",
                self.prometheus.url
            )));
        }
        if self.storage.output_dir.as_os_str().is_empty() {
            return invalid("storage.outputDir is required");
        }
        if self.api_proxies.is_empty() {
            return invalid("at least one API proxy must be specified");
        }
        if self.api_proxies.iter().any(|proxy| proxy.trim().is_empty()) {
            return invalid("API proxy names must not be empty");
        }

        let mut names = HashSet::new();
        for metric in &self.prometheus.metrics {
            if metric.name.trim().is_empty() {
                return invalid("every metric needs a name");
            }
            if metric.query.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("metric '{}' has no query", metric.name)));
            }
            if !names.insert(metric.name.as_str()) {
                return Err(ConfigError::Invalid(format!("metric '{}' is defined twice", metric.name)));
            }
        }

        if self.prometheus.timeout.is_zero() {
            return invalid("prometheus.timeout must be greater than zero");
        }
        if self.prometheus.range_step.is_zero() {
            return invalid("prometheus.rangeStep must be greater than zero");
        }
        if self.storage.write_stop_timeout.is_zero() {
            return invalid("storage.writeStopTimeout must be greater than zero");
        }
        if self.storage.row_group_size == 0 {
            return invalid("storage.rowGroupSize must be greater than zero");
        }
        Ok(())
    }

    /// The global window, if range collection was requested and a window is known.
    pub fn range_window(&self) -> Option<CollectionWindow> {
        self.window.filter(|_| self.prometheus.use_range_query)
    }

    pub fn collection_interval(&self) -> Duration {
        if self.debug {
            DEBUG_COLLECTION_INTERVAL
        } else {
            COLLECTION_INTERVAL
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    const EXAMPLE: &str = r#"
debug: true
apiProxies:
  - ice-validator-v1
  - memento
prometheus:
  url: http://prometheus:9090
  timeout: 10s
  username: reader
  password: s3cret
  rangeStep: 5m
  metrics:
    - name: request_count
      query: sum(increase(apigee_requests_total{apiproxy="%s"}[1h])) by (apiproxy, status)
      labels: [apiproxy, status]
storage:
  outputDir: data
  compression: zstd
  rowGroupSize: 5000
  writeStopTimeout: 30s
"#;

    fn write_config(dir: &temp_dir::TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn parses_full_document() {
        let config = Config::from_yaml_str(EXAMPLE).unwrap();
        config.validate().unwrap();

        assert!(config.debug);
        assert_eq!(config.api_proxies, vec!["ice-validator-v1", "memento"]);
        assert_eq!(config.prometheus.timeout, Duration::from_secs(10));
        assert_eq!(config.prometheus.range_step, Duration::from_secs(300));
        assert_eq!(config.prometheus.basic_auth(), Some(("reader", "s3cret")));
        assert_eq!(
            config.prometheus.metrics,
            vec![MetricConfig {
                name: "request_count".to_string(),
                query: r#"sum(increase(apigee_requests_total{apiproxy="%s"}[1h])) by (apiproxy, status)"#.to_string(),
                labels: vec!["apiproxy".to_string(), "status".to_string()],
            }]
        );
        assert_eq!(config.storage.output_dir, PathBuf::from("data"));
        assert_eq!(config.storage.compression, Compression::Zstd);
        assert_eq!(config.storage.row_group_size, 5000);
        assert_eq!(config.storage.write_stop_timeout, Duration::from_secs(30));
        assert_eq!(config.collection_interval(), DEBUG_COLLECTION_INTERVAL);
    }

    #[test]
    fn shipped_example_is_valid() {
        let config = Config::from_yaml_str(include_str!("../../config.example.yaml")).unwrap();
        config.validate().unwrap();
        assert_eq!(config.prometheus.basic_auth(), None);
        assert_eq!(config.prometheus.metrics.len(), 2);
    }

    #[test]
    fn applies_defaults() {
        let config = Config::from_yaml_str(
            "apiProxies: [a]\nprometheus:\n  url: http://localhost:9090\nstorage:\n  outputDir: out\n",
        )
        .unwrap();
        config.validate().unwrap();

        assert_eq!(config.prometheus.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.prometheus.range_step, DEFAULT_RANGE_STEP);
        assert_eq!(config.storage.compression, Compression::Snappy);
        assert_eq!(config.storage.row_group_size, DEFAULT_ROW_GROUP_SIZE);
        assert_eq!(config.storage.write_stop_timeout, DEFAULT_WRITE_STOP_TIMEOUT);
        assert!(!config.prometheus.use_range_query);
        assert_eq!(config.collection_interval(), COLLECTION_INTERVAL);
    }

    #[test]
    fn unknown_compression_is_not_an_error() {
        let config = Config::from_yaml_str(
            "apiProxies: [a]\nprometheus:\n  url: http://localhost:9090\nstorage:\n  outputDir: out\n  compression: lzma\n",
        )
        .unwrap();
        assert_eq!(config.storage.compression, Compression::Snappy);
    }

    #[test]
    fn rejects_missing_required_fields() {
        let cases = [
            ("apiProxies: [a]\nstorage:\n  outputDir: out\n", "prometheus.url"),
            ("apiProxies: [a]\nprometheus:\n  url: http://p:9090\n", "storage.outputDir"),
            ("prometheus:\n  url: http://p:9090\nstorage:\n  outputDir: out\n", "API proxy"),
            (
                "apiProxies: [a]\nprometheus:\n  url: not a url\nstorage:\n  outputDir: out\n",
                "not a valid URL",
            ),
        ];
        for (yaml, expected) in cases {
            let err = Config::from_yaml_str(yaml).unwrap().validate().unwrap_err();
            assert!(
                err.to_string().contains(expected),
                "expected '{expected}' in '{err}' for {yaml:?}"
            );
        }
    }

    #[test]
    fn rejects_duplicate_metric_names() {
        let mut config = Config::from_yaml_str(EXAMPLE).unwrap();
        let duplicate = config.prometheus.metrics[0].clone();
        config.prometheus.metrics.push(duplicate);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("defined twice"));
    }

    #[test]
    fn window_override_forces_range_mode() {
        let mut config = Config::from_yaml_str(EXAMPLE).unwrap();
        assert_eq!(config.range_window(), None);

        let start = "2025-04-07T00:00:00Z".parse().unwrap();
        let end = "2025-04-08T00:00:00Z".parse().unwrap();
        config
            .apply_overrides(Overrides {
                use_range_query: false,
                start: Some(start),
                end: Some(end),
            })
            .unwrap();

        assert!(config.prometheus.use_range_query);
        assert_eq!(config.range_window(), Some(CollectionWindow { start, end }));
    }

    #[test]
    fn range_flag_without_window_keeps_instant_collection() {
        let mut config = Config::from_yaml_str(EXAMPLE).unwrap();
        config
            .apply_overrides(Overrides {
                use_range_query: true,
                ..Overrides::default()
            })
            .unwrap();
        assert!(config.prometheus.use_range_query);
        assert_eq!(config.range_window(), None);
    }

    #[test]
    fn rejects_inverted_or_partial_window() {
        let mut config = Config::from_yaml_str(EXAMPLE).unwrap();
        let early = "2025-04-07T00:00:00Z".parse().unwrap();
        let late = "2025-04-08T00:00:00Z".parse().unwrap();

        let inverted = config.apply_overrides(Overrides {
            use_range_query: false,
            start: Some(late),
            end: Some(early),
        });
        assert!(matches!(inverted, Err(ConfigError::Invalid(_))));

        let partial = config.apply_overrides(Overrides {
            use_range_query: false,
            start: Some(early),
            end: None,
        });
        assert!(matches!(partial, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn load_reports_path_on_failure() {
        let dir = temp_dir::TempDir::new().unwrap();
        let missing = dir.path().join("missing.yaml");
        assert!(matches!(Config::load(&missing), Err(ConfigError::Read { .. })));

        let broken = write_config(&dir, "apiProxies: [unterminated");
        assert!(matches!(Config::load(&broken), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn load_validates() {
        let dir = temp_dir::TempDir::new().unwrap();
        let path = write_config(&dir, EXAMPLE);
        let config = Config::load(&path).unwrap();
        assert_eq!(config.api_proxies.len(), 2);

        let invalid = write_config(&dir, "apiProxies: []\n");
        assert!(matches!(Config::load(&invalid), Err(ConfigError::Invalid(_))));
    }
}
