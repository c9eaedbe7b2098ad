use serde::{
    Deserialize,
    Serialize,
};
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_RANGE_STEP: Duration = Duration::from_secs(60 * 60);

#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PrometheusConfig {
    #[serde(default)]
    pub url: String,

    /// Per request timeout.
    #[serde(default = "default_timeout", with = "crate::duration")]
    pub timeout: Duration,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default)]
    pub metrics: Vec<MetricConfig>,

    #[serde(default)]
    pub use_range_query: bool,

    #[serde(default = "default_range_step", with = "crate::duration")]
    pub range_step: Duration,
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

fn default_range_step() -> Duration {
    DEFAULT_RANGE_STEP
}

impl PrometheusConfig {
    /// Basic auth is only used when both parts are present and non-empty.
    pub fn basic_auth(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(password)) if !user.is_empty() && !password.is_empty() => Some((user, password)),
            _ => None,
        }
    }
}

// Hand written so the password never ends up in logs.
impl std::fmt::Debug for PrometheusConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusConfig")
            .field("url", &self.url)
            .field("timeout", &self.timeout)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("metrics", &self.metrics)
            .field("use_range_query", &self.use_range_query)
            .field("range_step", &self.range_step)
            .finish()
    }
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout: DEFAULT_TIMEOUT,
            username: None,
            password: None,
            metrics: Vec::new(),
            use_range_query: false,
            range_step: DEFAULT_RANGE_STEP,
        }
    }
}

/// One PromQL query collected for every API proxy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetricConfig {
    pub name: String,

    /// PromQL with a single `%s` placeholder for the API proxy name.
    pub query: String,

    /// Labels of interest. Informational only, every label on a result series is kept.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

impl MetricConfig {
    pub fn new(name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            query: query.into(),
            labels: Vec::new(),
        }
    }
}
