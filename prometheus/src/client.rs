use crate::{
    response::ApiResponse,
    QueryBackend,
    QueryError,
    QueryResponse,
    TimeRange,
};
use chrono::{
    DateTime,
    SecondsFormat,
    Utc,
};
use ingester_config::PrometheusConfig;
use reqwest::Client as HttpClient;
use std::{
    future::Future,
    pin::Pin,
    time::Duration,
};

const MAX_ERROR_BODY: usize = 512;

/// Minimal client for the Prometheus HTTP query API.
#[derive(Clone)]
pub struct PrometheusClient {
    http_client: HttpClient,
    base_url: String,
    basic_auth: Option<(String, String)>,
    timeout: Duration,
}

impl PrometheusClient {
    pub fn new(config: &PrometheusConfig) -> Result<Self, QueryError> {
        let url = url::Url::parse(&config.url)
            .map_err(|e| QueryError::Setup(format!("invalid URL '{}': {e}", config.url)))?;

        let http_client = HttpClient::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| QueryError::Setup(e.to_string()))?;

        let basic_auth = config
            .basic_auth()
            .map(|(user, password)| (user.to_string(), password.to_string()));

        Ok(Self {
            http_client,
            base_url: url.as_str().trim_end_matches('/').to_string(),
            basic_auth,
            timeout: config.timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(&self, endpoint: &str, params: &[(&str, String)]) -> Result<QueryResponse, QueryError> {
        let url = format!("{}/api/v1/{endpoint}", self.base_url);
        let mut request = self.http_client.get(&url).query(params);
        if let Some((user, password)) = &self.basic_auth {
            request = request.basic_auth(user, Some(password));
        }

        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        let body = response.bytes().await.map_err(|e| self.transport_error(e))?;

        match serde_json::from_slice::<ApiResponse>(&body) {
            Ok(api_response) => api_response.into_query_response(),
            Err(_) if !status.is_success() => {
                let text = String::from_utf8_lossy(&body);
                Err(QueryError::Rejected {
                    error_type: format!("http {}", status.as_u16()),
                    message: text.chars().take(MAX_ERROR_BODY).collect(),
                })
            }
            Err(e) => Err(QueryError::Decode(e.to_string())),
        }
    }

    fn transport_error(&self, error: reqwest::Error) -> QueryError {
        if error.is_timeout() {
            QueryError::Timeout { timeout: self.timeout }
        } else {
            QueryError::Unreachable {
                url: self.base_url.clone(),
                source: error,
            }
        }
    }
}

fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl QueryBackend for PrometheusClient {
    fn instant_query<'a>(
        &'a self,
        query: &'a str,
        at: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<QueryResponse, QueryError>> + Send + 'a>> {
        Box::pin(async move {
            self.get("query", &[("query", query.to_string()), ("time", format_time(at))])
                .await
        })
    }

    fn range_query<'a>(
        &'a self,
        query: &'a str,
        range: TimeRange,
    ) -> Pin<Box<dyn Future<Output = Result<QueryResponse, QueryError>> + Send + 'a>> {
        Box::pin(async move {
            self.get(
                "query_range",
                &[
                    ("query", query.to_string()),
                    ("start", format_time(range.start)),
                    ("end", format_time(range.end)),
                    ("step", range.step.as_secs_f64().to_string()),
                ],
            )
            .await
        })
    }
}
