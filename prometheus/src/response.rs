//! Prometheus HTTP API envelope and the result shapes it can carry.

use crate::{
    QueryError,
    Sample,
};
use chrono::{
    DateTime,
    Utc,
};
use serde::Deserialize;
use std::collections::BTreeMap;

pub type LabelSet = BTreeMap<String, String>;

/// `{"status": ..., "data": {...}, "warnings": [...]}` as returned by `/api/v1/query` and `/api/v1/query_range`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ApiResponse {
    pub status: String,
    #[serde(default)]
    pub data: Option<ResultData>,
    #[serde(default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ResultData {
    pub result_type: String,
    #[serde(default)]
    pub result: serde_json::Value,
}

impl ApiResponse {
    pub(crate) fn into_query_response(self) -> Result<QueryResponse, QueryError> {
        if self.status != "success" {
            return Err(QueryError::Rejected {
                error_type: self.error_type.unwrap_or_else(|| self.status.clone()),
                message: self.error.unwrap_or_default(),
            });
        }
        let data = self
            .data
            .ok_or_else(|| QueryError::Decode("successful response without data".to_string()))?;
        Ok(QueryResponse {
            result: QueryResult::decode(&data.result_type, data.result)?,
            warnings: self.warnings,
        })
    }
}

/// A decoded result together with the warnings Prometheus attached to it.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResponse {
    pub result: QueryResult,
    pub warnings: Vec<String>,
}

/// The result shapes a query can produce. Anything besides vectors, matrices and scalars is kept only by name.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Vector(Vec<VectorSample>),
    Matrix(Vec<MatrixSeries>),
    Scalar(SamplePair),
    Unsupported(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VectorSample {
    #[serde(default)]
    pub metric: LabelSet,
    pub value: SamplePair,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MatrixSeries {
    #[serde(default)]
    pub metric: LabelSet,
    #[serde(default)]
    pub values: Vec<SamplePair>,
}

/// `[<unix seconds as float>, "<value as string>"]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SamplePair(pub f64, pub String);

impl SamplePair {
    pub fn timestamp(&self) -> Result<DateTime<Utc>, QueryError> {
        let millis = (self.0 * 1000.0).round();
        if !millis.is_finite() {
            return Err(QueryError::Decode(format!("invalid timestamp {}", self.0)));
        }
        DateTime::from_timestamp_millis(millis as i64)
            .ok_or_else(|| QueryError::Decode(format!("timestamp {} out of range", self.0)))
    }

    /// Prometheus renders values as strings, including `NaN`, `+Inf` and `-Inf`.
    pub fn value(&self) -> Result<f64, QueryError> {
        self.1
            .parse()
            .map_err(|_| QueryError::Decode(format!("invalid sample value '{}'", self.1)))
    }

    fn to_sample(&self, metric_name: &str, labels: &LabelSet) -> Result<Sample, QueryError> {
        Ok(Sample {
            metric_name: metric_name.to_string(),
            timestamp: self.timestamp()?,
            value: self.value()?,
            labels: labels.clone(),
        })
    }
}

impl QueryResult {
    pub fn decode(result_type: &str, result: serde_json::Value) -> Result<Self, QueryError> {
        let decode_err = |e: serde_json::Error| QueryError::Decode(format!("{result_type} result: {e}"));
        Ok(match result_type {
            "vector" => QueryResult::Vector(serde_json::from_value(result).map_err(decode_err)?),
            "matrix" => QueryResult::Matrix(serde_json::from_value(result).map_err(decode_err)?),
            "scalar" => QueryResult::Scalar(serde_json::from_value(result).map_err(decode_err)?),
            other => QueryResult::Unsupported(other.to_string()),
        })
    }

    pub fn kind(&self) -> &str {
        match self {
            QueryResult::Vector(_) => "vector",
            QueryResult::Matrix(_) => "matrix",
            QueryResult::Scalar(_) => "scalar",
            QueryResult::Unsupported(kind) => kind.as_str(),
        }
    }
}

/// One sample per point of the vector.
pub fn vector_to_samples(metric_name: &str, vector: &[VectorSample]) -> Result<Vec<Sample>, QueryError> {
    vector
        .iter()
        .map(|sample| sample.value.to_sample(metric_name, &sample.metric))
        .collect()
}

/// One sample per point of every series, keeping the order of each series.
pub fn matrix_to_samples(metric_name: &str, matrix: &[MatrixSeries]) -> Result<Vec<Sample>, QueryError> {
    let mut samples = Vec::with_capacity(matrix.iter().map(|series| series.values.len()).sum());
    for series in matrix {
        for point in &series.values {
            samples.push(point.to_sample(metric_name, &series.metric)?);
        }
    }
    Ok(samples)
}
