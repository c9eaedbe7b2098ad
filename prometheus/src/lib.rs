//! # Prometheus collection
//!
//! Everything needed to turn configured PromQL templates into flat [`Sample`] sequences:
//!
//! - **[`batch`]**: splits a long window into bounded sub-windows
//! - **[`render_query`]**: substitutes an API proxy into a query template
//! - **[`QueryBackend`]**: instant and range queries, implemented over HTTP by [`PrometheusClient`]
//! - **[`QueryExecutor`]**: one query, normalized from the backend's vector or matrix result
//! - **[`TargetCollector`]**: all metrics of one API proxy, queried concurrently, all or nothing

#[macro_use]
extern crate tracing;

mod backend;
pub mod batch;
mod client;
mod error;
mod executor;
mod response;
mod sample;
mod target_collector;
mod template;

pub use backend::QueryBackend;
pub use batch::{
    plan,
    BatchPlan,
    DEFAULT_BATCH_SPAN,
};
pub use client::PrometheusClient;
pub use error::{
    AggregateError,
    MetricFailure,
    QueryError,
};
pub use executor::QueryExecutor;
pub use response::{
    matrix_to_samples,
    vector_to_samples,
    LabelSet,
    MatrixSeries,
    QueryResponse,
    QueryResult,
    SamplePair,
    VectorSample,
};
pub use sample::{
    QueryWindow,
    Sample,
    TimeRange,
};
pub use target_collector::TargetCollector;
pub use template::render_query;
