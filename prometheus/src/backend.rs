use crate::{
    QueryError,
    QueryResponse,
    TimeRange,
};
use chrono::{
    DateTime,
    Utc,
};
use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
};

/// The two query operations the collector needs from a metrics backend.
pub trait QueryBackend: Send + Sync {
    /// Evaluates `query` at a single point in time.
    fn instant_query<'a>(
        &'a self,
        query: &'a str,
        at: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<QueryResponse, QueryError>> + Send + 'a>>;

    /// Evaluates `query` at every `range.step` between `range.start` and `range.end`.
    fn range_query<'a>(
        &'a self,
        query: &'a str,
        range: TimeRange,
    ) -> Pin<Box<dyn Future<Output = Result<QueryResponse, QueryError>> + Send + 'a>>;
}

impl<T: QueryBackend + ?Sized> QueryBackend for Arc<T> {
    fn instant_query<'a>(
        &'a self,
        query: &'a str,
        at: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<QueryResponse, QueryError>> + Send + 'a>> {
        (**self).instant_query(query, at)
    }

    fn range_query<'a>(
        &'a self,
        query: &'a str,
        range: TimeRange,
    ) -> Pin<Box<dyn Future<Output = Result<QueryResponse, QueryError>> + Send + 'a>> {
        (**self).range_query(query, range)
    }
}
