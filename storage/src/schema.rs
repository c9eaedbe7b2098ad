//! Column layout of a metrics unit.
//!
//! | column        | type                                   |
//! |---------------|----------------------------------------|
//! | `timestamp`   | timestamp (ms, UTC)                    |
//! | `metric_name` | utf8                                   |
//! | `value`       | float64                                |
//! | `api_proxy`   | utf8                                   |
//! | `labels`      | list of `{key: utf8, value: utf8}`     |
//! | `date`        | utf8, `YYYY-MM-DD` of the partition    |

use crate::OutputKey;
use arrow_array::{
    ArrayRef,
    Float64Array,
    ListArray,
    RecordBatch,
    StringArray,
    StructArray,
    TimestampMillisecondArray,
};
use arrow_buffer::OffsetBuffer;
use arrow_schema::{
    ArrowError,
    DataType,
    Field,
    FieldRef,
    Fields,
    Schema,
    SchemaRef,
    TimeUnit,
};
use ingester_prometheus::Sample;
use std::sync::{
    Arc,
    LazyLock,
};

pub const TIMESTAMP: &str = "timestamp";
pub const METRIC_NAME: &str = "metric_name";
pub const VALUE: &str = "value";
pub const API_PROXY: &str = "api_proxy";
pub const LABELS: &str = "labels";
pub const DATE: &str = "date";

pub const LABEL_KEY: &str = "key";
pub const LABEL_VALUE: &str = "value";

const TIMEZONE: &str = "UTC";

static SCHEMA: LazyLock<SchemaRef> = LazyLock::new(|| {
    Arc::new(Schema::new(vec![
        Field::new(TIMESTAMP, DataType::Timestamp(TimeUnit::Millisecond, Some(TIMEZONE.into())), false),
        Field::new(METRIC_NAME, DataType::Utf8, false),
        Field::new(VALUE, DataType::Float64, false),
        Field::new(API_PROXY, DataType::Utf8, false),
        Field::new(LABELS, DataType::List(label_item()), false),
        Field::new(DATE, DataType::Utf8, false),
    ]))
});

fn label_fields() -> Fields {
    Fields::from(vec![
        Field::new(LABEL_KEY, DataType::Utf8, false),
        Field::new(LABEL_VALUE, DataType::Utf8, false),
    ])
}

fn label_item() -> FieldRef {
    Arc::new(Field::new("item", DataType::Struct(label_fields()), false))
}

pub fn metrics_schema() -> SchemaRef {
    SCHEMA.clone()
}

/// Builds one record batch holding every sample of a unit. Labels keep the key order of the sample's map, so they are
/// sorted by key.
pub fn to_record_batch(samples: &[Sample], key: &OutputKey) -> Result<RecordBatch, ArrowError> {
    let rows = samples.len();

    let timestamps = TimestampMillisecondArray::from_iter_values(samples.iter().map(|s| s.timestamp.timestamp_millis()))
        .with_timezone(TIMEZONE);
    let names = StringArray::from_iter_values(samples.iter().map(|s| s.metric_name.as_str()));
    let values = Float64Array::from_iter_values(samples.iter().map(|s| s.value));
    let api_proxies = StringArray::from_iter_values(std::iter::repeat_n(key.api_proxy.as_str(), rows));
    let date = key.date_label();
    let dates = StringArray::from_iter_values(std::iter::repeat_n(date.as_str(), rows));

    let label_keys = StringArray::from_iter_values(samples.iter().flat_map(|s| s.labels.keys()));
    let label_values = StringArray::from_iter_values(samples.iter().flat_map(|s| s.labels.values()));
    let entries = StructArray::try_new(
        label_fields(),
        vec![Arc::new(label_keys) as ArrayRef, Arc::new(label_values)],
        None,
    )?;
    let offsets = OffsetBuffer::<i32>::from_lengths(samples.iter().map(|s| s.labels.len()));
    let labels = ListArray::try_new(label_item(), offsets, Arc::new(entries), None)?;

    RecordBatch::try_new(
        metrics_schema(),
        vec![
            Arc::new(timestamps),
            Arc::new(names),
            Arc::new(values),
            Arc::new(api_proxies),
            Arc::new(labels),
            Arc::new(dates),
        ],
    )
}
