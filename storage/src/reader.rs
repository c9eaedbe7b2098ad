use crate::{
    schema,
    StorageError,
};
use arrow_array::{
    cast::AsArray,
    types::{
        Float64Type,
        TimestampMillisecondType,
    },
    Array,
    ArrayRef,
    RecordBatch,
};
use chrono::{
    DateTime,
    Utc,
};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::{
    fs::File,
    path::Path,
};

/// One row of a stored unit.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    pub timestamp: DateTime<Utc>,
    pub metric_name: String,
    pub value: f64,
    pub api_proxy: String,
    pub labels: Vec<(String, String)>,
    pub date: String,
}

/// Reads every row of a unit written by [`crate::ParquetSink`], in file order.
pub fn read_unit(path: &Path) -> Result<Vec<StoredRow>, StorageError> {
    let file = File::open(path).map_err(|source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    let mut rows = Vec::new();
    for batch in reader {
        decode_batch(path, &batch?, &mut rows)?;
    }
    Ok(rows)
}

fn layout(path: &Path, reason: String) -> StorageError {
    StorageError::Layout {
        path: path.to_path_buf(),
        reason,
    }
}

fn mismatch(path: &Path, name: &str) -> StorageError {
    layout(path, format!("column '{name}' has an unexpected type"))
}

fn column<'b>(path: &Path, batch: &'b RecordBatch, name: &str) -> Result<&'b ArrayRef, StorageError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| layout(path, format!("missing column '{name}'")))
}

fn decode_batch(path: &Path, batch: &RecordBatch, rows: &mut Vec<StoredRow>) -> Result<(), StorageError> {
    let timestamps = column(path, batch, schema::TIMESTAMP)?
        .as_primitive_opt::<TimestampMillisecondType>()
        .ok_or_else(|| mismatch(path, schema::TIMESTAMP))?;
    let names = column(path, batch, schema::METRIC_NAME)?
        .as_string_opt::<i32>()
        .ok_or_else(|| mismatch(path, schema::METRIC_NAME))?;
    let values = column(path, batch, schema::VALUE)?
        .as_primitive_opt::<Float64Type>()
        .ok_or_else(|| mismatch(path, schema::VALUE))?;
    let api_proxies = column(path, batch, schema::API_PROXY)?
        .as_string_opt::<i32>()
        .ok_or_else(|| mismatch(path, schema::API_PROXY))?;
    let labels = column(path, batch, schema::LABELS)?
        .as_list_opt::<i32>()
        .ok_or_else(|| mismatch(path, schema::LABELS))?;
    let dates = column(path, batch, schema::DATE)?
        .as_string_opt::<i32>()
        .ok_or_else(|| mismatch(path, schema::DATE))?;

    for row in 0..batch.num_rows() {
        let millis = timestamps.value(row);
        let timestamp =
            DateTime::from_timestamp_millis(millis).ok_or_else(|| layout(path, format!("timestamp {millis} out of range")))?;

        let entries = labels.value(row);
        let entries = entries.as_struct_opt().ok_or_else(|| mismatch(path, schema::LABELS))?;
        let keys = entries
            .column_by_name(schema::LABEL_KEY)
            .and_then(|c| c.as_string_opt::<i32>())
            .ok_or_else(|| mismatch(path, schema::LABELS))?;
        let label_values = entries
            .column_by_name(schema::LABEL_VALUE)
            .and_then(|c| c.as_string_opt::<i32>())
            .ok_or_else(|| mismatch(path, schema::LABELS))?;
        let row_labels = (0..entries.len())
            .map(|i| (keys.value(i).to_string(), label_values.value(i).to_string()))
            .collect();

        rows.push(StoredRow {
            timestamp,
            metric_name: names.value(row).to_string(),
            value: values.value(row),
            api_proxy: api_proxies.value(row).to_string(),
            labels: row_labels,
            date: dates.value(row).to_string(),
        });
    }
    Ok(())
}
