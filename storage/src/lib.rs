//! Parquet output for collected samples, one file per output unit, laid out in Hive style partitions.

#[macro_use]
extern crate tracing;

mod error;
mod partition;
mod reader;
pub mod schema;
mod sink;

pub use error::StorageError;
pub use partition::{
    OutputKey,
    UnitWindow,
    INSTANT_FILE_NAME,
};
pub use reader::{
    read_unit,
    StoredRow,
};
pub use sink::{
    MetricSink,
    ParquetSink,
    StoredUnit,
};
