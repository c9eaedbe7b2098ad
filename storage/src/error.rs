use std::{
    path::PathBuf,
    time::Duration,
};

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to build record batch: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),
    #[error("Failed to write parquet: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error("Writer task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("Finalizing {path:?} did not complete within {timeout:?}, the unit was discarded")]
    FinalizationTimeout { path: PathBuf, timeout: Duration },
    #[error("Unexpected layout in {path:?}: {reason}")]
    Layout { path: PathBuf, reason: String },
}
