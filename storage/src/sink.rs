use crate::{
    schema,
    OutputKey,
    StorageError,
};
use ingester_config::{
    Compression,
    StorageConfig,
};
use ingester_prometheus::Sample;
use parquet::{
    arrow::ArrowWriter,
    basic::{
        Compression as Codec,
        GzipLevel,
        ZstdLevel,
    },
    file::properties::{
        EnabledStatistics,
        WriterProperties,
    },
};
use std::{
    fs::{
        self,
        File,
    },
    future::Future,
    path::{
        Path,
        PathBuf,
    },
    pin::Pin,
    time::Duration,
};

/// A written unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUnit {
    pub path: PathBuf,
    pub rows: usize,
}

/// Destination for the samples of one output unit.
///
/// Storing is atomic per key: either the complete unit is readable at its location afterwards, or the call fails and
/// nothing new is visible there. Storing the same key again replaces the previous unit.
pub trait MetricSink: Send + Sync {
    fn store<'a>(
        &'a self,
        samples: Vec<Sample>,
        key: &'a OutputKey,
    ) -> Pin<Box<dyn Future<Output = Result<StoredUnit, StorageError>> + Send + 'a>>;
}

impl<T: MetricSink + ?Sized> MetricSink for std::sync::Arc<T> {
    fn store<'a>(
        &'a self,
        samples: Vec<Sample>,
        key: &'a OutputKey,
    ) -> Pin<Box<dyn Future<Output = Result<StoredUnit, StorageError>> + Send + 'a>> {
        (**self).store(samples, key)
    }
}

/// Writes each unit as one Parquet file below `output_dir`.
///
/// The file is staged as a hidden `.<name>.inprogress` sibling and renamed into place once the footer is written, so
/// readers scanning `**/*.parquet` never observe a partial file.
pub struct ParquetSink {
    output_dir: PathBuf,
    props: WriterProperties,
    write_stop_timeout: Duration,
}

impl ParquetSink {
    pub fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        fs::create_dir_all(&config.output_dir).map_err(|source| StorageError::CreateDir {
            path: config.output_dir.clone(),
            source,
        })?;
        debug!(output_dir = ?config.output_dir, compression = %config.compression, row_group_size = config.row_group_size, "Parquet sink ready");

        Ok(Self {
            output_dir: config.output_dir.clone(),
            props: writer_properties(config),
            write_stop_timeout: config.write_stop_timeout,
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    async fn write_unit(&self, samples: Vec<Sample>, key: &OutputKey) -> Result<StoredUnit, StorageError> {
        let path = key.path_in(&self.output_dir);
        let staging = staging_path(&path);
        let batch = schema::to_record_batch(&samples, key)?;
        drop(samples);
        let rows = batch.num_rows();

        let props = self.props.clone();
        let staging_for_write = staging.clone();
        let written = tokio::task::spawn_blocking(move || -> Result<ArrowWriter<File>, StorageError> {
            if let Some(dir) = staging_for_write.parent() {
                fs::create_dir_all(dir).map_err(|source| StorageError::CreateDir {
                    path: dir.to_path_buf(),
                    source,
                })?;
            }
            let file = File::create(&staging_for_write).map_err(|source| StorageError::Io {
                path: staging_for_write.clone(),
                source,
            })?;
            let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
            writer.write(&batch)?;
            Ok(writer)
        })
        .await;
        let writer = match written {
            Ok(Ok(writer)) => writer,
            Ok(Err(err)) => return Err(discard(&staging, err)),
            Err(err) => return Err(discard(&staging, err.into())),
        };

        let staging_for_close = staging.clone();
        let finalize = tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
            // Flushes the open row group and writes the footer.
            let file = writer.into_inner()?;
            file.sync_all().map_err(|source| StorageError::Io {
                path: staging_for_close,
                source,
            })
        });
        match tokio::time::timeout(self.write_stop_timeout, finalize).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(err))) => return Err(discard(&staging, err)),
            Ok(Err(err)) => return Err(discard(&staging, err.into())),
            Err(_) => {
                // The blocking task keeps running detached; the staged file stays hidden and is removed here.
                return Err(discard(
                    &staging,
                    StorageError::FinalizationTimeout {
                        path: path.clone(),
                        timeout: self.write_stop_timeout,
                    },
                ));
            }
        }

        fs::rename(&staging, &path).map_err(|source| {
            discard(
                &staging,
                StorageError::Io {
                    path: path.clone(),
                    source,
                },
            )
        })?;

        Ok(StoredUnit { path, rows })
    }
}

impl MetricSink for ParquetSink {
    fn store<'a>(
        &'a self,
        samples: Vec<Sample>,
        key: &'a OutputKey,
    ) -> Pin<Box<dyn Future<Output = Result<StoredUnit, StorageError>> + Send + 'a>> {
        Box::pin(self.write_unit(samples, key))
    }
}

fn writer_properties(config: &StorageConfig) -> WriterProperties {
    WriterProperties::builder()
        .set_compression(codec(config.compression))
        .set_max_row_group_size(config.row_group_size.max(1))
        .set_dictionary_enabled(true)
        .set_statistics_enabled(EnabledStatistics::Page)
        .build()
}

fn codec(compression: Compression) -> Codec {
    match compression {
        Compression::Snappy => Codec::SNAPPY,
        Compression::Gzip => Codec::GZIP(GzipLevel::default()),
        Compression::Lz4 => Codec::LZ4_RAW,
        Compression::Zstd => Codec::ZSTD(ZstdLevel::default()),
        Compression::None => Codec::UNCOMPRESSED,
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    path.with_file_name(format!(".{name}.inprogress"))
}

/// Best effort removal of a staged file after a failed write. Returns the original error.
fn discard(staging: &Path, err: StorageError) -> StorageError {
    match fs::remove_file(staging) {
        Ok(()) => debug!(path = ?staging, "Removed staged file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = ?staging, error = %e, "Failed to remove staged file"),
    }
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read_unit;
    use arrow_schema::SchemaRef;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use pretty_assertions::assert_eq;
    use strum::IntoEnumIterator;
    use temp_dir::TempDir;

    fn config(dir: &TempDir) -> StorageConfig {
        StorageConfig {
            output_dir: dir.path().join("data"),
            ..StorageConfig::default()
        }
    }

    fn samples() -> Vec<Sample> {
        let at = "2025-04-08T12:00:00Z".parse().unwrap();
        vec![
            Sample::new("request_count", at, 12.0).with_label("app", "ice-validator-v1"),
            Sample::new("request_count", at, 5.0)
                .with_label("app", "ice-validator-v1")
                .with_label("status", "500"),
        ]
    }

    fn key() -> OutputKey {
        OutputKey::instant("ice-validator-v1", "2025-04-08T12:00:00Z".parse().unwrap())
    }

    fn files_under(dir: &Path) -> Vec<PathBuf> {
        let mut found = Vec::new();
        let mut pending = vec![dir.to_path_buf()];
        while let Some(next) = pending.pop() {
            for entry in fs::read_dir(next).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    pending.push(path);
                } else {
                    found.push(path);
                }
            }
        }
        found.sort();
        found
    }

    #[test]
    fn new_creates_output_dir() {
        let dir = TempDir::new().unwrap();
        let sink = ParquetSink::new(&config(&dir)).unwrap();
        assert!(sink.output_dir().is_dir());
    }

    #[tokio::test]
    async fn stores_unit_at_partition_path() {
        let dir = TempDir::new().unwrap();
        let sink = ParquetSink::new(&config(&dir)).unwrap();

        let stored = sink.store(samples(), &key()).await.unwrap();

        let expected = dir
            .path()
            .join("data/year=2025/month=04/day=08/app=ice-validator-v1/metrics.parquet");
        assert_eq!(stored, StoredUnit { path: expected.clone(), rows: 2 });
        assert_eq!(files_under(&dir.path().join("data")), vec![expected.clone()]);

        let rows = read_unit(&expected).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].metric_name, "request_count");
        assert_eq!(rows[0].value, 12.0);
        assert_eq!(rows[0].api_proxy, "ice-validator-v1");
        assert_eq!(rows[0].date, "2025-04-08");
        assert_eq!(rows[0].timestamp.to_rfc3339(), "2025-04-08T12:00:00+00:00");
        assert_eq!(
            rows[1].labels,
            vec![
                ("app".to_string(), "ice-validator-v1".to_string()),
                ("status".to_string(), "500".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn empty_unit_is_readable() {
        let dir = TempDir::new().unwrap();
        let sink = ParquetSink::new(&config(&dir)).unwrap();

        let stored = sink.store(Vec::new(), &key()).await.unwrap();

        assert_eq!(stored.rows, 0);
        assert!(read_unit(&stored.path).unwrap().is_empty());
    }

    #[tokio::test]
    async fn storing_again_replaces_the_unit() {
        let dir = TempDir::new().unwrap();
        let sink = ParquetSink::new(&config(&dir)).unwrap();

        sink.store(samples(), &key()).await.unwrap();
        let at = "2025-04-08T12:00:00Z".parse().unwrap();
        let stored = sink
            .store(vec![Sample::new("request_count", at, 99.0)], &key())
            .await
            .unwrap();

        let rows = read_unit(&stored.path).unwrap();
        assert_eq!(rows.iter().map(|r| r.value).collect::<Vec<_>>(), vec![99.0]);
        assert_eq!(files_under(&dir.path().join("data")).len(), 1);
    }

    fn stored_layout(path: &Path) -> (SchemaRef, i64) {
        let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path).unwrap()).unwrap();
        (builder.schema().clone(), builder.metadata().file_metadata().num_rows())
    }

    #[tokio::test]
    async fn storing_identical_samples_twice_yields_the_same_unit() {
        let dir = TempDir::new().unwrap();
        let sink = ParquetSink::new(&config(&dir)).unwrap();

        let first = sink.store(samples(), &key()).await.unwrap();
        let first_rows = read_unit(&first.path).unwrap();
        let first_layout = stored_layout(&first.path);

        let second = sink.store(samples(), &key()).await.unwrap();
        let second_rows = read_unit(&second.path).unwrap();
        let second_layout = stored_layout(&second.path);

        assert_eq!(first, second);
        assert_eq!(first_rows, second_rows);
        assert_eq!(first_layout, second_layout);
        assert_eq!(second_layout.1, 2);
        assert_eq!(files_under(&dir.path().join("data")), vec![second.path]);
    }

    #[tokio::test]
    async fn finalization_timeout_leaves_nothing_behind() {
        let dir = TempDir::new().unwrap();
        let sink = ParquetSink::new(&StorageConfig {
            compression: Compression::Gzip,
            row_group_size: 1 << 20,
            write_stop_timeout: Duration::from_nanos(1),
            ..config(&dir)
        })
        .unwrap();
        let start: chrono::DateTime<chrono::Utc> = "2025-04-08T00:00:00Z".parse().unwrap();
        let samples = (0..300_000i64)
            .map(|i| {
                Sample::new("request_count", start + chrono::Duration::milliseconds(i), i as f64)
                    .with_label("app", "ice-validator-v1")
                    .with_label("status", (200 + i % 5).to_string())
            })
            .collect();

        let err = sink.store(samples, &key()).await.unwrap_err();

        assert!(matches!(err, StorageError::FinalizationTimeout { .. }), "{err}");
        assert!(!key().path_in(sink.output_dir()).exists());
        assert!(files_under(&dir.path().join("data")).is_empty());
    }

    #[tokio::test]
    async fn every_compression_roundtrips() {
        for compression in Compression::iter() {
            let dir = TempDir::new().unwrap();
            let sink = ParquetSink::new(&StorageConfig {
                compression,
                ..config(&dir)
            })
            .unwrap();

            let stored = sink.store(samples(), &key()).await.unwrap();
            assert_eq!(read_unit(&stored.path).unwrap().len(), 2, "{compression}");
        }
    }

    #[tokio::test]
    async fn small_row_groups_keep_every_row() {
        let dir = TempDir::new().unwrap();
        let sink = ParquetSink::new(&StorageConfig {
            row_group_size: 1,
            ..config(&dir)
        })
        .unwrap();

        let stored = sink.store(samples(), &key()).await.unwrap();
        let rows = read_unit(&stored.path).unwrap();
        assert_eq!(rows.iter().map(|r| r.value).collect::<Vec<_>>(), vec![12.0, 5.0]);
    }

    #[tokio::test]
    async fn failed_write_leaves_nothing_behind() {
        let dir = TempDir::new().unwrap();
        let sink = ParquetSink::new(&config(&dir)).unwrap();
        // A regular file where the partition directory should go.
        let blocker = dir.path().join("data/year=2025");
        fs::write(&blocker, b"").unwrap();

        let err = sink.store(samples(), &key()).await.unwrap_err();

        assert!(matches!(err, StorageError::CreateDir { .. }), "{err}");
        assert_eq!(files_under(&dir.path().join("data")), vec![blocker]);
    }

    #[test]
    fn staging_file_is_hidden_sibling() {
        assert_eq!(
            staging_path(Path::new("/out/app=a/metrics.parquet")),
            PathBuf::from("/out/app=a/.metrics.parquet.inprogress")
        );
    }
}
