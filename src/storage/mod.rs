//! Table sources (Arrow/Parquet)
//!
//! Ingestion is delegated to a [`TableSource`]: the benchmark loader only
//! ever sees a single Arrow [`RecordBatch`]. Sources are read-only; the one
//! write path is [`write_parquet`], used to persist predicted trajectories.

use crate::{Error, Result};
use arrow::compute;
use arrow::record_batch::RecordBatch;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Provider of whole tables addressed by path.
pub trait TableSource {
    /// Load the table stored at `source` as a single batch.
    ///
    /// # Errors
    ///
    /// Returns error if the table cannot be found or decoded.
    fn load_table(&self, source: &Path) -> Result<RecordBatch>;
}

/// Combine multiple batches into a single batch
///
/// # Errors
///
/// Returns error if `batches` is empty or the schemas differ
pub fn combine_batches(batches: &[RecordBatch]) -> Result<RecordBatch> {
    match batches {
        [] => Err(Error::StorageError("No record batches to combine".to_string())),
        [single] => Ok(single.clone()),
        [first, ..] => compute::concat_batches(&first.schema(), batches)
            .map_err(|e| Error::StorageError(format!("Failed to combine batches: {e}"))),
    }
}

/// Reads tables from Parquet files on the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct ParquetSource {
    root: Option<PathBuf>,
}

impl ParquetSource {
    /// Source resolving paths as given.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Source resolving relative paths against `root`.
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, source: &Path) -> PathBuf {
        match &self.root {
            Some(root) if source.is_relative() => root.join(source),
            _ => source.to_path_buf(),
        }
    }
}

impl TableSource for ParquetSource {
    fn load_table(&self, source: &Path) -> Result<RecordBatch> {
        use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
        use std::fs::File;

        let path = self.resolve(source);
        let file = File::open(&path).map_err(|e| {
            Error::StorageError(format!("Failed to open Parquet file {}: {e}", path.display()))
        })?;

        let builder = ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| {
            Error::StorageError(format!("Failed to parse Parquet file {}: {e}", path.display()))
        })?;
        let schema = builder.schema().clone();

        let reader = builder.build().map_err(|e| {
            Error::StorageError(format!("Failed to create Parquet reader: {e}"))
        })?;

        let mut batches = Vec::new();
        for batch in reader {
            let batch = batch.map_err(|e| {
                Error::StorageError(format!("Failed to read record batch: {e}"))
            })?;
            batches.push(batch);
        }

        if batches.is_empty() {
            return Ok(RecordBatch::new_empty(schema));
        }

        tracing::debug!(path = %path.display(), batches = batches.len(), "loaded parquet table");
        combine_batches(&batches)
    }
}

/// In-memory tables keyed by path.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    tables: HashMap<PathBuf, RecordBatch>,
}

impl MemorySource {
    /// Create an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `batch` under `path`, replacing any previous table.
    pub fn insert(&mut self, path: impl Into<PathBuf>, batch: RecordBatch) {
        self.tables.insert(path.into(), batch);
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with_table(mut self, path: impl Into<PathBuf>, batch: RecordBatch) -> Self {
        self.insert(path, batch);
        self
    }
}

impl TableSource for MemorySource {
    fn load_table(&self, source: &Path) -> Result<RecordBatch> {
        self.tables
            .get(source)
            .cloned()
            .ok_or_else(|| Error::StorageError(format!("No table at {}", source.display())))
    }
}

/// Write `batch` to a Parquet file at `path`.
///
/// # Errors
///
/// Returns error if the file cannot be created or encoded.
pub fn write_parquet<P: AsRef<Path>>(path: P, batch: &RecordBatch) -> Result<()> {
    use parquet::arrow::ArrowWriter;
    use std::fs::File;

    let file = File::create(path.as_ref())?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}
