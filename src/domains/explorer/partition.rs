//! Partition loading.
//!
//! Cell metrics are stored as Hive-style partitions:
//! `<root>/country=<ISO2>/year=<YYYY>/h3_resolution=<N>/*.parquet`.
//! A partition is read into a [`Frame`] of JSON-safe records. Files are
//! concatenated in file-name order; a missing partition directory yields
//! an empty frame.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, RecordBatch};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type, Int64Type, UInt64Type};
use arrow::error::ArrowError;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use async_trait::async_trait;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument};

use super::error::ExplorerError;
use crate::core::json::{Record, finite_number};
use crate::core::security::validate_data_path;

pub const MIN_EXPLORER_RESOLUTION: u8 = 6;
pub const MAX_EXPLORER_RESOLUTION: u8 = 9;

/// One (country, year, resolution) partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionKey {
    pub country: String,
    pub year: i32,
    pub h3_res: u8,
}

impl PartitionKey {
    /// Validate and normalize a selection. Country codes are upper-cased.
    pub fn new(country: &str, year: i32, h3_res: u8) -> Result<Self, ExplorerError> {
        let country = country.trim().to_ascii_uppercase();
        if country.len() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ExplorerError::invalid_selection(format!(
                "country must be a two-letter ISO code, got '{}'",
                country
            )));
        }
        if !(2000..=2100).contains(&year) {
            return Err(ExplorerError::invalid_selection(format!(
                "year must be between 2000 and 2100, got {}",
                year
            )));
        }
        if !(MIN_EXPLORER_RESOLUTION..=MAX_EXPLORER_RESOLUTION).contains(&h3_res) {
            return Err(ExplorerError::invalid_selection(format!(
                "h3_res must be between {} and {}",
                MIN_EXPLORER_RESOLUTION, MAX_EXPLORER_RESOLUTION
            )));
        }
        Ok(Self {
            country,
            year,
            h3_res,
        })
    }

    pub fn directory(&self, root: &Path) -> PathBuf {
        root.join(format!("country={}", self.country))
            .join(format!("year={}", self.year))
            .join(format!("h3_resolution={}", self.h3_res))
    }
}

/// Rows of one partition, with the union of their columns in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    pub columns: Vec<String>,
    pub rows: Vec<Record>,
}

impl Frame {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Append rows, extending the column list with unseen names.
    pub fn extend(&mut self, columns: &[String], rows: Vec<Record>) {
        for column in columns {
            if !self.has_column(column) {
                self.columns.push(column.clone());
            }
        }
        self.rows.extend(rows);
    }

    /// Add a constant column to every row unless the column already exists.
    fn inject(&mut self, name: &str, value: Value) {
        if self.has_column(name) {
            return;
        }
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.insert(name.to_string(), value.clone());
        }
    }

    /// First row whose `h3_index` equals `h3_id`, ignoring case.
    pub fn find_cell(&self, h3_id: &str) -> Option<&Record> {
        self.rows.iter().find(|row| {
            row.get("h3_index")
                .and_then(Value::as_str)
                .is_some_and(|id| id.eq_ignore_ascii_case(h3_id))
        })
    }
}

/// Source of partition frames.
#[async_trait]
pub trait PartitionStore: Send + Sync {
    async fn load(&self, key: &PartitionKey) -> Result<Frame, ExplorerError>;
}

/// Reads partitions from a local Parquet dataset.
#[derive(Debug, Clone)]
pub struct ParquetStore {
    root: PathBuf,
    allow_symlinks: bool,
}

impl ParquetStore {
    pub fn new(root: impl Into<PathBuf>, allow_symlinks: bool) -> Self {
        Self {
            root: root.into(),
            allow_symlinks,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl PartitionStore for ParquetStore {
    #[instrument(skip(self), fields(root = %self.root.display()))]
    async fn load(&self, key: &PartitionKey) -> Result<Frame, ExplorerError> {
        let root = self.root.clone();
        let key = key.clone();
        let allow_symlinks = self.allow_symlinks;

        tokio::task::spawn_blocking(move || read_partition(&root, &key, allow_symlinks))
            .await
            .map_err(|e| ExplorerError::Task(e.to_string()))?
    }
}

/// Parquet files of a partition directory, sorted by file name.
fn partition_files(dir: &Path) -> Result<Vec<PathBuf>, ExplorerError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "parquet") {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Read a whole partition synchronously.
pub fn read_partition(
    root: &Path,
    key: &PartitionKey,
    allow_symlinks: bool,
) -> Result<Frame, ExplorerError> {
    let dir = key.directory(root);
    let mut frame = Frame::default();

    if !dir.is_dir() {
        debug!("No partition at {}", dir.display());
        return Ok(frame);
    }

    let files = partition_files(&dir)?;
    for path in &files {
        let path = validate_data_path(path, root, allow_symlinks)?;
        let file = std::fs::File::open(&path)?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
        for batch in reader {
            let batch = batch?;
            let (columns, rows) = batch_to_records(&batch)?;
            frame.extend(&columns, rows);
        }
    }

    frame.inject("country", Value::String(key.country.clone()));
    frame.inject("year", Value::from(key.year));
    frame.inject("h3_resolution", Value::from(key.h3_res));

    info!(
        "Loaded {} rows from {} files for {}/{}/{}",
        frame.len(),
        files.len(),
        key.country,
        key.year,
        key.h3_res
    );
    Ok(frame)
}

/// Convert one Arrow column into JSON values.
///
/// Dictionary and large/view strings are cast to plain strings, integers
/// to i64 (u64 kept unsigned), floats to f64 with non-finite values as
/// null. Any other type is stringified.
pub fn column_values(array: &ArrayRef) -> Result<Vec<Value>, ArrowError> {
    let array: ArrayRef = match array.data_type() {
        DataType::Dictionary(_, _) | DataType::LargeUtf8 | DataType::Utf8View => {
            cast(array, &DataType::Utf8)?
        }
        _ => Arc::clone(array),
    };

    let len = array.len();
    let values = match array.data_type() {
        DataType::Null => vec![Value::Null; len],
        DataType::Utf8 => {
            let strings = array.as_string::<i32>();
            (0..len)
                .map(|i| {
                    if strings.is_null(i) {
                        Value::Null
                    } else {
                        Value::String(strings.value(i).to_string())
                    }
                })
                .collect()
        }
        DataType::Boolean => {
            let bools = array.as_boolean();
            (0..len)
                .map(|i| {
                    if bools.is_null(i) {
                        Value::Null
                    } else {
                        Value::Bool(bools.value(i))
                    }
                })
                .collect()
        }
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32 => {
            let ints = cast(&array, &DataType::Int64)?;
            let ints = ints.as_primitive::<Int64Type>();
            (0..len)
                .map(|i| {
                    if ints.is_null(i) {
                        Value::Null
                    } else {
                        Value::from(ints.value(i))
                    }
                })
                .collect()
        }
        DataType::UInt64 => {
            let ints = array.as_primitive::<UInt64Type>();
            (0..len)
                .map(|i| {
                    if ints.is_null(i) {
                        Value::Null
                    } else {
                        Value::from(ints.value(i))
                    }
                })
                .collect()
        }
        DataType::Float16 | DataType::Float32 | DataType::Float64 => {
            let floats = cast(&array, &DataType::Float64)?;
            let floats = floats.as_primitive::<Float64Type>();
            (0..len)
                .map(|i| {
                    if floats.is_null(i) {
                        Value::Null
                    } else {
                        finite_number(floats.value(i))
                    }
                })
                .collect()
        }
        _ => {
            let formatter = ArrayFormatter::try_new(array.as_ref(), &FormatOptions::default())?;
            (0..len)
                .map(|i| {
                    if array.is_null(i) {
                        Ok(Value::Null)
                    } else {
                        formatter.value(i).try_to_string().map(Value::String)
                    }
                })
                .collect::<Result<Vec<_>, ArrowError>>()?
        }
    };
    Ok(values)
}

/// Convert a record batch into column names and row records.
pub fn batch_to_records(batch: &RecordBatch) -> Result<(Vec<String>, Vec<Record>), ArrowError> {
    let schema = batch.schema();
    let columns: Vec<String> = schema.fields().iter().map(|f| f.name().clone()).collect();

    let converted = batch
        .columns()
        .iter()
        .map(column_values)
        .collect::<Result<Vec<_>, _>>()?;

    let mut rows = vec![Record::new(); batch.num_rows()];
    for (name, values) in columns.iter().zip(converted) {
        for (row, value) in rows.iter_mut().zip(values) {
            row.insert(name.clone(), value);
        }
    }
    Ok((columns, rows))
}
