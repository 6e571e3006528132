//! Input table reading
//!
//! Reads delimited text (CSV/TSV) or Parquet files into Arrow record
//! batches. Delimited files are read with every column as text so that codes
//! keep their leading zeros; typing happens in [`crate::schema`].

pub mod cases;
pub mod climate;

use std::fs::File;
use std::io::Seek;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use arrow::csv::ReaderBuilder;
use arrow::csv::reader::Format;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use crate::error::{CrossoverError, Result};
use crate::utils::logging::{create_spinner, log_operation_complete, log_operation_start};

pub use cases::{extract_year, load_cases, yearly_case_files};
pub use climate::load_climate;

/// Default batch size for reading
pub const DEFAULT_BATCH_SIZE: usize = 16384;

/// Number of records scanned to discover the header of delimited files
const HEADER_SCAN_RECORDS: usize = 1;

/// On-disk format of an input table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Parquet,
    Delimited(u8),
}

impl TableFormat {
    /// Detect the format from a file extension; unknown extensions are CSV
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("parquet" | "pq") => Self::Parquet,
            Some("tsv" | "tab") => Self::Delimited(b'\t'),
            _ => Self::Delimited(b','),
        }
    }

    /// Whether a path looks like a readable table file
    #[must_use]
    pub fn is_table_file(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| {
                matches!(
                    e.to_ascii_lowercase().as_str(),
                    "csv" | "tsv" | "tab" | "txt" | "parquet" | "pq"
                )
            })
    }
}

/// Read a table file into record batches
///
/// # Arguments
/// * `path` - Path to a `.csv`, `.tsv`, `.txt` or `.parquet` file
pub fn read_table(path: &Path) -> Result<Vec<RecordBatch>> {
    let start = Instant::now();
    log_operation_start("Reading table", path);

    let spinner = create_spinner(Some(&format!("Reading {}", path.display())));
    let batches = match TableFormat::from_path(path) {
        TableFormat::Parquet => read_parquet(path),
        TableFormat::Delimited(delimiter) => read_delimited(path, delimiter),
    };
    spinner.finish_and_clear();
    let batches = batches?;

    let rows = batches.iter().map(RecordBatch::num_rows).sum();
    log_operation_complete("Read", path, rows, Some(start.elapsed()));

    Ok(batches)
}

/// Read a delimited text file with a header row, all columns as text
pub fn read_delimited(path: &Path, delimiter: u8) -> Result<Vec<RecordBatch>> {
    let mut file = File::open(path).map_err(|e| CrossoverError::io(path, e))?;

    let format = Format::default().with_header(true).with_delimiter(delimiter);
    let (inferred, _) = format.infer_schema(&mut file, Some(HEADER_SCAN_RECORDS))?;
    file.rewind().map_err(|e| CrossoverError::io(path, e))?;

    let schema = Schema::new(
        inferred
            .fields()
            .iter()
            .map(|f| Field::new(f.name(), DataType::Utf8, true))
            .collect::<Vec<_>>(),
    );

    let reader = ReaderBuilder::new(Arc::new(schema))
        .with_format(format)
        .with_batch_size(DEFAULT_BATCH_SIZE)
        .build(file)?;

    Ok(reader.collect::<std::result::Result<Vec<_>, _>>()?)
}

/// Read a Parquet file into record batches
pub fn read_parquet(path: &Path) -> Result<Vec<RecordBatch>> {
    let file = File::open(path).map_err(|e| CrossoverError::io(path, e))?;

    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?
        .with_batch_size(DEFAULT_BATCH_SIZE)
        .build()?;

    Ok(reader.collect::<std::result::Result<Vec<_>, _>>()?)
}

/// Table label used in diagnostics, e.g. `cases (cases_2015.csv)`
pub(crate) fn table_label(table: &str, path: &Path) -> String {
    let name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
    format!("{table} ({name})")
}
