//! Output writing
//!
//! The joined crossover table is converted to a single Arrow record batch
//! and written as delimited text or Parquet. Every file is first staged as
//! a temporary sibling and only renamed into place on commit, so a run can
//! stage all of its outputs before replacing any of them.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use arrow::array::{ArrayRef, BooleanBuilder, Date32Builder, Float64Builder, Int64Builder, StringBuilder};
use arrow::csv::WriterBuilder;
use arrow::datatypes::{DataType, Field, FieldRef, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use log::debug;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use serde::Serialize;

use crate::algorithm::covariate::JoinedTable;
use crate::error::{CrossoverError, Result};
use crate::models::ControlDate;
use crate::reader::TableFormat;
use crate::utils::logging::{log_operation_complete, log_operation_start};
use crate::utils::to_date32;

/// Canonical column names of the output table
pub mod output_columns {
    pub const STRATUM_ID: &str = "stratum_id";
    pub const DATE: &str = "date";
    pub const IS_CASE: &str = "is_case";
    pub const SPATIAL_UNIT: &str = "spatial_unit";
    pub const LAB_RESULT: &str = "lab_result";
}

/// Schema of the output table for the given covariate columns
#[must_use]
pub fn output_schema(covariate_columns: &[String]) -> SchemaRef {
    use output_columns::{DATE, IS_CASE, LAB_RESULT, SPATIAL_UNIT, STRATUM_ID};

    let mut fields = vec![
        Field::new(STRATUM_ID, DataType::Int64, false),
        Field::new(DATE, DataType::Date32, false),
        Field::new(IS_CASE, DataType::Boolean, false),
        Field::new(SPATIAL_UNIT, DataType::Utf8, false),
        Field::new(LAB_RESULT, DataType::Utf8, true),
    ];
    fields.extend(
        covariate_columns
            .iter()
            .map(|name| Field::new(name, DataType::Float64, true)),
    );
    Arc::new(Schema::new(fields))
}

/// Convert the joined table to a record batch, preserving row order
///
/// # Errors
///
/// Returns an Arrow error if the columns do not match the schema
pub fn to_record_batch(table: &JoinedTable) -> Result<RecordBatch> {
    let n = table.len();
    let mut stratum_ids = Int64Builder::with_capacity(n);
    let mut dates = Date32Builder::with_capacity(n);
    let mut is_case = BooleanBuilder::with_capacity(n);
    let mut units = StringBuilder::new();
    let mut labs = StringBuilder::new();
    let mut covariates: Vec<Float64Builder> = table
        .covariate_columns
        .iter()
        .map(|_| Float64Builder::with_capacity(n))
        .collect();

    for joined in &table.rows {
        let row = &joined.row;
        stratum_ids.append_value(row.stratum_id);
        dates.append_value(to_date32(row.date));
        is_case.append_value(row.is_case);
        units.append_value(&row.spatial_unit);
        labs.append_option(row.lab_result.as_deref());
        for (builder, value) in covariates.iter_mut().zip(&joined.covariates) {
            builder.append_option(*value);
        }
    }

    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(stratum_ids.finish()),
        Arc::new(dates.finish()),
        Arc::new(is_case.finish()),
        Arc::new(units.finish()),
        Arc::new(labs.finish()),
    ];
    columns.extend(
        covariates
            .iter_mut()
            .map(|builder| Arc::new(builder.finish()) as ArrayRef),
    );

    Ok(RecordBatch::try_new(
        output_schema(&table.covariate_columns),
        columns,
    )?)
}

/// Write a batch to `path`, choosing the format from the extension
///
/// # Arguments
/// * `path` - Destination; `.parquet` writes Parquet, anything else text
/// * `batch` - Data to write
/// * `delimiter` - Field delimiter for text output
pub fn write_table(path: &Path, batch: &RecordBatch, delimiter: u8) -> Result<()> {
    stage_table(path, batch, delimiter)?.commit()
}

/// Write a batch to a temporary sibling of `path` without replacing `path`
pub fn stage_table(path: &Path, batch: &RecordBatch, delimiter: u8) -> Result<StagedFile> {
    let start = Instant::now();
    log_operation_start("Writing table", path);

    let format = match TableFormat::from_path(path) {
        TableFormat::Parquet => TableFormat::Parquet,
        TableFormat::Delimited(_) => TableFormat::Delimited(delimiter),
    };

    let staged = stage(path, |file| match format {
        TableFormat::Parquet => write_parquet(file, batch),
        TableFormat::Delimited(delimiter) => write_delimited(file, batch, delimiter),
    })?;

    log_operation_complete("Staged", path, batch.num_rows(), Some(start.elapsed()));
    Ok(staged)
}

/// Export the sampled control dates as (`case_id`, `date`) rows
pub fn write_control_assignments(path: &Path, controls: &[ControlDate], delimiter: u8) -> Result<()> {
    stage_control_assignments(path, controls, delimiter)?.commit()
}

/// Stage the control date export without replacing `path`
pub fn stage_control_assignments(path: &Path, controls: &[ControlDate], delimiter: u8) -> Result<StagedFile> {
    let fields: Vec<FieldRef> = vec![
        Arc::new(Field::new("case_id", DataType::Int64, false)),
        Arc::new(Field::new("date", DataType::Date32, false)),
    ];
    let batch = serde_arrow::to_record_batch(&fields, &controls)?;
    stage_table(path, &batch, delimiter)
}

/// Stage a value as pretty-printed JSON without replacing `path`
pub fn stage_json<T: Serialize>(path: &Path, value: &T) -> Result<StagedFile> {
    stage(path, |file| {
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush().map_err(|e| CrossoverError::io(path, e))
    })
}

/// A completely written temporary file waiting to be renamed over its target
///
/// Dropping it without [`StagedFile::commit`] deletes the temporary file and
/// leaves the target untouched.
#[derive(Debug)]
#[must_use = "a staged file is deleted unless committed"]
pub struct StagedFile {
    temp: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl StagedFile {
    #[must_use]
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Rename the temporary file over the target
    ///
    /// # Errors
    ///
    /// Returns an IO error if the rename fails; the temporary file is then
    /// removed
    pub fn commit(mut self) -> Result<()> {
        fs::rename(&self.temp, &self.target).map_err(|e| CrossoverError::io(&self.target, e))?;
        self.committed = true;
        debug!("Committed {}", self.target.display());
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.committed && self.temp.exists() {
            debug!("Removing uncommitted output {}", self.temp.display());
            let _ = fs::remove_file(&self.temp);
        }
    }
}

fn write_delimited(file: File, batch: &RecordBatch, delimiter: u8) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .with_header(true)
        .with_delimiter(delimiter)
        .build(file);
    writer.write(batch)?;
    Ok(())
}

fn write_parquet(file: File, batch: &RecordBatch) -> Result<()> {
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}

/// Temporary sibling path, e.g. `out.csv` -> `out.csv.tmp`
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write to the temporary sibling of `path`
///
/// The parent directory is created if needed. A failed write leaves nothing
/// behind.
fn stage<F>(path: &Path, write: F) -> Result<StagedFile>
where
    F: FnOnce(File) -> Result<()>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| CrossoverError::io(parent, e))?;
    }

    let temp = temp_path(path);
    let file = File::create(&temp).map_err(|e| CrossoverError::io(&temp, e))?;
    let staged = StagedFile {
        temp,
        target: path.to_path_buf(),
        committed: false,
    };
    write(file)?;
    Ok(staged)
}
