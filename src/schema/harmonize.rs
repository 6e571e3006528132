//! Projection of input batches onto a declared target schema

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Date32Array, StringArray, new_null_array};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use arrow::util::display::array_value_to_string;
use chrono::NaiveDate;
use log::debug;

use super::target::{ColumnSpec, TargetSchema};
use crate::error::{CrossoverError, Result};
use crate::utils::to_date32;

/// Date formats tried, in order, for textual date columns
pub const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", // ISO format: 2015-01-15
    "%Y/%m/%d", // 2015/01/15
    "%d-%m-%Y", // European: 15-01-2015
    "%d/%m/%Y", // UK: 15/01/2015
    "%d.%m.%Y", // German/Danish: 15.01.2015
    "%Y%m%d",   // Compact: 20150115
];

/// Parse a date using the supported formats
#[must_use]
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

/// Text values treated as missing in any non-text column
pub const MISSING_MARKERS: &[&str] = &["", "NA", "N/A", "NaN", "null"];

fn is_missing_marker(value: &str) -> bool {
    MISSING_MARKERS.iter().any(|marker| value.eq_ignore_ascii_case(marker))
}

/// Map a batch onto the target schema
///
/// Columns are matched by canonical name first, then by alias; matched
/// columns are cast to the declared type. Undeclared columns are dropped and
/// missing optional columns are filled with nulls. Empty cells and the
/// [`MISSING_MARKERS`] become null; any other value that cannot be converted
/// is an error.
///
/// # Arguments
/// * `table` - Label used in error messages
/// * `row_offset` - Number of data rows preceding this batch in the table
///
/// # Errors
///
/// Returns `MissingColumn` if a required column is absent, or
/// `MalformedInput` naming the row and column of the first value that
/// cannot be converted
pub fn harmonize_batch(
    batch: &RecordBatch,
    target: &TargetSchema,
    table: &str,
    row_offset: usize,
) -> Result<RecordBatch> {
    let schema = batch.schema();
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(target.columns.len());

    for spec in &target.columns {
        let found = schema
            .fields()
            .iter()
            .position(|f| f.name().trim().eq_ignore_ascii_case(spec.name))
            .or_else(|| schema.fields().iter().position(|f| spec.matches(f.name())));

        let column = match found {
            Some(idx) => {
                let input_name = schema.field(idx).name();
                if input_name != spec.name {
                    debug!("{}: mapping column '{input_name}' to '{}'", target.table, spec.name);
                }
                convert_column(batch.column(idx), spec, table, row_offset)?
            }
            None if spec.required => {
                return Err(CrossoverError::MissingColumn {
                    table: target.table.to_string(),
                    column: spec.name.to_string(),
                });
            }
            None => {
                debug!("{}: optional column '{}' absent, filling with nulls", target.table, spec.name);
                new_null_array(&spec.data_type, batch.num_rows())
            }
        };

        columns.push(column);
    }

    Ok(RecordBatch::try_new(target.arrow_schema(), columns)?)
}

/// Convert a column to its declared type, rejecting values lost in conversion
fn convert_column(
    column: &ArrayRef,
    spec: &ColumnSpec,
    table: &str,
    row_offset: usize,
) -> Result<ArrayRef> {
    let actual = column.data_type();
    if actual == &spec.data_type {
        return Ok(Arc::clone(column));
    }

    let is_text = matches!(actual, DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View);
    let (source, converted): (ArrayRef, ArrayRef) = if is_text && spec.data_type != DataType::Utf8 {
        let text = cast(column, &DataType::Utf8)?;
        let strings = text
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| CrossoverError::malformed(table, format!("column '{}' is not text", spec.name)))?;
        let cleaned: StringArray = strings
            .iter()
            .map(|value| value.map(str::trim).filter(|v| !is_missing_marker(v)))
            .collect();

        let converted: ArrayRef = if spec.data_type == DataType::Date32 {
            let dates: Date32Array = cleaned
                .iter()
                .map(|value| value.and_then(parse_date).map(to_date32))
                .collect();
            Arc::new(dates)
        } else {
            cast(&cleaned, &spec.data_type).map_err(|e| type_error(table, spec, actual, &e))?
        };
        (Arc::new(cleaned), converted)
    } else {
        let converted = cast(column, &spec.data_type).map_err(|e| type_error(table, spec, actual, &e))?;
        (Arc::clone(column), converted)
    };

    if let Some(i) = (0..source.len()).find(|&i| source.is_valid(i) && converted.is_null(i)) {
        let raw = array_value_to_string(source.as_ref(), i)?;
        return Err(CrossoverError::malformed_row(
            table,
            row_offset + i + 1,
            format!("column '{}': cannot parse '{raw}' as {}", spec.name, spec.data_type),
        ));
    }

    Ok(converted)
}

fn type_error(table: &str, spec: &ColumnSpec, actual: &DataType, e: &ArrowError) -> CrossoverError {
    CrossoverError::malformed(
        table,
        format!(
            "column '{}' of type {actual:?} cannot be converted to {:?}: {e}",
            spec.name, spec.data_type
        ),
    )
}
