//! Utilities for working with Arrow arrays.

use arrow::array::{Array, ArrayRef};
use arrow::record_batch::RecordBatch;

use crate::error::{CrossoverError, Result};

/// Get a column from a record batch by name
///
/// # Errors
///
/// Returns `MissingColumn` if the batch has no column with this name
pub fn get_column<'a>(batch: &'a RecordBatch, table: &str, column_name: &str) -> Result<&'a ArrayRef> {
    let idx = batch
        .schema()
        .index_of(column_name)
        .map_err(|_| CrossoverError::MissingColumn {
            table: table.to_string(),
            column: column_name.to_string(),
        })?;
    Ok(batch.column(idx))
}

/// Downcast a column to a specific array type with clear error messages
///
/// # Type Parameters
///
/// * `T` - The concrete Arrow array type
///
/// # Arguments
///
/// * `batch` - The record batch containing the column
/// * `table` - Name of the table, used in error messages
/// * `column_name` - The name of the column to extract
pub fn typed_column<'a, T: Array + 'static>(
    batch: &'a RecordBatch,
    table: &str,
    column_name: &str,
) -> Result<&'a T> {
    let array = get_column(batch, table, column_name)?;
    array.as_any().downcast_ref::<T>().ok_or_else(|| {
        CrossoverError::malformed(
            table,
            format!(
                "column '{column_name}' has type {:?}, expected {}",
                array.data_type(),
                std::any::type_name::<T>()
            ),
        )
    })
}
