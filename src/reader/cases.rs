//! Case table loading
//!
//! The case table is either a single file or a directory of yearly files
//! (`cases_2014.csv`, `cases_2015.parquet`, ...). Yearly files are selected
//! by the configured year range and concatenated in year order.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use arrow::array::{Array, Date32Array, Int64Array, StringArray};
use arrow::record_batch::RecordBatch;
use log::{debug, info};
use rustc_hash::FxHashMap;

use super::{TableFormat, read_table, table_label};
use crate::config::YearRange;
use crate::error::{CrossoverError, Result};
use crate::models::CaseRecord;
use crate::schema::{case_columns, case_schema, harmonize_batch};
use crate::utils::arrow::typed_column;
use crate::utils::logging::{log_stage_complete, log_warning};

/// Extract a year from a file name, e.g. `cases_2015.csv` or `ttt_201501.parquet`
///
/// The first run of at least four digits is used; its leading four digits
/// must form a plausible year.
#[must_use]
pub fn extract_year(file_name: &str) -> Option<i32> {
    let bytes = file_name.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i - start >= 4 {
                return file_name[start..start + 4]
                    .parse::<i32>()
                    .ok()
                    .filter(|year| (1800..=2200).contains(year));
            }
        } else {
            i += 1;
        }
    }
    None
}

/// List yearly case files in a directory, filtered by year range
///
/// # Returns
/// Paths ordered by year, then file name
pub fn yearly_case_files(dir: &Path, years: Option<&YearRange>) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| CrossoverError::io(dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| CrossoverError::io(dir, e))?.path();
        if !path.is_file() || !TableFormat::is_table_file(&path) {
            continue;
        }
        let Some(year) = path.file_name().and_then(|n| n.to_str()).and_then(extract_year) else {
            log_warning("Skipping case file without a year in its name", Some(&path));
            continue;
        };
        if years.is_none_or(|range| range.contains(year)) {
            files.push((year, path));
        } else {
            debug!("Skipping {}: {year} outside year range", path.display());
        }
    }

    files.sort();
    Ok(files.into_iter().map(|(_, path)| path).collect())
}

/// Load and validate the case table
///
/// # Arguments
/// * `path` - A case file, or a directory of yearly case files
/// * `years` - Year range used to select yearly files
///
/// # Errors
///
/// Returns `MalformedInput` for rows violating the case record invariants
/// (missing id, infection date or spatial unit; duplicate id)
pub fn load_cases(path: &Path, years: Option<&YearRange>) -> Result<Vec<CaseRecord>> {
    let start_time = Instant::now();

    let files = if path.is_dir() {
        let files = yearly_case_files(path, years)?;
        if files.is_empty() {
            return Err(CrossoverError::Config(format!(
                "No yearly case files found in {}{}",
                path.display(),
                years.map(|r| format!(" for years {r}")).unwrap_or_default()
            )));
        }
        info!("Loading {} yearly case files from {}", files.len(), path.display());
        files
    } else {
        vec![path.to_path_buf()]
    };

    let target = case_schema();
    let mut cases = Vec::new();
    let mut first_seen: FxHashMap<i64, String> = FxHashMap::default();

    for file in &files {
        let table = table_label(target.table, file);
        let mut row_offset = 0;

        for batch in read_table(file)? {
            let harmonized = harmonize_batch(&batch, &target, &table, row_offset)?;
            for (row, case) in cases_from_batch(&harmonized, &table, row_offset)? {
                if let Some(previous) = first_seen.get(&case.id) {
                    return Err(CrossoverError::malformed_row(
                        &table,
                        row,
                        format!("duplicate case id {} (first seen in {previous})", case.id),
                    ));
                }
                first_seen.insert(case.id, table.clone());
                cases.push(case);
            }
            row_offset += batch.num_rows();
        }
    }

    log_stage_complete("Case loading", cases.len(), start_time.elapsed());
    Ok(cases)
}

/// Extract validated case records from a harmonized batch
///
/// # Returns
/// Pairs of 1-based data row number and record
pub fn cases_from_batch(
    batch: &RecordBatch,
    table: &str,
    row_offset: usize,
) -> Result<Vec<(usize, CaseRecord)>> {
    let ids = typed_column::<Int64Array>(batch, table, case_columns::ID)?;
    let dates = typed_column::<Date32Array>(batch, table, case_columns::INFECTION_DATE)?;
    let units = typed_column::<StringArray>(batch, table, case_columns::SPATIAL_UNIT)?;
    let labs = typed_column::<StringArray>(batch, table, case_columns::LAB_RESULT)?;

    let mut records = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let row = row_offset + i + 1;

        if ids.is_null(i) {
            return Err(CrossoverError::malformed_row(table, row, "missing or non-integer id"));
        }
        let id = ids.value(i);

        let infection_date = if dates.is_null(i) {
            None
        } else {
            dates.value_as_date(i)
        }
        .ok_or_else(|| {
            CrossoverError::malformed_row(
                table,
                row,
                format!("case {id} has a missing or unparseable infection_date"),
            )
        })?;

        let spatial_unit = (!units.is_null(i))
            .then(|| units.value(i).trim())
            .filter(|unit| !unit.is_empty())
            .ok_or_else(|| {
                CrossoverError::malformed_row(table, row, format!("case {id} has no spatial_unit"))
            })?;

        let lab_result = (!labs.is_null(i))
            .then(|| labs.value(i).trim())
            .filter(|lab| !lab.is_empty())
            .map(str::to_string);

        records.push((row, CaseRecord::new(id, infection_date, spatial_unit, lab_result)));
    }

    Ok(records)
}
