//! Climate table loading

use std::path::Path;
use std::time::Instant;

use arrow::array::{Array, Date32Array, Float64Array, StringArray};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use rustc_hash::FxHashMap;

use super::{read_table, table_label};
use crate::error::{CrossoverError, Result};
use crate::models::ClimateObservation;
use crate::schema::{climate_columns, climate_schema, harmonize_batch};
use crate::utils::arrow::typed_column;
use crate::utils::logging::log_stage_complete;

/// Load and validate the daily climate table
///
/// Missing or non-finite covariate values are kept as `None`; only the key
/// columns are required to be present on every row.
///
/// # Errors
///
/// Returns `MalformedInput` for rows without a spatial unit or date, for a
/// value that is neither numeric nor a missing marker, or for a repeated
/// (spatial unit, date) pair
pub fn load_climate(path: &Path) -> Result<Vec<ClimateObservation>> {
    let start_time = Instant::now();
    let target = climate_schema();
    let table = table_label(target.table, path);

    let mut observations = Vec::new();
    let mut first_row: FxHashMap<(String, NaiveDate), usize> = FxHashMap::default();
    let mut row_offset = 0;

    for batch in read_table(path)? {
        let harmonized = harmonize_batch(&batch, &target, &table, row_offset)?;
        for (row, obs) in observations_from_batch(&harmonized, &table, row_offset)? {
            let key = (obs.spatial_unit.clone(), obs.date);
            if let Some(previous) = first_row.get(&key) {
                return Err(CrossoverError::malformed_row(
                    &table,
                    row,
                    format!(
                        "duplicate observation for spatial unit '{}' on {} (first at row {previous})",
                        obs.spatial_unit, obs.date
                    ),
                ));
            }
            first_row.insert(key, row);
            observations.push(obs);
        }
        row_offset += batch.num_rows();
    }

    log_stage_complete("Climate loading", observations.len(), start_time.elapsed());
    Ok(observations)
}

/// Extract observations from a harmonized batch
///
/// # Returns
/// Pairs of 1-based data row number and observation
pub fn observations_from_batch(
    batch: &RecordBatch,
    table: &str,
    row_offset: usize,
) -> Result<Vec<(usize, ClimateObservation)>> {
    let units = typed_column::<StringArray>(batch, table, climate_columns::SPATIAL_UNIT)?;
    let dates = typed_column::<Date32Array>(batch, table, climate_columns::DATE)?;
    let tmax = typed_column::<Float64Array>(batch, table, climate_columns::TEMPERATURE_MAX)?;
    let tmin = typed_column::<Float64Array>(batch, table, climate_columns::TEMPERATURE_MIN)?;
    let tmean = typed_column::<Float64Array>(batch, table, climate_columns::TEMPERATURE_MEAN)?;
    let precip = typed_column::<Float64Array>(batch, table, climate_columns::PRECIPITATION_SUM)?;

    let mut observations = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let row = row_offset + i + 1;

        let spatial_unit = (!units.is_null(i))
            .then(|| units.value(i).trim())
            .filter(|unit| !unit.is_empty())
            .ok_or_else(|| CrossoverError::malformed_row(table, row, "missing spatial_unit"))?;

        let date = if dates.is_null(i) {
            None
        } else {
            dates.value_as_date(i)
        }
        .ok_or_else(|| CrossoverError::malformed_row(table, row, "missing or unparseable date"))?;

        observations.push((
            row,
            ClimateObservation {
                spatial_unit: spatial_unit.to_string(),
                date,
                temperature_max: finite_value(tmax, i),
                temperature_min: finite_value(tmin, i),
                temperature_mean: finite_value(tmean, i),
                precipitation_sum: finite_value(precip, i),
            },
        ));
    }

    Ok(observations)
}

fn finite_value(array: &Float64Array, i: usize) -> Option<f64> {
    if array.is_null(i) {
        return None;
    }
    Some(array.value(i)).filter(|v| v.is_finite())
}
