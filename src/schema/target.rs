//! Declared target schemas of the pipeline inputs
//!
//! Yearly case files and climate exports use different column names across
//! schema versions. Each input table has one declared target schema; every
//! incoming batch is mapped onto it before records are extracted.

use std::sync::Arc;

use arrow_schema::{DataType, Field, Schema, SchemaRef};

/// Canonical column names of the case table
pub mod case_columns {
    pub const ID: &str = "id";
    pub const INFECTION_DATE: &str = "infection_date";
    pub const SPATIAL_UNIT: &str = "spatial_unit";
    pub const LAB_RESULT: &str = "lab_result";
}

/// Canonical column names of the climate table
pub mod climate_columns {
    pub const SPATIAL_UNIT: &str = "spatial_unit";
    pub const DATE: &str = "date";
    pub const TEMPERATURE_MAX: &str = "temperature_max";
    pub const TEMPERATURE_MIN: &str = "temperature_min";
    pub const TEMPERATURE_MEAN: &str = "temperature_mean";
    pub const PRECIPITATION_SUM: &str = "precipitation_sum";
}

/// A declared column of a target schema
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    /// Canonical name
    pub name: &'static str,
    pub data_type: DataType,
    /// Whether the column must be present in every input batch
    pub required: bool,
    /// Alternative names accepted on input (case-insensitive)
    pub aliases: &'static [&'static str],
}

impl ColumnSpec {
    const fn new(
        name: &'static str,
        data_type: DataType,
        required: bool,
        aliases: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            data_type,
            required,
            aliases,
        }
    }

    /// Whether an input column name refers to this column
    #[must_use]
    pub fn matches(&self, input_name: &str) -> bool {
        let input = input_name.trim();
        input.eq_ignore_ascii_case(self.name) || self.aliases.iter().any(|a| input.eq_ignore_ascii_case(a))
    }
}

/// Declared schema of an input table
#[derive(Debug, Clone)]
pub struct TargetSchema {
    /// Table name used in diagnostics
    pub table: &'static str,
    pub columns: Vec<ColumnSpec>,
}

impl TargetSchema {
    /// Arrow schema of harmonized batches; values are validated on extraction
    #[must_use]
    pub fn arrow_schema(&self) -> SchemaRef {
        Arc::new(Schema::new(
            self.columns
                .iter()
                .map(|c| Field::new(c.name, c.data_type.clone(), true))
                .collect::<Vec<_>>(),
        ))
    }
}

/// Target schema of the case table
#[must_use]
pub fn case_schema() -> TargetSchema {
    use case_columns::{ID, INFECTION_DATE, LAB_RESULT, SPATIAL_UNIT};

    TargetSchema {
        table: "cases",
        columns: vec![
            ColumnSpec::new(ID, DataType::Int64, true, &["case_id", "record_id"]),
            ColumnSpec::new(
                INFECTION_DATE,
                DataType::Date32,
                true,
                &["date_infection", "infection", "estimated_infection_date"],
            ),
            ColumnSpec::new(
                SPATIAL_UNIT,
                DataType::Utf8,
                true,
                &["municipality", "municipality_code", "geocode", "unit"],
            ),
            ColumnSpec::new(
                LAB_RESULT,
                DataType::Utf8,
                true,
                &["lab", "result", "final_classification", "classification"],
            ),
        ],
    }
}

/// Target schema of the climate table
#[must_use]
pub fn climate_schema() -> TargetSchema {
    use climate_columns::{
        DATE, PRECIPITATION_SUM, SPATIAL_UNIT, TEMPERATURE_MAX, TEMPERATURE_MEAN, TEMPERATURE_MIN,
    };

    TargetSchema {
        table: "climate",
        columns: vec![
            ColumnSpec::new(
                SPATIAL_UNIT,
                DataType::Utf8,
                true,
                &["municipality", "municipality_code", "geocode", "unit"],
            ),
            ColumnSpec::new(DATE, DataType::Date32, true, &["day", "obs_date"]),
            ColumnSpec::new(TEMPERATURE_MAX, DataType::Float64, true, &["tmax", "tx", "temp_max"]),
            ColumnSpec::new(TEMPERATURE_MIN, DataType::Float64, true, &["tmin", "tn", "temp_min"]),
            ColumnSpec::new(
                TEMPERATURE_MEAN,
                DataType::Float64,
                true,
                &["tmean", "tavg", "tg", "temp_mean"],
            ),
            ColumnSpec::new(
                PRECIPITATION_SUM,
                DataType::Float64,
                true,
                &["precipitation", "precip", "prcp", "rr"],
            ),
        ],
    }
}
