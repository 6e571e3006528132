//! Input schema declarations and harmonization
//!
//! The case and climate inputs each have a declared target schema. Every
//! incoming batch goes through an explicit mapping step ([`harmonize_batch`])
//! that resolves column aliases across schema versions, casts to the
//! declared types and rejects batches lacking required columns.

pub mod harmonize;
pub mod target;

pub use harmonize::{DATE_FORMATS, MISSING_MARKERS, harmonize_batch, parse_date};
pub use target::{ColumnSpec, TargetSchema, case_columns, case_schema, climate_columns, climate_schema};
