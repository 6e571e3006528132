//! Climate window engine
//!
//! Trailing-window aggregates of daily climate covariates per spatial unit.
//! Units never share window state, so they are processed in parallel.

pub mod engine;
pub mod spec;

pub use engine::{ClimateWindowEngine, ClimateWindowRow, ClimateWindowTable};
pub use spec::{Aggregation, Covariate, WindowSpec, default_specs};
