//! Data models for cases, climate observations and crossover rows

pub mod case;
pub mod climate;
pub mod crossover;

pub use case::CaseRecord;
pub use climate::ClimateObservation;
pub use crossover::{ControlDate, CrossoverRow};
