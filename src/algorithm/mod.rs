//! Algorithm implementations for the case-crossover workflow
//!
//! This module contains the analytical core: referent selection, stratum
//! assembly, climate window aggregation and the covariate join.

pub mod climate;
pub mod covariate;
pub mod crossover;
pub mod referent;
