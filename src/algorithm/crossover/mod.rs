//! Case-crossover set assembly
//!
//! Combines case rows and sampled control rows into strata sharing the case
//! id, and enforces the one-case-plus-N-controls shape of every stratum.

pub mod assembler;

pub use assembler::{CrossoverSet, assemble};
