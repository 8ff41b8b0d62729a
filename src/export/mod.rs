//! Export of cohort tables.
//!
//! Provides the in-memory [`CohortTable`] shared by the Pi10 and summary
//! pipelines and its single-write CSV serialization.

pub mod table;

pub use table::CohortTable;
