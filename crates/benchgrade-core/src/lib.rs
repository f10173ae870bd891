//! benchgrade-core: benchmark grade aggregation engine.
//!
//! This crate holds the gradebook data model, the calculation-rule resolver,
//! the aggregate cache accessor, the category/course aggregators, the GPA
//! roll-up, the report-card data and the follow-up lists that the rest of
//! benchgrade builds on.

pub mod analytics;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod gpa;
pub mod memory;
pub mod model;
pub mod parser;
pub mod report;
pub mod rules;
pub mod statistics;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;
