//! Analysis modules.
//!
//! Aggregation of raw records and statistics over labeled tables.

pub mod aggregator;

pub use aggregator::*;
