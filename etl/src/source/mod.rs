//! Warehouses that rows are extracted from.
//!
//! The [`Source`] trait executes extraction queries. [`redshift::RedshiftSource`] talks to a
//! Redshift cluster and [`memory::MemorySource`] evaluates queries in memory for tests.

mod base;
pub mod memory;
pub mod redshift;

pub use base::{QueryResult, Source};
