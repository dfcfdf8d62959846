//! Incremental extraction of source tables.
//!
//! - [`query`] builds the watermark query of the next page of a table.
//! - [`transfer`] drives the pages of one table into the destination in sub-batches.

pub mod query;
pub mod transfer;
