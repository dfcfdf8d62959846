//! Data destination abstractions.
//!
//! This module provides the core [`Destination`] trait and its implementations. Destinations
//! receive DDL from the schema reconciler and bulk upserts from the transfer loop.

mod base;
pub mod memory;
pub mod snowflake;

pub use base::{ColumnSchema, Destination};
