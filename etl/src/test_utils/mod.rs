//! Utilities for testing sync passes against in-memory stores.
//!
//! - [`fixtures`] builds source tables and catalogs with predictable content.
//! - [`event`] collects and inspects the events of a pass.
//! - [`test_destination_wrapper`] records every call made to a destination.
//! - [`failpoints`] configures fault injection for the duration of a test.

pub mod event;
pub mod failpoints;
pub mod fixtures;
pub mod test_destination_wrapper;
