//! Destination schema reconciliation.
//!
//! Makes sure the destination namespace and tables exist before rows are written. Tables are
//! created on first sight with the columns of the first extraction result and never altered.

mod reconciler;

pub use reconciler::{destination_columns, ensure_namespace, ensure_table};
