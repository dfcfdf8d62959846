use std::future::Future;

use crate::conversions::type_mapper::DestinationType;
use crate::error::EtlResult;
use crate::types::Record;

/// A column of a destination table, in creation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    pub name: String,
    pub destination_type: DestinationType,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, destination_type: DestinationType) -> Self {
        Self {
            name: name.into(),
            destination_type,
        }
    }
}

/// Trait for warehouses that receive synced rows.
///
/// [`Destination`] implementations expose the few statements the engine needs: namespace
/// creation, table introspection, table creation and a bulk write. Destination identifiers are
/// normalized to upper case, so callers compare table names case-insensitively.
///
/// [`Destination::bulk_insert`] must be idempotent on the table's primary key. The engine
/// re-delivers rows after a restart and at page boundaries, relying on upsert semantics.
///
/// The trait also provides an optional [`Destination::shutdown`] method with a default no-op
/// implementation. Override this method if your destination requires cleanup when the host
/// stops.
pub trait Destination {
    /// Returns the name of the destination.
    fn name() -> &'static str;

    /// Releases resources held by the destination.
    ///
    /// The default implementation is a no-op.
    fn shutdown(&self) -> impl Future<Output = EtlResult<()>> + Send {
        async { Ok(()) }
    }

    /// Creates `namespace` if it does not exist yet.
    fn create_namespace_if_missing(
        &self,
        namespace: &str,
    ) -> impl Future<Output = EtlResult<()>> + Send;

    /// Lists the names of the tables in `namespace` as the destination reports them.
    fn list_tables(&self, namespace: &str) -> impl Future<Output = EtlResult<Vec<String>>> + Send;

    /// Creates a table with the given columns, in order.
    fn create_table(
        &self,
        namespace: &str,
        table_name: &str,
        columns: &[ColumnSchema],
    ) -> impl Future<Output = EtlResult<()>> + Send;

    /// Writes records to a table, inserting new rows and overwriting rows that share the
    /// primary key.
    ///
    /// Every record of a call has the same columns. A failure leaves the table in an
    /// unspecified state for the records of this call.
    fn bulk_insert(
        &self,
        namespace: &str,
        table_name: &str,
        primary_key: &[String],
        records: Vec<Record>,
    ) -> impl Future<Output = EtlResult<()>> + Send;
}
