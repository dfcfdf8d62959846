use tracing::{debug, info};

use crate::conversions::type_mapper::destination_type;
use crate::destination::{ColumnSchema, Destination};
use crate::error::EtlResult;
use crate::types::ColumnDescriptor;

/// Maps the columns of an extraction result to destination columns, keeping their order.
pub fn destination_columns(columns: &[ColumnDescriptor]) -> Vec<ColumnSchema> {
    columns
        .iter()
        .map(|column| ColumnSchema::new(&column.name, destination_type(&column.source_type_code)))
        .collect()
}

/// Creates `namespace` in the destination if it does not exist. Safe to call on every pass.
pub async fn ensure_namespace<D>(destination: &D, namespace: &str) -> EtlResult<()>
where
    D: Destination,
{
    destination.create_namespace_if_missing(namespace).await?;
    debug!(namespace, "namespace is ready");

    Ok(())
}

/// Creates `table_name` with `columns` unless a table with that name already exists.
///
/// Existing tables are matched case-insensitively and never altered, even when `columns`
/// differ from their structure. Returns `true` when the table was created.
pub async fn ensure_table<D>(
    destination: &D,
    namespace: &str,
    table_name: &str,
    columns: &[ColumnSchema],
) -> EtlResult<bool>
where
    D: Destination,
{
    let existing_tables = destination.list_tables(namespace).await?;
    let normalized_name = table_name.to_uppercase();

    if existing_tables
        .iter()
        .any(|existing| existing.to_uppercase() == normalized_name)
    {
        info!(namespace, table = table_name, "destination table already exists");
        return Ok(false);
    }

    destination
        .create_table(namespace, table_name, columns)
        .await?;
    info!(
        namespace,
        table = table_name,
        columns = columns.len(),
        "created destination table"
    );

    Ok(true)
}
