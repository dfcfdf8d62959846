use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::bail;
use crate::destination::{ColumnSchema, Destination};
use crate::error::{ErrorKind, EtlResult};
use crate::types::Record;

#[derive(Debug, Clone)]
struct MemoryTable {
    columns: Vec<ColumnSchema>,
    rows: BTreeMap<Vec<Option<String>>, Record>,
}

#[derive(Debug, Default)]
struct Inner {
    namespaces: BTreeSet<String>,
    tables: BTreeMap<(String, String), MemoryTable>,
}

/// Normalizes an identifier the way the destination warehouse does.
fn normalize_identifier(identifier: &str) -> String {
    identifier.to_uppercase()
}

/// In-memory destination for testing and development purposes.
///
/// [`MemoryDestination`] keeps tables in memory with upsert semantics on the primary key, so
/// tests can assert on the final row set of a table regardless of how often rows were delivered.
/// Identifiers are upper-cased like in the warehouse. All data is lost when the process
/// terminates.
#[derive(Debug, Clone, Default)]
pub struct MemoryDestination {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryDestination {
    /// Creates a new empty memory destination.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the namespaces created so far.
    pub async fn namespaces(&self) -> Vec<String> {
        let inner = self.inner.lock().await;
        inner.namespaces.iter().cloned().collect()
    }

    /// Returns the columns of a table, if it exists.
    pub async fn table_columns(
        &self,
        namespace: &str,
        table_name: &str,
    ) -> Option<Vec<ColumnSchema>> {
        let inner = self.inner.lock().await;
        inner
            .tables
            .get(&(normalize_identifier(namespace), normalize_identifier(table_name)))
            .map(|table| table.columns.clone())
    }

    /// Returns the rows of a table ordered by primary key, or an empty list if the table is
    /// missing.
    pub async fn table_rows(&self, namespace: &str, table_name: &str) -> Vec<Record> {
        let inner = self.inner.lock().await;
        inner
            .tables
            .get(&(normalize_identifier(namespace), normalize_identifier(table_name)))
            .map(|table| table.rows.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Clears all namespaces and tables.
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.namespaces.clear();
        inner.tables.clear();
    }
}

impl Destination for MemoryDestination {
    fn name() -> &'static str {
        "memory"
    }

    async fn create_namespace_if_missing(&self, namespace: &str) -> EtlResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.namespaces.insert(normalize_identifier(namespace)) {
            info!(namespace, "created namespace in memory destination");
        }

        Ok(())
    }

    async fn list_tables(&self, namespace: &str) -> EtlResult<Vec<String>> {
        let inner = self.inner.lock().await;
        let namespace = normalize_identifier(namespace);

        Ok(inner
            .tables
            .keys()
            .filter(|(table_namespace, _)| *table_namespace == namespace)
            .map(|(_, table_name)| table_name.clone())
            .collect())
    }

    async fn create_table(
        &self,
        namespace: &str,
        table_name: &str,
        columns: &[ColumnSchema],
    ) -> EtlResult<()> {
        let mut inner = self.inner.lock().await;
        let namespace = normalize_identifier(namespace);
        let table_name = normalize_identifier(table_name);

        if !inner.namespaces.contains(&namespace) {
            bail!(
                ErrorKind::DestinationSchemaError,
                "Destination namespace does not exist",
                format!("namespace {namespace}")
            );
        }

        let key = (namespace, table_name);
        if inner.tables.contains_key(&key) {
            bail!(
                ErrorKind::DestinationSchemaError,
                "Destination table already exists",
                format!("table {}.{}", key.0, key.1)
            );
        }

        let columns = columns
            .iter()
            .map(|column| ColumnSchema::new(normalize_identifier(&column.name), column.destination_type))
            .collect();
        info!(namespace = %key.0, table = %key.1, "created table in memory destination");
        inner.tables.insert(
            key,
            MemoryTable {
                columns,
                rows: BTreeMap::new(),
            },
        );

        Ok(())
    }

    async fn bulk_insert(
        &self,
        namespace: &str,
        table_name: &str,
        primary_key: &[String],
        records: Vec<Record>,
    ) -> EtlResult<()> {
        let mut inner = self.inner.lock().await;
        let key = (normalize_identifier(namespace), normalize_identifier(table_name));

        let Some(table) = inner.tables.get_mut(&key) else {
            bail!(
                ErrorKind::DestinationSchemaError,
                "Destination table does not exist",
                format!("table {}.{}", key.0, key.1)
            );
        };

        debug!(table = %key.1, records = records.len(), "writing records to memory destination");

        for record in records {
            let mut row_key = Vec::with_capacity(primary_key.len());
            for column in primary_key {
                let Some(value) = record.get(column) else {
                    bail!(
                        ErrorKind::InvalidData,
                        "Record is missing a primary key column",
                        format!("column {column} of table {}", key.1)
                    );
                };
                row_key.push(value.to_text());
            }
            table.rows.insert(row_key, record);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversions::type_mapper::DestinationType;
    use crate::types::Cell;

    fn record(id: i64, note: &str) -> Record {
        let columns: Arc<[String]> = vec!["id".to_string(), "note".to_string()].into();
        Record::new(columns, vec![Cell::I64(id), Cell::String(note.to_string())])
    }

    #[tokio::test]
    async fn bulk_insert_upserts_by_primary_key() {
        let destination = MemoryDestination::new();
        destination.create_namespace_if_missing("public").await.unwrap();
        destination
            .create_table(
                "public",
                "notes",
                &[
                    ColumnSchema::new("id", DestinationType::Number),
                    ColumnSchema::new("note", DestinationType::Varchar),
                ],
            )
            .await
            .unwrap();

        let primary_key = vec!["id".to_string()];
        destination
            .bulk_insert("public", "notes", &primary_key, vec![record(1, "a"), record(2, "b")])
            .await
            .unwrap();
        destination
            .bulk_insert("PUBLIC", "NOTES", &primary_key, vec![record(1, "c")])
            .await
            .unwrap();

        let rows = destination.table_rows("public", "notes").await;
        assert_eq!(rows, vec![record(1, "c"), record(2, "b")]);
        assert_eq!(
            destination.list_tables("public").await.unwrap(),
            vec!["NOTES".to_string()]
        );
    }

    #[tokio::test]
    async fn create_table_requires_namespace() {
        let destination = MemoryDestination::new();

        let err = destination
            .create_table("missing", "notes", &[])
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DestinationSchemaError);
    }

    #[tokio::test]
    async fn existing_table_is_not_recreated() {
        let destination = MemoryDestination::new();
        destination.create_namespace_if_missing("public").await.unwrap();
        destination.create_table("public", "notes", &[]).await.unwrap();

        let err = destination
            .create_table("public", "Notes", &[])
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DestinationSchemaError);
    }
}
