use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::bail;
use crate::conversions::text::parse_cursor_like;
use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;
use crate::replication::query::ExtractionQuery;
use crate::source::{QueryResult, Source};
use crate::types::{Cell, ColumnDescriptor, TableRow, find_column};

static NULL_CELL: Cell = Cell::Null;

#[derive(Debug, Clone)]
struct MemoryTable {
    columns: Vec<ColumnDescriptor>,
    rows: Vec<TableRow>,
}

#[derive(Debug, Default)]
struct Inner {
    tables: HashMap<String, MemoryTable>,
    executed_queries: Vec<ExtractionQuery>,
    fail_after_queries: Option<usize>,
}

/// In-memory source for tests and local development.
///
/// Evaluates [`ExtractionQuery`]s against tables held in memory with the same semantics as the
/// warehouse: inclusive lower bound on the replication key, ascending order, nulls excluded by
/// the cursor filter and sorted last otherwise, and a row limit.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    inner: Arc<Mutex<Inner>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates or replaces a table.
    pub async fn create_table(
        &self,
        table_name: impl Into<String>,
        columns: Vec<ColumnDescriptor>,
        rows: Vec<TableRow>,
    ) {
        let mut inner = self.inner.lock().await;
        inner
            .tables
            .insert(table_name.into(), MemoryTable { columns, rows });
    }

    /// Appends rows to an existing table.
    pub async fn insert_rows(&self, table_name: &str, rows: Vec<TableRow>) -> EtlResult<()> {
        let mut inner = self.inner.lock().await;
        let Some(table) = inner.tables.get_mut(table_name) else {
            bail!(
                ErrorKind::SourceSchemaError,
                "Source table not found",
                format!("table {table_name}")
            );
        };
        table.rows.extend(rows);

        Ok(())
    }

    /// Returns every query executed so far, in order.
    pub async fn executed_queries(&self) -> Vec<ExtractionQuery> {
        let inner = self.inner.lock().await;
        inner.executed_queries.clone()
    }

    /// Makes every query after the first `queries` ones fail with a connection error.
    pub async fn fail_after_queries(&self, queries: usize) {
        let mut inner = self.inner.lock().await;
        inner.fail_after_queries = Some(queries);
    }
}

/// Orders replication key values ascending with nulls last.
fn compare_keys(a: &Cell, b: &Cell) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp_value(b).unwrap_or(Ordering::Equal),
    }
}

fn matches_cursor(value: &Cell, cursor: &str) -> EtlResult<bool> {
    if value.is_null() {
        return Ok(false);
    }

    let cursor = parse_cursor_like(cursor, value)?;
    Ok(matches!(
        value.partial_cmp_value(&cursor),
        Some(Ordering::Greater | Ordering::Equal)
    ))
}

impl Source for MemorySource {
    fn name() -> &'static str {
        "memory"
    }

    async fn execute(&self, query: &ExtractionQuery) -> EtlResult<QueryResult> {
        let mut inner = self.inner.lock().await;
        inner.executed_queries.push(query.clone());

        if let Some(limit) = inner.fail_after_queries
            && inner.executed_queries.len() > limit
        {
            bail!(
                ErrorKind::SourceConnectionFailed,
                "Source connection failed",
                "memory source configured to fail"
            );
        }

        debug!(query = %query, "executing query on memory source");

        let table = inner.tables.get(&query.table_name).ok_or_else(|| {
            etl_error!(
                ErrorKind::SourceSchemaError,
                "Source table not found",
                format!("table {}", query.table_name)
            )
        })?;

        let key_index = find_column(&table.columns, &query.replication_key).ok_or_else(|| {
            etl_error!(
                ErrorKind::SourceSchemaError,
                "Replication key column not found",
                format!(
                    "column {} of table {}",
                    query.replication_key, query.table_name
                )
            )
        })?;

        let mut rows = Vec::with_capacity(table.rows.len());
        for row in &table.rows {
            let value = row.values().get(key_index).unwrap_or(&NULL_CELL);
            let selected = match &query.cursor {
                Some(cursor) => matches_cursor(value, cursor)?,
                None => true,
            };
            if selected {
                rows.push(row.clone());
            }
        }

        rows.sort_by(|a, b| {
            let a = a.values().get(key_index).unwrap_or(&NULL_CELL);
            let b = b.values().get(key_index).unwrap_or(&NULL_CELL);
            compare_keys(a, b)
        });
        rows.truncate(query.page_size);

        Ok(QueryResult {
            columns: table.columns.clone(),
            rows: futures::stream::iter(rows.into_iter().map(Ok)).boxed(),
        })
    }
}
