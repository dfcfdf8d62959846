use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use async_stream::try_stream;
use config::shared::TableSpec;
use futures::{Stream, TryStreamExt};
use metrics::{counter, histogram};
use tracing::{debug, info};

use crate::concurrency::cancel::CancelRx;
use crate::conversions::text::normalize_cell;
use crate::destination::Destination;
use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;
use crate::failpoints::{
    TRANSFER_AFTER_SUB_BATCH_WRITE, TRANSFER_BEFORE_SUB_BATCH_WRITE, etl_fail_point,
};
use crate::metrics::{
    ETL_BOUNDARY_ROWS_SKIPPED_TOTAL, ETL_ROWS_EXTRACTED_TOTAL, ETL_SUB_BATCH_WRITE_DURATION_SECONDS,
    ETL_SUB_BATCHES_WRITTEN_TOTAL, TABLE_NAME_LABEL,
};
use crate::replication::query::build_query;
use crate::schema::{destination_columns, ensure_table};
use crate::source::Source;
use crate::types::{
    Cell, ColumnDescriptor, Record, SyncEvent, TableRow, UpsertEvent, find_column,
};

/// Primary key of a row, rendered as text.
type RowKey = Vec<Option<String>>;

/// Items produced while transferring one table.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferStep {
    /// An event to forward to the caller of the pass.
    Event(SyncEvent),
    /// The table was read up to the current source tail.
    Completed {
        /// Replication key of the last written row, or the starting cursor if nothing was written.
        cursor: Option<String>,
        rows_written: u64,
    },
    /// Cancellation was observed. Nothing after the last written sub-batch was processed.
    Cancelled,
}

/// Sizes and destination of a table transfer.
#[derive(Debug, Clone)]
pub struct TransferSettings<'a> {
    pub namespace: &'a str,
    pub batch_query_size: usize,
    pub batch_process_size: usize,
}

/// Rows already written whose replication key equals the current cursor.
///
/// The inclusive lower bound of the next query returns them again. They are recognized by primary
/// key and skipped so a page boundary does not write the same rows twice in one pass.
#[derive(Debug, Default)]
struct Boundary {
    value: Option<String>,
    keys: HashSet<RowKey>,
}

impl Boundary {
    fn contains(&self, value: &str, key: &RowKey) -> bool {
        self.value.as_deref() == Some(value) && self.keys.contains(key)
    }

    fn record(&mut self, value: String, key: RowKey) {
        if self.value.as_deref() != Some(value.as_str()) {
            self.keys.clear();
            self.value = Some(value);
        }
        self.keys.insert(key);
    }
}

/// Column positions resolved from a query result.
struct ResultLayout {
    columns: Arc<[String]>,
    replication_key: usize,
    primary_key: Vec<usize>,
}

impl ResultLayout {
    fn resolve(table: &TableSpec, columns: &[ColumnDescriptor]) -> EtlResult<Self> {
        let replication_key = find_column(columns, &table.replication_key).ok_or_else(|| {
            etl_error!(
                ErrorKind::InvalidData,
                "Replication key column missing from query result",
                format!(
                    "column {} of table {}",
                    table.replication_key, table.table_name
                )
            )
        })?;

        let mut primary_key = Vec::with_capacity(table.primary_key.len());
        for column in &table.primary_key {
            let index = find_column(columns, column).ok_or_else(|| {
                etl_error!(
                    ErrorKind::InvalidData,
                    "Primary key column missing from query result",
                    format!("column {column} of table {}", table.table_name)
                )
            })?;
            primary_key.push(index);
        }

        let columns: Arc<[String]> = columns
            .iter()
            .map(|column| column.name.clone())
            .collect::<Vec<_>>()
            .into();

        Ok(ResultLayout {
            columns,
            replication_key,
            primary_key,
        })
    }

    fn row_key(&self, values: &[Cell]) -> RowKey {
        self.primary_key
            .iter()
            .map(|index| values.get(*index).and_then(Cell::to_text))
            .collect()
    }
}

/// Text form of a row's replication key value. `NULL` keys cannot become a cursor.
fn cursor_value(table: &TableSpec, values: &[Cell], index: usize) -> EtlResult<String> {
    values
        .get(index)
        .and_then(Cell::to_text)
        .ok_or_else(|| {
            etl_error!(
                ErrorKind::InvalidData,
                "Replication key value is NULL",
                format!(
                    "column {} of table {}",
                    table.replication_key, table.table_name
                )
            )
        })
}

/// Transfers one table from `cursor` to the current tail of the source.
///
/// Pages of `batch_query_size` rows are requested from the source in replication key order and
/// written in sub-batches of at most `batch_process_size` rows. Before each sub-batch is written
/// one [`UpsertEvent`] per row is yielded. The cursor advances to the replication key of the last
/// row of every written sub-batch. Cancellation is checked before each query and before each
/// sub-batch.
///
/// The destination table is reconciled from the first query's columns, even when it returns no
/// rows.
///
/// Rows already written at the current cursor value are recognized by primary key and skipped
/// when the next page returns them again. If a full page consists only of such rows, which
/// happens as soon as `batch_query_size` or more rows share one replication key value, the
/// transfer fails with [`ErrorKind::InvalidData`].
pub fn transfer_table<'a, S, D>(
    source: &'a S,
    destination: &'a D,
    table: &'a TableSpec,
    settings: TransferSettings<'a>,
    cursor: Option<String>,
    cancel_rx: &'a CancelRx,
) -> impl Stream<Item = EtlResult<TransferStep>> + 'a
where
    S: Source + Sync,
    D: Destination + Sync,
{
    try_stream! {
        let table_name = table.table_name.as_str();
        let destination_table = table.destination_table_name();
        let mut cursor = cursor;
        let mut boundary = Boundary::default();
        let mut rows_written: u64 = 0;
        let mut table_reconciled = false;
        let mut cancelled = false;

        'pages: loop {
            if cancel_rx.is_cancelled() {
                cancelled = true;
                break 'pages;
            }

            let query = build_query(
                table_name,
                &table.replication_key,
                cursor.as_deref(),
                settings.batch_query_size,
            );
            yield TransferStep::Event(SyncEvent::log(format!("Running query: {query}")));

            let result = source.execute(&query).await?;

            if !table_reconciled {
                let columns = destination_columns(&result.columns);
                let created =
                    ensure_table(destination, settings.namespace, &destination_table, &columns)
                        .await?;
                let message = if created {
                    format!("Created destination table {destination_table}")
                } else {
                    format!("Destination table {destination_table} already exists")
                };
                yield TransferStep::Event(SyncEvent::log(message));
                table_reconciled = true;
            }

            let layout = ResultLayout::resolve(table, &result.columns)?;
            let mut rows = result.rows;
            let mut page_rows: usize = 0;
            let mut page_written: usize = 0;
            let mut buffer: Vec<TableRow> = Vec::with_capacity(settings.batch_process_size);
            let mut exhausted = false;

            while !exhausted {
                match rows.try_next().await? {
                    Some(row) => {
                        page_rows += 1;
                        buffer.push(row);
                        if buffer.len() < settings.batch_process_size {
                            continue;
                        }
                    }
                    None => exhausted = true,
                }

                if buffer.is_empty() {
                    continue;
                }

                if cancel_rx.is_cancelled() {
                    cancelled = true;
                    break 'pages;
                }

                counter!(ETL_ROWS_EXTRACTED_TOTAL, TABLE_NAME_LABEL => table_name.to_owned())
                    .increment(buffer.len() as u64);

                let mut records = Vec::with_capacity(buffer.len());
                let mut keys = Vec::with_capacity(buffer.len());
                let mut skipped: u64 = 0;
                for row in buffer.drain(..) {
                    let value = cursor_value(table, row.values(), layout.replication_key)?;
                    let key = layout.row_key(row.values());
                    if boundary.contains(&value, &key) {
                        skipped += 1;
                        continue;
                    }

                    let values = row.into_values().into_iter().map(normalize_cell).collect();
                    records.push(Record::new(layout.columns.clone(), values));
                    keys.push((value, key));
                }

                if skipped > 0 {
                    counter!(ETL_BOUNDARY_ROWS_SKIPPED_TOTAL, TABLE_NAME_LABEL => table_name.to_owned())
                        .increment(skipped);
                    debug!(table = table_name, skipped, "skipped rows already written at the page boundary");
                }

                if records.is_empty() {
                    continue;
                }

                for record in &records {
                    yield TransferStep::Event(SyncEvent::Upsert(UpsertEvent {
                        table_name: table_name.to_owned(),
                        record: record.clone(),
                    }));
                }

                etl_fail_point(TRANSFER_BEFORE_SUB_BATCH_WRITE)?;

                let written = records.len();
                let started = Instant::now();
                destination
                    .bulk_insert(
                        settings.namespace,
                        &destination_table,
                        &table.primary_key,
                        records,
                    )
                    .await?;
                histogram!(ETL_SUB_BATCH_WRITE_DURATION_SECONDS, TABLE_NAME_LABEL => table_name.to_owned())
                    .record(started.elapsed().as_secs_f64());
                counter!(ETL_SUB_BATCHES_WRITTEN_TOTAL, TABLE_NAME_LABEL => table_name.to_owned())
                    .increment(1);

                etl_fail_point(TRANSFER_AFTER_SUB_BATCH_WRITE)?;

                for (value, key) in keys {
                    boundary.record(value, key);
                }
                cursor = boundary.value.clone();
                rows_written += written as u64;
                page_written += written;

                yield TransferStep::Event(SyncEvent::log(format!(
                    "Wrote {written} rows to {destination_table}"
                )));
            }

            if page_rows < settings.batch_query_size {
                info!(table = table_name, rows_written, "table transfer completed");
                break 'pages;
            }

            if page_written == 0 {
                Err::<(), _>(etl_error!(
                    ErrorKind::InvalidData,
                    "Extraction cannot progress past a replication key value",
                    format!(
                        "table {table_name}: every row of a full page of {} rows has {} = {}",
                        settings.batch_query_size,
                        table.replication_key,
                        cursor.as_deref().unwrap_or("NULL")
                    )
                ))?;
            }
        }

        if cancelled {
            info!(table = table_name, rows_written, "table transfer cancelled");
            yield TransferStep::Cancelled;
        } else {
            yield TransferStep::Completed { cursor, rows_written };
        }
    }
}
