//! The sync orchestrator.
//!
//! A [`SyncEngine`] owns one connection to each store and runs sync passes over its table
//! catalog. A pass is a lazy stream of [`SyncEvent`]s: nothing happens until the caller polls it,
//! and no work proceeds while an event is waiting to be consumed.

use std::collections::BTreeMap;
use std::pin::pin;

use async_stream::try_stream;
use config::shared::{SyncConfig, TableCatalog, TableSpec};
use futures::{Stream, TryStreamExt};
use metrics::counter;
use tracing::{info, warn};

use crate::concurrency::cancel::CancelRx;
use crate::destination::Destination;
use crate::error::EtlResult;
use crate::failpoints::{SYNC_BEFORE_CHECKPOINT, etl_fail_point};
use crate::metrics::{ETL_TABLE_TRANSFERS_TOTAL, OUTCOME_LABEL, TABLE_NAME_LABEL, register_metrics};
use crate::replication::transfer::{TransferSettings, TransferStep, transfer_table};
use crate::schema::ensure_namespace;
use crate::source::Source;
use crate::types::{CheckpointEvent, SyncEvent, SyncState};

/// Runs sync passes from a [`Source`] into a [`Destination`].
#[derive(Debug)]
pub struct SyncEngine<S, D> {
    source: S,
    destination: D,
    catalog: TableCatalog,
    namespace: String,
}

impl<S, D> SyncEngine<S, D>
where
    S: Source + Sync,
    D: Destination + Sync,
{
    /// Creates an engine syncing the tables of `catalog` into `namespace`.
    pub fn new(source: S, destination: D, catalog: TableCatalog, namespace: String) -> Self {
        Self {
            source,
            destination,
            catalog,
            namespace,
        }
    }

    pub fn destination(&self) -> &D {
        &self.destination
    }

    /// Runs one sync pass.
    ///
    /// Tables are processed one after the other in catalog order, restricted to
    /// [`SyncConfig::only_tables`] when set. Each table resumes from its cursor in `state`.
    ///
    /// After a table has been read to the end, a [`CheckpointEvent`] with its new cursor is
    /// yielded if at least one row was written. `state` is never modified: the caller persists
    /// checkpoints as they arrive.
    ///
    /// `cancel_rx` is checked before each table, each query and each sub-batch. Once cancelled
    /// the pass yields a final log event and ends without a checkpoint for the table in flight.
    /// The first error ends the pass.
    ///
    /// The engine stays borrowed until the returned stream is dropped, so passes of one engine
    /// never overlap.
    pub fn sync(
        &mut self,
        config: SyncConfig,
        state: SyncState,
        cancel_rx: CancelRx,
    ) -> impl Stream<Item = EtlResult<SyncEvent>> + '_ {
        try_stream! {
            config.validate()?;
            register_metrics();

            let tables = self.selected_tables(&config);
            for unknown in self.unknown_tables(&config) {
                warn!(table = %unknown, "table listed in only_tables is not in the catalog");
                yield SyncEvent::log(format!("Skipping unknown table {unknown}"));
            }

            info!(tables = tables.len(), namespace = %self.namespace, "starting sync pass");
            yield SyncEvent::log(format!("Starting sync of {} tables", tables.len()));

            let settings = TransferSettings {
                namespace: &self.namespace,
                batch_query_size: config.batch_query_size,
                batch_process_size: config.batch_process_size,
            };

            let mut cancelled = cancel_rx.is_cancelled();
            if !cancelled {
                ensure_namespace(&self.destination, &self.namespace).await?;
            }

            for table in tables {
                if cancelled {
                    break;
                }
                if cancel_rx.is_cancelled() {
                    cancelled = true;
                    break;
                }

                let table_name = table.table_name.as_str();
                let cursor = state.cursor(table_name).map(str::to_owned);
                info!(table = table_name, cursor = ?cursor, "syncing table");
                yield SyncEvent::log(match &cursor {
                    Some(cursor) => format!("Syncing table {table_name} from cursor {cursor}"),
                    None => format!("Syncing table {table_name} from the beginning"),
                });

                let mut steps = pin!(transfer_table(
                    &self.source,
                    &self.destination,
                    table,
                    settings.clone(),
                    cursor,
                    &cancel_rx,
                ));

                let mut outcome = None;
                while let Some(step) = steps.try_next().await? {
                    match step {
                        TransferStep::Event(event) => yield event,
                        TransferStep::Completed { cursor, rows_written } => {
                            outcome = Some((cursor, rows_written));
                        }
                        TransferStep::Cancelled => cancelled = true,
                    }
                }

                let Some((cursor, rows_written)) = outcome else {
                    counter!(ETL_TABLE_TRANSFERS_TOTAL, TABLE_NAME_LABEL => table_name.to_owned(), OUTCOME_LABEL => "cancelled")
                        .increment(1);
                    break;
                };

                counter!(ETL_TABLE_TRANSFERS_TOTAL, TABLE_NAME_LABEL => table_name.to_owned(), OUTCOME_LABEL => "completed")
                    .increment(1);

                match cursor {
                    Some(cursor) if rows_written > 0 => {
                        etl_fail_point(SYNC_BEFORE_CHECKPOINT)?;

                        info!(table = table_name, %cursor, rows_written, "table synced");
                        yield SyncEvent::log(format!(
                            "Synced {rows_written} rows of {table_name}, cursor is now {cursor}"
                        ));
                        yield SyncEvent::Checkpoint(CheckpointEvent {
                            table_cursor_updates: BTreeMap::from([(
                                SyncState::cursor_key(table_name),
                                cursor,
                            )]),
                        });
                    }
                    _ => {
                        info!(table = table_name, "table has no new rows");
                        yield SyncEvent::log(format!("No new rows in {table_name}"));
                    }
                }
            }

            if cancelled {
                info!("sync pass cancelled");
                yield SyncEvent::log("Sync cancelled");
            } else {
                info!("sync pass completed");
                yield SyncEvent::log("Sync completed");
            }
        }
    }

    /// Returns the catalog tables selected by `config`, in catalog order.
    fn selected_tables(&self, config: &SyncConfig) -> Vec<&TableSpec> {
        self.catalog
            .tables()
            .iter()
            .filter(|table| config.includes(&table.table_name))
            .collect()
    }

    /// Returns the names in `only_tables` that are missing from the catalog.
    fn unknown_tables(&self, config: &SyncConfig) -> Vec<String> {
        config
            .only_tables
            .iter()
            .flatten()
            .filter(|name| self.catalog.get(name).is_none())
            .cloned()
            .collect()
    }
}
