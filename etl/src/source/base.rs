use std::fmt;
use std::future::Future;

use futures::stream::BoxStream;

use crate::error::EtlResult;
use crate::replication::query::ExtractionQuery;
use crate::types::{ColumnDescriptor, TableRow};

/// Result of an extraction query.
///
/// The columns are known as soon as the query has been described by the source, before any row
/// is read. Rows are streamed in the order produced by the query and hold one [`crate::types::Cell`]
/// per column.
pub struct QueryResult {
    pub columns: Vec<ColumnDescriptor>,
    pub rows: BoxStream<'static, EtlResult<TableRow>>,
}

impl fmt::Debug for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryResult")
            .field("columns", &self.columns)
            .finish_non_exhaustive()
    }
}

/// Trait for warehouses that rows are extracted from.
///
/// A [`Source`] executes read-only [`ExtractionQuery`]s. Each call runs independently so the
/// engine can observe cancellation between queries.
pub trait Source {
    /// Returns the name of the source.
    fn name() -> &'static str;

    /// Executes an extraction query.
    ///
    /// Errors raised while describing or running the query are returned directly. Errors raised
    /// while reading rows are yielded by [`QueryResult::rows`].
    fn execute(
        &self,
        query: &ExtractionQuery,
    ) -> impl Future<Output = EtlResult<QueryResult>> + Send;
}
