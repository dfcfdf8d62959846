use std::sync::Arc;

use tokio::sync::RwLock;

use crate::bail;
use crate::destination::{ColumnSchema, Destination};
use crate::error::{ErrorKind, EtlResult};
use crate::types::Record;

/// A `bulk_insert` call observed by the wrapper.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkInsertCall {
    pub namespace: String,
    pub table_name: String,
    pub primary_key: Vec<String>,
    pub records: Vec<Record>,
}

#[derive(Debug)]
struct Inner<D> {
    wrapped_destination: D,
    created_namespaces: Vec<String>,
    created_tables: Vec<(String, Vec<ColumnSchema>)>,
    bulk_inserts: Vec<BulkInsertCall>,
    fail_bulk_insert_at: Option<usize>,
    bulk_insert_attempts: usize,
    shutdown_called: bool,
}

/// Test wrapper for [`Destination`] implementations that tracks all operations.
///
/// [`TestDestinationWrapper`] forwards every call to the wrapped destination and records the
/// DDL and the sub-batches flowing through it, so tests can assert on write sizes and ordering.
/// Only successful writes are recorded.
#[derive(Debug, Clone)]
pub struct TestDestinationWrapper<D> {
    inner: Arc<RwLock<Inner<D>>>,
}

impl<D> TestDestinationWrapper<D> {
    /// Creates a new test wrapper around any destination implementation.
    pub fn wrap(destination: D) -> Self {
        let inner = Inner {
            wrapped_destination: destination,
            created_namespaces: Vec::new(),
            created_tables: Vec::new(),
            bulk_inserts: Vec::new(),
            fail_bulk_insert_at: None,
            bulk_insert_attempts: 0,
            shutdown_called: false,
        };

        Self {
            inner: Arc::new(RwLock::new(inner)),
        }
    }

    /// Makes the `attempt`-th `bulk_insert` call (1-based) fail with a query error.
    pub async fn fail_bulk_insert_at(&self, attempt: usize) {
        self.inner.write().await.fail_bulk_insert_at = Some(attempt);
    }

    pub async fn created_namespaces(&self) -> Vec<String> {
        self.inner.read().await.created_namespaces.clone()
    }

    /// Returns the tables created so far with their columns.
    pub async fn created_tables(&self) -> Vec<(String, Vec<ColumnSchema>)> {
        self.inner.read().await.created_tables.clone()
    }

    pub async fn bulk_inserts(&self) -> Vec<BulkInsertCall> {
        self.inner.read().await.bulk_inserts.clone()
    }

    /// Returns the number of records of every successful `bulk_insert` call, in order.
    pub async fn bulk_insert_sizes(&self) -> Vec<usize> {
        self.inner
            .read()
            .await
            .bulk_inserts
            .iter()
            .map(|call| call.records.len())
            .collect()
    }

    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.created_namespaces.clear();
        inner.created_tables.clear();
        inner.bulk_inserts.clear();
        inner.bulk_insert_attempts = 0;
    }

    /// Returns whether the shutdown method was called on the destination.
    pub async fn shutdown_called(&self) -> bool {
        self.inner.read().await.shutdown_called
    }
}

impl<D> Destination for TestDestinationWrapper<D>
where
    D: Destination + Send + Sync + Clone,
{
    fn name() -> &'static str {
        "wrapper"
    }

    async fn shutdown(&self) -> EtlResult<()> {
        let destination = self.inner.read().await.wrapped_destination.clone();

        let result = destination.shutdown().await;
        self.inner.write().await.shutdown_called = true;

        result
    }

    async fn create_namespace_if_missing(&self, namespace: &str) -> EtlResult<()> {
        let destination = self.inner.read().await.wrapped_destination.clone();

        let result = destination.create_namespace_if_missing(namespace).await;
        if result.is_ok() {
            self.inner
                .write()
                .await
                .created_namespaces
                .push(namespace.to_owned());
        }

        result
    }

    async fn list_tables(&self, namespace: &str) -> EtlResult<Vec<String>> {
        let destination = self.inner.read().await.wrapped_destination.clone();

        destination.list_tables(namespace).await
    }

    async fn create_table(
        &self,
        namespace: &str,
        table_name: &str,
        columns: &[ColumnSchema],
    ) -> EtlResult<()> {
        let destination = self.inner.read().await.wrapped_destination.clone();

        let result = destination.create_table(namespace, table_name, columns).await;
        if result.is_ok() {
            self.inner
                .write()
                .await
                .created_tables
                .push((table_name.to_owned(), columns.to_vec()));
        }

        result
    }

    async fn bulk_insert(
        &self,
        namespace: &str,
        table_name: &str,
        primary_key: &[String],
        records: Vec<Record>,
    ) -> EtlResult<()> {
        let destination = {
            let mut inner = self.inner.write().await;
            inner.bulk_insert_attempts += 1;
            if inner.fail_bulk_insert_at == Some(inner.bulk_insert_attempts) {
                bail!(
                    ErrorKind::DestinationQueryFailed,
                    "Destination bulk insert failed",
                    format!("injected failure on call {}", inner.bulk_insert_attempts)
                );
            }
            inner.wrapped_destination.clone()
        };

        let result = destination
            .bulk_insert(namespace, table_name, primary_key, records.clone())
            .await;

        if result.is_ok() {
            self.inner.write().await.bulk_inserts.push(BulkInsertCall {
                namespace: namespace.to_owned(),
                table_name: table_name.to_owned(),
                primary_key: primary_key.to_vec(),
                records,
            });
        }

        result
    }
}
