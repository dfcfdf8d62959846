use chrono::{Duration, NaiveDate, NaiveDateTime};
use config::shared::{SyncConfig, TableCatalog, TableSpec};
use tokio_postgres::types::Type;

use crate::source::memory::MemorySource;
use crate::types::{Cell, ColumnDescriptor, SourceTypeCode, TableRow};

/// Name of the fixture table.
pub const ORDERS_TABLE: &str = "orders";

/// Returns the timestamp of the first fixture order. Every following order is one second later.
pub fn orders_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Returns the `updated_at` value of order `id`.
pub fn order_updated_at(id: i64) -> NaiveDateTime {
    orders_epoch() + Duration::seconds(id)
}

/// Columns of the fixture table: `id`, `customer`, `amount` and `updated_at`.
pub fn orders_columns() -> Vec<ColumnDescriptor> {
    vec![
        ColumnDescriptor::new("id", SourceTypeCode::Oid(Type::INT8.oid())),
        ColumnDescriptor::new("customer", SourceTypeCode::Oid(Type::VARCHAR.oid())),
        ColumnDescriptor::new("amount", SourceTypeCode::Oid(Type::FLOAT8.oid())),
        ColumnDescriptor::new("updated_at", SourceTypeCode::Oid(Type::TIMESTAMP.oid())),
    ]
}

/// Builds order `id` with a strictly increasing `updated_at`.
pub fn order_row(id: i64) -> TableRow {
    TableRow::new(vec![
        Cell::I64(id),
        Cell::String(format!("customer-{}", id % 7)),
        Cell::F64(id as f64 * 1.5),
        Cell::Timestamp(order_updated_at(id)),
    ])
}

/// Builds orders with ids `from..=to`.
pub fn order_rows(from: i64, to: i64) -> Vec<TableRow> {
    (from..=to).map(order_row).collect()
}

/// Catalog entry of the fixture table.
pub fn orders_spec() -> TableSpec {
    TableSpec {
        table_name: ORDERS_TABLE.to_string(),
        primary_key: vec!["id".to_string()],
        replication_key: "updated_at".to_string(),
    }
}

/// Catalog holding only the fixture table.
pub fn orders_catalog() -> TableCatalog {
    TableCatalog::new(vec![orders_spec()])
}

/// Creates a source holding `count` orders with ids `1..=count`.
pub async fn orders_source(count: i64) -> MemorySource {
    let source = MemorySource::new();
    source
        .create_table(ORDERS_TABLE, orders_columns(), order_rows(1, count))
        .await;

    source
}

/// Sync settings for the whole catalog with the given batch sizes.
pub fn sync_config(batch_query_size: usize, batch_process_size: usize) -> SyncConfig {
    SyncConfig {
        only_tables: None,
        batch_query_size,
        batch_process_size,
    }
}
