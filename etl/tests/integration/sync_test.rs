use etl::concurrency::cancel::{CancelRx, create_cancel_channel};
use etl::destination::memory::MemoryDestination;
use etl::error::ErrorKind;
use etl::sync::SyncEngine;
use etl::test_utils::event::{
    apply_checkpoints, checkpoints, collect_events, collect_events_until_error, log_messages,
    upserts,
};
use etl::test_utils::fixtures::{
    ORDERS_TABLE, order_rows, order_updated_at, orders_catalog, orders_columns, orders_source,
    orders_spec, sync_config,
};
use etl::test_utils::test_destination_wrapper::TestDestinationWrapper;
use etl::types::{Cell, SyncEvent, SyncState};
use config::shared::{SyncConfig, TableCatalog, TableSpec};
use futures::TryStreamExt;
use telemetry::init_test_tracing;

const NAMESPACE: &str = "analytics";

fn cursor_text(id: i64) -> String {
    order_updated_at(id).format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[tokio::test(flavor = "multi_thread")]
async fn first_sync_transfers_all_rows_in_sub_batches() {
    init_test_tracing();
    let source = orders_source(1200).await;
    let destination = TestDestinationWrapper::wrap(MemoryDestination::new());
    let destination_view = destination.clone();

    let mut engine = SyncEngine::new(
        source.clone(),
        destination,
        orders_catalog(),
        NAMESPACE.to_string(),
    );
    let events = collect_events(engine.sync(
        sync_config(1000, 500),
        SyncState::new(),
        CancelRx::never(),
    ))
    .await
    .unwrap();

    // The second query starts at the last written key, so it returns row 1000 again.
    let queries = source.executed_queries().await;
    assert_eq!(queries.len(), 2);
    assert_eq!(queries[0].cursor, None);
    assert_eq!(queries[1].cursor, Some(cursor_text(1000)));

    assert_eq!(
        destination_view.bulk_insert_sizes().await,
        vec![500, 500, 200]
    );
    assert_eq!(upserts(&events).len(), 1200);

    let checkpoints = checkpoints(&events);
    assert_eq!(checkpoints.len(), 1);
    assert_eq!(
        checkpoints[0].table_cursor_updates.get("orders_cursor"),
        Some(&cursor_text(1200))
    );

    let created_tables = destination_view.created_tables().await;
    assert_eq!(created_tables.len(), 1);
    assert_eq!(created_tables[0].0, ORDERS_TABLE);
    assert_eq!(created_tables[0].1.len(), orders_columns().len());

    let messages = log_messages(&events);
    assert_eq!(messages.first(), Some(&"Starting sync of 1 tables"));
    assert_eq!(messages.last(), Some(&"Sync completed"));
}

#[tokio::test(flavor = "multi_thread")]
async fn upserts_precede_their_sub_batch_write_and_checkpoint_comes_last() {
    init_test_tracing();
    let source = orders_source(25).await;
    let destination = MemoryDestination::new();

    let mut engine = SyncEngine::new(
        source,
        destination.clone(),
        orders_catalog(),
        NAMESPACE.to_string(),
    );
    let events = collect_events(engine.sync(
        sync_config(100, 10),
        SyncState::new(),
        CancelRx::never(),
    ))
    .await
    .unwrap();

    let mut upserts_since_write = 0;
    let mut writes = Vec::new();
    for event in &events {
        match event {
            SyncEvent::Upsert(_) => upserts_since_write += 1,
            SyncEvent::Log(log) if log.message.starts_with("Wrote ") => {
                writes.push(upserts_since_write);
                upserts_since_write = 0;
            }
            _ => {}
        }
    }
    assert_eq!(writes, vec![10, 10, 5]);

    let checkpoint_position = events
        .iter()
        .position(|event| matches!(event, SyncEvent::Checkpoint(_)))
        .unwrap();
    let last_upsert_position = events
        .iter()
        .rposition(|event| matches!(event, SyncEvent::Upsert(_)))
        .unwrap();
    assert!(checkpoint_position > last_upsert_position);

    let rows = destination.table_rows(NAMESPACE, ORDERS_TABLE).await;
    assert_eq!(rows.len(), 25);
    assert_eq!(
        rows[0].get("updated_at"),
        Some(&Cell::String(cursor_text(1)))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn resumed_sync_without_new_rows_only_rewrites_the_boundary_row() {
    init_test_tracing();
    let source = orders_source(30).await;
    let destination = TestDestinationWrapper::wrap(MemoryDestination::new());
    let destination_view = destination.clone();

    let mut state = SyncState::new();
    state.set_cursor(ORDERS_TABLE, cursor_text(30));

    let mut engine = SyncEngine::new(
        source.clone(),
        destination,
        orders_catalog(),
        NAMESPACE.to_string(),
    );
    let events = collect_events(engine.sync(sync_config(100, 10), state, CancelRx::never()))
        .await
        .unwrap();

    // The inclusive lower bound returns the row at the cursor. It is rewritten as an upsert.
    assert_eq!(destination_view.bulk_insert_sizes().await, vec![1]);
    assert_eq!(
        checkpoints(&events)[0].table_cursor_updates.get("orders_cursor"),
        Some(&cursor_text(30))
    );
    assert_eq!(source.executed_queries().await.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_table_creates_destination_table_without_writes_or_checkpoint() {
    init_test_tracing();
    let source = orders_source(0).await;
    let destination = TestDestinationWrapper::wrap(MemoryDestination::new());
    let destination_view = destination.clone();

    let mut engine = SyncEngine::new(
        source,
        destination,
        orders_catalog(),
        NAMESPACE.to_string(),
    );
    let events = collect_events(engine.sync(
        sync_config(100, 10),
        SyncState::new(),
        CancelRx::never(),
    ))
    .await
    .unwrap();

    assert!(destination_view.bulk_insert_sizes().await.is_empty());
    assert_eq!(destination_view.created_tables().await.len(), 1);
    assert!(checkpoints(&events).is_empty());
    assert!(log_messages(&events).contains(&"No new rows in orders"));
}

#[tokio::test(flavor = "multi_thread")]
async fn prior_cursor_without_matching_rows_writes_nothing() {
    init_test_tracing();
    let source = orders_source(0).await;
    let destination = TestDestinationWrapper::wrap(MemoryDestination::new());
    let destination_view = destination.clone();

    let mut state = SyncState::new();
    state.set_cursor(ORDERS_TABLE, "2024-01-01T00:00:00Z");

    let mut engine = SyncEngine::new(
        source.clone(),
        destination,
        orders_catalog(),
        NAMESPACE.to_string(),
    );
    let events = collect_events(engine.sync(sync_config(1000, 500), state, CancelRx::never()))
        .await
        .unwrap();

    assert!(upserts(&events).is_empty());
    assert!(checkpoints(&events).is_empty());
    assert!(destination_view.bulk_insert_sizes().await.is_empty());
    assert_eq!(destination_view.created_tables().await.len(), 1);
    assert!(log_messages(&events).contains(&"No new rows in orders"));

    let queries = source.executed_queries().await;
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].cursor.as_deref(), Some("2024-01-01T00:00:00Z"));
}

#[tokio::test(flavor = "multi_thread")]
async fn rerunning_with_persisted_state_is_idempotent() {
    init_test_tracing();
    let source = orders_source(50).await;
    let destination = MemoryDestination::new();

    let mut engine = SyncEngine::new(
        source.clone(),
        destination.clone(),
        orders_catalog(),
        NAMESPACE.to_string(),
    );

    let mut state = SyncState::new();
    let events = collect_events(engine.sync(
        sync_config(20, 5),
        state.clone(),
        CancelRx::never(),
    ))
    .await
    .unwrap();
    apply_checkpoints(&mut state, &events);
    assert_eq!(state.cursor(ORDERS_TABLE), Some(cursor_text(50).as_str()));

    source
        .insert_rows(ORDERS_TABLE, order_rows(51, 60))
        .await
        .unwrap();

    let events = collect_events(engine.sync(
        sync_config(20, 5),
        state.clone(),
        CancelRx::never(),
    ))
    .await
    .unwrap();
    apply_checkpoints(&mut state, &events);

    // Row 50 sits at the cursor and is delivered again with the 10 new rows.
    assert_eq!(upserts(&events).len(), 11);
    assert_eq!(state.cursor(ORDERS_TABLE), Some(cursor_text(60).as_str()));
    assert_eq!(destination.table_rows(NAMESPACE, ORDERS_TABLE).await.len(), 60);
}

#[tokio::test(flavor = "multi_thread")]
async fn cancellation_between_sub_batches_stops_without_checkpoint() {
    init_test_tracing();
    let source = orders_source(100).await;
    let destination = TestDestinationWrapper::wrap(MemoryDestination::new());
    let destination_view = destination.clone();
    let (cancel_tx, cancel_rx) = create_cancel_channel();

    let mut engine = SyncEngine::new(
        source,
        destination,
        orders_catalog(),
        NAMESPACE.to_string(),
    );

    let mut events = Vec::new();
    {
        let mut stream = std::pin::pin!(engine.sync(
            sync_config(100, 10),
            SyncState::new(),
            cancel_rx
        ));
        while let Some(event) = stream.try_next().await.unwrap() {
            if let SyncEvent::Log(log) = &event
                && log.message.starts_with("Wrote ")
            {
                cancel_tx.cancel();
            }
            events.push(event);
        }
    }

    assert_eq!(destination_view.bulk_insert_sizes().await, vec![10]);
    assert!(checkpoints(&events).is_empty());
    assert_eq!(log_messages(&events).last(), Some(&"Sync cancelled"));
}

#[tokio::test(flavor = "multi_thread")]
async fn cancellation_before_the_pass_does_no_work() {
    init_test_tracing();
    let source = orders_source(10).await;
    let destination = TestDestinationWrapper::wrap(MemoryDestination::new());
    let destination_view = destination.clone();
    let (cancel_tx, cancel_rx) = create_cancel_channel();
    cancel_tx.cancel();

    let mut engine = SyncEngine::new(
        source.clone(),
        destination,
        orders_catalog(),
        NAMESPACE.to_string(),
    );
    let events = collect_events(engine.sync(sync_config(100, 10), SyncState::new(), cancel_rx))
        .await
        .unwrap();

    assert!(source.executed_queries().await.is_empty());
    assert!(destination_view.created_namespaces().await.is_empty());
    assert_eq!(log_messages(&events).last(), Some(&"Sync cancelled"));
}

#[tokio::test(flavor = "multi_thread")]
async fn only_tables_restricts_the_pass() {
    init_test_tracing();
    let source = orders_source(5).await;
    source
        .create_table("customers", orders_columns(), order_rows(1, 3))
        .await;
    let catalog = TableCatalog::new(vec![
        orders_spec(),
        TableSpec {
            table_name: "customers".to_string(),
            primary_key: vec!["id".to_string()],
            replication_key: "id".to_string(),
        },
    ]);
    let destination = MemoryDestination::new();

    let mut engine = SyncEngine::new(source, destination.clone(), catalog, NAMESPACE.to_string());
    let config = SyncConfig {
        only_tables: Some(vec!["customers".to_string(), "unknown".to_string()]),
        ..sync_config(100, 10)
    };
    let events = collect_events(engine.sync(config, SyncState::new(), CancelRx::never()))
        .await
        .unwrap();

    assert!(destination.table_rows(NAMESPACE, ORDERS_TABLE).await.is_empty());
    assert_eq!(destination.table_rows(NAMESPACE, "customers").await.len(), 3);
    assert!(log_messages(&events).contains(&"Skipping unknown table unknown"));

    let checkpoints = checkpoints(&events);
    assert_eq!(checkpoints.len(), 1);
    assert_eq!(
        checkpoints[0].table_cursor_updates.get("customers_cursor"),
        Some(&"3".to_string())
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn destination_failure_ends_the_pass_without_checkpoint() {
    init_test_tracing();
    let source = orders_source(30).await;
    let destination = TestDestinationWrapper::wrap(MemoryDestination::new());
    destination.fail_bulk_insert_at(2).await;
    let destination_view = destination.clone();

    let mut engine = SyncEngine::new(
        source,
        destination,
        orders_catalog(),
        NAMESPACE.to_string(),
    );
    let (events, err) = collect_events_until_error(engine.sync(
        sync_config(100, 10),
        SyncState::new(),
        CancelRx::never(),
    ))
    .await;

    assert_eq!(err.kind(), ErrorKind::DestinationQueryFailed);
    assert_eq!(destination_view.bulk_insert_sizes().await, vec![10]);
    assert!(checkpoints(&events).is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn source_failure_ends_the_pass() {
    init_test_tracing();
    let source = orders_source(30).await;
    source.fail_after_queries(1).await;
    let destination = MemoryDestination::new();

    let mut engine = SyncEngine::new(
        source,
        destination,
        orders_catalog(),
        NAMESPACE.to_string(),
    );
    let (events, err) = collect_events_until_error(engine.sync(
        sync_config(10, 10),
        SyncState::new(),
        CancelRx::never(),
    ))
    .await;

    assert_eq!(err.kind(), ErrorKind::SourceConnectionFailed);
    assert_eq!(upserts(&events).len(), 10);
    assert!(checkpoints(&events).is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn full_page_of_identical_keys_is_rejected() {
    init_test_tracing();
    let source = orders_source(0).await;
    let rows = (1..=4)
        .map(|id| {
            etl::types::TableRow::new(vec![
                Cell::I64(id),
                Cell::String("same".to_string()),
                Cell::F64(1.0),
                Cell::Timestamp(order_updated_at(1)),
            ])
        })
        .collect();
    source.insert_rows(ORDERS_TABLE, rows).await.unwrap();

    let mut engine = SyncEngine::new(
        source,
        MemoryDestination::new(),
        orders_catalog(),
        NAMESPACE.to_string(),
    );
    let (_, err) = collect_events_until_error(engine.sync(
        sync_config(2, 2),
        SyncState::new(),
        CancelRx::never(),
    ))
    .await;

    assert_eq!(err.kind(), ErrorKind::InvalidData);
}

#[tokio::test(flavor = "multi_thread")]
async fn run_of_identical_keys_as_long_as_a_page_is_rejected() {
    init_test_tracing();
    let source = orders_source(0).await;
    let rows = [(1, 1), (2, 2), (3, 2), (4, 2), (5, 3)]
        .into_iter()
        .map(|(id, second)| {
            etl::types::TableRow::new(vec![
                Cell::I64(id),
                Cell::String(format!("customer-{id}")),
                Cell::F64(1.0),
                Cell::Timestamp(order_updated_at(second)),
            ])
        })
        .collect();
    source.insert_rows(ORDERS_TABLE, rows).await.unwrap();
    let destination = TestDestinationWrapper::wrap(MemoryDestination::new());
    let destination_view = destination.clone();

    let mut engine = SyncEngine::new(
        source,
        destination,
        orders_catalog(),
        NAMESPACE.to_string(),
    );
    let (events, err) = collect_events_until_error(engine.sync(
        sync_config(3, 3),
        SyncState::new(),
        CancelRx::never(),
    ))
    .await;

    assert_eq!(err.kind(), ErrorKind::InvalidData);
    // Rows up to the last id sharing the repeated key were written before the stall.
    assert_eq!(destination_view.bulk_insert_sizes().await, vec![3, 1]);
    assert_eq!(upserts(&events).len(), 4);
}
