use etl::concurrency::cancel::CancelRx;
use etl::destination::memory::MemoryDestination;
use etl::error::ErrorKind;
use etl::failpoints::{
    SYNC_BEFORE_CHECKPOINT, TRANSFER_AFTER_SUB_BATCH_WRITE, TRANSFER_BEFORE_SUB_BATCH_WRITE,
};
use etl::sync::SyncEngine;
use etl::test_utils::event::{
    apply_checkpoints, checkpoints, collect_events, collect_events_until_error, upserts,
};
use etl::test_utils::failpoints::CustomFailScenario;
use etl::test_utils::fixtures::{ORDERS_TABLE, orders_catalog, orders_source, sync_config};
use etl::test_utils::test_destination_wrapper::TestDestinationWrapper;
use etl::types::SyncState;
use telemetry::init_test_tracing;

const NAMESPACE: &str = "analytics";

#[tokio::test(flavor = "multi_thread")]
async fn crash_before_checkpoint_redelivers_rows_on_the_next_pass() {
    init_test_tracing();
    let source = orders_source(30).await;
    let destination = MemoryDestination::new();
    let mut engine = SyncEngine::new(
        source,
        destination.clone(),
        orders_catalog(),
        NAMESPACE.to_string(),
    );

    let mut state = SyncState::new();
    {
        let _scenario = CustomFailScenario::setup(&[(SYNC_BEFORE_CHECKPOINT, "return")]);

        let (events, err) = collect_events_until_error(engine.sync(
            sync_config(100, 10),
            state.clone(),
            CancelRx::never(),
        ))
        .await;

        assert_eq!(err.kind(), ErrorKind::WithFailpoint);
        assert_eq!(upserts(&events).len(), 30);
        assert!(checkpoints(&events).is_empty());
        apply_checkpoints(&mut state, &events);
    }

    // Nothing was committed, so the next pass starts from the beginning again.
    let events = collect_events(engine.sync(
        sync_config(100, 10),
        state.clone(),
        CancelRx::never(),
    ))
    .await
    .unwrap();
    apply_checkpoints(&mut state, &events);

    assert_eq!(upserts(&events).len(), 30);
    assert_eq!(state.cursor(ORDERS_TABLE), Some("2024-01-01T00:00:30Z"));
    assert_eq!(destination.table_rows(NAMESPACE, ORDERS_TABLE).await.len(), 30);
}

#[tokio::test(flavor = "multi_thread")]
async fn failure_after_a_write_keeps_written_rows_and_no_checkpoint() {
    init_test_tracing();
    let source = orders_source(30).await;
    let destination = TestDestinationWrapper::wrap(MemoryDestination::new());
    let destination_view = destination.clone();
    let mut engine = SyncEngine::new(
        source,
        destination,
        orders_catalog(),
        NAMESPACE.to_string(),
    );

    let _scenario =
        CustomFailScenario::setup(&[(TRANSFER_AFTER_SUB_BATCH_WRITE, "1*off->return")]);

    let (events, err) = collect_events_until_error(engine.sync(
        sync_config(100, 10),
        SyncState::new(),
        CancelRx::never(),
    ))
    .await;

    assert_eq!(err.kind(), ErrorKind::WithFailpoint);
    assert_eq!(destination_view.bulk_insert_sizes().await, vec![10, 10]);
    assert_eq!(upserts(&events).len(), 20);
    assert!(checkpoints(&events).is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn failure_before_a_write_leaves_the_destination_untouched() {
    init_test_tracing();
    let source = orders_source(5).await;
    let destination = TestDestinationWrapper::wrap(MemoryDestination::new());
    let destination_view = destination.clone();
    let mut engine = SyncEngine::new(
        source,
        destination,
        orders_catalog(),
        NAMESPACE.to_string(),
    );

    let _scenario = CustomFailScenario::setup(&[(TRANSFER_BEFORE_SUB_BATCH_WRITE, "return")]);

    let (events, err) = collect_events_until_error(engine.sync(
        sync_config(100, 10),
        SyncState::new(),
        CancelRx::never(),
    ))
    .await;

    assert_eq!(err.kind(), ErrorKind::WithFailpoint);
    assert!(destination_view.bulk_insert_sizes().await.is_empty());
    assert_eq!(destination_view.created_tables().await.len(), 1);
    // Upserts of the failed sub-batch were already yielded.
    assert_eq!(upserts(&events).len(), 5);
}
