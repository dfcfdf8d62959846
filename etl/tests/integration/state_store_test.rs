use etl::concurrency::cancel::CancelRx;
use etl::destination::memory::MemoryDestination;
use etl::state::store::StateStore;
use etl::state::store::file::FileStateStore;
use etl::sync::SyncEngine;
use etl::test_utils::fixtures::{ORDERS_TABLE, order_rows, orders_catalog, orders_source, sync_config};
use etl::types::SyncEvent;
use futures::TryStreamExt;
use telemetry::init_test_tracing;

#[tokio::test(flavor = "multi_thread")]
async fn checkpoints_persisted_while_streaming_resume_the_next_pass() {
    init_test_tracing();
    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("state.json");
    let source = orders_source(15).await;
    let destination = MemoryDestination::new();

    let mut engine = SyncEngine::new(
        source.clone(),
        destination.clone(),
        orders_catalog(),
        "analytics".to_string(),
    );

    let store = FileStateStore::new(&state_path);
    let state = store.load_state().await.unwrap();
    {
        let mut events =
            std::pin::pin!(engine.sync(sync_config(10, 5), state, CancelRx::never()));
        while let Some(event) = events.try_next().await.unwrap() {
            if let SyncEvent::Checkpoint(checkpoint) = &event {
                store.apply_checkpoint(checkpoint).await.unwrap();
            }
        }
    }

    source
        .insert_rows(ORDERS_TABLE, order_rows(16, 18))
        .await
        .unwrap();

    let store = FileStateStore::new(&state_path);
    let state = store.load_state().await.unwrap();
    assert_eq!(state.cursor(ORDERS_TABLE), Some("2024-01-01T00:00:15Z"));

    let events: Vec<SyncEvent> = engine
        .sync(sync_config(10, 5), state, CancelRx::never())
        .try_collect()
        .await
        .unwrap();

    let upserts = events
        .iter()
        .filter(|event| matches!(event, SyncEvent::Upsert(_)))
        .count();
    assert_eq!(upserts, 4);
    assert_eq!(destination.table_rows("analytics", ORDERS_TABLE).await.len(), 18);

    let queries = source.executed_queries().await;
    assert_eq!(
        queries.last().and_then(|query| query.cursor.as_deref()),
        Some("2024-01-01T00:00:15Z")
    );
}
