use etl::concurrency::cancel::CancelRx;
use etl::destination::memory::MemoryDestination;
use etl::progress::{ProgressEvent, ProgressStream};
use etl::sync::SyncEngine;
use etl::test_utils::fixtures::{orders_catalog, orders_source, sync_config};
use etl::types::SyncState;
use futures::TryStreamExt;
use telemetry::init_test_tracing;

#[tokio::test(flavor = "multi_thread")]
async fn progress_reports_total_records_at_checkpoint() {
    init_test_tracing();
    let source = orders_source(42).await;

    let mut engine = SyncEngine::new(
        source,
        MemoryDestination::new(),
        orders_catalog(),
        "analytics".to_string(),
    );
    let progress: Vec<ProgressEvent> = ProgressStream::wrap(engine.sync(
        sync_config(20, 10),
        SyncState::new(),
        CancelRx::never(),
    ))
    .try_collect()
    .await
    .unwrap();

    let records: Vec<_> = progress
        .iter()
        .filter_map(|event| match event {
            ProgressEvent::Progress {
                total_records,
                batch,
                checkpoint,
                ..
            } => Some((*total_records, *batch, checkpoint.clone())),
            ProgressEvent::Log { .. } => None,
        })
        .collect();

    // Rows re-read at page boundaries are skipped, so every row is counted once.
    assert_eq!(records.len(), 1);
    let (total_records, batch, checkpoint) = &records[0];
    assert_eq!(*total_records, 42);
    assert_eq!(*batch, 1);
    assert_eq!(
        checkpoint.get("orders_cursor").map(String::as_str),
        Some("2024-01-01T00:00:42Z")
    );
    assert!(matches!(
        progress.last(),
        Some(ProgressEvent::Log { message }) if message == "Sync completed"
    ));
}
