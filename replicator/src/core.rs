use ::config::shared::{DestinationConfig, ReplicatorConfig, StateStoreConfig};
use etl::concurrency::cancel::{CancelRx, CancelTx, create_cancel_channel};
use etl::destination::Destination;
use etl::destination::memory::MemoryDestination;
use etl::destination::snowflake::SnowflakeDestination;
use etl::progress::{ProgressEvent, ProgressStream};
use etl::source::Source;
use etl::source::redshift::RedshiftSource;
use etl::state::store::StateStore;
use etl::state::store::file::FileStateStore;
use etl::state::store::memory::MemoryStateStore;
use etl::sync::SyncEngine;
use etl::types::CheckpointEvent;
use futures::TryStreamExt;
use std::pin::pin;
use tracing::{error, info, warn};

// Statically dispatches the pass loop over the configured state store.
macro_rules! run_sync_loop_dispatch {
    ($config:expr, $source:expr, $destination:expr) => {{
        match &$config.state_store {
            StateStoreConfig::Memory => {
                run_sync_loop($config, $source, $destination, MemoryStateStore::new()).await
            }
            StateStoreConfig::File { path } => {
                run_sync_loop($config, $source, $destination, FileStateStore::new(path)).await
            }
        }
    }};
}

pub async fn start_replicator(replicator_config: ReplicatorConfig) -> anyhow::Result<()> {
    info!(
        host = %replicator_config.source.host,
        database = %replicator_config.source.name,
        tables = replicator_config.tables.tables().len(),
        "starting replicator"
    );

    let source = RedshiftSource::connect(&replicator_config.source).await?;

    // For each destination we run the loop with static dispatch. This is more verbose, but keeps
    // the engine free of trait objects.
    match &replicator_config.destination {
        DestinationConfig::Memory { .. } => {
            let destination = MemoryDestination::new();

            run_sync_loop_dispatch!(&replicator_config, source, destination)?;
        }
        DestinationConfig::Snowflake { .. } => {
            let Some(destination) =
                SnowflakeDestination::from_config(&replicator_config.destination)?
            else {
                anyhow::bail!("destination configuration is not a snowflake configuration");
            };

            run_sync_loop_dispatch!(&replicator_config, source, destination)?;
        }
    }

    Ok(())
}

async fn run_sync_loop<S, D, St>(
    config: &ReplicatorConfig,
    source: S,
    destination: D,
    state_store: St,
) -> anyhow::Result<()>
where
    S: Source + Sync,
    D: Destination + Sync,
    St: StateStore,
{
    let (cancel_tx, cancel_rx) = create_cancel_channel();

    // Spawn a task to listen for shutdown signals and cancel the running pass.
    let shutdown_handle = tokio::spawn(listen_for_shutdown(cancel_tx));

    let mut engine = SyncEngine::new(
        source,
        destination,
        config.tables.clone(),
        config.destination.namespace().to_owned(),
    );
    let result = run_passes(config, &mut engine, &state_store, cancel_rx).await;

    if let Err(err) = engine.destination().shutdown().await {
        warn!(error = %err, "failed to shut down destination");
    }

    // The listener only finishes on a signal, so it is aborted once the passes are done.
    shutdown_handle.abort();
    let _ = shutdown_handle.await;

    result
}

async fn run_passes<S, D, St>(
    config: &ReplicatorConfig,
    engine: &mut SyncEngine<S, D>,
    state_store: &St,
    mut cancel_rx: CancelRx,
) -> anyhow::Result<()>
where
    S: Source + Sync,
    D: Destination + Sync,
    St: StateStore,
{
    let mut pass: u64 = 0;
    loop {
        pass += 1;
        let state = state_store.load_state().await?;
        info!(pass, cursors = state.len(), "starting sync pass");

        let mut events = pin!(ProgressStream::wrap(engine.sync(
            config.sync.clone(),
            state,
            cancel_rx.clone(),
        )));
        while let Some(event) = events.try_next().await? {
            if let ProgressEvent::Progress { checkpoint, .. } = &event {
                state_store
                    .apply_checkpoint(&CheckpointEvent {
                        table_cursor_updates: checkpoint.clone(),
                    })
                    .await?;
            }

            info!(progress = %serde_json::to_string(&event)?, "sync progress");
        }

        if cancel_rx.is_cancelled() {
            info!(pass, "replicator stopped by shutdown signal");
            return Ok(());
        }

        let Some(interval) = config.auto_refresh_interval() else {
            info!(pass, "sync finished");
            return Ok(());
        };

        info!(pass, interval_ms = interval.as_millis() as u64, "waiting for next pass");
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = cancel_rx.cancelled() => {
                info!(pass, "replicator stopped by shutdown signal");
                return Ok(());
            }
        }
    }
}

async fn listen_for_shutdown(cancel_tx: CancelTx) {
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!("failed to listen for SIGTERM: {err:?}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(err) = result {
                error!("failed to listen for Ctrl+C: {err:?}");
                return;
            }
            info!("Ctrl+C received, stopping after the current sub-batch");
        }
        _ = terminate => {
            info!("SIGTERM received, stopping after the current sub-batch");
        }
    }

    cancel_tx.cancel();
}
