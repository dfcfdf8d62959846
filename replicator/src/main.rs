//! Replicator service binary.
//!
//! Loads the configuration, initializes tracing and runs sync passes from the source warehouse
//! into the configured destination until the work is done or a shutdown signal arrives.

use ::config::shared::ReplicatorConfig;
use telemetry::init_tracing;
use tracing::error;

use crate::config::load_replicator_config;
use crate::core::start_replicator;

mod config;
mod core;

fn main() -> anyhow::Result<()> {
    let replicator_config = load_replicator_config()?;

    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME"))?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(replicator_config))?;

    Ok(())
}

async fn async_main(replicator_config: ReplicatorConfig) -> anyhow::Result<()> {
    if let Err(err) = start_replicator(replicator_config).await {
        error!("{err:#}");
        return Err(err);
    }

    Ok(())
}
