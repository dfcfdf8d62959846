use std::future::Future;

use crate::error::EtlResult;
use crate::types::{CheckpointEvent, SyncState};

/// Trait for loading and persisting table cursors.
///
/// Implementations should ensure thread-safety and handle concurrent access to the data.
pub trait StateStore {
    /// Loads the last persisted state. A store that was never written returns an empty state.
    fn load_state(&self) -> impl Future<Output = EtlResult<SyncState>> + Send;

    /// Merges the cursors of `checkpoint` into the persisted state.
    ///
    /// Cursors of tables not named in the checkpoint are kept. Once the future resolves the
    /// checkpoint survives a restart of the host.
    fn apply_checkpoint(
        &self,
        checkpoint: &CheckpointEvent,
    ) -> impl Future<Output = EtlResult<()>> + Send;
}
