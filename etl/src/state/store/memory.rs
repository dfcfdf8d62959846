use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::EtlResult;
use crate::state::store::StateStore;
use crate::types::{CheckpointEvent, SyncState};

/// A state store that keeps cursors in memory only.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    state: Arc<Mutex<SyncState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store already holding `state`.
    pub fn with_state(state: SyncState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }
}

impl StateStore for MemoryStateStore {
    async fn load_state(&self) -> EtlResult<SyncState> {
        Ok(self.state.lock().await.clone())
    }

    async fn apply_checkpoint(&self, checkpoint: &CheckpointEvent) -> EtlResult<()> {
        self.state.lock().await.apply(checkpoint);

        Ok(())
    }
}
