use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::error::EtlResult;
use crate::state::store::StateStore;
use crate::types::{CheckpointEvent, SyncState};

/// A state store persisting cursors as a JSON object in a single file.
///
/// The file holds the flat `{"<table>_cursor": "<value>"}` map. Every checkpoint rewrites it
/// through a temporary sibling file that is renamed over the original, so a crash leaves either
/// the previous or the new state on disk.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
    state: Arc<Mutex<Option<SyncState>>>,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: Arc::new(Mutex::new(None)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> EtlResult<SyncState> {
        match tokio::fs::read(&self.path).await {
            Ok(content) => Ok(serde_json::from_slice(&content)?),
            Err(err) if err.kind() == IoErrorKind::NotFound => {
                debug!(path = %self.path.display(), "state file not found, starting from an empty state");
                Ok(SyncState::new())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn write(&self, state: &SyncState) -> EtlResult<()> {
        let content = serde_json::to_vec_pretty(state)?;
        let temp_path = self.path.with_extension("tmp");
        tokio::fs::write(&temp_path, &content).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;

        Ok(())
    }
}

impl StateStore for FileStateStore {
    async fn load_state(&self) -> EtlResult<SyncState> {
        let mut cached = self.state.lock().await;
        let state = self.read().await?;
        *cached = Some(state.clone());

        Ok(state)
    }

    async fn apply_checkpoint(&self, checkpoint: &CheckpointEvent) -> EtlResult<()> {
        let mut cached = self.state.lock().await;
        let mut state = match cached.take() {
            Some(state) => state,
            None => self.read().await?,
        };
        state.apply(checkpoint);
        self.write(&state).await?;
        *cached = Some(state);

        Ok(())
    }
}
