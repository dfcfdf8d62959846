use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where the replicator keeps table cursors between passes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateStoreConfig {
    /// Cursors live in memory and are lost on exit.
    #[default]
    Memory,
    /// Cursors are persisted as a JSON object in `path`.
    File { path: PathBuf },
}
