use std::time::Duration;

use serde::Deserialize;

use crate::Config;
use crate::shared::{
    DestinationConfig, SourceConnectionConfig, StateStoreConfig, SyncConfig, TableCatalog,
    ValidationError,
};

/// Complete configuration of the replicator binary.
///
/// This intentionally does not implement [`serde::Serialize`] to avoid leaking secrets.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplicatorConfig {
    /// Source warehouse connection.
    pub source: SourceConnectionConfig,
    /// Destination warehouse.
    pub destination: DestinationConfig,
    /// Cursor persistence.
    #[serde(default)]
    pub state_store: StateStoreConfig,
    /// Batch sizes and table filter of each pass.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Tables known to the replicator, in processing order.
    pub tables: TableCatalog,
    /// Wait between two passes. When absent the replicator runs a single pass.
    #[serde(default)]
    pub auto_refresh_interval_ms: Option<u64>,
}

impl ReplicatorConfig {
    /// Validates every section of the configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.source.validate()?;
        self.destination.validate()?;
        self.sync.validate()?;
        self.tables.validate()?;

        if self.auto_refresh_interval_ms == Some(0) {
            return Err(ValidationError::InvalidFieldValue {
                field: "auto_refresh_interval_ms".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    pub fn auto_refresh_interval(&self) -> Option<Duration> {
        self.auto_refresh_interval_ms.map(Duration::from_millis)
    }
}

impl Config for ReplicatorConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &["sync.only_tables"];
}
