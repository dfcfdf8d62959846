use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Per-pass settings handed to the sync engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SyncConfig {
    /// Restricts the pass to these tables. `None` processes the whole catalog.
    #[serde(default)]
    pub only_tables: Option<Vec<String>>,
    /// Maximum rows requested from the source per extraction query.
    #[serde(default = "default_batch_query_size")]
    pub batch_query_size: usize,
    /// Maximum rows written to the destination per sub-batch.
    #[serde(default = "default_batch_process_size")]
    pub batch_process_size: usize,
}

impl SyncConfig {
    /// Default number of rows per extraction query.
    pub const DEFAULT_BATCH_QUERY_SIZE: usize = 10_000;

    /// Default number of rows per destination write.
    pub const DEFAULT_BATCH_PROCESS_SIZE: usize = 1_000;

    /// Validates batch sizes.
    ///
    /// Both sizes must be non-zero and `batch_process_size` cannot exceed `batch_query_size`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.batch_query_size == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "batch_query_size".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        if self.batch_process_size == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "batch_process_size".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        if self.batch_process_size > self.batch_query_size {
            return Err(ValidationError::InvalidFieldValue {
                field: "batch_process_size".to_string(),
                constraint: format!(
                    "must be less than or equal to batch_query_size ({})",
                    self.batch_query_size
                ),
            });
        }

        Ok(())
    }

    /// Returns `true` when `table_name` is selected by `only_tables`.
    pub fn includes(&self, table_name: &str) -> bool {
        match &self.only_tables {
            Some(only_tables) => only_tables.iter().any(|name| name == table_name),
            None => true,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            only_tables: None,
            batch_query_size: default_batch_query_size(),
            batch_process_size: default_batch_process_size(),
        }
    }
}

fn default_batch_query_size() -> usize {
    SyncConfig::DEFAULT_BATCH_QUERY_SIZE
}

fn default_batch_process_size() -> usize {
    SyncConfig::DEFAULT_BATCH_PROCESS_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(batch_query_size: usize, batch_process_size: usize) -> SyncConfig {
        SyncConfig {
            only_tables: None,
            batch_query_size,
            batch_process_size,
        }
    }

    #[test]
    fn validate_accepts_process_size_up_to_query_size() {
        assert!(config(1000, 500).validate().is_ok());
        assert!(config(1000, 1000).validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_sizes() {
        assert!(matches!(
            config(0, 0).validate(),
            Err(ValidationError::InvalidFieldValue { field, .. }) if field == "batch_query_size"
        ));
        assert!(matches!(
            config(10, 0).validate(),
            Err(ValidationError::InvalidFieldValue { field, .. }) if field == "batch_process_size"
        ));
    }

    #[test]
    fn validate_rejects_process_size_above_query_size() {
        assert!(config(100, 101).validate().is_err());
    }

    #[test]
    fn missing_fields_use_defaults() {
        let config: SyncConfig = serde_json::from_str(r#"{"only_tables": ["orders"]}"#).unwrap();

        assert_eq!(config.only_tables, Some(vec!["orders".to_string()]));
        assert_eq!(config.batch_query_size, SyncConfig::DEFAULT_BATCH_QUERY_SIZE);
        assert_eq!(
            config.batch_process_size,
            SyncConfig::DEFAULT_BATCH_PROCESS_SIZE
        );
        assert!(config.includes("orders"));
        assert!(!config.includes("users"));
    }
}
