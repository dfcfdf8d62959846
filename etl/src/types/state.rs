use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::CheckpointEvent;

/// Suffix appended to a table name to build its cursor key.
const CURSOR_KEY_SUFFIX: &str = "_cursor";

/// Last committed cursor of every table, as a flat `{"<table>_cursor": "<value>"}` map.
///
/// Owned by the host. The engine only reads it at pass start.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncState(BTreeMap<String, String>);

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the key under which the cursor of `table_name` is stored.
    pub fn cursor_key(table_name: &str) -> String {
        format!("{table_name}{CURSOR_KEY_SUFFIX}")
    }

    /// Returns the last committed cursor of `table_name`.
    pub fn cursor(&self, table_name: &str) -> Option<&str> {
        self.0
            .get(&Self::cursor_key(table_name))
            .map(String::as_str)
    }

    pub fn set_cursor(&mut self, table_name: &str, cursor: impl Into<String>) {
        self.0.insert(Self::cursor_key(table_name), cursor.into());
    }

    /// Merges the cursors of a checkpoint, overwriting existing values.
    pub fn apply(&mut self, checkpoint: &CheckpointEvent) {
        for (key, value) in &checkpoint.table_cursor_updates {
            self.0.insert(key.clone(), value.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

impl From<BTreeMap<String, String>> for SyncState {
    fn from(value: BTreeMap<String, String>) -> Self {
        Self(value)
    }
}
