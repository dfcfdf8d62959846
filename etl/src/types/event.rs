use std::collections::BTreeMap;

use crate::types::Record;

/// Human readable progress message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub message: String,
}

/// One row written to the destination, keyed implicitly by the table's primary key.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertEvent {
    pub table_name: String,
    pub record: Record,
}

/// Durability boundary: the host may persist these cursors.
///
/// Keys are cursor keys as built by [`crate::types::SyncState::cursor_key`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CheckpointEvent {
    pub table_cursor_updates: BTreeMap<String, String>,
}

/// Events produced by a sync pass.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Log(LogEvent),
    Upsert(UpsertEvent),
    Checkpoint(CheckpointEvent),
}

impl SyncEvent {
    pub fn log(message: impl Into<String>) -> Self {
        SyncEvent::Log(LogEvent {
            message: message.into(),
        })
    }
}
