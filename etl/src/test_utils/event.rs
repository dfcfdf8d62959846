use futures::{Stream, TryStreamExt};

use crate::error::{EtlError, EtlResult};
use crate::types::{CheckpointEvent, SyncEvent, SyncState, UpsertEvent};

/// Drives a pass to its end and returns all its events.
pub async fn collect_events<S>(stream: S) -> EtlResult<Vec<SyncEvent>>
where
    S: Stream<Item = EtlResult<SyncEvent>>,
{
    stream.try_collect().await
}

/// Drives a pass until it fails and returns the events yielded before the error.
///
/// Panics if the pass ends without an error.
pub async fn collect_events_until_error<S>(stream: S) -> (Vec<SyncEvent>, EtlError)
where
    S: Stream<Item = EtlResult<SyncEvent>>,
{
    let mut stream = std::pin::pin!(stream);
    let mut events = Vec::new();
    loop {
        match stream.try_next().await {
            Ok(Some(event)) => events.push(event),
            Ok(None) => panic!("the pass completed without an error"),
            Err(err) => return (events, err),
        }
    }
}

pub fn upserts(events: &[SyncEvent]) -> Vec<&UpsertEvent> {
    events
        .iter()
        .filter_map(|event| match event {
            SyncEvent::Upsert(upsert) => Some(upsert),
            _ => None,
        })
        .collect()
}

pub fn checkpoints(events: &[SyncEvent]) -> Vec<&CheckpointEvent> {
    events
        .iter()
        .filter_map(|event| match event {
            SyncEvent::Checkpoint(checkpoint) => Some(checkpoint),
            _ => None,
        })
        .collect()
}

pub fn log_messages(events: &[SyncEvent]) -> Vec<&str> {
    events
        .iter()
        .filter_map(|event| match event {
            SyncEvent::Log(log) => Some(log.message.as_str()),
            _ => None,
        })
        .collect()
}

/// Applies every checkpoint of `events` to `state`, like a host persisting them would.
pub fn apply_checkpoints(state: &mut SyncState, events: &[SyncEvent]) {
    for checkpoint in checkpoints(events) {
        state.apply(checkpoint);
    }
}
