//! Translation of sync events into progress records for user interfaces.

use core::pin::Pin;
use core::task::{Context, Poll};
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use futures::{Stream, ready};
use pin_project_lite::pin_project;
use serde::Serialize;

use crate::error::EtlResult;
use crate::types::SyncEvent;

/// A progress record, serialized as `{"type": "log", ...}` or `{"type": "progress", ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Log {
        message: String,
    },
    Progress {
        timestamp: DateTime<Utc>,
        /// Upserts seen since the start of the pass.
        total_records: u64,
        /// Number of checkpoints seen so far, including this one.
        batch: u64,
        checkpoint: BTreeMap<String, String>,
    },
}

pin_project! {
    /// A stream adapter turning [`SyncEvent`]s into [`ProgressEvent`]s.
    ///
    /// Upserts are only counted. Every checkpoint produces a progress record carrying the running
    /// counters. Errors are passed through unchanged.
    #[must_use = "streams do nothing unless polled"]
    #[derive(Debug)]
    pub struct ProgressStream<S> {
        #[pin]
        stream: S,
        total_records: u64,
        batch: u64,
    }
}

impl<S> ProgressStream<S>
where
    S: Stream<Item = EtlResult<SyncEvent>>,
{
    /// Creates a new [`ProgressStream`] wrapping `stream`.
    pub fn wrap(stream: S) -> Self {
        Self {
            stream,
            total_records: 0,
            batch: 0,
        }
    }

    pub fn total_records(&self) -> u64 {
        self.total_records
    }
}

impl<S> Stream for ProgressStream<S>
where
    S: Stream<Item = EtlResult<SyncEvent>>,
{
    type Item = EtlResult<ProgressEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            let event = match ready!(this.stream.as_mut().poll_next(cx)) {
                Some(Ok(event)) => event,
                Some(Err(err)) => return Poll::Ready(Some(Err(err))),
                None => return Poll::Ready(None),
            };

            match event {
                SyncEvent::Log(log) => {
                    return Poll::Ready(Some(Ok(ProgressEvent::Log {
                        message: log.message,
                    })));
                }
                SyncEvent::Upsert(_) => {
                    *this.total_records += 1;
                }
                SyncEvent::Checkpoint(checkpoint) => {
                    *this.batch += 1;
                    return Poll::Ready(Some(Ok(ProgressEvent::Progress {
                        timestamp: Utc::now(),
                        total_records: *this.total_records,
                        batch: *this.batch,
                        checkpoint: checkpoint.table_cursor_updates,
                    })));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::TryStreamExt;

    use super::*;
    use crate::error::ErrorKind;
    use crate::etl_error;
    use crate::types::{Cell, CheckpointEvent, Record, UpsertEvent};

    fn upsert(id: i64) -> EtlResult<SyncEvent> {
        let columns: Arc<[String]> = vec!["id".to_string()].into();
        Ok(SyncEvent::Upsert(UpsertEvent {
            table_name: "orders".to_string(),
            record: Record::new(columns, vec![Cell::I64(id)]),
        }))
    }

    fn checkpoint(cursor: &str) -> EtlResult<SyncEvent> {
        Ok(SyncEvent::Checkpoint(CheckpointEvent {
            table_cursor_updates: BTreeMap::from([(
                "orders_cursor".to_string(),
                cursor.to_string(),
            )]),
        }))
    }

    #[tokio::test]
    async fn counts_upserts_and_checkpoints() {
        let events = futures::stream::iter(vec![
            Ok(SyncEvent::log("Starting")),
            upsert(1),
            upsert(2),
            checkpoint("2"),
            upsert(3),
            checkpoint("3"),
        ]);

        let progress: Vec<ProgressEvent> = ProgressStream::wrap(events).try_collect().await.unwrap();

        assert_eq!(progress.len(), 3);
        assert_eq!(
            progress[0],
            ProgressEvent::Log {
                message: "Starting".to_string()
            }
        );
        let ProgressEvent::Progress {
            total_records,
            batch,
            ..
        } = &progress[2]
        else {
            panic!("expected a progress record");
        };
        assert_eq!((*total_records, *batch), (3, 2));
    }

    #[tokio::test]
    async fn errors_pass_through() {
        let events = futures::stream::iter(vec![
            upsert(1),
            Err(etl_error!(ErrorKind::SourceConnectionFailed, "Source connection failed")),
        ]);

        let result: EtlResult<Vec<ProgressEvent>> =
            ProgressStream::wrap(events).try_collect().await;

        assert_eq!(result.unwrap_err().kind(), ErrorKind::SourceConnectionFailed);
    }

    #[test]
    fn records_serialize_with_type_tag() {
        let log = ProgressEvent::Log {
            message: "hello".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&log).unwrap(),
            serde_json::json!({"type": "log", "message": "hello"})
        );

        let timestamp = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let progress = ProgressEvent::Progress {
            timestamp,
            total_records: 10,
            batch: 1,
            checkpoint: BTreeMap::from([("orders_cursor".to_string(), "5".to_string())]),
        };
        assert_eq!(
            serde_json::to_value(&progress).unwrap(),
            serde_json::json!({
                "type": "progress",
                "timestamp": "2024-01-01T00:00:00Z",
                "total_records": 10,
                "batch": 1,
                "checkpoint": {"orders_cursor": "5"}
            })
        );
    }
}
