//! Incremental, resumable table sync from Redshift into Snowflake.
//!
//! A [`sync::SyncEngine`] reads every table of a catalog in replication key order, starting from
//! the last committed cursor, and upserts the rows into the destination in bounded sub-batches.
//! The pass is exposed as a stream of [`types::SyncEvent`]s that the host drives and persists
//! checkpoints from.

mod macros;

pub mod clients;
pub mod concurrency;
pub mod conversions;
pub mod destination;
pub mod error;
pub mod failpoints;
pub mod metrics;
pub mod progress;
pub mod replication;
pub mod schema;
pub mod source;
pub mod state;
pub mod sync;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
