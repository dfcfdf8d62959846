//! Persistence of table cursors between sync passes.
//!
//! The engine never writes state itself. Hosts load a [`SyncState`](crate::types::SyncState)
//! from a [`StateStore`](store::StateStore) before a pass and hand every checkpoint back to the
//! store as soon as it is yielded.

pub mod store;
