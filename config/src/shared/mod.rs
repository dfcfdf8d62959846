mod base;
mod catalog;
mod connection;
mod destination;
mod replicator;
mod state_store;
mod sync;

pub use base::*;
pub use catalog::*;
pub use connection::*;
pub use destination::*;
pub use replicator::*;
pub use state_store::*;
pub use sync::*;
