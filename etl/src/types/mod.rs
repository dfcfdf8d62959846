//! Data types flowing through a sync pass.

mod cell;
mod column;
mod event;
mod record;
mod state;
mod table_row;

pub use cell::*;
pub use column::*;
pub use event::*;
pub use record::*;
pub use state::*;
pub use table_row::*;
