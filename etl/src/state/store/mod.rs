mod base;
pub mod file;
pub mod memory;

pub use base::StateStore;
