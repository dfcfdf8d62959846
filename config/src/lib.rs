mod environment;
mod load;
pub mod shared;

pub use environment::*;
pub use load::*;
