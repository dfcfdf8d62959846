//! Conversions between source values, normalized values and destination types.

pub mod hex;
pub mod numeric;
pub mod text;
pub mod type_mapper;
