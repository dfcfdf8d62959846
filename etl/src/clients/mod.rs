//! HTTP clients of the destination warehouses.

pub mod snowflake;
