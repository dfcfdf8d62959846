use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::types::Cell;

/// A normalized row ready to leave the engine.
///
/// Column names are shared by every record of the same query result. Temporal values have
/// already been rendered to text.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    columns: Arc<[String]>,
    values: Vec<Cell>,
}

impl Record {
    /// Creates a record. `values` must be ordered like `columns`.
    pub fn new(columns: Arc<[String]>, values: Vec<Cell>) -> Self {
        debug_assert_eq!(columns.len(), values.len());

        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Cell] {
        &self.values
    }

    /// Returns the value of `column`, comparing names case-insensitively.
    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.columns
            .iter()
            .position(|name| name.eq_ignore_ascii_case(column))
            .and_then(|index| self.values.get(index))
    }

    /// Iterates over `(column, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

impl Serialize for Record {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (column, value) in self.iter() {
            map.serialize_entry(column, &value.to_text())?;
        }
        map.end()
    }
}
