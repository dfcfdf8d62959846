use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Describes one source table to replicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TableSpec {
    /// Source table name, optionally schema qualified (`public.orders`).
    pub table_name: String,
    /// Columns identifying a row; destination writes upsert on them.
    pub primary_key: Vec<String>,
    /// Column whose ascending order defines extraction progress.
    pub replication_key: String,
}

impl TableSpec {
    /// Name of the destination table: the source name with schema separators replaced by `_`.
    pub fn destination_table_name(&self) -> String {
        self.table_name.replace('.', "_")
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.table_name.trim().is_empty() {
            return Err(ValidationError::InvalidFieldValue {
                field: "tables.table_name".to_string(),
                constraint: "must not be empty".to_string(),
            });
        }

        if self.replication_key.trim().is_empty() {
            return Err(ValidationError::InvalidFieldValue {
                field: format!("tables.{}.replication_key", self.table_name),
                constraint: "must not be empty".to_string(),
            });
        }

        if self.primary_key.is_empty() {
            return Err(ValidationError::InvalidFieldValue {
                field: format!("tables.{}.primary_key", self.table_name),
                constraint: "must contain at least one column".to_string(),
            });
        }

        Ok(())
    }
}

/// Ordered list of tables. The order is the processing order of a sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableCatalog(Vec<TableSpec>);

impl TableCatalog {
    pub fn new(tables: Vec<TableSpec>) -> Self {
        Self(tables)
    }

    pub fn tables(&self) -> &[TableSpec] {
        &self.0
    }

    pub fn get(&self, table_name: &str) -> Option<&TableSpec> {
        self.0.iter().find(|table| table.table_name == table_name)
    }

    /// Validates every table and rejects duplicate names.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.0.is_empty() {
            return Err(ValidationError::EmptyCatalog);
        }

        let mut seen = HashSet::with_capacity(self.0.len());
        for table in &self.0 {
            table.validate()?;

            if !seen.insert(table.table_name.as_str()) {
                return Err(ValidationError::DuplicateTable(table.table_name.clone()));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orders() -> TableSpec {
        TableSpec {
            table_name: "orders".to_string(),
            primary_key: vec!["id".to_string()],
            replication_key: "updated_at".to_string(),
        }
    }

    #[test]
    fn catalog_rejects_duplicates() {
        let catalog = TableCatalog::new(vec![orders(), orders()]);

        assert_eq!(
            catalog.validate(),
            Err(ValidationError::DuplicateTable("orders".to_string()))
        );
    }

    #[test]
    fn table_requires_primary_key() {
        let mut table = orders();
        table.primary_key.clear();

        assert!(table.validate().is_err());
    }

    #[test]
    fn destination_name_flattens_schema() {
        let mut table = orders();
        table.table_name = "sales.orders".to_string();

        assert_eq!(table.destination_table_name(), "sales_orders");
    }

    #[test]
    fn catalog_keeps_declaration_order() {
        let mut users = orders();
        users.table_name = "users".to_string();
        let catalog = TableCatalog::new(vec![users, orders()]);

        let names: Vec<_> = catalog
            .tables()
            .iter()
            .map(|table| table.table_name.as_str())
            .collect();
        assert_eq!(names, ["users", "orders"]);
        assert!(catalog.get("orders").is_some());
    }
}
