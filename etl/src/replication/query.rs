use std::fmt;

use pg_escape::{quote_identifier, quote_literal};

/// An incremental extraction query for one page of a table.
///
/// Rows are ordered ascending by the replication key. When a cursor is present only rows with
/// `replication_key >= cursor` are selected: the boundary row of the previous page may come back,
/// so no row sharing the boundary value is ever skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionQuery {
    pub table_name: String,
    pub replication_key: String,
    pub cursor: Option<String>,
    pub page_size: usize,
}

impl ExtractionQuery {
    /// Renders the query as SQL.
    ///
    /// Identifiers are quoted only when needed and the cursor is escaped as a string literal,
    /// leaving the comparison semantics to the column's type.
    pub fn to_sql(&self) -> String {
        let table = quote_qualified_name(&self.table_name);
        let key = quote_identifier(&self.replication_key);

        match &self.cursor {
            Some(cursor) => format!(
                "SELECT * FROM {table} WHERE {key} >= {} ORDER BY {key} ASC LIMIT {}",
                quote_literal(cursor),
                self.page_size
            ),
            None => format!(
                "SELECT * FROM {table} ORDER BY {key} ASC LIMIT {}",
                self.page_size
            ),
        }
    }
}

impl fmt::Display for ExtractionQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

/// Builds the next extraction query of a table.
///
/// The replication key is lowercased because the source folds unquoted identifiers to lower case.
pub fn build_query(
    table_name: &str,
    replication_key: &str,
    last_cursor: Option<&str>,
    page_size: usize,
) -> ExtractionQuery {
    ExtractionQuery {
        table_name: table_name.to_owned(),
        replication_key: replication_key.to_lowercase(),
        cursor: last_cursor.map(str::to_owned),
        page_size,
    }
}

/// Quotes each segment of a possibly schema qualified name.
fn quote_qualified_name(name: &str) -> String {
    name.split('.')
        .map(|segment| quote_identifier(segment).into_owned())
        .collect::<Vec<_>>()
        .join(".")
}
