use std::fmt;

/// Identifier of a column's source type as reported by the result description.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceTypeCode {
    /// Numeric type OID.
    Oid(u32),
    /// Type name, e.g. `character varying`.
    Name(String),
}

impl fmt::Display for SourceTypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceTypeCode::Oid(oid) => write!(f, "oid {oid}"),
            SourceTypeCode::Name(name) => f.write_str(name),
        }
    }
}

/// A column of an extraction query result.
///
/// Rebuilt for every query since the shape of a table can change between runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub source_type_code: SourceTypeCode,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, source_type_code: SourceTypeCode) -> Self {
        Self {
            name: name.into(),
            source_type_code,
        }
    }
}

/// Returns the position of `name` in `columns`, comparing case-insensitively.
pub fn find_column(columns: &[ColumnDescriptor], name: &str) -> Option<usize> {
    columns
        .iter()
        .position(|column| column.name.eq_ignore_ascii_case(name))
}
