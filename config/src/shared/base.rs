use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A field holds a value outside of its allowed range.
    #[error("Invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
    /// TLS is enabled but no trusted root certificates are provided.
    #[error("Invalid TLS config: `trusted_root_certs` must be set when `enabled` is true")]
    MissingTrustedRootCerts,
    /// The same table appears more than once in the catalog.
    #[error("Table `{0}` is listed more than once in the catalog")]
    DuplicateTable(String),
    /// The table catalog is empty.
    #[error("The table catalog must contain at least one table")]
    EmptyCatalog,
}
