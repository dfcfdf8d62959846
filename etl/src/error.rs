//! Error types and result definitions for sync operations.
//!
//! Every fallible operation of the engine and of the store drivers returns an [`EtlError`]. An
//! error carries a coarse [`ErrorKind`] used by callers to decide what to report, a static
//! description, optional dynamic detail, the originating error and the call site that created it.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use bigdecimal::ParseBigDecimalError;

/// Result type of sync operations.
pub type EtlResult<T> = Result<T, EtlError>;

/// Main error type for sync operations.
#[derive(Debug, Clone)]
pub struct EtlError {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Categories of errors that can occur during a sync pass.
///
/// Connectivity, schema and data failures all end the pass; the kind only tells the caller
/// which store or stage failed.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Connection Errors
    SourceConnectionFailed,
    DestinationConnectionFailed,

    // Query & Execution Errors
    SourceQueryFailed,
    DestinationQueryFailed,

    // Schema Errors
    SourceSchemaError,
    DestinationSchemaError,

    // Data & Transformation Errors
    ConversionError,
    InvalidData,
    ValidationError,

    // Configuration Errors
    ConfigError,
    AuthenticationError,
    EncryptionError,

    // IO & Serialization Errors
    IoError,
    SerializationError,
    DeserializationError,

    // State Errors
    InvalidState,

    Unknown,

    // Raised by fault injection in tests.
    #[cfg(feature = "failpoints")]
    WithFailpoint,
}

impl EtlError {
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the static description of the error.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the dynamic detail attached to the error, if any.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    /// Returns the call site that created this error.
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    /// Attaches an originating error, exposed through [`error::Error::source`].
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        self.source = Some(Arc::new(source));
        self
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        EtlError {
            kind,
            description,
            detail,
            source,
            location: Location::caller(),
            backtrace: Arc::new(Backtrace::capture()),
        }
    }

    /// Wraps a foreign error, keeping its message as detail.
    #[track_caller]
    fn wrap<E>(kind: ErrorKind, description: &'static str, err: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        let detail = err.to_string();
        EtlError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl PartialEq for EtlError {
    fn eq(&self, other: &EtlError) -> bool {
        self.kind == other.kind
    }
}

impl fmt::Display for EtlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:?}] {} @ {}:{}:{}",
            self.kind,
            self.description,
            self.location.file(),
            self.location.line(),
            self.location.column()
        )?;

        if let Some(detail) = &self.detail {
            if detail.trim().is_empty() {
                write!(f, "\n  Detail: <empty>")?;
            } else {
                write!(f, "\n  Detail:")?;
                for line in detail.lines() {
                    write!(f, "\n    {line}")?;
                }
            }
        }

        let rendered_backtrace = self.backtrace.to_string();
        if !rendered_backtrace.trim().is_empty() {
            write!(f, "\n  Backtrace:")?;
            for line in rendered_backtrace.lines() {
                write!(f, "\n    {line}")?;
            }
        }

        Ok(())
    }
}

impl error::Error for EtlError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn error::Error + 'static))
    }
}

impl From<(ErrorKind, &'static str)> for EtlError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> EtlError {
        EtlError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

impl<D> From<(ErrorKind, &'static str, D)> for EtlError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> EtlError {
        EtlError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

impl From<std::io::Error> for EtlError {
    #[track_caller]
    fn from(err: std::io::Error) -> EtlError {
        EtlError::wrap(ErrorKind::IoError, "I/O operation failed", err)
    }
}

impl From<serde_json::Error> for EtlError {
    #[track_caller]
    fn from(err: serde_json::Error) -> EtlError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Io => (ErrorKind::IoError, "JSON I/O operation failed"),
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Data
            | serde_json::error::Category::Eof => (
                ErrorKind::DeserializationError,
                "JSON deserialization failed",
            ),
        };

        EtlError::wrap(kind, description, err)
    }
}

impl From<std::str::Utf8Error> for EtlError {
    #[track_caller]
    fn from(err: std::str::Utf8Error) -> EtlError {
        EtlError::wrap(ErrorKind::ConversionError, "UTF-8 conversion failed", err)
    }
}

impl From<std::num::ParseIntError> for EtlError {
    #[track_caller]
    fn from(err: std::num::ParseIntError) -> EtlError {
        EtlError::wrap(ErrorKind::ConversionError, "Integer parsing failed", err)
    }
}

impl From<std::num::ParseFloatError> for EtlError {
    #[track_caller]
    fn from(err: std::num::ParseFloatError) -> EtlError {
        EtlError::wrap(ErrorKind::ConversionError, "Float parsing failed", err)
    }
}

impl From<chrono::ParseError> for EtlError {
    #[track_caller]
    fn from(err: chrono::ParseError) -> EtlError {
        EtlError::wrap(ErrorKind::ConversionError, "Datetime parsing failed", err)
    }
}

impl From<ParseBigDecimalError> for EtlError {
    #[track_caller]
    fn from(err: ParseBigDecimalError) -> EtlError {
        EtlError::wrap(ErrorKind::ConversionError, "Numeric parsing failed", err)
    }
}

impl From<config::shared::ValidationError> for EtlError {
    #[track_caller]
    fn from(err: config::shared::ValidationError) -> EtlError {
        EtlError::wrap(ErrorKind::ValidationError, "Invalid configuration", err)
    }
}

/// Maps source driver errors by SQLSTATE class.
impl From<tokio_postgres::Error> for EtlError {
    #[track_caller]
    fn from(err: tokio_postgres::Error) -> EtlError {
        use tokio_postgres::error::SqlState;

        let (kind, description) = match err.code() {
            Some(sqlstate) => match *sqlstate {
                SqlState::INVALID_AUTHORIZATION_SPECIFICATION | SqlState::INVALID_PASSWORD => (
                    ErrorKind::AuthenticationError,
                    "Source authentication failed",
                ),
                SqlState::UNDEFINED_TABLE
                | SqlState::UNDEFINED_COLUMN
                | SqlState::UNDEFINED_SCHEMA
                | SqlState::FEATURE_NOT_SUPPORTED => (
                    ErrorKind::SourceSchemaError,
                    "Source schema object not found",
                ),
                SqlState::DATA_EXCEPTION
                | SqlState::INVALID_TEXT_REPRESENTATION
                | SqlState::INVALID_DATETIME_FORMAT
                | SqlState::DATETIME_FIELD_OVERFLOW
                | SqlState::NUMERIC_VALUE_OUT_OF_RANGE => (
                    ErrorKind::ConversionError,
                    "Source data conversion failed",
                ),
                _ => match sqlstate.code().get(..2) {
                    Some("08") | Some("53") | Some("57") => (
                        ErrorKind::SourceConnectionFailed,
                        "Source connection failed",
                    ),
                    _ => (ErrorKind::SourceQueryFailed, "Source query failed"),
                },
            },
            // No SQLSTATE means the failure happened below the protocol.
            None => (
                ErrorKind::SourceConnectionFailed,
                "Source connection failed",
            ),
        };

        EtlError::wrap(kind, description, err)
    }
}

impl From<reqwest::Error> for EtlError {
    #[track_caller]
    fn from(err: reqwest::Error) -> EtlError {
        let (kind, description) = if err.is_decode() {
            (
                ErrorKind::DeserializationError,
                "Destination response decoding failed",
            )
        } else if err.is_status() {
            (
                ErrorKind::DestinationQueryFailed,
                "Destination request failed",
            )
        } else {
            (
                ErrorKind::DestinationConnectionFailed,
                "Destination connection failed",
            )
        };

        EtlError::wrap(kind, description, err)
    }
}

impl From<rustls::Error> for EtlError {
    #[track_caller]
    fn from(err: rustls::Error) -> EtlError {
        EtlError::wrap(ErrorKind::EncryptionError, "TLS configuration failed", err)
    }
}
