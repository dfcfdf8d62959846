use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::bail;
use crate::error::{ErrorKind, EtlResult};
use crate::types::Cell;

/// Textual form of every temporal value leaving the engine. Always UTC, second precision.
///
/// Cursors of temporal replication keys are truncated to the second. When `batch_query_size` or
/// more rows fall within one second, a transfer cannot advance past that second and fails.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Replaces temporal values by their [`TIMESTAMP_FORMAT`] rendering. Other values are kept.
pub fn normalize_cell(cell: Cell) -> Cell {
    if cell.is_temporal() {
        match cell.to_text() {
            Some(text) => Cell::String(text),
            None => Cell::Null,
        }
    } else {
        cell
    }
}

/// Parses a timestamp written in [`TIMESTAMP_FORMAT`], RFC 3339, the source's default text
/// output (`2024-01-01 10:00:00.123`) or as a plain date.
pub fn parse_timestamp(value: &str) -> EtlResult<NaiveDateTime> {
    let value = value.trim();

    let first_attempt = match NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT) {
        Ok(timestamp) => return Ok(timestamp),
        Err(err) => err,
    };

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Ok(timestamp.naive_utc());
    }

    if let Ok(timestamp) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(timestamp);
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date.and_hms_opt(0, 0, 0).unwrap_or_default());
    }

    Err(first_attempt.into())
}

/// Parses a cursor string into a cell of the same variant as `template`.
///
/// Used to compare stored cursors against typed values with the value type's own ordering.
pub fn parse_cursor_like(cursor: &str, template: &Cell) -> EtlResult<Cell> {
    let cell = match template {
        Cell::Bool(_) => match cursor.trim().to_lowercase().as_str() {
            "true" | "t" => Cell::Bool(true),
            "false" | "f" => Cell::Bool(false),
            other => bail!(
                ErrorKind::ConversionError,
                "Cursor is not a boolean",
                format!("cursor value `{other}`")
            ),
        },
        Cell::I16(_) => Cell::I16(cursor.trim().parse()?),
        Cell::I32(_) => Cell::I32(cursor.trim().parse()?),
        Cell::I64(_) => Cell::I64(cursor.trim().parse()?),
        Cell::F32(_) => Cell::F32(cursor.trim().parse()?),
        Cell::F64(_) => Cell::F64(cursor.trim().parse()?),
        Cell::Numeric(_) => Cell::Numeric(cursor.trim().parse()?),
        Cell::String(_) => Cell::String(cursor.to_owned()),
        Cell::Date(_) => Cell::Date(parse_timestamp(cursor)?.date()),
        Cell::Timestamp(_) => Cell::Timestamp(parse_timestamp(cursor)?),
        Cell::TimestampTz(_) => Cell::TimestampTz(parse_timestamp(cursor)?.and_utc()),
        Cell::Bytes(_) | Cell::Null => bail!(
            ErrorKind::InvalidData,
            "Replication key type cannot be compared with a cursor",
            format!("value {template:?}")
        ),
    };

    Ok(cell)
}
