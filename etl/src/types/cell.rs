use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::conversions::hex::encode_bytea_hex;
use crate::conversions::numeric::PgNumeric;
use crate::conversions::text::TIMESTAMP_FORMAT;

/// A single value read from the source.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Numeric(PgNumeric),
    String(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Bytes(Vec<u8>),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Returns `true` for date and timestamp values.
    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            Cell::Date(_) | Cell::Timestamp(_) | Cell::TimestampTz(_)
        )
    }

    /// Renders the value as text, or `None` for [`Cell::Null`].
    ///
    /// Temporal values use the fixed UTC timestamp format and bytes use the `\x` hex form, so
    /// the result can be sent as a bound parameter or stored as a cursor.
    pub fn to_text(&self) -> Option<String> {
        let text = match self {
            Cell::Null => return None,
            Cell::Bool(value) => value.to_string(),
            Cell::I16(value) => value.to_string(),
            Cell::I32(value) => value.to_string(),
            Cell::I64(value) => value.to_string(),
            Cell::F32(value) => value.to_string(),
            Cell::F64(value) => value.to_string(),
            Cell::Numeric(value) => value.to_string(),
            Cell::String(value) => value.clone(),
            Cell::Date(value) => value
                .and_hms_opt(0, 0, 0)
                .unwrap_or_default()
                .format(TIMESTAMP_FORMAT)
                .to_string(),
            Cell::Timestamp(value) => value.format(TIMESTAMP_FORMAT).to_string(),
            Cell::TimestampTz(value) => value.format(TIMESTAMP_FORMAT).to_string(),
            Cell::Bytes(value) => encode_bytea_hex(value),
        };

        Some(text)
    }

    /// Compares two cells of the same variant using the natural order of that type.
    ///
    /// Returns `None` for mismatched variants, NaN floats and nulls.
    pub fn partial_cmp_value(&self, other: &Cell) -> Option<Ordering> {
        match (self, other) {
            (Cell::Bool(a), Cell::Bool(b)) => Some(a.cmp(b)),
            (Cell::I16(a), Cell::I16(b)) => Some(a.cmp(b)),
            (Cell::I32(a), Cell::I32(b)) => Some(a.cmp(b)),
            (Cell::I64(a), Cell::I64(b)) => Some(a.cmp(b)),
            (Cell::F32(a), Cell::F32(b)) => a.partial_cmp(b),
            (Cell::F64(a), Cell::F64(b)) => a.partial_cmp(b),
            (Cell::Numeric(a), Cell::Numeric(b)) => Some(a.cmp(b)),
            (Cell::String(a), Cell::String(b)) => Some(a.cmp(b)),
            (Cell::Date(a), Cell::Date(b)) => Some(a.cmp(b)),
            (Cell::Timestamp(a), Cell::Timestamp(b)) => Some(a.cmp(b)),
            (Cell::TimestampTz(a), Cell::TimestampTz(b)) => Some(a.cmp(b)),
            (Cell::Bytes(a), Cell::Bytes(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_text() {
            Some(text) => f.write_str(&text),
            None => f.write_str("NULL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temporal_cells_render_in_fixed_format() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let timestamp = date.and_hms_opt(13, 5, 59).unwrap();

        assert_eq!(
            Cell::Date(date).to_text().unwrap(),
            "2024-03-09T00:00:00Z"
        );
        assert_eq!(
            Cell::Timestamp(timestamp).to_text().unwrap(),
            "2024-03-09T13:05:59Z"
        );
        assert_eq!(
            Cell::TimestampTz(timestamp.and_utc()).to_text().unwrap(),
            "2024-03-09T13:05:59Z"
        );
    }

    #[test]
    fn sub_second_timestamps_share_one_text_form() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let early = date.and_hms_milli_opt(13, 5, 59, 10).unwrap();
        let late = date.and_hms_milli_opt(13, 5, 59, 990).unwrap();

        assert_ne!(early, late);
        assert_eq!(Cell::Timestamp(early).to_text(), Cell::Timestamp(late).to_text());
        assert_eq!(
            Cell::TimestampTz(late.and_utc()).to_text().unwrap(),
            "2024-03-09T13:05:59Z"
        );
    }

    #[test]
    fn null_has_no_text() {
        assert_eq!(Cell::Null.to_text(), None);
        assert_eq!(Cell::Null.to_string(), "NULL");
    }

    #[test]
    fn mismatched_variants_do_not_compare() {
        assert_eq!(Cell::I64(1).partial_cmp_value(&Cell::I32(1)), None);
        assert_eq!(
            Cell::I64(1).partial_cmp_value(&Cell::I64(2)),
            Some(Ordering::Less)
        );
    }
}
