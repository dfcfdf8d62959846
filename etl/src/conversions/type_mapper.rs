//! Mapping of source column types to destination column types.
//!
//! [`destination_type`] is the only place that knows how a source type is represented in the
//! destination. It is total: every input maps to a type and unknown inputs fall back to
//! [`DestinationType::Varchar`].

use std::fmt;

use crate::types::SourceTypeCode;

/// Column types created in the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DestinationType {
    /// `NUMBER`, integers.
    Number,
    /// `NUMBER(38,2)`, fixed point.
    NumberScaled,
    /// `DOUBLE`
    Double,
    /// `BOOLEAN`
    Boolean,
    /// `VARCHAR`, also the fallback for anything unknown.
    Varchar,
    /// `TEXT`
    Text,
    /// `TIMESTAMP_TZ`, every temporal type.
    TimestampTz,
}

impl DestinationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DestinationType::Number => "NUMBER",
            DestinationType::NumberScaled => "NUMBER(38,2)",
            DestinationType::Double => "DOUBLE",
            DestinationType::Boolean => "BOOLEAN",
            DestinationType::Varchar => "VARCHAR",
            DestinationType::Text => "TEXT",
            DestinationType::TimestampTz => "TIMESTAMP_TZ",
        }
    }
}

impl fmt::Display for DestinationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name assumed for type OIDs missing from [`OID_TYPE_NAMES`].
const DEFAULT_TYPE_NAME: &str = "varchar";

/// Type OIDs the source reports in result descriptions.
const OID_TYPE_NAMES: &[(u32, &str)] = &[
    (16, "boolean"),
    (20, "bigint"),
    (21, "int2"),
    (23, "integer"),
    (25, "text"),
    (700, "real"),
    (701, "double precision"),
    (1042, "char"),
    (1043, "varchar"),
    (1082, "date"),
    (1114, "timestamp without time zone"),
    (1184, "timestamp with time zone"),
    (1700, "float"),
];

/// Source type names and their destination type.
const NAME_TYPES: &[(&str, DestinationType)] = &[
    ("bigint", DestinationType::Number),
    ("integer", DestinationType::Number),
    ("int", DestinationType::Number),
    ("int8", DestinationType::Number),
    ("int4", DestinationType::Number),
    ("int2", DestinationType::Number),
    ("smallint", DestinationType::Number),
    ("double precision", DestinationType::Double),
    ("float8", DestinationType::Double),
    ("real", DestinationType::Number),
    ("float4", DestinationType::Number),
    ("float", DestinationType::NumberScaled),
    ("numeric", DestinationType::NumberScaled),
    ("decimal", DestinationType::NumberScaled),
    ("boolean", DestinationType::Boolean),
    ("bool", DestinationType::Boolean),
    ("character varying", DestinationType::Varchar),
    ("varchar", DestinationType::Varchar),
    ("character", DestinationType::Varchar),
    ("char", DestinationType::Varchar),
    ("bpchar", DestinationType::Varchar),
    ("text", DestinationType::Varchar),
    ("nvarchar", DestinationType::Text),
    ("date", DestinationType::TimestampTz),
    ("timestamp", DestinationType::TimestampTz),
    ("timestamptz", DestinationType::TimestampTz),
    ("timestamp without time zone", DestinationType::TimestampTz),
    ("timestamp with time zone", DestinationType::TimestampTz),
];

/// Resolves a type OID to its source type name.
pub fn type_name_for_oid(oid: u32) -> &'static str {
    OID_TYPE_NAMES
        .iter()
        .find(|(known, _)| *known == oid)
        .map(|(_, name)| *name)
        .unwrap_or(DEFAULT_TYPE_NAME)
}

/// Returns the destination type for a source type name, ignoring case and surrounding spaces.
pub fn destination_type_for_name(name: &str) -> DestinationType {
    let name = name.trim();

    NAME_TYPES
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(name))
        .map(|(_, destination_type)| *destination_type)
        .unwrap_or(DestinationType::Varchar)
}

/// Returns the destination type of a source column type.
pub fn destination_type(source_type_code: &SourceTypeCode) -> DestinationType {
    match source_type_code {
        SourceTypeCode::Oid(oid) => destination_type_for_name(type_name_for_oid(*oid)),
        SourceTypeCode::Name(name) => destination_type_for_name(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_known_oid_maps_to_a_type() {
        let expected = [
            (16, DestinationType::Boolean),
            (20, DestinationType::Number),
            (21, DestinationType::Number),
            (23, DestinationType::Number),
            (25, DestinationType::Varchar),
            (700, DestinationType::Number),
            (701, DestinationType::Double),
            (1042, DestinationType::Varchar),
            (1043, DestinationType::Varchar),
            (1082, DestinationType::TimestampTz),
            (1114, DestinationType::TimestampTz),
            (1184, DestinationType::TimestampTz),
            (1700, DestinationType::NumberScaled),
        ];

        for (oid, destination) in expected {
            assert_eq!(
                destination_type(&SourceTypeCode::Oid(oid)),
                destination,
                "oid {oid}"
            );
        }
        assert_eq!(expected.len(), OID_TYPE_NAMES.len());
    }

    #[test]
    fn unknown_types_default_to_varchar() {
        assert_eq!(type_name_for_oid(3802), "varchar");
        assert_eq!(
            destination_type(&SourceTypeCode::Oid(3802)),
            DestinationType::Varchar
        );
        assert_eq!(
            destination_type(&SourceTypeCode::Name("geometry".to_string())),
            DestinationType::Varchar
        );
    }

    #[test]
    fn names_match_case_insensitively() {
        assert_eq!(
            destination_type_for_name(" Character Varying "),
            DestinationType::Varchar
        );
        assert_eq!(destination_type_for_name("NVARCHAR"), DestinationType::Text);
        assert_eq!(
            destination_type_for_name("TIMESTAMP WITH TIME ZONE"),
            DestinationType::TimestampTz
        );
        assert_eq!(destination_type_for_name("float"), DestinationType::NumberScaled);
    }

    #[test]
    fn destination_types_render_as_ddl() {
        assert_eq!(DestinationType::NumberScaled.to_string(), "NUMBER(38,2)");
        assert_eq!(DestinationType::TimestampTz.to_string(), "TIMESTAMP_TZ");
    }
}
