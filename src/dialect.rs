// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Database dialect abstraction.
//!
//! The binder never renders SQL. It only asks the dialect which type codes it
//! prefers for a handful of Rust types, which generator strategy it treats as
//! native, and whether it can represent some structural features. [`Dialect`]
//! is the narrow interface; [`DatabaseDialect`] is the built-in set.
//!
//! # Preferences of the built-in dialects
//!
//! | Dialect | boolean | uuid | duration | array | native generator |
//! |---------|---------|------|----------|-------|------------------|
//! | PostgreSQL | `Boolean` | `Uuid` | `IntervalSecond` | `Array` | `sequence` |
//! | H2 | `Boolean` | `Uuid` | `IntervalSecond` | `Array` | `sequence` |
//! | Oracle | `Boolean` | `Binary` | `IntervalSecond` | `Table` | `sequence` |
//! | MySQL | `Bit` | `Binary` | `Numeric` | `Json` | `identity` |
//! | SQL Server | `Bit` | `Uuid` | `Numeric` | `Json` | `identity` |

use std::fmt;

use darling::FromMeta;

/// Abstract SQL type codes understood by the binder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SqlTypeCode {
    /// `BOOLEAN`
    Boolean,
    /// `BIT`
    Bit,
    /// `TINYINT`
    TinyInt,
    /// `SMALLINT`
    SmallInt,
    /// `INTEGER`
    Integer,
    /// `BIGINT`
    BigInt,
    /// `REAL`
    Real,
    /// `DOUBLE PRECISION`
    Double,
    /// `NUMERIC`
    Numeric,
    /// `CHAR`
    Char,
    /// `VARCHAR`
    Varchar,
    /// `VARBINARY`
    Varbinary,
    /// `BINARY`
    Binary,
    /// `DATE`
    Date,
    /// `TIME`
    Time,
    /// `TIMESTAMP`
    Timestamp,
    /// `TIMESTAMP` normalized to UTC.
    TimestampUtc,
    /// `TIMESTAMP WITH TIME ZONE`
    TimestampWithTimeZone,
    /// `INTERVAL SECOND`
    IntervalSecond,
    /// Native UUID type.
    Uuid,
    /// JSON document.
    Json,
    /// XML document.
    Xml,
    /// Structured (composite) type.
    Struct,
    /// Array of structured values.
    StructArray,
    /// Nested table of structured values.
    StructTable,
    /// JSON array of structured values.
    JsonArray,
    /// XML array of structured values.
    XmlArray,
    /// Basic SQL array.
    Array,
    /// Nested table.
    Table
}

impl SqlTypeCode {
    /// Whether this code makes an attribute an aggregate (struct-like) value.
    #[must_use]
    pub fn is_aggregate(self) -> bool {
        matches!(
            self,
            Self::Struct
                | Self::Json
                | Self::Xml
                | Self::StructArray
                | Self::StructTable
                | Self::JsonArray
                | Self::XmlArray
        )
    }

    /// Whether this aggregate code holds many structured values.
    #[must_use]
    pub fn is_plural_aggregate(self) -> bool {
        matches!(
            self,
            Self::StructArray | Self::StructTable | Self::JsonArray | Self::XmlArray
        )
    }

    /// Parse a code from its attribute spelling.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_lowercase().replace(['-', ' '], "_");
        let code = match normalized.as_str() {
            "boolean" | "bool" => Self::Boolean,
            "bit" => Self::Bit,
            "tinyint" => Self::TinyInt,
            "smallint" => Self::SmallInt,
            "integer" | "int" => Self::Integer,
            "bigint" => Self::BigInt,
            "real" | "float" => Self::Real,
            "double" => Self::Double,
            "numeric" | "decimal" => Self::Numeric,
            "char" => Self::Char,
            "varchar" => Self::Varchar,
            "varbinary" => Self::Varbinary,
            "binary" => Self::Binary,
            "date" => Self::Date,
            "time" => Self::Time,
            "timestamp" => Self::Timestamp,
            "timestamp_utc" => Self::TimestampUtc,
            "timestamp_with_timezone" | "timestamp_with_time_zone" => Self::TimestampWithTimeZone,
            "interval_second" => Self::IntervalSecond,
            "uuid" => Self::Uuid,
            "json" => Self::Json,
            "xml" => Self::Xml,
            "struct" => Self::Struct,
            "struct_array" => Self::StructArray,
            "struct_table" => Self::StructTable,
            "json_array" => Self::JsonArray,
            "xml_array" => Self::XmlArray,
            "array" => Self::Array,
            "table" => Self::Table,
            _ => return None
        };
        Some(code)
    }
}

impl FromMeta for SqlTypeCode {
    fn from_string(value: &str) -> darling::Result<Self> {
        Self::parse(value).ok_or_else(|| darling::Error::unknown_value(value))
    }
}

/// Database version reported by a dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct DatabaseVersion {
    /// Major version.
    pub major: u16,
    /// Minor version.
    pub minor: u16
}

impl DatabaseVersion {
    /// Create a version.
    #[must_use]
    pub const fn new(major: u16, minor: u16) -> Self {
        Self {
            major,
            minor
        }
    }
}

impl fmt::Display for DatabaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Narrow dialect interface consumed by the binder.
pub trait Dialect: fmt::Debug {
    /// Class-style name used in error messages, e.g. `PostgreSQLDialect`.
    fn name(&self) -> &str;

    /// Short family name matched by dialect overrides, e.g. `postgres`.
    fn family(&self) -> &str;

    /// Database version.
    fn version(&self) -> DatabaseVersion;

    /// Preferred type code for `bool`.
    fn preferred_sql_type_code_for_boolean(&self) -> SqlTypeCode {
        SqlTypeCode::Boolean
    }

    /// Preferred type code for durations.
    fn preferred_sql_type_code_for_duration(&self) -> SqlTypeCode {
        SqlTypeCode::Numeric
    }

    /// Preferred type code for UUIDs.
    fn preferred_sql_type_code_for_uuid(&self) -> SqlTypeCode {
        SqlTypeCode::Binary
    }

    /// Preferred type code for instants.
    fn preferred_sql_type_code_for_instant(&self) -> SqlTypeCode {
        SqlTypeCode::TimestampUtc
    }

    /// Preferred representation for arrays.
    fn preferred_sql_type_code_for_array(&self) -> SqlTypeCode {
        SqlTypeCode::Array
    }

    /// Strategy used for `native` and unnamed `AUTO` generation.
    fn native_identifier_generator_strategy(&self) -> &str {
        "sequence"
    }

    /// Whether identity columns are available.
    fn supports_identity_columns(&self) -> bool {
        true
    }

    /// Whether sequences are available.
    fn supports_sequences(&self) -> bool {
        true
    }

    /// Whether `TIMESTAMP WITH TIME ZONE` keeps the offset.
    fn supports_time_zone_types(&self) -> bool {
        false
    }

    /// Whether this dialect is the one named by an override attribute.
    fn matches(&self, family: &str) -> bool {
        self.family().eq_ignore_ascii_case(family.trim())
    }
}

/// Built-in dialects.
///
/// # Examples
///
/// ```rust,ignore
/// let dialect = DatabaseDialect::Postgres.with_version(16, 2);
/// assert_eq!(dialect.native_identifier_generator_strategy(), "sequence");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DatabaseDialect {
    /// PostgreSQL.
    #[default]
    Postgres,

    /// H2.
    H2,

    /// Oracle.
    Oracle,

    /// MySQL.
    MySql,

    /// Microsoft SQL Server.
    SqlServer
}

impl DatabaseDialect {
    /// Pair this dialect with a version.
    #[must_use]
    pub const fn with_version(self, major: u16, minor: u16) -> VersionedDialect {
        VersionedDialect {
            dialect: self,
            version: DatabaseVersion::new(major, minor)
        }
    }

    fn default_version(self) -> DatabaseVersion {
        match self {
            Self::Postgres => DatabaseVersion::new(16, 0),
            Self::H2 => DatabaseVersion::new(2, 2),
            Self::Oracle => DatabaseVersion::new(23, 0),
            Self::MySql => DatabaseVersion::new(8, 0),
            Self::SqlServer => DatabaseVersion::new(16, 0)
        }
    }
}

impl FromMeta for DatabaseDialect {
    fn from_string(value: &str) -> darling::Result<Self> {
        match value.to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "h2" => Ok(Self::H2),
            "oracle" => Ok(Self::Oracle),
            "mysql" => Ok(Self::MySql),
            "sqlserver" | "mssql" => Ok(Self::SqlServer),
            _ => Err(darling::Error::unknown_value(value))
        }
    }
}

impl Dialect for DatabaseDialect {
    fn name(&self) -> &str {
        match self {
            Self::Postgres => "PostgreSQLDialect",
            Self::H2 => "H2Dialect",
            Self::Oracle => "OracleDialect",
            Self::MySql => "MySQLDialect",
            Self::SqlServer => "SQLServerDialect"
        }
    }

    fn family(&self) -> &str {
        match self {
            Self::Postgres => "postgres",
            Self::H2 => "h2",
            Self::Oracle => "oracle",
            Self::MySql => "mysql",
            Self::SqlServer => "sqlserver"
        }
    }

    fn version(&self) -> DatabaseVersion {
        self.default_version()
    }

    fn preferred_sql_type_code_for_boolean(&self) -> SqlTypeCode {
        match self {
            Self::MySql | Self::SqlServer => SqlTypeCode::Bit,
            _ => SqlTypeCode::Boolean
        }
    }

    fn preferred_sql_type_code_for_duration(&self) -> SqlTypeCode {
        match self {
            Self::Postgres | Self::H2 | Self::Oracle => SqlTypeCode::IntervalSecond,
            _ => SqlTypeCode::Numeric
        }
    }

    fn preferred_sql_type_code_for_uuid(&self) -> SqlTypeCode {
        match self {
            Self::Postgres | Self::H2 | Self::SqlServer => SqlTypeCode::Uuid,
            _ => SqlTypeCode::Binary
        }
    }

    fn preferred_sql_type_code_for_array(&self) -> SqlTypeCode {
        match self {
            Self::Postgres | Self::H2 => SqlTypeCode::Array,
            Self::Oracle => SqlTypeCode::Table,
            Self::MySql | Self::SqlServer => SqlTypeCode::Json
        }
    }

    fn native_identifier_generator_strategy(&self) -> &str {
        match self {
            Self::MySql | Self::SqlServer => "identity",
            _ => "sequence"
        }
    }

    fn supports_sequences(&self) -> bool {
        !matches!(self, Self::MySql)
    }

    fn supports_time_zone_types(&self) -> bool {
        matches!(self, Self::H2 | Self::Oracle | Self::SqlServer)
    }
}

/// A built-in dialect pinned to a specific version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionedDialect {
    dialect: DatabaseDialect,
    version: DatabaseVersion
}

impl Dialect for VersionedDialect {
    fn name(&self) -> &str {
        self.dialect.name()
    }

    fn family(&self) -> &str {
        self.dialect.family()
    }

    fn version(&self) -> DatabaseVersion {
        self.version
    }

    fn preferred_sql_type_code_for_boolean(&self) -> SqlTypeCode {
        self.dialect.preferred_sql_type_code_for_boolean()
    }

    fn preferred_sql_type_code_for_duration(&self) -> SqlTypeCode {
        self.dialect.preferred_sql_type_code_for_duration()
    }

    fn preferred_sql_type_code_for_uuid(&self) -> SqlTypeCode {
        self.dialect.preferred_sql_type_code_for_uuid()
    }

    fn preferred_sql_type_code_for_array(&self) -> SqlTypeCode {
        self.dialect.preferred_sql_type_code_for_array()
    }

    fn native_identifier_generator_strategy(&self) -> &str {
        self.dialect.native_identifier_generator_strategy()
    }

    fn supports_sequences(&self) -> bool {
        self.dialect.supports_sequences()
    }

    fn supports_time_zone_types(&self) -> bool {
        self.dialect.supports_time_zone_types()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_meta_aliases() {
        assert_eq!(
            DatabaseDialect::from_string("PostgreSQL").unwrap(),
            DatabaseDialect::Postgres
        );
        assert_eq!(
            DatabaseDialect::from_string("mssql").unwrap(),
            DatabaseDialect::SqlServer
        );
        assert!(DatabaseDialect::from_string("sqlite").is_err());
    }

    #[test]
    fn array_preferences() {
        assert_eq!(
            DatabaseDialect::Postgres.preferred_sql_type_code_for_array(),
            SqlTypeCode::Array
        );
        assert_eq!(
            DatabaseDialect::Oracle.preferred_sql_type_code_for_array(),
            SqlTypeCode::Table
        );
        assert_eq!(
            DatabaseDialect::MySql.preferred_sql_type_code_for_array(),
            SqlTypeCode::Json
        );
    }

    #[test]
    fn native_strategy() {
        assert_eq!(
            DatabaseDialect::Postgres.native_identifier_generator_strategy(),
            "sequence"
        );
        assert_eq!(
            DatabaseDialect::MySql.native_identifier_generator_strategy(),
            "identity"
        );
    }

    #[test]
    fn versioned_dialect_delegates() {
        let dialect = DatabaseDialect::H2.with_version(1, 4);
        assert_eq!(dialect.version(), DatabaseVersion::new(1, 4));
        assert_eq!(dialect.name(), "H2Dialect");
        assert!(dialect.matches("H2"));
        assert!(!dialect.matches("postgres"));
    }

    #[test]
    fn aggregate_codes() {
        assert!(SqlTypeCode::Struct.is_aggregate());
        assert!(SqlTypeCode::JsonArray.is_plural_aggregate());
        assert!(!SqlTypeCode::Array.is_aggregate());
        assert_eq!(SqlTypeCode::parse("STRUCT-ARRAY"), Some(SqlTypeCode::StructArray));
        assert_eq!(SqlTypeCode::parse("nope"), None);
    }
}
