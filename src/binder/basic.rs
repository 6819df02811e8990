// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Basic values.
//!
//! A basic attribute maps to one or more plain columns (or a formula) on the
//! owner's table. The column type comes from `jdbc_type_code` when present,
//! otherwise from the Rust type:
//!
//! | Rust type | Type code |
//! |-----------|-----------|
//! | `bool` | dialect boolean |
//! | `i8` | `TINYINT` |
//! | `i16`, `u8` | `SMALLINT` |
//! | `i32`, `u16` | `INTEGER` |
//! | `i64`, `u32`, `u64`, `isize`, `usize` | `BIGINT` |
//! | `f32` / `f64` | `REAL` / `DOUBLE` |
//! | `Decimal` | `NUMERIC` |
//! | `char` / `String` | `CHAR` / `VARCHAR` |
//! | `Vec<u8>`, `[u8; N]` | `VARBINARY` |
//! | `Uuid` | dialect uuid |
//! | `NaiveDate`, `NaiveTime`, `NaiveDateTime` | `DATE`, `TIME`, `TIMESTAMP` |
//! | `DateTime`, `OffsetDateTime`, `ZonedDateTime` | per time-zone storage |
//! | `Instant`, `SystemTime` | dialect instant |
//! | `Duration` | dialect duration |
//! | `Value` | `JSON` |
//! | plural of a basic type | dialect array |
//!
//! Zoned timestamps stored with the `column` strategy get a second, integer
//! column holding the offset.

use quote::ToTokens;

use super::{
    column::{ColumnsBuilder, Nullability},
    context::BuildingContext,
    property::{BoundValue, PropertyScope, resolve_table},
    support::{resolve_time_zone_storage, time_zone_type_code}
};
use crate::{
    dialect::{Dialect, SqlTypeCode},
    error::{BindError, Result},
    model::{
        Column, MetadataCollector, PropertyValue, Selectable, SimpleValue, TimeZoneStorageKind,
        ValueKind
    },
    source::{
        AnnotationTarget, FieldType, MemberDetails,
        attrs::{TimeZoneColumnAttr, parse_type_code}
    }
};

/// Type code requested with `jdbc_type_code("..")`.
///
/// # Errors
///
/// A payload that is not a known type code.
pub(crate) fn explicit_type_code(member: &MemberDetails) -> Result<Option<SqlTypeCode>> {
    member
        .string_argument("jdbc_type_code")?
        .map(|code| {
            parse_type_code(&code).map_err(|_| {
                BindError::annotation(member.location(), format!("unknown type code '{code}'"))
            })
        })
        .transpose()
}

/// Type code inferred from a field type, `None` when nothing fits.
#[must_use]
pub(crate) fn infer_type_code(field: &FieldType, dialect: &dyn Dialect) -> Option<SqlTypeCode> {
    if field.is_bytes() {
        return Some(SqlTypeCode::Varbinary);
    }
    match field {
        FieldType::Scalar {
            name
        } => scalar_type_code(name, dialect),
        FieldType::Optional(inner) => infer_type_code(inner, dialect),
        FieldType::Plural {
            element, ..
        }
        | FieldType::Array {
            element
        } => infer_type_code(element, dialect).map(|_| dialect.preferred_sql_type_code_for_array()),
        FieldType::Map {
            ..
        } => None
    }
}

fn scalar_type_code(name: &str, dialect: &dyn Dialect) -> Option<SqlTypeCode> {
    let code = match name {
        "bool" => dialect.preferred_sql_type_code_for_boolean(),
        "i8" => SqlTypeCode::TinyInt,
        "i16" | "u8" => SqlTypeCode::SmallInt,
        "i32" | "u16" => SqlTypeCode::Integer,
        "i64" | "u32" | "u64" | "isize" | "usize" => SqlTypeCode::BigInt,
        "f32" => SqlTypeCode::Real,
        "f64" => SqlTypeCode::Double,
        "Decimal" | "BigDecimal" => SqlTypeCode::Numeric,
        "char" => SqlTypeCode::Char,
        "String" | "str" => SqlTypeCode::Varchar,
        "Uuid" => dialect.preferred_sql_type_code_for_uuid(),
        "NaiveDate" | "Date" => SqlTypeCode::Date,
        "NaiveTime" | "Time" => SqlTypeCode::Time,
        "NaiveDateTime" | "PrimitiveDateTime" => SqlTypeCode::Timestamp,
        "DateTime" | "OffsetDateTime" | "ZonedDateTime" => SqlTypeCode::TimestampWithTimeZone,
        "Instant" | "SystemTime" => dialect.preferred_sql_type_code_for_instant(),
        "Duration" => dialect.preferred_sql_type_code_for_duration(),
        "Value" | "JsonValue" => SqlTypeCode::Json,
        _ => return None
    };
    Some(code)
}

/// Type name recorded on a value: the scalar name, or the written type.
pub(crate) fn type_name(member: &MemberDetails) -> String {
    member
        .field_type()
        .scalar_name()
        .map(str::to_string)
        .unwrap_or_else(|| member.ty().to_token_stream().to_string().replace(' ', ""))
}

/// Bind a basic attribute.
///
/// # Errors
///
/// Undecodable attributes, inconsistent columns, unknown explicit tables and
/// invalid time-zone storage.
pub(crate) fn bind_basic(
    member: &MemberDetails,
    scope: &PropertyScope<'_>,
    metadata: &mut MetadataCollector,
    context: &BuildingContext<'_>
) -> Result<BoundValue> {
    let columns = ColumnsBuilder::new(member, context, scope.path.as_str())
        .nullability(scope.nullability)
        .build_columns()?;
    let table = resolve_table(member, columns.explicit_table_name(), scope, metadata, context)?;

    let storage = resolve_time_zone_storage(member, context)?;
    let type_code = match explicit_type_code(member)? {
        Some(code) => Some(code),
        None => match storage {
            Some(kind) => Some(time_zone_type_code(kind)),
            None => infer_type_code(member.field_type(), context.dialect)
        }
    };

    let implicit = context.implicit_naming.basic_column_name(&scope.path);
    let mut selectables = columns.bind(table, &implicit, type_code, metadata, context);

    if storage == Some(TimeZoneStorageKind::Column)
        && let Some(Selectable::Column(main)) = selectables.first().cloned()
    {
        let logical = member
            .parse_direct::<TimeZoneColumnAttr>("time_zone_column")?
            .and_then(|attr| attr.name)
            .unwrap_or_else(|| format!("{main}_tz"));
        let physical = context.column_name(&logical);
        let mut offset = Column::new(physical.clone());
        offset.sql_type_code = Some(SqlTypeCode::Integer);
        offset.nullable = columns.nullable() && scope.nullability != Nullability::ForcedNotNull;
        let owner = metadata.table_mut(table);
        owner.add_column(offset);
        owner.bind_logical_name(logical, physical.clone());
        selectables.push(Selectable::Column(physical));
    }

    let mut value = SimpleValue::new(table, ValueKind::Basic);
    value.selectables = selectables;
    value.type_name = Some(type_name(member));
    value.sql_type_code = type_code;
    value.time_zone_storage = storage;
    let value = metadata.add_value(value);

    Ok(BoundValue {
        value:      PropertyValue::Simple(value),
        optional:   columns.nullable(),
        insertable: columns.insertable(),
        updatable:  columns.updatable(),
        lazy:       false
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        binder::test_support::Fixture,
        dialect::DatabaseDialect,
        model::Table
    };

    const SOURCE: &str = r#"
        #[entity]
        struct Event {
            id: i64,
            flag: bool,
            label: Option<String>,
            tags: Vec<String>,
            payload: Vec<u8>,
            #[jdbc_type_code("json")]
            extra: String,
            #[time_zone_storage("column")]
            #[time_zone_column(name = "at_offset")]
            at: DateTime<Utc>,
            #[column(name = "amount_cents", nullable = false)]
            amount: i32,
            #[jdbc_type_code("sideways")]
            broken: String
        }
    "#;

    fn bind(fixture: &Fixture, dialect: &dyn Dialect, member: &str) -> (MetadataCollector, BoundValue) {
        let context = fixture.context_with(dialect);
        let mut metadata = MetadataCollector::new();
        let table = metadata.add_table(Table::new("Event", "Event"));
        let scope = PropertyScope::root("Event", "Event", table).nested(member);
        let bound = bind_basic(fixture.member("Event", member), &scope, &mut metadata, &context).unwrap();
        (metadata, bound)
    }

    fn value_of(bound: &BoundValue) -> crate::model::ValueId {
        match bound.value {
            PropertyValue::Simple(id) => id,
            PropertyValue::Collection(_) => panic!("not a simple value")
        }
    }

    #[test]
    fn infers_scalar_codes() {
        let dialect = DatabaseDialect::Postgres;
        let scalar = |name: &str| FieldType::Scalar {
            name: name.into()
        };
        assert_eq!(infer_type_code(&scalar("i64"), &dialect), Some(SqlTypeCode::BigInt));
        assert_eq!(infer_type_code(&scalar("u8"), &dialect), Some(SqlTypeCode::SmallInt));
        assert_eq!(infer_type_code(&scalar("Uuid"), &dialect), Some(SqlTypeCode::Uuid));
        assert_eq!(infer_type_code(&scalar("Customer"), &dialect), None);
        assert_eq!(
            infer_type_code(&scalar("Uuid"), &DatabaseDialect::MySql),
            Some(SqlTypeCode::Binary)
        );
    }

    #[test]
    fn binds_named_and_implicit_columns() {
        let fixture = Fixture::new(SOURCE);
        let (metadata, bound) = bind(&fixture, &DatabaseDialect::Postgres, "amount");
        let value = metadata.value(value_of(&bound));
        assert_eq!(value.column_names(), vec!["amount_cents".to_string()]);
        assert!(!bound.optional);
        let table = metadata.table(value.table);
        assert_eq!(table.column("amount_cents").unwrap().sql_type_code, Some(SqlTypeCode::Integer));

        let (metadata, bound) = bind(&fixture, &DatabaseDialect::Postgres, "label");
        let value = metadata.value(value_of(&bound));
        assert_eq!(value.column_names(), vec!["label".to_string()]);
        assert_eq!(value.type_name.as_deref(), Some("String"));
        assert!(bound.optional);
    }

    #[test]
    fn arrays_bytes_and_explicit_codes() {
        let fixture = Fixture::new(SOURCE);
        let (metadata, bound) = bind(&fixture, &DatabaseDialect::Oracle, "tags");
        assert_eq!(metadata.value(value_of(&bound)).sql_type_code, Some(SqlTypeCode::Table));

        let (metadata, bound) = bind(&fixture, &DatabaseDialect::Postgres, "payload");
        assert_eq!(metadata.value(value_of(&bound)).sql_type_code, Some(SqlTypeCode::Varbinary));

        let (metadata, bound) = bind(&fixture, &DatabaseDialect::Postgres, "extra");
        assert_eq!(metadata.value(value_of(&bound)).sql_type_code, Some(SqlTypeCode::Json));

        let (metadata, bound) = bind(&fixture, &DatabaseDialect::MySql, "flag");
        assert_eq!(metadata.value(value_of(&bound)).sql_type_code, Some(SqlTypeCode::Bit));
    }

    #[test]
    fn column_time_zone_storage_adds_offset_column() {
        let fixture = Fixture::new(SOURCE);
        let (metadata, bound) = bind(&fixture, &DatabaseDialect::Postgres, "at");
        let value = metadata.value(value_of(&bound));
        assert_eq!(value.column_names(), vec!["at".to_string(), "at_offset".to_string()]);
        assert_eq!(value.time_zone_storage, Some(TimeZoneStorageKind::Column));
        let table = metadata.table(value.table);
        assert_eq!(table.column("at").unwrap().sql_type_code, Some(SqlTypeCode::Timestamp));
        assert_eq!(table.column("at_offset").unwrap().sql_type_code, Some(SqlTypeCode::Integer));
    }

    #[test]
    fn unknown_type_code_is_rejected() {
        let fixture = Fixture::new(SOURCE);
        let context = fixture.context();
        let mut metadata = MetadataCollector::new();
        let table = metadata.add_table(Table::new("Event", "Event"));
        let scope = PropertyScope::root("Event", "Event", table).nested("broken");
        let err = bind_basic(fixture.member("Event", "broken"), &scope, &mut metadata, &context).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::MalformedAnnotation);
    }
}
