// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Aggregate components.
//!
//! An embeddable attribute is stored in one structured column instead of one
//! column per attribute when the member or the embeddable carries
//! `struct_type`, or the member asks for an aggregate `jdbc_type_code`
//! (`struct`, `json`, `xml` and their array forms).
//!
//! The structured type name is taken from `struct_type(name)` on the member,
//! then on the embeddable, then from a single `column(column_definition)`;
//! otherwise the aggregate stays unqualified.
//!
//! Plural structs follow the dialect's preferred array representation:
//!
//! | Preferred array type | Aggregate type code |
//! |----------------------|---------------------|
//! | `ARRAY` | `STRUCT_ARRAY` |
//! | `TABLE` | `STRUCT_TABLE` |
//! | anything else | unsupported |
//!
//! The nested attribute columns and the user-defined type are completed by
//! an [`AggregateComponentSecondPass`], which is always queued.

use tracing::debug;

use super::{
    basic::explicit_type_code,
    column::ColumnsBuilder,
    context::BuildingContext,
    property::{BoundValue, PropertyScope, resolve_table}
};
use crate::{
    dialect::{Dialect, SqlTypeCode},
    error::{BindError, Result},
    model::{Aggregate, Component, MetadataCollector, PropertyValue, SimpleValue, ValueKind},
    second_pass::AggregateComponentSecondPass,
    source::{
        AnnotationTarget, ClassDetails, MemberDetails,
        attrs::{ColumnAttr, StructAttr}
    }
};

/// Whether `member`, of the embeddable type `embeddable`, is an aggregate.
///
/// # Errors
///
/// An undecodable `jdbc_type_code`.
pub(crate) fn is_aggregate(member: &MemberDetails, embeddable: &ClassDetails) -> Result<bool> {
    if member.has("struct_type") || embeddable.has("struct_type") {
        return Ok(true);
    }
    Ok(explicit_type_code(member)?.is_some_and(SqlTypeCode::is_aggregate))
}

/// Type code of a plural struct on `dialect`.
///
/// # Errors
///
/// [`BindError::Unsupported`] when the dialect has no structured array type.
pub(crate) fn struct_array_type_code(dialect: &dyn Dialect) -> Result<SqlTypeCode> {
    match dialect.preferred_sql_type_code_for_array() {
        SqlTypeCode::Array => Ok(SqlTypeCode::StructArray),
        SqlTypeCode::Table => Ok(SqlTypeCode::StructTable),
        other => Err(BindError::unsupported(
            dialect.name(),
            format!("arrays of structured types (preferred array type {other:?})")
        ))
    }
}

fn aggregate_type_code(member: &MemberDetails, dialect: &dyn Dialect) -> Result<SqlTypeCode> {
    let code = explicit_type_code(member)?.unwrap_or(SqlTypeCode::Struct);
    if !member.field_type().is_plural() {
        return Ok(code);
    }
    match code {
        SqlTypeCode::Json | SqlTypeCode::JsonArray => Ok(SqlTypeCode::JsonArray),
        SqlTypeCode::Xml | SqlTypeCode::XmlArray => Ok(SqlTypeCode::XmlArray),
        _ => struct_array_type_code(dialect)
    }
}

fn struct_name(
    member: &MemberDetails,
    embeddable: &ClassDetails
) -> Result<(Option<String>, Option<String>, Option<String>)> {
    let declared = match member.parse_direct::<StructAttr>("struct_type")? {
        Some(attr) => Some(attr),
        None => embeddable.parse_direct::<StructAttr>("struct_type")?
    };
    if let Some(attr) = declared
        && let Some(name) = attr.name.filter(|n| !n.trim().is_empty())
    {
        return Ok((Some(name), attr.schema, attr.catalog));
    }
    let columns: Vec<ColumnAttr> = member.parse_repeated("column")?;
    let definition = match columns.as_slice() {
        [single] => single.column_definition.clone(),
        _ => None
    };
    Ok((definition, None, None))
}

/// Bind `member` as an aggregate of `embeddable`.
///
/// # Errors
///
/// Undecodable attributes, inconsistent columns and dialects without a
/// structured array type.
pub(crate) fn bind_aggregate(
    member: &MemberDetails,
    embeddable: &ClassDetails,
    scope: &PropertyScope<'_>,
    metadata: &mut MetadataCollector,
    context: &BuildingContext<'_>
) -> Result<BoundValue> {
    let type_code = aggregate_type_code(member, context.dialect)?;
    let (struct_name, struct_schema, struct_catalog) = struct_name(member, embeddable)?;

    let columns = ColumnsBuilder::new(member, context, scope.path.as_str())
        .nullability(scope.nullability)
        .build_columns()?;
    let table = resolve_table(member, columns.explicit_table_name(), scope, metadata, context)?;
    let implicit = context.implicit_naming.basic_column_name(&scope.path);
    let selectables = columns.bind(table, &implicit, Some(type_code), metadata, context);
    let Some(column) = selectables
        .first()
        .and_then(|s| s.column_name())
        .map(str::to_string)
    else {
        return Err(BindError::annotation(
            member.location(),
            "an aggregate must map to a column, not a formula"
        ));
    };

    let mut value = SimpleValue::new(
        table,
        ValueKind::Component(Component {
            type_name:   embeddable.name().to_string(),
            properties:  Vec::new(),
            embedded_id: false,
            aggregate:   Some(Aggregate {
                column,
                type_code,
                struct_name,
                struct_schema,
                struct_catalog,
                columns: Vec::new()
            })
        })
    );
    value.selectables = selectables;
    value.type_name = Some(embeddable.name().to_string());
    value.sql_type_code = Some(type_code);
    let value = metadata.add_value(value);

    debug!(
        entity = %scope.entity,
        property = %scope.attribute(),
        type_code = ?type_code,
        "bound aggregate component"
    );
    metadata.add_second_pass(
        AggregateComponentSecondPass::new(scope.entity, scope.attribute(), value, embeddable.name()).into()
    );

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
        dialect::{DatabaseDialect, DatabaseVersion},
        error::ErrorKind,
        model::Table
    };

    const SOURCE: &str = r#"
        #[embeddable]
        #[struct_type(name = "address_type", schema = "geo")]
        struct Address {
            street: String,
            city: String
        }

        #[embeddable]
        struct Point {
            x: f64,
            y: f64
        }

        #[entity]
        struct Site {
            #[id]
            id: i64,
            address: Address,
            #[jdbc_type_code("json")]
            location: Point,
            #[embedded]
            corner: Point,
            #[jdbc_type_code("struct")]
            #[column(name = "waypoints", column_definition = "point_type")]
            waypoints: Vec<Point>
        }
    "#;

    #[derive(Debug)]
    struct JsonArrays;

    impl Dialect for JsonArrays {
        fn name(&self) -> &str {
            "JsonArrayDialect"
        }

        fn family(&self) -> &str {
            "json"
        }

        fn version(&self) -> DatabaseVersion {
            DatabaseVersion::new(1, 0)
        }

        fn preferred_sql_type_code_for_array(&self) -> SqlTypeCode {
            SqlTypeCode::Json
        }
    }

    fn bind_with(
        fixture: &Fixture,
        dialect: &dyn Dialect,
        member: &str,
        embeddable: &str
    ) -> (MetadataCollector, Result<BoundValue>) {
        let context = fixture.context_with(dialect);
        let mut metadata = MetadataCollector::new();
        let table = metadata.add_table(Table::new("Site", "Site"));
        let scope = PropertyScope::root("Site", "Site", table).nested(member);
        let class = fixture.sources.class(embeddable).unwrap();
        let result = bind_aggregate(fixture.member("Site", member), class, &scope, &mut metadata, &context);
        (metadata, result)
    }

    #[test]
    fn detection() {
        let fixture = Fixture::new(SOURCE);
        let address = fixture.sources.class("Address").unwrap();
        let point = fixture.sources.class("Point").unwrap();
        assert!(is_aggregate(fixture.member("Site", "address"), address).unwrap());
        assert!(is_aggregate(fixture.member("Site", "location"), point).unwrap());
        assert!(!is_aggregate(fixture.member("Site", "corner"), point).unwrap());
    }

    #[test]
    fn struct_name_from_embeddable() {
        let fixture = Fixture::new(SOURCE);
        let (metadata, bound) = bind_with(&fixture, &DatabaseDialect::Postgres, "address", "Address");
        let PropertyValue::Simple(id) = bound.unwrap().value else {
            panic!("expected a simple value");
        };
        let value = metadata.value(id);
        let aggregate = value.component().unwrap().aggregate.as_ref().unwrap();
        assert_eq!(aggregate.type_code, SqlTypeCode::Struct);
        assert_eq!(aggregate.struct_name.as_deref(), Some("address_type"));
        assert_eq!(aggregate.struct_schema.as_deref(), Some("geo"));
        assert_eq!(value.column_names(), vec!["address".to_string()]);
        assert!(metadata.is_value_resolved(id));
        assert_eq!(metadata.pending_second_passes()[0].describe(), "aggregate-component");
    }

    #[test]
    fn struct_arrays_follow_the_dialect() {
        let fixture = Fixture::new(SOURCE);
        let code = |dialect: &dyn Dialect| {
            let (metadata, bound) = bind_with(&fixture, dialect, "waypoints", "Point");
            bound.map(|bound| match bound.value {
                PropertyValue::Simple(id) => metadata.value(id).sql_type_code,
                PropertyValue::Collection(_) => None
            })
        };
        assert_eq!(code(&DatabaseDialect::Postgres).unwrap(), Some(SqlTypeCode::StructArray));
        assert_eq!(code(&DatabaseDialect::Oracle).unwrap(), Some(SqlTypeCode::StructTable));
        let err = code(&JsonArrays).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
        assert!(err.to_string().contains("JsonArrayDialect"));
    }

    #[test]
    fn struct_name_from_column_definition() {
        let fixture = Fixture::new(SOURCE);
        let (metadata, bound) = bind_with(&fixture, &DatabaseDialect::H2, "waypoints", "Point");
        let PropertyValue::Simple(id) = bound.unwrap().value else {
            panic!("expected a simple value");
        };
        let aggregate = metadata.value(id).component().unwrap().aggregate.clone().unwrap();
        assert_eq!(aggregate.struct_name.as_deref(), Some("point_type"));
        assert_eq!(aggregate.column, "waypoints");
    }
}
