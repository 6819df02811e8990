// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Polymorphic `any` associations.
//!
//! An `any` attribute is a discriminator column (or formula) naming the
//! target entity plus key columns holding the target's identifier. No foreign
//! key is created. Discriminator values come from `any_discriminator_value`
//! entries, resolved against the entity map in a second pass, and from an
//! implicit strategy:
//!
//! | `any_discriminator_implicit_values` | Strategy |
//! |-------------------------------------|----------|
//! | absent | none |
//! | `strategy = "full_name"` | full entity name |
//! | `strategy = "short_name"` | short entity name |
//! | `strategy = "custom"`, no implementation or the strategy interface | none |
//! | `strategy = "custom"`, a built-in strategy class | that strategy |
//! | `strategy = "custom"`, another class | loaded through the class resolver |

use tracing::debug;

use super::{
    classes::{ClassKind, short_name},
    column::{ColumnSet, ColumnsBuilder, Nullability},
    context::BuildingContext,
    property::{BoundValue, PropertyScope}
};
use crate::{
    dialect::SqlTypeCode,
    error::{BindError, Result},
    model::{
        AnyValue, Column, ImplicitDiscriminatorStrategy, MetadataCollector, PropertyValue,
        Selectable, SimpleValue, ValueKind
    },
    second_pass::AnyDiscriminatorValuesSecondPass,
    source::{
        AnnotationTarget, MemberDetails,
        attrs::{
            AnyAttr, AnyDiscriminatorValueAttr, AnyImplicitValuesAttr, ImplicitValueStrategy,
            parse_type_code
        }
    }
};

/// Interface every implicit discriminator strategy implements.
pub const STRATEGY_INTERFACE: &str = "ImplicitDiscriminatorStrategy";

/// Built-in strategy storing the full entity name.
pub const FULL_NAME_STRATEGY: &str = "FullNameImplicitDiscriminatorStrategy";

/// Built-in strategy storing the short entity name.
pub const SHORT_NAME_STRATEGY: &str = "ShortNameImplicitDiscriminatorStrategy";

/// Resolve the implicit discriminator strategy of `member`.
///
/// # Errors
///
/// Undecodable payloads and custom classes the resolver cannot load.
pub(crate) fn implicit_strategy(
    member: &MemberDetails,
    context: &BuildingContext<'_>
) -> Result<Option<ImplicitDiscriminatorStrategy>> {
    let Some(attr) = member.parse_direct::<AnyImplicitValuesAttr>("any_discriminator_implicit_values")?
    else {
        return Ok(None);
    };
    let strategy = match attr.strategy {
        ImplicitValueStrategy::FullName => Some(ImplicitDiscriminatorStrategy::FullName),
        ImplicitValueStrategy::ShortName => Some(ImplicitDiscriminatorStrategy::ShortName),
        ImplicitValueStrategy::Custom => match attr.implementation.as_deref().map(short_name) {
            None | Some(STRATEGY_INTERFACE) => None,
            Some(FULL_NAME_STRATEGY) => Some(ImplicitDiscriminatorStrategy::FullName),
            Some(SHORT_NAME_STRATEGY) => Some(ImplicitDiscriminatorStrategy::ShortName),
            Some(_) => {
                let implementation = attr.implementation.as_deref().unwrap_or_default();
                let handle = context
                    .classes
                    .load(implementation, ClassKind::ImplicitDiscriminatorStrategy)?;
                Some(ImplicitDiscriminatorStrategy::Custom(handle.name))
            }
        }
    };
    Ok(strategy)
}

/// Bind an `any` association.
///
/// # Errors
///
/// `columns` on the member, missing join columns, inconsistent columns,
/// undecodable payloads and unloadable custom strategies.
pub(crate) fn bind_any(
    member: &MemberDetails,
    scope: &PropertyScope<'_>,
    metadata: &mut MetadataCollector,
    context: &BuildingContext<'_>
) -> Result<BoundValue> {
    let attr = member.parse_direct::<AnyAttr>("any")?.unwrap_or_default();
    let optional = attr.optional.unwrap_or(true);
    let nullability = match (scope.nullability, optional) {
        (Nullability::NoConstraint, false) => Nullability::ForcedNotNull,
        (Nullability::NoConstraint, true) => Nullability::ForcedNull,
        (forced, _) => forced
    };

    let ColumnSet::JoinColumns(join_columns) = ColumnsBuilder::new(member, context, scope.path.as_str())
        .nullability(nullability)
        .build()?
    else {
        return Err(BindError::annotation(member.location(), "'any' requires 'join_column'"));
    };
    let discriminator_columns = ColumnsBuilder::new(member, context, scope.path.as_str())
        .nullability(nullability)
        .build_columns()?;
    let strategy = implicit_strategy(member, context)?;
    let mappings: Vec<(String, String)> = member
        .parse_repeated::<AnyDiscriminatorValueAttr>("any_discriminator_value")?
        .into_iter()
        .map(|m| (m.discriminator, m.entity))
        .collect();
    let key_type = member
        .string_argument("any_key_type")?
        .map(|code| {
            parse_type_code(&code).map_err(|_| {
                BindError::annotation(member.location(), format!("unknown key type '{code}'"))
            })
        })
        .transpose()?
        .unwrap_or(SqlTypeCode::BigInt);

    let table = scope.table;
    let attribute = scope.attribute().to_string();
    let discriminator_selectables = discriminator_columns.bind(
        table,
        &format!("{attribute}_type"),
        Some(SqlTypeCode::Varchar),
        metadata,
        context
    );
    let mut discriminator = SimpleValue::new(table, ValueKind::Basic);
    discriminator.selectables = discriminator_selectables.clone();
    discriminator.type_name = Some("String".to_string());
    discriminator.sql_type_code = Some(SqlTypeCode::Varchar);
    let discriminator = metadata.add_value(discriminator);

    let mut key_selectables = Vec::with_capacity(join_columns.columns().len());
    for spec in join_columns.columns() {
        let logical = spec.name.clone().unwrap_or_else(|| {
            context
                .implicit_naming
                .join_column_name(&attribute, spec.referenced_column.as_deref().unwrap_or("id"))
        });
        let physical = context.column_name(&logical);
        let mut column = Column::new(physical.clone());
        column.sql_type_code = Some(key_type);
        column.nullable = spec.nullable;
        let owner = metadata.table_mut(table);
        owner.add_column(column);
        owner.bind_logical_name(logical, physical.clone());
        key_selectables.push(Selectable::Column(physical));
    }
    let mut key = SimpleValue::new(table, ValueKind::Basic);
    key.selectables = key_selectables.clone();
    key.sql_type_code = Some(key_type);
    let key = metadata.add_value(key);

    let lazy = attr
        .fetch
        .as_deref()
        .is_some_and(|f| f.eq_ignore_ascii_case("lazy"));
    let mut value = SimpleValue::new(
        table,
        ValueKind::Any(AnyValue {
            discriminator,
            key,
            discriminator_values: Default::default(),
            implicit_strategy: strategy,
            lazy
        })
    );
    value.selectables = discriminator_selectables
        .into_iter()
        .chain(key_selectables)
        .collect();
    let value = metadata.add_value(value);

    debug!(
        entity = %scope.entity,
        property = %attribute,
        explicit_values = mappings.len(),
        "bound any association"
    );
    if !mappings.is_empty() {
        metadata.add_second_pass(
            AnyDiscriminatorValuesSecondPass::new(scope.entity, attribute, value, mappings).into()
        );
    }

    Ok(BoundValue {
        value: PropertyValue::Simple(value),
        optional,
        insertable: join_columns.column_at(0).insertable,
        updatable: join_columns.column_at(0).updatable,
        lazy
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        binder::{ClassRegistry, test_support::Fixture},
        error::ErrorKind,
        model::Table
    };

    const SOURCE: &str = r#"
        #[entity]
        struct Payment {
            #[id]
            id: i64,
            #[any(optional = false)]
            #[column(name = "method_type")]
            #[join_column(name = "method_id")]
            #[any_discriminator_value(discriminator = "CARD", entity = "CardPayment")]
            #[any_discriminator_value(discriminator = "CASH", entity = "CashPayment")]
            #[any_discriminator_implicit_values(strategy = "short_name")]
            method: PaymentMethod,
            #[any]
            #[join_column(name = "target_id")]
            #[any_discriminator_implicit_values(strategy = "custom", implementation = "org.example.CodeStrategy")]
            target: Target,
            #[any]
            #[join_column(name = "other_id")]
            #[any_discriminator_implicit_values(strategy = "custom", implementation = "ImplicitDiscriminatorStrategy")]
            other: Target,
            #[any]
            #[columns(column(name = "a"), column(name = "b"))]
            #[join_column(name = "bad_id")]
            bad: Target,
            #[any]
            missing: Target
        }
    "#;

    fn bind(fixture: &Fixture, member: &str) -> (MetadataCollector, Result<BoundValue>) {
        let context = fixture.context();
        let mut metadata = MetadataCollector::new();
        let table = metadata.add_table(Table::new("Payment", "Payment"));
        let scope = PropertyScope::root("Payment", "Payment", table).nested(member);
        let result = bind_any(fixture.member("Payment", member), &scope, &mut metadata, &context);
        (metadata, result)
    }

    #[test]
    fn discriminator_and_key_columns() {
        let fixture = Fixture::new(SOURCE);
        let (metadata, bound) = bind(&fixture, "method");
        let bound = bound.unwrap();
        assert!(!bound.optional);
        let PropertyValue::Simple(id) = bound.value else {
            panic!("expected a simple value");
        };
        let value = metadata.value(id);
        assert_eq!(value.column_names(), vec!["method_type".to_string(), "method_id".to_string()]);
        let ValueKind::Any(any) = &value.kind else {
            panic!("expected an any value");
        };
        assert_eq!(any.implicit_strategy, Some(ImplicitDiscriminatorStrategy::ShortName));
        let table = metadata.table(value.table);
        assert!(!table.column("method_type").unwrap().nullable);
        assert_eq!(table.column("method_id").unwrap().sql_type_code, Some(SqlTypeCode::BigInt));
        assert_eq!(metadata.pending_second_passes()[0].describe(), "any-discriminator-values");
    }

    #[test]
    fn custom_strategies_go_through_the_resolver() {
        let mut fixture = Fixture::new(SOURCE);
        let (_, result) = bind(&fixture, "target");
        assert_eq!(result.unwrap_err().kind(), ErrorKind::ClassLoading);

        fixture.classes = ClassRegistry::default().with("CodeStrategy", ClassKind::ImplicitDiscriminatorStrategy);
        let (metadata, bound) = bind(&fixture, "target");
        let PropertyValue::Simple(id) = bound.unwrap().value else {
            panic!("expected a simple value");
        };
        let ValueKind::Any(any) = &metadata.value(id).kind else {
            panic!("expected an any value");
        };
        assert!(matches!(any.implicit_strategy, Some(ImplicitDiscriminatorStrategy::Custom(_))));
        assert_eq!(metadata.value(any.discriminator).column_names(), vec!["target_type".to_string()]);

        let (metadata, bound) = bind(&fixture, "other");
        let PropertyValue::Simple(id) = bound.unwrap().value else {
            panic!("expected a simple value");
        };
        let ValueKind::Any(any) = &metadata.value(id).kind else {
            panic!("expected an any value");
        };
        assert!(any.implicit_strategy.is_none());
    }

    #[test]
    fn malformed_any_fails_immediately() {
        let fixture = Fixture::new(SOURCE);
        let (metadata, result) = bind(&fixture, "bad");
        assert_eq!(result.unwrap_err().kind(), ErrorKind::MalformedAnnotation);
        assert!(metadata.pending_second_passes().is_empty());
        assert!(bind(&fixture, "missing").1.is_err());
    }
}
