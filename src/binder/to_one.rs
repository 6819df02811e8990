// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! `many_to_one` and `one_to_one` associations.
//!
//! The owning side always needs the target's key, so the foreign key is
//! finished by a [`FkSecondPass`]:
//!
//! | Association | First pass | Second pass |
//! |-------------|------------|-------------|
//! | every `join_column` named | untyped columns | [`FkKind::SimpleToOne`] |
//! | implicit or referencing join columns | nothing | [`FkKind::ToOne`] |
//! | `maps_id` | nothing | [`FkKind::PkDrivenByDefaultMapsId`] |
//! | `maps_id("attr")` | nothing | [`FkKind::CopyIdentifierComponent`] |
//! | `one_to_one(mapped_by = "..")` | inverse value | [`InverseOneToOneSecondPass`] |

use tracing::debug;

use super::{
    column::{ColumnSet, ColumnsBuilder},
    context::BuildingContext,
    property::{BoundValue, PropertyScope, resolve_table},
    support::fetch_profile_overrides
};
use crate::{
    error::{BindError, Result},
    model::{Column, MetadataCollector, PropertyValue, Selectable, SimpleValue, ToOne, ValueKind},
    second_pass::{FkKind, FkSecondPass, InverseOneToOneSecondPass},
    source::{AnnotationTarget, MemberDetails, attrs::AssociationAttr}
};

/// Whether `member` is a single-valued association.
#[must_use]
pub(crate) fn is_to_one(member: &MemberDetails) -> bool {
    member.has("many_to_one") || member.has("one_to_one")
}

/// Bind a to-one association.
///
/// # Errors
///
/// Undecodable attributes, inconsistent join columns, a target that cannot
/// be inferred and unknown explicit tables.
pub(crate) fn bind_to_one(
    member: &MemberDetails,
    scope: &PropertyScope<'_>,
    metadata: &mut MetadataCollector,
    context: &BuildingContext<'_>
) -> Result<BoundValue> {
    let one_to_one = member.has("one_to_one");
    let kind = if one_to_one { "one_to_one" } else { "many_to_one" };
    let attr = member
        .parse_direct::<AssociationAttr>(kind)?
        .unwrap_or_default();
    let Some(target) = attr
        .target
        .clone()
        .or_else(|| member.field_type().scalar_name().map(str::to_string))
    else {
        return Err(BindError::annotation(
            member.location(),
            format!("'{kind}' needs a 'target' when the field type does not name the entity")
        ));
    };
    let lazy = attr.is_lazy(false);

    for pass in fetch_profile_overrides(member, scope.entity)? {
        metadata.add_second_pass(pass.into());
    }

    if let Some(mapped_by) = attr.mapped_by.clone().filter(|m| !m.is_empty()) {
        if !one_to_one {
            return Err(BindError::annotation(
                member.location(),
                "'mapped_by' is only allowed on 'one_to_one'"
            ));
        }
        return Ok(bind_inverse(member, scope, target, mapped_by, lazy, metadata));
    }

    if member.has("column") || member.has("columns") || member.has("formula") {
        return Err(BindError::annotation(
            member.location(),
            format!("'{kind}' may not use 'column', 'columns' or 'formula'")
        ));
    }
    let ColumnSet::JoinColumns(join_columns) = ColumnsBuilder::new(member, context, scope.path.as_str())
        .nullability(scope.nullability)
        .build()?
    else {
        return Err(BindError::mapping(format!(
            "'{}' did not produce join columns",
            scope.path
        )));
    };
    let explicit_table = join_columns
        .columns()
        .first()
        .and_then(|c| c.explicit_table.clone());
    let table = resolve_table(member, explicit_table.as_deref(), scope, metadata, context)?;

    let mut value = SimpleValue::new(
        table,
        ValueKind::ToOne(ToOne {
            referenced_entity: target.clone(),
            referenced_property: None,
            unique: one_to_one || join_columns.unique(),
            inverse: false,
            lazy,
            foreign_key_name: join_columns.foreign_key_name().map(str::to_string),
            no_constraint: join_columns.no_constraint()
        })
    );
    value.type_name = Some(target.clone());

    let spec = join_columns.column_at(0).clone();
    let kind = match member.direct("maps_id") {
        Some(usage) => match usage.optional_string_argument()? {
            Some(component_property) => FkKind::CopyIdentifierComponent {
                component_property,
                join_columns
            },
            None => FkKind::PkDrivenByDefaultMapsId {
                join_columns
            }
        },
        None if join_columns.is_fully_named() => {
            for column in join_columns.columns() {
                let Some(logical) = column.name.clone() else {
                    continue;
                };
                let physical = context.column_name(&logical);
                let mut created = Column::new(physical.clone());
                created.nullable = column.nullable;
                let owner = metadata.table_mut(table);
                owner.add_column(created);
                owner.bind_logical_name(logical, physical.clone());
                value.selectables.push(Selectable::Column(physical));
            }
            FkKind::SimpleToOne
        }
        None => FkKind::ToOne {
            path: scope.path.clone(),
            join_columns
        }
    };
    let value = metadata.add_value(value);

    let handle = metadata.next_second_pass_handle();
    let pass = FkSecondPass::new(handle, scope.entity, scope.attribute(), value, kind)
        .with_enclosing(scope.enclosing.clone());
    debug!(
        entity = %scope.entity,
        property = %scope.attribute(),
        target = %target,
        kind = pass.kind().describe(),
        "queued to-one foreign key"
    );
    metadata.add_second_pass(pass.into());

    Ok(BoundValue {
        value: PropertyValue::Simple(value),
        optional: spec.nullable,
        insertable: spec.insertable,
        updatable: spec.updatable,
        lazy
    })
}

fn bind_inverse(
    member: &MemberDetails,
    scope: &PropertyScope<'_>,
    target: String,
    mapped_by: String,
    lazy: bool,
    metadata: &mut MetadataCollector
) -> BoundValue {
    let mut value = SimpleValue::new(
        scope.table,
        ValueKind::ToOne(ToOne {
            referenced_entity: target.clone(),
            referenced_property: Some(mapped_by.clone()),
            unique: true,
            inverse: true,
            lazy,
            foreign_key_name: None,
            no_constraint: true
        })
    );
    value.type_name = Some(target);
    let value = metadata.add_value(value);
    metadata.add_second_pass(
        InverseOneToOneSecondPass::new(scope.entity, member.name(), value, mapped_by).into()
    );
    BoundValue {
        value: PropertyValue::Simple(value),
        optional: true,
        insertable: false,
        updatable: false,
        lazy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        binder::test_support::Fixture,
        model::{Table, ValueId},
        second_pass::SecondPass
    };

    const SOURCE: &str = r#"
        #[entity]
        struct Order {
            #[id]
            id: i64,
            #[many_to_one]
            customer: Customer,
            #[many_to_one]
            #[join_column(name = "billing_ref", nullable = false)]
            billing: Customer,
            #[one_to_one(mapped_by = "order")]
            invoice: Option<Invoice>,
            #[many_to_one(mapped_by = "orders")]
            wrong: Customer,
            #[many_to_one]
            #[column(name = "x")]
            mixed: Customer
        }
    "#;

    fn bind(fixture: &Fixture, member: &str) -> (MetadataCollector, Result<BoundValue>) {
        let context = fixture.context();
        let mut metadata = MetadataCollector::new();
        let table = metadata.add_table(Table::new("Order", "Order"));
        let scope = PropertyScope::root("Order", "Order", table).nested(member);
        let result = bind_to_one(fixture.member("Order", member), &scope, &mut metadata, &context);
        (metadata, result)
    }

    fn value_id(bound: &BoundValue) -> ValueId {
        match bound.value {
            PropertyValue::Simple(id) => id,
            PropertyValue::Collection(_) => panic!("not a simple value")
        }
    }

    #[test]
    fn implicit_join_columns_wait_for_the_target() {
        let fixture = Fixture::new(SOURCE);
        let (metadata, bound) = bind(&fixture, "customer");
        let bound = bound.unwrap();
        let value = metadata.value(value_id(&bound));
        assert!(value.selectables.is_empty());
        assert_eq!(value.to_one().unwrap().referenced_entity, "Customer");
        match &metadata.pending_second_passes()[0] {
            SecondPass::ForeignKey(pass) => {
                assert_eq!(pass.kind().describe(), "to-one-fk");
                assert_eq!(pass.property(), "customer");
            }
            other => panic!("unexpected pass {}", other.describe())
        }
    }

    #[test]
    fn named_join_columns_exist_immediately() {
        let fixture = Fixture::new(SOURCE);
        let (metadata, bound) = bind(&fixture, "billing");
        let bound = bound.unwrap();
        assert!(!bound.optional);
        let value = metadata.value(value_id(&bound));
        assert_eq!(value.column_names(), vec!["billing_ref".to_string()]);
        assert!(!metadata.table(value.table).column("billing_ref").unwrap().nullable);
        assert_eq!(metadata.pending_second_passes()[0].describe(), "simple-to-one-fk");
    }

    #[test]
    fn inverse_one_to_one_is_validated_later() {
        let fixture = Fixture::new(SOURCE);
        let (metadata, bound) = bind(&fixture, "invoice");
        let bound = bound.unwrap();
        assert!(!bound.insertable);
        assert!(metadata.value(value_id(&bound)).to_one().unwrap().inverse);
        assert!(metadata.is_value_resolved(value_id(&bound)));
        assert_eq!(metadata.pending_second_passes()[0].describe(), "inverse-one-to-one");
    }

    #[test]
    fn malformed_associations_fail_eagerly() {
        let fixture = Fixture::new(SOURCE);
        assert!(bind(&fixture, "wrong").1.is_err());
        assert!(bind(&fixture, "mixed").1.is_err());
    }
}
