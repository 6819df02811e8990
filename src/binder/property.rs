// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Property dispatch and embedded components.
//!
//! Every member of an entity or embeddable goes through [`bind_property`],
//! which picks the binder from the member's attributes and type:
//!
//! | Member | Binder |
//! |--------|--------|
//! | `transient` | skipped |
//! | `any` | [`bind_any`](super::any::bind_any) |
//! | `one_to_many`, `many_to_many`, `element_collection` | [`bind_collection`](super::collection::bind_collection) |
//! | `many_to_one`, `one_to_one` | [`bind_to_one`](super::to_one::bind_to_one) |
//! | embeddable type, aggregate | [`bind_aggregate`](super::aggregate::bind_aggregate) |
//! | embeddable type | [`bind_component`] |
//! | anything else | [`bind_basic`](super::basic::bind_basic) |
//!
//! A component's selectables are the concatenation of its attributes'
//! selectables. Attributes whose columns only appear in a second pass (to-one
//! join columns) add them to every enclosing component when they do.

use super::{
    aggregate, any,
    basic::{self, bind_basic, explicit_type_code, infer_type_code},
    collection,
    column::Nullability,
    context::BuildingContext,
    to_one
};
use crate::{
    error::{BindError, Result},
    model::{
        Component, MetadataCollector, Property, PropertyValue, SimpleValue, TableId, ValueId,
        ValueKind
    },
    source::{AnnotationTarget, ClassDetails, MemberDetails, MemberRef, attrs::NaturalIdAttr}
};

/// Where a property is being bound.
#[derive(Debug, Clone)]
pub(crate) struct PropertyScope<'s> {
    /// Owning entity.
    pub entity:      &'s str,
    /// JPA name of the owning entity.
    pub jpa_entity:  &'s str,
    /// Table receiving the columns.
    pub table:       TableId,
    /// Dotted path, `Entity.attribute` or `Entity.component.attribute`.
    pub path:        String,
    /// Nullability imposed on every column.
    pub nullability: Nullability,
    /// Component values enclosing the property, outermost first.
    pub enclosing:   Vec<ValueId>
}

impl<'s> PropertyScope<'s> {
    /// Scope of the direct attributes of `entity`.
    pub fn root(entity: &'s str, jpa_entity: &'s str, table: TableId) -> Self {
        Self {
            entity,
            jpa_entity,
            table,
            path: entity.to_string(),
            nullability: Nullability::NoConstraint,
            enclosing: Vec::new()
        }
    }

    /// Scope of the attribute `name` below this one.
    #[must_use]
    pub fn nested(&self, name: &str) -> Self {
        Self {
            path: format!("{}.{name}", self.path),
            ..self.clone()
        }
    }

    /// Scope of the attributes of the component `value`.
    #[must_use]
    pub fn within(&self, value: ValueId) -> Self {
        let mut scope = self.clone();
        scope.enclosing.push(value);
        scope
    }

    /// Same scope with another nullability policy.
    #[must_use]
    pub fn with_nullability(mut self, nullability: Nullability) -> Self {
        self.nullability = nullability;
        self
    }

    /// Name of the attribute this scope is for.
    pub fn attribute(&self) -> &str {
        self.path.rsplit('.').next().unwrap_or(&self.path)
    }
}

/// Result of one attribute binder.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BoundValue {
    pub value:      PropertyValue,
    pub optional:   bool,
    pub insertable: bool,
    pub updatable:  bool,
    pub lazy:       bool
}

impl BoundValue {
    fn into_property(self, name: &str) -> Property {
        let mut property = Property::new(name, self.value);
        property.optional = self.optional;
        property.insertable = self.insertable;
        property.updatable = self.updatable;
        property.lazy = self.lazy;
        property
    }
}

/// Table named by an explicit `column(table = "..")`, or the scope's table.
///
/// # Errors
///
/// A table that is neither the owner's nor already known.
pub(crate) fn resolve_table(
    member: &MemberDetails,
    explicit: Option<&str>,
    scope: &PropertyScope<'_>,
    metadata: &MetadataCollector,
    context: &BuildingContext<'_>
) -> Result<TableId> {
    let Some(name) = explicit else {
        return Ok(scope.table);
    };
    let physical = context.table_name(name);
    let owner = metadata.table(scope.table);
    if owner.logical_name == name || owner.name == physical {
        return Ok(scope.table);
    }
    metadata
        .database()
        .find_table(&physical)
        .ok_or_else(|| BindError::annotation(member.location(), format!("unknown table '{name}'")))
}

/// Bind the member at `at` below `scope`; `None` for transient members.
///
/// # Errors
///
/// Whatever the selected binder raises.
pub(crate) fn bind_property(
    at: MemberRef,
    scope: &PropertyScope<'_>,
    metadata: &mut MetadataCollector,
    context: &BuildingContext<'_>
) -> Result<Option<Property>> {
    let Some((member, _, _)) = context.member_scope(at) else {
        return Err(BindError::mapping(format!(
            "no member at {}:{} in the source model",
            at.class, at.member
        )));
    };
    if member.has("transient") {
        return Ok(None);
    }
    let scope = scope.nested(member.name());

    let bound = if member.has("any") {
        any::bind_any(member, &scope, metadata, context)?
    } else if collection::is_collection(member) {
        if !scope.enclosing.is_empty() {
            return Err(BindError::annotation(
                member.location(),
                "collections inside embeddables are not supported"
            ));
        }
        collection::bind_collection(at, member, &scope, metadata, context)?
    } else if to_one::is_to_one(member) {
        to_one::bind_to_one(member, &scope, metadata, context)?
    } else if let Some(embeddable) = embeddable_target(member, context)? {
        if aggregate::is_aggregate(member, embeddable)? {
            aggregate::bind_aggregate(member, embeddable, &scope, metadata, context)?
        } else if member.field_type().is_plural() {
            return Err(BindError::annotation(
                member.location(),
                "plural attribute of embeddables needs 'element_collection' or 'struct_type'"
            ));
        } else {
            bind_component(member, embeddable, &scope, false, &[], metadata, context)?
        }
    } else {
        reject_unmapped_plural(member, context)?;
        bind_basic(member, &scope, metadata, context)?
    };

    let mut property = bound.into_property(member.name());
    if let Some(natural_id) = member.parse_direct::<NaturalIdAttr>("natural_id")? {
        property.natural_id = true;
        property.natural_id_mutable = natural_id.mutable;
    }
    Ok(Some(property))
}

/// Embeddable class of `member`, if its type is one.
fn embeddable_target<'a>(
    member: &MemberDetails,
    context: &BuildingContext<'a>
) -> Result<Option<&'a ClassDetails>> {
    let class = member
        .field_type()
        .target_name()
        .and_then(|name| context.sources.class(name))
        .filter(|class| class.is_embeddable());
    if class.is_none() && (member.has("embedded") || member.has("embedded_id")) {
        return Err(BindError::annotation(
            member.location(),
            "'embedded' requires the type of an embeddable struct"
        ));
    }
    Ok(class)
}

fn reject_unmapped_plural(member: &MemberDetails, context: &BuildingContext<'_>) -> Result<()> {
    let field = member.field_type();
    if !field.is_plural() || field.is_bytes() {
        return Ok(());
    }
    if field.element().is_none() {
        return Err(BindError::annotation(member.location(), "map attributes are not supported"));
    }
    if field
        .element_name()
        .and_then(|name| context.sources.class(name))
        .is_some_and(|class| class.is_entity() || class.is_embeddable())
    {
        return Err(BindError::annotation(
            member.location(),
            "plural attribute of entities or embeddables needs 'one_to_many', 'many_to_many' or 'element_collection'"
        ));
    }
    Ok(())
}

/// Bind `member` as a component of `embeddable`.
///
/// Attributes listed in `mapped` take their columns from a `maps_id`
/// association and are created without columns.
///
/// # Errors
///
/// Whatever the nested binders raise.
pub(crate) fn bind_component(
    member: &MemberDetails,
    embeddable: &ClassDetails,
    scope: &PropertyScope<'_>,
    embedded_id: bool,
    mapped: &[String],
    metadata: &mut MetadataCollector,
    context: &BuildingContext<'_>
) -> Result<BoundValue> {
    let mut value = SimpleValue::new(
        scope.table,
        ValueKind::Component(Component {
            type_name: embeddable.name().to_string(),
            properties: Vec::new(),
            embedded_id,
            aggregate: None
        })
    );
    value.type_name = Some(embeddable.name().to_string());
    let id = metadata.add_value(value);
    let inner = scope.within(id);

    let mut optional = true;
    for nested in embeddable.members() {
        let Some(at) = context.sources.member_ref(embeddable.name(), nested.name()) else {
            continue;
        };
        let property = if mapped.iter().any(|m| m == nested.name()) {
            Some(bind_mapped_attribute(nested, &inner, metadata, context)?)
        } else {
            bind_property(at, &inner, metadata, context)?
        };
        let Some(property) = property else {
            continue;
        };
        optional &= property.optional;
        let selectables = property
            .simple_value()
            .map(|v| metadata.value(v).selectables.clone())
            .unwrap_or_default();
        let component = metadata.value_mut(id);
        component.selectables.extend(selectables);
        if let Some(component) = component.component_mut() {
            component.properties.push(property);
        }
    }

    Ok(BoundValue {
        value:      PropertyValue::Simple(id),
        optional:   !embedded_id && (optional || member.field_type().is_optional()),
        insertable: true,
        updatable:  !embedded_id,
        lazy:       false
    })
}

/// Identifier attribute whose columns come from a `maps_id` association.
fn bind_mapped_attribute(
    member: &MemberDetails,
    scope: &PropertyScope<'_>,
    metadata: &mut MetadataCollector,
    context: &BuildingContext<'_>
) -> Result<Property> {
    let mut value = SimpleValue::new(scope.table, ValueKind::Basic);
    value.type_name = Some(basic::type_name(member));
    value.sql_type_code = match explicit_type_code(member)? {
        Some(code) => Some(code),
        None => infer_type_code(member.field_type(), context.dialect)
    };
    let value = metadata.add_value(value);
    let mut property = Property::new(member.name(), PropertyValue::Simple(value));
    property.optional = false;
    property.updatable = false;
    Ok(property)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{binder::test_support::Fixture, model::Table};

    const SOURCE: &str = r#"
        #[embeddable]
        struct Address {
            street: String,
            #[column(name = "zip_code")]
            zip: Option<String>
        }

        #[entity]
        struct Customer {
            #[id]
            id: i64,
            #[embedded]
            home: Address,
            #[transient]
            cache: Vec<String>,
            #[natural_id(mutable)]
            email: String,
            scores: Vec<i32>,
            friends: Vec<Customer>
        }
    "#;

    fn bind(fixture: &Fixture, member: &str) -> (MetadataCollector, Result<Option<Property>>) {
        let context = fixture.context();
        let mut metadata = MetadataCollector::new();
        let table = metadata.add_table(Table::new("Customer", "Customer"));
        let scope = PropertyScope::root("Customer", "Customer", table);
        let result = bind_property(fixture.member_ref("Customer", member), &scope, &mut metadata, &context);
        (metadata, result)
    }

    #[test]
    fn scope_paths() {
        let scope = PropertyScope::root("Order", "Order", TableId(0)).nested("id").nested("line");
        assert_eq!(scope.path, "Order.id.line");
        assert_eq!(scope.attribute(), "line");
        assert_eq!(scope.within(ValueId(4)).enclosing, vec![ValueId(4)]);
    }

    #[test]
    fn component_collects_nested_columns() {
        let fixture = Fixture::new(SOURCE);
        let (metadata, result) = bind(&fixture, "home");
        let property = result.unwrap().unwrap();
        let value = metadata.value(property.simple_value().unwrap());
        assert_eq!(value.column_names(), vec!["street".to_string(), "zip_code".to_string()]);
        let component = value.component().unwrap();
        assert_eq!(component.properties.len(), 2);
        assert!(!component.embedded_id);
        assert!(metadata.is_value_resolved(property.simple_value().unwrap()));
    }

    #[test]
    fn transient_and_natural_id() {
        let fixture = Fixture::new(SOURCE);
        let (_, result) = bind(&fixture, "cache");
        assert!(result.unwrap().is_none());

        let (_, result) = bind(&fixture, "email");
        let property = result.unwrap().unwrap();
        assert!(property.natural_id);
        assert!(property.natural_id_mutable);
    }

    #[test]
    fn plural_basics_become_arrays_but_entities_need_an_association() {
        let fixture = Fixture::new(SOURCE);
        let (metadata, result) = bind(&fixture, "scores");
        let property = result.unwrap().unwrap();
        assert_eq!(
            metadata.value(property.simple_value().unwrap()).sql_type_code,
            Some(crate::dialect::SqlTypeCode::Array)
        );

        let (_, result) = bind(&fixture, "friends");
        assert!(result.is_err());
    }
}
