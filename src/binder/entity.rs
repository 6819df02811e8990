// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Entity classes.
//!
//! Binds one `#[entity]` struct: its table, its place in the hierarchy, the
//! identifier, the discriminator and every other member, then queues the
//! structural second passes.
//!
//! # Tables per inheritance strategy
//!
//! | Class | `single_table` | `joined` | `table_per_class` |
//! |-------|----------------|----------|-------------------|
//! | root | own table | own table | own table |
//! | subclass | root table, columns nullable | own table, key with FK to parent | own table, parent columns copied |
//!
//! # Discriminator
//!
//! A single-table root with subclasses, or any root with
//! `discriminator_column` / `discriminator_formula`, gets a discriminator:
//!
//! | `discriminator_type` | Column type | Default value |
//! |----------------------|-------------|---------------|
//! | `string` | `VARCHAR(31)` | JPA entity name |
//! | `char` | `CHAR(1)` | first letter of the JPA entity name |
//! | `integer` | `INTEGER` | hash of the JPA entity name |

use tracing::{debug, trace};

use super::{
    basic::bind_basic,
    column::Nullability,
    context::BuildingContext,
    generator::{GeneratorRequest, generator_request},
    property::{PropertyScope, bind_component, bind_property},
    support::{bind_soft_delete, filter_pass, named_graph_passes}
};
use crate::{
    dialect::SqlTypeCode,
    error::{BindError, Result},
    model::{
        Column, InheritanceType, MetadataCollector, PersistentClass, Property, PropertyValue,
        Selectable, SimpleValue, Table, TableId, ValueKind
    },
    second_pass::{
        DiscriminatorSecondPass, FkKind, FkSecondPass, IdGeneratorSecondPass,
        NaturalIdUniqueKeySecondPass, NullableDiscriminatorSecondPass, PrimaryKeySecondPass,
        UniqueKeySecondPass
    },
    source::{
        AnnotationTarget, ClassDetails, MemberDetails,
        attrs::{
            DiscriminatorColumnAttr, DiscriminatorOptionsAttr, DiscriminatorType, EntityAttr,
            InheritanceAttr, PrimaryKeyJoinColumnAttr, SoftDeleteAttr, TableAttr,
            UniqueConstraintAttr
        }
    }
};

/// Default length of a string discriminator column.
pub const DISCRIMINATOR_LENGTH: u32 = 31;

/// Entity and superclass names declared by `class`.
///
/// # Errors
///
/// An undecodable `entity` payload.
pub(crate) fn entity_names(class: &ClassDetails) -> Result<(String, Option<String>)> {
    let attr = class.parse_direct::<EntityAttr>("entity")?.unwrap_or_default();
    let jpa_name = attr
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| class.name().to_string());
    Ok((jpa_name, attr.extends.filter(|e| !e.trim().is_empty())))
}

/// Bind the entity `class`. Superclasses must already be bound.
///
/// # Errors
///
/// Malformed attributes, an unbound superclass, a missing identifier and
/// whatever the property binders raise.
pub(crate) fn bind_entity(
    class: &ClassDetails,
    metadata: &mut MetadataCollector,
    context: &BuildingContext<'_>
) -> Result<()> {
    let entity_name = class.name().to_string();
    let (jpa_name, extends) = entity_names(class)?;
    debug!(entity = %entity_name, jpa_name = %jpa_name, "binding entity");

    let parent = match extends.as_deref() {
        Some(name) => {
            let Some(resolved) = metadata.resolve_entity_name(name).map(str::to_string) else {
                return Err(BindError::unresolved(
                    &entity_name,
                    "",
                    format!("unknown superclass '{name}'")
                ));
            };
            Some(resolved)
        }
        None => None
    };
    let inheritance = match &parent {
        Some(parent) => metadata
            .root_entity(parent)
            .map(|root| root.inheritance)
            .unwrap_or_default(),
        None => class
            .parse_direct::<InheritanceAttr>("inheritance")?
            .map(|attr| attr.strategy)
            .unwrap_or_default()
    };
    let shares_parent_table = parent.is_some() && inheritance == InheritanceType::SingleTable;

    let table = match &parent {
        Some(parent) if shares_parent_table => metadata
            .entity(parent)
            .map(|p| p.table)
            .ok_or_else(|| BindError::unresolved(&entity_name, "", format!("unknown superclass '{parent}'")))?,
        _ => bind_table(class, &jpa_name, metadata, context)?
    };

    let mut entity = PersistentClass::new(&entity_name, &jpa_name, table);
    entity.superclass = parent.clone();
    entity.inheritance = inheritance;
    entity.sql_restriction = context
        .overrides
        .resolve_string(class, "sql_restriction", context.dialect)?;
    metadata.add_entity(entity)?;
    if let Some(parent) = &parent
        && let Some(parent) = metadata.entity_mut(parent)
    {
        parent.subclasses.push(entity_name.clone());
    }

    if parent.is_some() && !shares_parent_table {
        bind_subclass_key(class, &entity_name, table, inheritance, metadata)?;
    }

    let nullability = if shares_parent_table {
        Nullability::ForcedNull
    } else {
        Nullability::NoConstraint
    };
    let scope = PropertyScope::root(&entity_name, &jpa_name, table).with_nullability(nullability);

    let mut has_identifier = false;
    let mut natural_id = false;
    for member in class.members() {
        let Some(at) = context.sources.member_ref(class.name(), member.name()) else {
            continue;
        };
        if member.has("id") || member.has("embedded_id") {
            if parent.is_some() {
                return Err(BindError::annotation(
                    member.location(),
                    "subclasses inherit the identifier of their root entity"
                ));
            }
            if has_identifier {
                return Err(BindError::annotation(
                    member.location(),
                    "an entity has exactly one identifier"
                ));
            }
            bind_identifier(class, member, &scope, metadata, context)?;
            has_identifier = true;
            continue;
        }
        let Some(property) = bind_property(at, &scope, metadata, context)? else {
            continue;
        };
        natural_id |= property.natural_id;
        if let Some(entity) = metadata.entity_mut(&entity_name) {
            entity.add_property(property);
        }
    }
    if parent.is_none() && !has_identifier {
        return Err(BindError::annotation(
            class.location(),
            "entity needs a member marked 'id' or 'embedded_id'"
        ));
    }
    if parent.is_none() {
        metadata.add_second_pass(PrimaryKeySecondPass::new(&entity_name).into());
    }

    bind_discriminator(class, &entity_name, &jpa_name, parent.as_deref(), metadata, context)?;

    if natural_id {
        metadata.add_second_pass(NaturalIdUniqueKeySecondPass::new(&entity_name).into());
    }
    for constraint in class.parse_repeated::<UniqueConstraintAttr>("unique_constraint")? {
        if constraint.columns.0.is_empty() {
            return Err(BindError::annotation(
                class.location(),
                "'unique_constraint' needs at least one column"
            ));
        }
        metadata.add_second_pass(
            UniqueKeySecondPass::new(&entity_name, table, constraint.name, constraint.columns.0).into()
        );
    }
    if let Some(attr) = class.parse_direct::<SoftDeleteAttr>("soft_delete")? {
        if parent.is_some() {
            return Err(BindError::annotation(
                class.location(),
                "'soft_delete' belongs on the root of the hierarchy"
            ));
        }
        let mapping = bind_soft_delete(&attr, table, metadata, context);
        if let Some(entity) = metadata.entity_mut(&entity_name) {
            entity.soft_delete = Some(mapping);
        }
    }
    if let Some(filters) = filter_pass(class, &entity_name, None)? {
        metadata.add_second_pass(filters.into());
    }
    for graph in named_graph_passes(class, &entity_name, &jpa_name)? {
        metadata.add_second_pass(graph.into());
    }
    trace!(entity = %entity_name, ?inheritance, "bound entity first pass");
    Ok(())
}

fn bind_table(
    class: &ClassDetails,
    jpa_name: &str,
    metadata: &mut MetadataCollector,
    context: &BuildingContext<'_>
) -> Result<TableId> {
    let attr = class.parse_direct::<TableAttr>("table")?.unwrap_or_default();
    let logical = attr
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| context.implicit_naming.primary_table_name(jpa_name));
    let mut table = Table::new(context.table_name(&logical), logical);
    table.schema = attr.schema.or_else(|| context.options.default_schema.clone());
    table.catalog = attr.catalog.or_else(|| context.options.default_catalog.clone());
    table.subselect = class.string_argument("subselect")?;
    Ok(metadata.add_table(table))
}

/// Key value of a joined or table-per-class subclass, completed later.
fn bind_subclass_key(
    class: &ClassDetails,
    entity_name: &str,
    table: TableId,
    inheritance: InheritanceType,
    metadata: &mut MetadataCollector
) -> Result<()> {
    let columns = class
        .parse_repeated::<PrimaryKeyJoinColumnAttr>("primary_key_join_column")?
        .into_iter()
        .map(|attr| attr.name.filter(|n| !n.trim().is_empty()))
        .collect();
    let key = metadata.add_value(SimpleValue::new(table, ValueKind::Basic));
    if let Some(entity) = metadata.entity_mut(entity_name) {
        entity.key = Some(key);
    }
    let handle = metadata.next_second_pass_handle();
    let kind = FkKind::SubclassKey {
        with_fk: inheritance == InheritanceType::Joined,
        columns
    };
    metadata.add_second_pass(FkSecondPass::new(handle, entity_name, "", key, kind).into());
    Ok(())
}

/// Bind `id` or `embedded_id`.
fn bind_identifier(
    class: &ClassDetails,
    member: &MemberDetails,
    scope: &PropertyScope<'_>,
    metadata: &mut MetadataCollector,
    context: &BuildingContext<'_>
) -> Result<()> {
    let id_scope = scope
        .nested(member.name())
        .with_nullability(Nullability::ForcedNotNull);
    let bound = if member.has("embedded_id") {
        let Some(embeddable) = member
            .field_type()
            .scalar_name()
            .and_then(|name| context.sources.class(name))
            .filter(|c| c.is_embeddable())
        else {
            return Err(BindError::annotation(
                member.location(),
                "'embedded_id' requires the type of an embeddable struct"
            ));
        };
        let mapped = maps_id_attributes(class)?;
        bind_component(member, embeddable, &id_scope, true, &mapped, metadata, context)?
    } else {
        bind_basic(member, &id_scope, metadata, context)?
    };
    let PropertyValue::Simple(value) = bound.value else {
        return Err(BindError::mapping(format!("identifier '{}' is not a value", id_scope.path)));
    };

    let mut property = Property::new(member.name(), bound.value);
    property.optional = false;
    property.updatable = false;
    if let Some(entity) = metadata.entity_mut(scope.entity) {
        entity.identifier_property = Some(property);
        entity.identifier = Some(value);
    }

    if member.has("id")
        && let Some(at) = context.sources.member_ref(class.name(), member.name())
    {
        let request = generator_request(context, at)?.unwrap_or(GeneratorRequest::Assigned);
        trace!(entity = %scope.entity, ?request, "queued identifier generator");
        metadata.add_second_pass(IdGeneratorSecondPass::new(scope.entity, at, request).into());
    }
    Ok(())
}

/// Embedded identifier attributes named by `maps_id("..")` members.
fn maps_id_attributes(class: &ClassDetails) -> Result<Vec<String>> {
    let mut mapped = Vec::new();
    for member in class.members() {
        if let Some(usage) = member.direct("maps_id")
            && let Some(attribute) = usage.optional_string_argument()?
        {
            mapped.push(attribute);
        }
    }
    Ok(mapped)
}

/// Default discriminator value of an entity.
#[must_use]
pub fn default_discriminator_value(jpa_name: &str, kind: DiscriminatorType) -> String {
    match kind {
        DiscriminatorType::String => jpa_name.to_string(),
        DiscriminatorType::Char => jpa_name.chars().next().map(String::from).unwrap_or_default(),
        DiscriminatorType::Integer => jpa_name
            .encode_utf16()
            .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(i32::from(unit)))
            .to_string()
    }
}

fn bind_discriminator(
    class: &ClassDetails,
    entity_name: &str,
    jpa_name: &str,
    parent: Option<&str>,
    metadata: &mut MetadataCollector,
    context: &BuildingContext<'_>
) -> Result<()> {
    let explicit_value = class.string_argument("discriminator_value")?;
    if let Some(parent) = parent {
        let Some(root) = metadata.root_entity(parent) else {
            return Ok(());
        };
        let Some(discriminator) = root.discriminator else {
            return Ok(());
        };
        let kind = discriminator_kind(metadata.value(discriminator).sql_type_code);
        let value = explicit_value.unwrap_or_else(|| default_discriminator_value(jpa_name, kind));
        if let Some(entity) = metadata.entity_mut(entity_name) {
            entity.discriminator_value = Some(value);
        }
        return Ok(());
    }

    let column_attr = class.parse_direct::<DiscriminatorColumnAttr>("discriminator_column")?;
    let formula = context
        .overrides
        .resolve_string(class, "discriminator_formula", context.dialect)?;
    let (inheritance, has_subclasses, table) = match metadata.entity(entity_name) {
        Some(entity) => (entity.inheritance, has_declared_subclasses(class, context), entity.table),
        None => return Ok(())
    };
    let needed = column_attr.is_some()
        || formula.is_some()
        || (inheritance == InheritanceType::SingleTable && has_subclasses);
    if !needed {
        return Ok(());
    }
    let column_attr = column_attr.unwrap_or_default();
    let kind = column_attr.discriminator_type;
    let type_code = match kind {
        DiscriminatorType::String => SqlTypeCode::Varchar,
        DiscriminatorType::Char => SqlTypeCode::Char,
        DiscriminatorType::Integer => SqlTypeCode::Integer
    };

    let selectable = match formula.clone() {
        Some(formula) => Selectable::Formula(formula),
        None => {
            let logical = column_attr
                .name
                .clone()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| context.implicit_naming.discriminator_column_name());
            let physical = context.column_name(&logical);
            let mut column = Column::new(physical.clone());
            column.sql_type_code = Some(type_code);
            column.sql_type = column_attr.column_definition.clone();
            column.nullable = false;
            column.length = match kind {
                DiscriminatorType::String => Some(column_attr.length.unwrap_or(DISCRIMINATOR_LENGTH)),
                DiscriminatorType::Char => Some(1),
                DiscriminatorType::Integer => None
            };
            let owner = metadata.table_mut(table);
            owner.add_column(column);
            owner.bind_logical_name(logical, physical.clone());
            Selectable::Column(physical)
        }
    };
    let mut value = SimpleValue::new(table, ValueKind::Basic);
    value.selectables = vec![selectable];
    value.sql_type_code = Some(type_code);
    value.type_name = Some(
        match kind {
            DiscriminatorType::String => "String",
            DiscriminatorType::Char => "char",
            DiscriminatorType::Integer => "i32"
        }
        .to_string()
    );
    let value = metadata.add_value(value);

    let options = class
        .parse_direct::<DiscriminatorOptionsAttr>("discriminator_options")?
        .unwrap_or_default();
    if let Some(entity) = metadata.entity_mut(entity_name) {
        entity.discriminator = Some(value);
        entity.discriminator_value =
            Some(explicit_value.unwrap_or_else(|| default_discriminator_value(jpa_name, kind)));
        entity.force_discriminator = options.force;
        entity.discriminator_insertable = options.insert.unwrap_or(formula.is_none());
    }
    debug!(entity = %entity_name, formula = formula.is_some(), "bound discriminator");
    metadata.add_second_pass(DiscriminatorSecondPass::new(entity_name).into());
    metadata.add_second_pass(NullableDiscriminatorSecondPass::new(entity_name).into());
    Ok(())
}

fn discriminator_kind(code: Option<SqlTypeCode>) -> DiscriminatorType {
    match code {
        Some(SqlTypeCode::Char) => DiscriminatorType::Char,
        Some(SqlTypeCode::Integer) => DiscriminatorType::Integer,
        _ => DiscriminatorType::String
    }
}

/// Whether any entity in the source model extends `class`.
fn has_declared_subclasses(class: &ClassDetails, context: &BuildingContext<'_>) -> bool {
    let own = entity_names(class).ok().map(|(jpa, _)| jpa);
    context
        .sources
        .classes()
        .iter()
        .filter(|c| c.is_entity())
        .filter_map(|c| entity_names(c).ok().and_then(|(_, extends)| extends))
        .any(|extends| extends == class.name() || own.as_deref() == Some(extends.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{binder::test_support::Fixture, error::ErrorKind, second_pass::SecondPass};

    const SOURCE: &str = r#"
        #[entity(name = "Animal")]
        #[table(name = "animals")]
        #[discriminator_options(force)]
        struct AnimalEntity {
            #[id]
            #[generated_value(strategy = "sequence")]
            id: i64,
            name: String
        }

        #[entity(extends = "Animal")]
        #[discriminator_value("D")]
        struct Dog {
            good: bool
        }

        #[entity(extends = "Animal")]
        struct Cat {
            lives: i32
        }

        #[entity]
        #[inheritance(strategy = "joined")]
        #[discriminator_column(name = "kind", discriminator_type = "integer")]
        struct Vehicle {
            #[id]
            id: i64
        }

        #[entity(extends = "Vehicle")]
        #[primary_key_join_column(name = "car_id")]
        struct Car {
            doors: i32
        }

        #[embeddable]
        struct LineId {
            order_id: i64,
            line: i32
        }

        #[entity]
        #[unique_constraint(name = "uk_sku", columns("sku"))]
        #[soft_delete]
        struct Line {
            #[embedded_id]
            id: LineId,
            sku: String,
            #[natural_id]
            code: String
        }

        #[entity]
        struct Orphan {
            name: String
        }
    "#;

    fn bind_all(fixture: &Fixture, names: &[&str]) -> Result<MetadataCollector> {
        let context = fixture.context();
        let mut metadata = MetadataCollector::new();
        for name in names {
            bind_entity(fixture.sources.class(name).unwrap(), &mut metadata, &context)?;
        }
        Ok(metadata)
    }

    #[test]
    fn single_table_subclasses_share_the_root_table() {
        let fixture = Fixture::new(SOURCE);
        let metadata = bind_all(&fixture, &["AnimalEntity", "Dog", "Cat"]).unwrap();
        let root = metadata.entity("AnimalEntity").unwrap();
        assert_eq!(root.jpa_entity_name, "Animal");
        assert_eq!(root.subclasses, vec!["Dog".to_string(), "Cat".to_string()]);
        assert!(root.force_discriminator);
        assert_eq!(root.discriminator_value.as_deref(), Some("Animal"));
        let dog = metadata.entity("Dog").unwrap();
        assert_eq!(dog.table, root.table);
        assert_eq!(dog.discriminator_value.as_deref(), Some("D"));
        assert_eq!(metadata.entity("Cat").unwrap().discriminator_value.as_deref(), Some("Cat"));

        let table = metadata.table(root.table);
        assert_eq!(table.name, "animals");
        assert_eq!(table.column("DTYPE").unwrap().length, Some(DISCRIMINATOR_LENGTH));
        assert!(table.column("good").unwrap().nullable);
    }

    #[test]
    fn joined_subclass_key_is_deferred() {
        let fixture = Fixture::new(SOURCE);
        let metadata = bind_all(&fixture, &["Vehicle", "Car"]).unwrap();
        let car = metadata.entity("Car").unwrap();
        assert_ne!(car.table, metadata.entity("Vehicle").unwrap().table);
        assert!(metadata.value(car.key.unwrap()).is_deferred());
        assert!(metadata.pending_second_passes().iter().any(|p| match p {
            SecondPass::ForeignKey(pass) => pass.kind()
                == &FkKind::SubclassKey {
                    with_fk: true,
                    columns: vec![Some("car_id".to_string())]
                },
            _ => false
        }));
        let value = default_discriminator_value("Car", DiscriminatorType::Integer);
        assert_eq!(car.discriminator_value.as_deref(), Some(value.as_str()));
    }

    #[test]
    fn embedded_identifier_and_entity_passes() {
        let fixture = Fixture::new(SOURCE);
        let metadata = bind_all(&fixture, &["Line"]).unwrap();
        let line = metadata.entity("Line").unwrap();
        let id = metadata.value(metadata.identifier_value("Line").unwrap());
        assert!(id.component().unwrap().embedded_id);
        assert_eq!(id.column_names(), vec!["order_id".to_string(), "line".to_string()]);
        assert!(line.soft_delete.is_some());
        assert!(line.discriminator.is_none());
        let kinds: Vec<_> = metadata
            .pending_second_passes()
            .iter()
            .map(SecondPass::describe)
            .collect();
        assert!(kinds.contains(&"primary-key"));
        assert!(kinds.contains(&"unique-key"));
        assert!(kinds.contains(&"natural-id-unique-key"));
        assert!(!kinds.contains(&"id-generator"));
    }

    #[test]
    fn missing_pieces_are_reported() {
        let fixture = Fixture::new(SOURCE);
        let err = bind_all(&fixture, &["Orphan"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedAnnotation);
        let err = bind_all(&fixture, &["Dog"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnresolvedReference);
    }

    #[test]
    fn integer_discriminators_hash_like_strings() {
        assert_eq!(default_discriminator_value("a", DiscriminatorType::Integer), "97");
        assert_eq!(default_discriminator_value("ab", DiscriminatorType::Integer), "3105");
        assert_eq!(default_discriminator_value("Dog", DiscriminatorType::Char), "D");
    }
}
