// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Second passes that complete registries and metadata rather than columns.
//!
//! | Pass | Needs | Fails with |
//! |------|-------|------------|
//! | [`FilterSecondPass`] | filter definitions | unknown definition, no condition |
//! | [`FetchOverrideSecondPass`] | fetch profiles, entity properties | unknown profile, entity or association |
//! | [`NamedGraphSecondPass`] | inherited attribute names | unknown attribute node |
//! | [`AggregateComponentSecondPass`] | embeddable source, dialect types | conflicting structured type |
//! | [`AnyDiscriminatorValuesSecondPass`] | entity names | unknown entity, conflicting value |
//! | [`InverseOneToOneSecondPass`] | target to-one | unknown target or `mapped_by` |

use tracing::debug;

use super::Progress;
use crate::{
    binder::{BuildingContext, explicit_type_code, infer_type_code},
    dialect::SqlTypeCode,
    error::{BindError, Result},
    model::{
        CollectionId, Column, FetchMode, FetchOverride, FilterReference, MetadataCollector,
        NamedEntityGraph, UserDefinedType, ValueId, ValueKind
    },
    source::{
        AnnotationTarget,
        attrs::{ColumnAttr, FilterAttr}
    }
};

/// What a filter applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterTarget {
    /// Rows of the named entity.
    Entity,

    /// Elements of a collection.
    Collection(CollectionId)
}

/// Resolve `filter(name, condition)` references against the definitions.
#[derive(Debug, Clone)]
pub struct FilterSecondPass {
    owner:   String,
    target:  FilterTarget,
    filters: Vec<FilterAttr>
}

impl FilterSecondPass {
    /// Filters of an entity.
    pub fn entity(entity: impl Into<String>, filters: Vec<FilterAttr>) -> Self {
        Self {
            owner: entity.into(),
            target: FilterTarget::Entity,
            filters
        }
    }

    /// Filters of a collection, `role` is `Owner.property`.
    pub fn collection(role: impl Into<String>, collection: CollectionId, filters: Vec<FilterAttr>) -> Self {
        Self {
            owner: role.into(),
            target: FilterTarget::Collection(collection),
            filters
        }
    }

    /// Entity name or collection role.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Target.
    #[must_use]
    pub fn target(&self) -> FilterTarget {
        self.target
    }

    pub(crate) fn execute(&self, metadata: &mut MetadataCollector) -> Result<Progress> {
        let mut resolved = Vec::with_capacity(self.filters.len());
        for filter in &self.filters {
            let Some(definition) = metadata.filter_definition(&filter.name) else {
                return Err(BindError::unresolved(
                    &self.owner,
                    "",
                    format!("no filter definition named '{}'", filter.name)
                ));
            };
            let condition = filter
                .condition
                .clone()
                .filter(|c| !c.trim().is_empty())
                .or_else(|| definition.default_condition.clone());
            let Some(condition) = condition else {
                return Err(BindError::unresolved(
                    &self.owner,
                    "",
                    format!("filter '{}' has no condition and its definition no default", filter.name)
                ));
            };
            resolved.push(FilterReference {
                name: filter.name.clone(),
                condition
            });
        }

        let target = match self.target {
            FilterTarget::Entity => match metadata.entity_mut(&self.owner) {
                Some(entity) => &mut entity.filters,
                None => {
                    return Err(BindError::unresolved(&self.owner, "", "unknown entity"));
                }
            },
            FilterTarget::Collection(id) => &mut metadata.collection_mut(id).filters
        };
        for filter in resolved {
            if !target.iter().any(|f| f.name == filter.name) {
                target.push(filter);
            }
        }
        Ok(Progress::Done)
    }
}

/// Attach one association override to a fetch profile.
#[derive(Debug, Clone)]
pub struct FetchOverrideSecondPass {
    profile:     String,
    entity:      String,
    association: String,
    mode:        FetchMode
}

impl FetchOverrideSecondPass {
    /// Override `entity.association` in `profile`.
    pub fn new(
        profile: impl Into<String>,
        entity: impl Into<String>,
        association: impl Into<String>,
        mode: FetchMode
    ) -> Self {
        Self {
            profile: profile.into(),
            entity: entity.into(),
            association: association.into(),
            mode
        }
    }

    /// Entity as written.
    #[must_use]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Association property.
    #[must_use]
    pub fn association(&self) -> &str {
        &self.association
    }

    pub(crate) fn execute(&self, metadata: &mut MetadataCollector) -> Result<Progress> {
        if metadata.fetch_profile(&self.profile).is_none() {
            return Err(BindError::unresolved(
                &self.entity,
                &self.association,
                format!("no fetch profile named '{}'", self.profile)
            ));
        }
        let Some(entity) = metadata.resolve_entity_name(&self.entity).map(str::to_string) else {
            return Err(BindError::unresolved(
                &self.entity,
                &self.association,
                format!("fetch profile '{}' names an unknown entity", self.profile)
            ));
        };
        if metadata.find_property(&entity, &self.association).is_none() {
            return Err(BindError::unresolved(
                &entity,
                &self.association,
                format!("fetch profile '{}' names an unknown association", self.profile)
            ));
        }
        let fetch_override = FetchOverride {
            entity,
            association: self.association.clone(),
            mode: self.mode
        };
        if let Some(profile) = metadata.fetch_profile_mut(&self.profile)
            && !profile.overrides.contains(&fetch_override)
        {
            profile.overrides.push(fetch_override);
        }
        Ok(Progress::Done)
    }
}

/// Register a named entity graph once every attribute is known.
#[derive(Debug, Clone)]
pub struct NamedGraphSecondPass {
    entity:                 String,
    name:                   String,
    attribute_nodes:        Vec<String>,
    include_all_attributes: bool
}

impl NamedGraphSecondPass {
    /// Graph `name` over `entity`.
    pub fn new(
        entity: impl Into<String>,
        name: impl Into<String>,
        attribute_nodes: Vec<String>,
        include_all_attributes: bool
    ) -> Self {
        Self {
            entity: entity.into(),
            name: name.into(),
            attribute_nodes,
            include_all_attributes
        }
    }

    /// Entity.
    #[must_use]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Graph name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn execute(&self, metadata: &mut MetadataCollector) -> Result<Progress> {
        let known = metadata.attribute_names(&self.entity);
        if let Some(missing) = self.attribute_nodes.iter().find(|n| !known.contains(n)) {
            return Err(BindError::unresolved(
                &self.entity,
                missing,
                format!("entity graph '{}' names an unknown attribute", self.name)
            ));
        }
        let attribute_nodes = if self.include_all_attributes {
            known
        } else {
            self.attribute_nodes.clone()
        };
        metadata.add_entity_graph(NamedEntityGraph {
            name: self.name.clone(),
            entity: self.entity.clone(),
            attribute_nodes
        })?;
        Ok(Progress::Done)
    }
}

/// Bind the nested attribute columns of an aggregate and register its
/// structured type.
#[derive(Debug, Clone)]
pub struct AggregateComponentSecondPass {
    entity:     String,
    property:   String,
    value:      ValueId,
    embeddable: String
}

impl AggregateComponentSecondPass {
    /// Complete `value`, an aggregate of `embeddable`.
    pub fn new(
        entity: impl Into<String>,
        property: impl Into<String>,
        value: ValueId,
        embeddable: impl Into<String>
    ) -> Self {
        Self {
            entity: entity.into(),
            property: property.into(),
            value,
            embeddable: embeddable.into()
        }
    }

    /// Owning entity.
    #[must_use]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Aggregate property.
    #[must_use]
    pub fn property(&self) -> &str {
        &self.property
    }

    pub(crate) fn execute(
        &self,
        metadata: &mut MetadataCollector,
        context: &BuildingContext<'_>
    ) -> Result<Progress> {
        let Some(class) = context.sources.class(&self.embeddable) else {
            return Err(BindError::unresolved(
                &self.entity,
                &self.property,
                format!("unknown embeddable '{}'", self.embeddable)
            ));
        };

        let mut columns = Vec::with_capacity(class.members().len());
        for member in class.members() {
            if member.has("transient") {
                continue;
            }
            let attr = member.parse_direct::<ColumnAttr>("column")?.unwrap_or_default();
            let logical = attr
                .name
                .clone()
                .unwrap_or_else(|| context.implicit_naming.basic_column_name(member.name()));
            let field = member.field_type();
            let nested_embeddable = field
                .target_name()
                .and_then(|t| context.sources.class(t))
                .is_some_and(|c| c.is_embeddable());
            let type_code = match explicit_type_code(member)? {
                Some(code) => Some(code),
                None if nested_embeddable => Some(SqlTypeCode::Struct),
                None => infer_type_code(field, context.dialect)
            };
            let mut column = Column::new(context.column_name(&logical));
            column.sql_type_code = type_code;
            column.sql_type = attr.column_definition;
            column.nullable = attr
                .nullable
                .unwrap_or(field.is_optional() || !field.is_primitive());
            column.length = attr.length;
            column.precision = attr.precision;
            column.scale = attr.scale;
            columns.push(column);
        }

        let value = metadata.value_mut(self.value);
        let Some(aggregate) = value.component_mut().and_then(|c| c.aggregate.as_mut()) else {
            return Err(BindError::mapping(format!(
                "'{}.{}' is not an aggregate component",
                self.entity, self.property
            )));
        };
        aggregate.columns = columns.clone();
        let structured = matches!(
            aggregate.type_code,
            SqlTypeCode::Struct | SqlTypeCode::StructArray | SqlTypeCode::StructTable
        );
        let Some(name) = aggregate.struct_name.clone().filter(|_| structured) else {
            debug!(entity = %self.entity, property = %self.property, "aggregate left unqualified");
            return Ok(Progress::Done);
        };
        let udt = UserDefinedType {
            name:    name.clone(),
            schema:  aggregate.struct_schema.clone(),
            catalog: aggregate.struct_catalog.clone(),
            columns
        };

        let database = metadata.database_mut();
        if let Some(existing) = database.user_defined_type(&name) {
            if existing.columns != udt.columns {
                return Err(BindError::mapping(format!(
                    "structured type '{name}' is declared with different attributes"
                )));
            }
            return Ok(Progress::Done);
        }
        database.add_user_defined_type(udt);
        debug!(entity = %self.entity, property = %self.property, udt = %name, "registered structured type");
        Ok(Progress::Done)
    }
}

/// Resolve explicit `any_discriminator_value` mappings to entity names.
#[derive(Debug, Clone)]
pub struct AnyDiscriminatorValuesSecondPass {
    entity:   String,
    property: String,
    value:    ValueId,
    mappings: Vec<(String, String)>
}

impl AnyDiscriminatorValuesSecondPass {
    /// `mappings` are `(discriminator value, entity as written)` pairs.
    pub fn new(
        entity: impl Into<String>,
        property: impl Into<String>,
        value: ValueId,
        mappings: Vec<(String, String)>
    ) -> Self {
        Self {
            entity: entity.into(),
            property: property.into(),
            value,
            mappings
        }
    }

    /// Owning entity.
    #[must_use]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// `any` property.
    #[must_use]
    pub fn property(&self) -> &str {
        &self.property
    }

    pub(crate) fn execute(&self, metadata: &mut MetadataCollector) -> Result<Progress> {
        let mut resolved = Vec::with_capacity(self.mappings.len());
        for (discriminator, entity) in &self.mappings {
            let Some(name) = metadata.resolve_entity_name(entity) else {
                return Err(BindError::unresolved(
                    &self.entity,
                    &self.property,
                    format!("discriminator value '{discriminator}' maps to unknown entity '{entity}'")
                ));
            };
            resolved.push((discriminator.clone(), name.to_string()));
        }

        let ValueKind::Any(any) = &mut metadata.value_mut(self.value).kind else {
            return Err(BindError::mapping(format!(
                "'{}.{}' is not an any association",
                self.entity, self.property
            )));
        };
        for (discriminator, entity) in resolved {
            match any.discriminator_values.get(&discriminator) {
                Some(existing) if *existing != entity => {
                    return Err(BindError::mapping(format!(
                        "discriminator value '{discriminator}' of '{}.{}' maps to both '{existing}' and '{entity}'",
                        self.entity, self.property
                    )));
                }
                Some(_) => {}
                None => {
                    any.discriminator_values.insert(discriminator, entity);
                }
            }
        }
        Ok(Progress::Done)
    }
}

/// Validate the inverse side of a one-to-one.
#[derive(Debug, Clone)]
pub struct InverseOneToOneSecondPass {
    entity:    String,
    property:  String,
    value:     ValueId,
    mapped_by: String
}

impl InverseOneToOneSecondPass {
    /// `value` is the inverse to-one; `mapped_by` names the owning side.
    pub fn new(
        entity: impl Into<String>,
        property: impl Into<String>,
        value: ValueId,
        mapped_by: impl Into<String>
    ) -> Self {
        Self {
            entity: entity.into(),
            property: property.into(),
            value,
            mapped_by: mapped_by.into()
        }
    }

    /// Owning entity.
    #[must_use]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Inverse property.
    #[must_use]
    pub fn property(&self) -> &str {
        &self.property
    }

    pub(crate) fn execute(&self, metadata: &mut MetadataCollector) -> Result<Progress> {
        let requested = metadata
            .value(self.value)
            .to_one()
            .map(|t| t.referenced_entity.clone())
            .unwrap_or_default();
        let Some(target) = metadata.resolve_entity_name(&requested).map(str::to_string) else {
            return Err(BindError::unresolved(
                &self.entity,
                &self.property,
                format!("unknown entity '{requested}'")
            ));
        };
        let Some(owning) = metadata.find_property(&target, &self.mapped_by) else {
            return Err(BindError::unresolved(
                &self.entity,
                &self.property,
                format!("mapped_by '{}' is not an attribute of '{target}'", self.mapped_by)
            ));
        };
        let back = owning
            .simple_value()
            .and_then(|v| metadata.value(v).to_one())
            .map(|t| t.referenced_entity.clone());
        let Some(back) = back else {
            return Err(BindError::unresolved(
                &self.entity,
                &self.property,
                format!("mapped_by '{target}.{}' is not a to-one association", self.mapped_by)
            ));
        };
        let points_back = metadata
            .resolve_entity_name(&back)
            .and_then(|b| metadata.root_entity(b))
            .zip(metadata.root_entity(&self.entity))
            .is_some_and(|(a, b)| a.entity_name == b.entity_name);
        if !points_back {
            return Err(BindError::unresolved(
                &self.entity,
                &self.property,
                format!("'{target}.{}' does not reference '{}'", self.mapped_by, self.entity)
            ));
        }

        if let ValueKind::ToOne(to_one) = &mut metadata.value_mut(self.value).kind {
            to_one.referenced_entity = target;
            to_one.referenced_property = Some(self.mapped_by.clone());
        }
        Ok(Progress::Done)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::model::{
        AnyValue, FilterDefinition, PersistentClass, Property, PropertyValue, SimpleValue, Table,
        ToOne
    };

    fn collector_with(entities: &[&str]) -> MetadataCollector {
        let mut metadata = MetadataCollector::new();
        for name in entities {
            let table = metadata.add_table(Table::new(name.to_lowercase(), *name));
            metadata
                .add_entity(PersistentClass::new(*name, *name, table))
                .unwrap();
        }
        metadata
    }

    fn filter(name: &str, condition: Option<&str>) -> FilterAttr {
        FilterAttr {
            name:      name.to_string(),
            condition: condition.map(str::to_string)
        }
    }

    #[test]
    fn filter_uses_default_condition() {
        let mut metadata = collector_with(&["Order"]);
        metadata
            .add_filter_definition(FilterDefinition {
                name:                 "tenant".into(),
                default_condition:    Some("tenant_id = :tenant".into()),
                parameters:           BTreeMap::new(),
                apply_to_load_by_key: false
            })
            .unwrap();
        let pass = FilterSecondPass::entity("Order", vec![filter("tenant", None)]);
        assert_eq!(pass.execute(&mut metadata).unwrap(), Progress::Done);
        pass.execute(&mut metadata).unwrap();
        let filters = &metadata.entity("Order").unwrap().filters;
        assert_eq!(filters.len(), 1);
        assert_eq!(filters[0].condition, "tenant_id = :tenant");
    }

    #[test]
    fn filter_errors_are_unresolved_references() {
        let mut metadata = collector_with(&["Order"]);
        let unknown = FilterSecondPass::entity("Order", vec![filter("missing", Some("1 = 1"))]);
        let err = unknown.execute(&mut metadata).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::UnresolvedReference);

        metadata
            .add_filter_definition(FilterDefinition {
                name:                 "active".into(),
                default_condition:    None,
                parameters:           BTreeMap::new(),
                apply_to_load_by_key: false
            })
            .unwrap();
        let no_condition = FilterSecondPass::entity("Order", vec![filter("active", None)]);
        assert!(no_condition.execute(&mut metadata).is_err());
    }

    #[test]
    fn fetch_override_requires_profile_and_association() {
        let mut metadata = collector_with(&["Order"]);
        let pass = FetchOverrideSecondPass::new("eager", "Order", "lines", FetchMode::Join);
        assert!(pass.execute(&mut metadata).is_err());

        metadata.add_fetch_profile("eager");
        assert!(pass.execute(&mut metadata).is_err());

        let value = metadata.add_value(SimpleValue::new(
            metadata.entity("Order").unwrap().table,
            crate::model::ValueKind::Basic
        ));
        metadata
            .entity_mut("Order")
            .unwrap()
            .add_property(Property::new("lines", PropertyValue::Simple(value)));
        pass.execute(&mut metadata).unwrap();
        pass.execute(&mut metadata).unwrap();
        assert_eq!(metadata.fetch_profile("eager").unwrap().overrides.len(), 1);
    }

    #[test]
    fn any_values_resolve_and_conflict() {
        let mut metadata = collector_with(&["Cat", "Dog", "Owner"]);
        let table = metadata.entity("Owner").unwrap().table;
        let discriminator = metadata.add_value(SimpleValue::new(table, ValueKind::Basic));
        let key = metadata.add_value(SimpleValue::new(table, ValueKind::Basic));
        let any = metadata.add_value(SimpleValue::new(
            table,
            ValueKind::Any(AnyValue {
                discriminator,
                key,
                discriminator_values: BTreeMap::new(),
                implicit_strategy: None,
                lazy: false
            })
        ));

        let ok = AnyDiscriminatorValuesSecondPass::new(
            "Owner",
            "pet",
            any,
            vec![("C".into(), "Cat".into()), ("D".into(), "Dog".into())]
        );
        ok.execute(&mut metadata).unwrap();

        let conflicting =
            AnyDiscriminatorValuesSecondPass::new("Owner", "pet", any, vec![("C".into(), "Dog".into())]);
        assert!(conflicting.execute(&mut metadata).is_err());

        let unknown =
            AnyDiscriminatorValuesSecondPass::new("Owner", "pet", any, vec![("B".into(), "Bird".into())]);
        assert_eq!(
            unknown.execute(&mut metadata).unwrap_err().kind(),
            crate::error::ErrorKind::UnresolvedReference
        );
    }

    #[test]
    fn inverse_one_to_one_checks_owning_side() {
        let mut metadata = collector_with(&["User", "Profile"]);
        let user_table = metadata.entity("User").unwrap().table;
        let profile_table = metadata.entity("Profile").unwrap().table;
        let to_one = |entity: &str, inverse: bool| ToOne {
            referenced_entity:   entity.to_string(),
            referenced_property: None,
            unique:              true,
            inverse,
            lazy:                false,
            foreign_key_name:    None,
            no_constraint:       false
        };
        let owning = metadata.add_value(SimpleValue::new(profile_table, ValueKind::ToOne(to_one("User", false))));
        metadata
            .entity_mut("Profile")
            .unwrap()
            .add_property(Property::new("user", PropertyValue::Simple(owning)));
        let inverse = metadata.add_value(SimpleValue::new(user_table, ValueKind::ToOne(to_one("Profile", true))));

        let bad = InverseOneToOneSecondPass::new("User", "profile", inverse, "owner");
        assert!(bad.execute(&mut metadata).is_err());

        let good = InverseOneToOneSecondPass::new("User", "profile", inverse, "user");
        good.execute(&mut metadata).unwrap();
        let resolved = metadata.value(inverse).to_one().unwrap();
        assert_eq!(resolved.referenced_property.as_deref(), Some("user"));
    }
}
