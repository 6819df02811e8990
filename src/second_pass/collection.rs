// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Collection completion.
//!
//! The first pass knows the role, the kind and the element type of a
//! collection. Everything that depends on another entity's key is done here:
//!
//! | Mapping | Table | Key columns | Element |
//! |---------|-------|-------------|---------|
//! | element collection | collection table | owner key copy | basic or component |
//! | one-to-many, `mapped_by` | target table | target to-one columns | target entity |
//! | one-to-many, join columns | target table | owner key copy | target entity |
//! | one-to-many, no join columns | join table | owner key copy | unique target key copy |
//! | many-to-many | join table | owner key copy | target key copy |
//! | many-to-many, `mapped_by` | owning join table | owning element columns | owning key columns |
//!
//! After key and element, the index (lists, arrays), the idbag identifier,
//! the primary key of a dedicated table and the soft delete column follow.

use tracing::debug;

use super::{IdBagIdGeneratorSecondPass, Progress};
use crate::{
    binder::{AnnotatedJoinColumns, BuildingContext, strategies, support::bind_soft_delete},
    dialect::SqlTypeCode,
    error::{BindError, Result},
    model::{
        CollectionElement, CollectionId, CollectionKind, CollectionState, Column, ForeignKey,
        MetadataCollector, PrimaryKey, Property, PropertyAccess, PropertyValue, Selectable,
        SimpleValue, Table, TableId, ToOne, ValueId, ValueKind
    },
    source::{MemberRef, attrs::SoftDeleteAttr}
};

/// What a collection holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionTarget {
    /// Basic or embeddable elements bound in the first pass.
    Elements,

    /// Entities owning a key back to the collection owner.
    OneToMany {
        /// Entity name as written.
        target: String
    },

    /// Entities reached through a join table.
    ManyToMany {
        /// Entity name as written.
        target: String
    }
}

impl CollectionTarget {
    /// Target entity name, for associations.
    #[must_use]
    pub fn entity(&self) -> Option<&str> {
        match self {
            Self::Elements => None,
            Self::OneToMany {
                target
            }
            | Self::ManyToMany {
                target
            } => Some(target)
        }
    }
}

/// Explicit `join_table` of an association collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinTableSpec {
    /// Logical table name.
    pub name:                 Option<String>,
    /// Schema.
    pub schema:               Option<String>,
    /// Catalog.
    pub catalog:              Option<String>,
    /// Columns referencing the target.
    pub inverse_join_columns: AnnotatedJoinColumns
}

impl JoinTableSpec {
    /// Join table with every name implicit.
    #[must_use]
    pub fn implicit(property_path: impl Into<String>) -> Self {
        Self {
            name:                 None,
            schema:               None,
            catalog:              None,
            inverse_join_columns: AnnotatedJoinColumns::implicit(property_path, false)
        }
    }
}

/// Index column of a list or array.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSpec {
    /// Logical column name.
    pub column:   Option<String>,
    /// Nullability outside a dedicated table.
    pub nullable: bool
}

/// Surrogate identifier of an idbag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionIdSpec {
    /// Logical column name.
    pub column:    Option<String>,
    /// Generator name or legacy strategy.
    pub generator: String
}

/// Where the key ended up.
#[derive(Debug, Clone, Copy)]
struct Layout {
    table:     TableId,
    key:       ValueId,
    dedicated: bool,
    fk_mode:   bool
}

/// Completes one collection.
#[derive(Debug, Clone)]
pub struct CollectionSecondPass {
    collection:    CollectionId,
    owner:         String,
    property:      String,
    member:        MemberRef,
    target:        CollectionTarget,
    join_table:    Option<JoinTableSpec>,
    key_columns:   AnnotatedJoinColumns,
    index:         Option<IndexSpec>,
    collection_id: Option<CollectionIdSpec>,
    soft_delete:   Option<SoftDeleteAttr>
}

impl CollectionSecondPass {
    /// Pass for `collection`, the property `owner.property` declared by `member`.
    pub fn new(
        collection: CollectionId,
        owner: impl Into<String>,
        property: impl Into<String>,
        member: MemberRef,
        target: CollectionTarget,
        key_columns: AnnotatedJoinColumns
    ) -> Self {
        Self {
            collection,
            owner: owner.into(),
            property: property.into(),
            member,
            target,
            join_table: None,
            key_columns,
            index: None,
            collection_id: None,
            soft_delete: None
        }
    }

    /// Explicit join table.
    #[must_use]
    pub fn with_join_table(mut self, join_table: JoinTableSpec) -> Self {
        self.join_table = Some(join_table);
        self
    }

    /// Index column.
    #[must_use]
    pub fn with_index(mut self, index: IndexSpec) -> Self {
        self.index = Some(index);
        self
    }

    /// Idbag identifier.
    #[must_use]
    pub fn with_collection_id(mut self, collection_id: CollectionIdSpec) -> Self {
        self.collection_id = Some(collection_id);
        self
    }

    /// Soft delete column of the collection table.
    #[must_use]
    pub fn with_soft_delete(mut self, soft_delete: SoftDeleteAttr) -> Self {
        self.soft_delete = Some(soft_delete);
        self
    }

    /// Owning entity.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Collection property.
    #[must_use]
    pub fn property(&self) -> &str {
        &self.property
    }

    /// Collection being completed.
    #[must_use]
    pub fn collection(&self) -> CollectionId {
        self.collection
    }

    pub(crate) fn execute(
        &self,
        metadata: &mut MetadataCollector,
        context: &BuildingContext<'_>
    ) -> Result<Progress> {
        let Some((owner_table, owner_key)) = metadata.primary_key_columns(&self.owner) else {
            return Ok(Progress::Deferred);
        };
        let target = self
            .target
            .entity()
            .map(|name| self.resolve_target(metadata, name))
            .transpose()?;
        let target_key = match &target {
            Some(name) => match metadata.primary_key_columns(name) {
                Some(key) => Some(key),
                None => return Ok(Progress::Deferred)
            },
            None => None
        };
        if let Some(element) = self.element_value(metadata)
            && !metadata.is_value_resolved(element)
        {
            return Ok(Progress::Deferred);
        }

        let mapped_by = metadata.collection(self.collection).mapped_by.clone();
        let layout = match (&self.target, target, target_key, mapped_by) {
            (CollectionTarget::ManyToMany { .. }, Some(target), _, Some(mapped_by)) => {
                match self.mirror_owning_side(&target, &mapped_by, metadata)? {
                    Some(layout) => layout,
                    None => return Ok(Progress::Deferred)
                }
            }
            (CollectionTarget::OneToMany { .. }, Some(target), _, Some(mapped_by))
                if self.join_table.is_none() =>
            {
                match self.mapped_one_to_many(&target, &mapped_by, metadata)? {
                    Some(layout) => layout,
                    None => return Ok(Progress::Deferred)
                }
            }
            (CollectionTarget::OneToMany { .. }, Some(target), Some((target_table, _)), None)
                if self.join_table.is_none() && !self.key_columns.is_implicit() =>
            {
                self.foreign_key_one_to_many(
                    &target,
                    target_table,
                    owner_table,
                    &owner_key,
                    metadata,
                    context
                )
            }
            (CollectionTarget::Elements, ..) => {
                let Some(table) = metadata.collection(self.collection).collection_table else {
                    return Err(BindError::mapping(format!(
                        "element collection '{}.{}' has no collection table",
                        self.owner, self.property
                    )));
                };
                let key = self.bind_key(table, owner_table, &owner_key, metadata, context);
                Layout {
                    table,
                    key,
                    dedicated: true,
                    fk_mode: false
                }
            }
            (_, Some(target), Some((target_table, target_key)), _) => self.join_table_association(
                &target,
                (target_table, &target_key),
                (owner_table, &owner_key),
                metadata,
                context
            ),
            _ => return Err(self.unresolved("association target could not be determined"))
        };

        {
            let collection = metadata.collection_mut(self.collection);
            collection.collection_table = Some(layout.table);
            collection.key = Some(layout.key);
        }
        let inverse = metadata.collection(self.collection).inverse;

        self.bind_index(layout, inverse, metadata, context);
        self.bind_identifier(layout, metadata, context)?;
        if layout.dedicated && !inverse {
            self.bind_primary_key(layout, metadata);
        }
        if let Some(attr) = &self.soft_delete
            && layout.dedicated
        {
            let mapping = bind_soft_delete(attr, layout.table, metadata, context);
            metadata.collection_mut(self.collection).soft_delete = Some(mapping);
        }

        let key = metadata.value(layout.key).clone();
        let index = metadata
            .collection(self.collection)
            .index
            .map(|id| metadata.value(id).clone());
        let collection = metadata.collection_mut(self.collection);
        collection.cache_keys(&key, index.as_ref());
        collection.advance(CollectionState::SecondPassComplete)?;
        debug!(
            role = %collection.role,
            kind = collection.kind.as_str(),
            inverse,
            table = ?layout.table,
            "bound collection"
        );
        Ok(Progress::Done)
    }

    fn resolve_target(&self, metadata: &MetadataCollector, name: &str) -> Result<String> {
        metadata
            .resolve_entity_name(name)
            .map(str::to_string)
            .ok_or_else(|| self.unresolved(&format!("unknown entity '{name}'")))
    }

    fn element_value(&self, metadata: &MetadataCollector) -> Option<ValueId> {
        match metadata.collection(self.collection).element {
            CollectionElement::Basic(id) | CollectionElement::Component(id) => Some(id),
            _ => None
        }
    }

    fn mirror_owning_side(
        &self,
        target: &str,
        mapped_by: &str,
        metadata: &mut MetadataCollector
    ) -> Result<Option<Layout>> {
        let Some(owning) = metadata
            .find_property(target, mapped_by)
            .and_then(Property::collection)
        else {
            return Err(self.unresolved(&format!("'{target}.{mapped_by}' is not a collection")));
        };
        let owning = metadata.collection(owning);
        if owning.state != CollectionState::SecondPassComplete {
            return Ok(None);
        }
        let CollectionElement::ManyToMany(owning_element) = owning.element else {
            return Err(self.unresolved(&format!(
                "'{target}.{mapped_by}' is not a many-to-many association"
            )));
        };
        let (Some(table), Some(owning_key)) = (owning.collection_table, owning.key) else {
            return Ok(None);
        };

        let mut key = SimpleValue::new(table, ValueKind::Basic);
        key.selectables = metadata.value(owning_element).selectables.clone();
        let key = metadata.add_value(key);

        let lazy = metadata.collection(self.collection).lazy;
        let mut element = SimpleValue::new(
            table,
            ValueKind::ToOne(ToOne {
                referenced_entity:   target.to_string(),
                referenced_property: Some(mapped_by.to_string()),
                unique:              false,
                inverse:             true,
                lazy,
                foreign_key_name:    None,
                no_constraint:       true
            })
        );
        element.selectables = metadata.value(owning_key).selectables.clone();
        let element = metadata.add_value(element);
        let collection = metadata.collection_mut(self.collection);
        collection.element = CollectionElement::ManyToMany(element);
        collection.inverse = true;

        Ok(Some(Layout {
            table,
            key,
            dedicated: true,
            fk_mode: false
        }))
    }

    fn mapped_one_to_many(
        &self,
        target: &str,
        mapped_by: &str,
        metadata: &mut MetadataCollector
    ) -> Result<Option<Layout>> {
        let Some(value) = metadata
            .find_property(target, mapped_by)
            .and_then(Property::simple_value)
        else {
            return Err(self.unresolved(&format!("'{target}' has no property '{mapped_by}'")));
        };
        let referenced = metadata.value(value);
        if referenced.to_one().is_none() {
            return Err(self.unresolved(&format!(
                "'{target}.{mapped_by}' is not a to-one association"
            )));
        }
        if referenced.is_deferred() {
            return Ok(None);
        }

        let table = referenced.table;
        let mut key = SimpleValue::new(table, ValueKind::Basic);
        key.selectables = referenced.selectables.clone();
        let key = metadata.add_value(key);
        let collection = metadata.collection_mut(self.collection);
        collection.element = CollectionElement::OneToMany {
            referenced_entity: target.to_string()
        };
        collection.inverse = true;

        Ok(Some(Layout {
            table,
            key,
            dedicated: false,
            fk_mode: true
        }))
    }

    fn foreign_key_one_to_many(
        &self,
        target: &str,
        target_table: TableId,
        owner_table: TableId,
        owner_key: &[Column],
        metadata: &mut MetadataCollector,
        context: &BuildingContext<'_>
    ) -> Layout {
        let mut names = Vec::with_capacity(owner_key.len());
        for (index, source) in owner_key.iter().enumerate() {
            let descriptor = self.key_columns.column_at(index);
            let name = self.key_columns.physical_name(index, &source.name, context);
            let mut column = Column::typed_like(name.clone(), source);
            column.nullable = descriptor.nullable;
            let table = metadata.table_mut(target_table);
            table.add_column(column);
            table.bind_logical_name(descriptor.name.clone().unwrap_or_else(|| name.clone()), name.clone());
            names.push(name);
        }
        self.add_owner_foreign_key(target_table, owner_table, owner_key, &names, metadata, context);

        let mut key = SimpleValue::new(target_table, ValueKind::Basic);
        key.selectables = names.into_iter().map(Selectable::Column).collect();
        let key = metadata.add_value(key);
        metadata.collection_mut(self.collection).element = CollectionElement::OneToMany {
            referenced_entity: target.to_string()
        };

        Layout {
            table: target_table,
            key,
            dedicated: false,
            fk_mode: true
        }
    }

    fn join_table_association(
        &self,
        target: &str,
        (target_table, target_key): (TableId, &[Column]),
        (owner_table, owner_key): (TableId, &[Column]),
        metadata: &mut MetadataCollector,
        context: &BuildingContext<'_>
    ) -> Layout {
        let descriptor = self.join_table.clone().unwrap_or_else(|| {
            JoinTableSpec::implicit(format!("{}.{}", self.owner, self.property))
        });
        let logical = descriptor.name.clone().unwrap_or_else(|| {
            context.implicit_naming.join_table_name(
                &metadata.table(owner_table).logical_name,
                &metadata.table(target_table).logical_name
            )
        });
        let mut table = Table::new(context.table_name(&logical), logical);
        table.schema = descriptor.schema.clone().or_else(|| context.options.default_schema.clone());
        table.catalog = descriptor.catalog.clone().or_else(|| context.options.default_catalog.clone());
        let table = metadata.add_table(table);

        let key = self.bind_key(table, owner_table, owner_key, metadata, context);

        let inverse_columns = &descriptor.inverse_join_columns;
        let mut names = Vec::with_capacity(target_key.len());
        for (index, source) in target_key.iter().enumerate() {
            let name = inverse_columns.physical_name(index, &source.name, context);
            let mut column = Column::typed_like(name.clone(), source);
            column.nullable = false;
            let join_table = metadata.table_mut(table);
            join_table.add_column(column);
            let logical = inverse_columns
                .column_at(index)
                .name
                .clone()
                .unwrap_or_else(|| name.clone());
            join_table.bind_logical_name(logical, name.clone());
            names.push(name);
        }

        let one_to_many = matches!(self.target, CollectionTarget::OneToMany { .. });
        let lazy = metadata.collection(self.collection).lazy;
        let mut element = SimpleValue::new(
            table,
            ValueKind::ToOne(ToOne {
                referenced_entity:   target.to_string(),
                referenced_property: None,
                unique:              one_to_many,
                inverse:             false,
                lazy,
                foreign_key_name:    inverse_columns.foreign_key_name().map(str::to_string),
                no_constraint:       inverse_columns.no_constraint()
            })
        );
        element.selectables = names.iter().cloned().map(Selectable::Column).collect();
        let element = metadata.add_value(element);

        if one_to_many {
            let name = context
                .implicit_naming
                .unique_key_name(&metadata.table(table).name, &names);
            metadata.table_mut(table).add_unique_key(name, names.clone(), false);
        }
        let fk_name = inverse_columns.foreign_key_name().map(str::to_string).unwrap_or_else(|| {
            context.implicit_naming.foreign_key_name(
                &metadata.table(table).name,
                &metadata.table(target_table).name,
                &names
            )
        });
        metadata.table_mut(table).add_foreign_key(ForeignKey {
            name:               fk_name,
            columns:            names,
            referenced_table:   target_table,
            referenced_entity:  Some(target.to_string()),
            referenced_columns: target_key.iter().map(|c| c.name.clone()).collect(),
            no_constraint:      inverse_columns.no_constraint()
                || !context.options.create_implicit_foreign_keys
        });
        metadata.collection_mut(self.collection).element = CollectionElement::ManyToMany(element);

        Layout {
            table,
            key,
            dedicated: true,
            fk_mode: false
        }
    }

    /// Key columns on a dedicated table, named after the owner entity.
    fn bind_key(
        &self,
        table: TableId,
        owner_table: TableId,
        owner_key: &[Column],
        metadata: &mut MetadataCollector,
        context: &BuildingContext<'_>
    ) -> ValueId {
        let owner_name = metadata
            .entity(&self.owner)
            .map_or_else(|| self.owner.clone(), |e| e.jpa_entity_name.clone());
        let mut names = Vec::with_capacity(owner_key.len());
        for (index, source) in owner_key.iter().enumerate() {
            let explicit = self
                .key_columns
                .column_for_referenced(&source.name)
                .or_else(|| self.key_columns.columns().get(index))
                .and_then(|c| c.name.clone());
            let logical = explicit.unwrap_or_else(|| {
                context
                    .implicit_naming
                    .collection_key_column_name(&owner_name, &source.name)
            });
            let name = context.column_name(&logical);
            let mut column = Column::typed_like(name.clone(), source);
            column.nullable = false;
            let collection_table = metadata.table_mut(table);
            collection_table.add_column(column);
            collection_table.bind_logical_name(logical, name.clone());
            names.push(name);
        }
        self.add_owner_foreign_key(table, owner_table, owner_key, &names, metadata, context);

        let mut key = SimpleValue::new(table, ValueKind::Basic);
        key.selectables = names.into_iter().map(Selectable::Column).collect();
        metadata.add_value(key)
    }

    fn add_owner_foreign_key(
        &self,
        table: TableId,
        owner_table: TableId,
        owner_key: &[Column],
        names: &[String],
        metadata: &mut MetadataCollector,
        context: &BuildingContext<'_>
    ) {
        let name = self
            .key_columns
            .foreign_key_name()
            .map(str::to_string)
            .unwrap_or_else(|| {
                context.implicit_naming.foreign_key_name(
                    &metadata.table(table).name,
                    &metadata.table(owner_table).name,
                    names
                )
            });
        metadata.table_mut(table).add_foreign_key(ForeignKey {
            name,
            columns: names.to_vec(),
            referenced_table: owner_table,
            referenced_entity: Some(self.owner.clone()),
            referenced_columns: owner_key.iter().map(|c| c.name.clone()).collect(),
            no_constraint: self.key_columns.no_constraint()
                || !context.options.create_implicit_foreign_keys
        });
    }

    fn bind_index(
        &self,
        layout: Layout,
        inverse: bool,
        metadata: &mut MetadataCollector,
        context: &BuildingContext<'_>
    ) {
        let kind = metadata.collection(self.collection).kind;
        if !kind.capabilities().indexed {
            return;
        }
        let descriptor = self.index.clone().unwrap_or_default();
        let logical = descriptor.column.unwrap_or_else(|| {
            context
                .implicit_naming
                .list_index_column_name(&self.property)
        });
        let name = context.column_name(&logical);

        let mut column = Column::new(name.clone());
        column.sql_type_code = Some(SqlTypeCode::Integer);
        column.nullable = !layout.dedicated && descriptor.nullable;
        let table = metadata.table_mut(layout.table);
        table.add_column(column);
        table.bind_logical_name(logical, name.clone());

        let mut index = SimpleValue::new(layout.table, ValueKind::Basic);
        index.selectables = vec![Selectable::Column(name)];
        index.type_name = Some("i32".into());
        index.sql_type_code = Some(SqlTypeCode::Integer);
        let index = metadata.add_value(index);
        metadata.collection_mut(self.collection).index = Some(index);

        if layout.fk_mode && !inverse && !self.key_columns.nullable() {
            self.add_index_backref(index, metadata);
        }
    }

    fn add_index_backref(&self, index: ValueId, metadata: &mut MetadataCollector) {
        let CollectionElement::OneToMany {
            referenced_entity
        } = metadata.collection(self.collection).element.clone()
        else {
            return;
        };
        let Some(target) = metadata.entity_mut(&referenced_entity) else {
            return;
        };
        let name = format!("_{}IndexBackref", self.property);
        if target.property(&name).is_some() {
            return;
        }
        let mut backref = Property::new(name, PropertyValue::Simple(index));
        backref.access = PropertyAccess::IndexBackref;
        backref.updatable = false;
        backref.optional = false;
        target.add_property(backref);
    }

    fn bind_identifier(
        &self,
        layout: Layout,
        metadata: &mut MetadataCollector,
        context: &BuildingContext<'_>
    ) -> Result<()> {
        let Some(descriptor) = &self.collection_id else {
            return Ok(());
        };
        let logical = descriptor.column.clone().unwrap_or_else(|| "id".to_string());
        let name = context.column_name(&logical);
        let mut column = Column::new(name.clone());
        column.sql_type_code = Some(SqlTypeCode::BigInt);
        column.nullable = false;
        let table = metadata.table_mut(layout.table);
        table.add_column(column);
        table.bind_logical_name(logical, name.clone());

        let mut identifier = SimpleValue::new(layout.table, ValueKind::Basic);
        identifier.selectables = vec![Selectable::Column(name)];
        identifier.type_name = Some("i64".into());
        identifier.sql_type_code = Some(SqlTypeCode::BigInt);
        let identifier = metadata.add_value(identifier);
        metadata.collection_mut(self.collection).identifier = Some(identifier);

        let pass = IdBagIdGeneratorSecondPass::new(
            self.collection,
            &self.owner,
            &self.property,
            self.member,
            &descriptor.generator
        );
        if strategies::legacy_implementation(&descriptor.generator, context.dialect).is_some()
            && pass.execute(metadata, context)? == Progress::Done
        {
            return Ok(());
        }
        metadata.add_second_pass(pass.into());
        Ok(())
    }

    fn bind_primary_key(&self, layout: Layout, metadata: &mut MetadataCollector) {
        let collection = metadata.collection(self.collection);
        let mut columns = metadata.value(layout.key).column_names();
        match collection.kind {
            CollectionKind::Set => {
                let element = match collection.element {
                    CollectionElement::Basic(id)
                    | CollectionElement::Component(id)
                    | CollectionElement::ManyToMany(id) => metadata.value(id),
                    _ => return
                };
                if element.has_formula() {
                    debug!(role = %collection.role, "no primary key for a set of formulas");
                    return;
                }
                let element_columns = element.column_names();
                let table = metadata.table_mut(layout.table);
                for name in &element_columns {
                    if let Some(column) = table.column_mut(name) {
                        column.nullable = false;
                    }
                }
                columns.extend(element_columns);
            }
            CollectionKind::List | CollectionKind::Array | CollectionKind::PrimitiveArray => {
                let Some(index) = collection.index else {
                    return;
                };
                columns.extend(metadata.value(index).column_names());
            }
            CollectionKind::IdBag => {
                let Some(identifier) = collection.identifier else {
                    return;
                };
                columns = metadata.value(identifier).column_names();
            }
            CollectionKind::Bag => return
        }
        metadata.table_mut(layout.table).primary_key = Some(PrimaryKey {
            name: None,
            columns
        });
    }

    fn unresolved(&self, message: &str) -> BindError {
        BindError::unresolved(&self.owner, &self.property, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_names() {
        assert_eq!(CollectionTarget::Elements.entity(), None);
        let target = CollectionTarget::ManyToMany {
            target: "Tag".into()
        };
        assert_eq!(target.entity(), Some("Tag"));
    }

    #[test]
    fn implicit_join_table_has_no_names() {
        let descriptor = JoinTableSpec::implicit("Order.tags");
        assert!(descriptor.name.is_none());
        assert!(descriptor.inverse_join_columns.is_implicit());
        assert_eq!(descriptor.inverse_join_columns.property_name(), "tags");
    }
}
