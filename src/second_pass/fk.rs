// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Foreign key second passes.
//!
//! Every kind finishes a value whose columns point at another entity's key:
//!
//! | Kind | Columns exist before | Creates |
//! |------|----------------------|---------|
//! | [`FkKind::SimpleToOne`] | yes (explicitly named) | types and the constraint |
//! | [`FkKind::ToOne`] | no | columns named from the referenced key, constraint |
//! | [`FkKind::SubclassKey`] | no | subclass key columns, primary key, optional constraint |
//! | [`FkKind::CopyIdentifierComponent`] | partially | identifier component columns shared with the association |
//! | [`FkKind::PkDrivenByDefaultMapsId`] | yes (the identifier) | association sharing the identifier columns |
//!
//! Passes are compared by their [`SecondPassHandle`] only.

use std::hash::{Hash, Hasher};

use tracing::debug;

use super::{Progress, SecondPassHandle};
use crate::{
    binder::{AnnotatedJoinColumns, BuildingContext},
    error::{BindError, Result},
    model::{
        Column, ForeignKey, GeneratorDefinition, MetadataCollector, Selectable, TableId, ValueId,
        ValueKind
    }
};

/// What a [`FkSecondPass`] completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FkKind {
    /// Explicitly named join columns; only types and constraint are missing.
    SimpleToOne,

    /// Join columns named from the referenced key.
    ToOne {
        /// Dotted property path, `Entity.property` or `Entity.id.property`.
        path:         String,
        /// Join column descriptors.
        join_columns: AnnotatedJoinColumns
    },

    /// Key of a joined or table-per-class subclass.
    SubclassKey {
        /// Create a constraint towards the parent table.
        with_fk: bool,
        /// Explicit key column names by position.
        columns: Vec<Option<String>>
    },

    /// `maps_id("attr")` into an embedded identifier.
    CopyIdentifierComponent {
        /// Identifier component attribute receiving the columns.
        component_property: String,
        /// Join column descriptors.
        join_columns:       AnnotatedJoinColumns
    },

    /// `maps_id` on an entity with a simple identifier.
    PkDrivenByDefaultMapsId {
        /// Join column descriptors.
        join_columns: AnnotatedJoinColumns
    }
}

impl FkKind {
    /// Short name for logs.
    #[must_use]
    pub fn describe(&self) -> &'static str {
        match self {
            Self::SimpleToOne => "simple-to-one-fk",
            Self::ToOne {
                ..
            } => "to-one-fk",
            Self::SubclassKey {
                ..
            } => "subclass-key-fk",
            Self::CopyIdentifierComponent {
                ..
            } => "copy-identifier-component",
            Self::PkDrivenByDefaultMapsId {
                ..
            } => "pk-driven-by-default-maps-id"
        }
    }
}

/// A foreign key second pass.
#[derive(Debug, Clone)]
pub struct FkSecondPass {
    handle:    SecondPassHandle,
    entity:    String,
    property:  String,
    value:     ValueId,
    enclosing: Vec<ValueId>,
    kind:      FkKind
}

impl PartialEq for FkSecondPass {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl Eq for FkSecondPass {}

impl Hash for FkSecondPass {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.handle.hash(state);
    }
}

impl FkSecondPass {
    /// Create a pass. `value` is the value whose columns are completed.
    pub fn new(
        handle: SecondPassHandle,
        entity: impl Into<String>,
        property: impl Into<String>,
        value: ValueId,
        kind: FkKind
    ) -> Self {
        Self {
            handle,
            entity: entity.into(),
            property: property.into(),
            value,
            enclosing: Vec::new(),
            kind
        }
    }

    /// Component values (outermost first) that also receive the created columns.
    #[must_use]
    pub fn with_enclosing(mut self, enclosing: Vec<ValueId>) -> Self {
        self.enclosing = enclosing;
        self
    }

    /// Identity.
    #[must_use]
    pub fn handle(&self) -> SecondPassHandle {
        self.handle
    }

    /// Owning entity.
    #[must_use]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Owning property.
    #[must_use]
    pub fn property(&self) -> &str {
        &self.property
    }

    /// Completed value.
    #[must_use]
    pub fn value(&self) -> ValueId {
        self.value
    }

    /// Kind.
    #[must_use]
    pub fn kind(&self) -> &FkKind {
        &self.kind
    }

    /// Whether the columns are part of the owner's primary key.
    ///
    /// For [`FkKind::ToOne`] the path is stripped of the entity name and of
    /// the identifier attribute name; what remains must be an attribute of
    /// the embedded identifier.
    #[must_use]
    pub fn is_in_primary_key(&self, metadata: &MetadataCollector) -> bool {
        match &self.kind {
            FkKind::SimpleToOne => false,
            FkKind::ToOne {
                path, ..
            } => {
                let Some(entity) = metadata.entity(&self.entity) else {
                    return false;
                };
                let Some(id) = &entity.identifier_property else {
                    return false;
                };
                let relative = path
                    .strip_prefix(self.entity.as_str())
                    .and_then(|p| p.strip_prefix('.'))
                    .unwrap_or(path);
                let Some(inner) = relative
                    .strip_prefix(id.name.as_str())
                    .and_then(|p| p.strip_prefix('.'))
                else {
                    return false;
                };
                id.simple_value()
                    .and_then(|v| metadata.value(v).component())
                    .is_some_and(|c| c.property(inner).is_some())
            }
            FkKind::SubclassKey {
                ..
            }
            | FkKind::CopyIdentifierComponent {
                ..
            }
            | FkKind::PkDrivenByDefaultMapsId {
                ..
            } => true
        }
    }

    /// Entity referenced by the completed value.
    #[must_use]
    pub fn referenced_entity_name(&self, metadata: &MetadataCollector) -> Option<String> {
        match &self.kind {
            FkKind::SubclassKey {
                ..
            } => metadata.entity(&self.entity)?.superclass.clone(),
            _ => metadata
                .value(self.value)
                .to_one()
                .map(|t| t.referenced_entity.clone())
        }
    }

    pub(crate) fn execute(
        &self,
        metadata: &mut MetadataCollector,
        context: &BuildingContext<'_>
    ) -> Result<Progress> {
        match &self.kind {
            FkKind::SimpleToOne => self.simple_to_one(metadata, context),
            FkKind::ToOne {
                join_columns, ..
            } => self.to_one(join_columns, metadata, context),
            FkKind::SubclassKey {
                with_fk,
                columns
            } => self.subclass_key(*with_fk, columns, metadata, context),
            FkKind::CopyIdentifierComponent {
                component_property,
                join_columns
            } => self.copy_identifier_component(component_property, join_columns, metadata, context),
            FkKind::PkDrivenByDefaultMapsId {
                join_columns
            } => self.pk_driven_maps_id(join_columns, metadata, context)
        }
    }

    fn target(&self, metadata: &MetadataCollector) -> Result<String> {
        let requested = self
            .referenced_entity_name(metadata)
            .unwrap_or_default();
        metadata
            .resolve_entity_name(&requested)
            .map(str::to_string)
            .ok_or_else(|| {
                BindError::unresolved(
                    &self.entity,
                    &self.property,
                    format!("unknown entity '{requested}'")
                )
            })
    }

    fn simple_to_one(
        &self,
        metadata: &mut MetadataCollector,
        context: &BuildingContext<'_>
    ) -> Result<Progress> {
        let target = self.target(metadata)?;
        let Some((referenced_table, referenced)) = metadata.primary_key_columns(&target) else {
            return Ok(Progress::Deferred);
        };
        let value = metadata.value(self.value);
        let table = value.table;
        let columns = value.column_names();
        if columns.len() != referenced.len() {
            return Err(self.arity_error(&target, columns.len(), referenced.len()));
        }
        for (name, source) in columns.iter().zip(&referenced) {
            if let Some(column) = metadata.table_mut(table).column_mut(name) {
                copy_type(column, source);
            }
        }
        self.finish_to_one(&target, table, columns, referenced_table, &referenced, metadata, context);
        Ok(Progress::Done)
    }

    fn to_one(
        &self,
        join_columns: &AnnotatedJoinColumns,
        metadata: &mut MetadataCollector,
        context: &BuildingContext<'_>
    ) -> Result<Progress> {
        let target = self.target(metadata)?;
        let referenced = if join_columns.references_columns() {
            let Some(table) = metadata.entity(&target).map(|e| e.table) else {
                return Ok(Progress::Deferred);
            };
            let mut found = Vec::new();
            for descriptor in join_columns.columns() {
                let Some(name) = descriptor.referenced_column.as_deref() else {
                    continue;
                };
                let target_table = metadata.table(table);
                let physical = target_table
                    .physical_column_name(name)
                    .map(str::to_string)
                    .unwrap_or_else(|| context.column_name(name));
                match target_table.column(&physical) {
                    Some(column) => found.push(column.clone()),
                    None if metadata.has_deferred_values(table) => return Ok(Progress::Deferred),
                    None => {
                        return Err(BindError::unresolved(
                            &self.entity,
                            &self.property,
                            format!("referenced column '{name}' not found on '{target}'")
                        ));
                    }
                }
            }
            (table, found)
        } else {
            match metadata.primary_key_columns(&target) {
                Some(key) => key,
                None => return Ok(Progress::Deferred)
            }
        };
        let (referenced_table, referenced) = referenced;
        if !join_columns.is_implicit() && join_columns.columns().len() != referenced.len() {
            return Err(self.arity_error(&target, join_columns.columns().len(), referenced.len()));
        }

        let in_primary_key = self.is_in_primary_key(metadata);
        let table = metadata.value(self.value).table;
        let mut names = Vec::with_capacity(referenced.len());
        for (index, source) in referenced.iter().enumerate() {
            let descriptor = join_columns.column_at(index);
            let name = join_columns.physical_name(index, &source.name, context);
            let mut column = Column::typed_like(name.clone(), source);
            column.nullable = descriptor.nullable && !in_primary_key;
            let owner = metadata.table_mut(table);
            owner.add_column(column);
            let logical = descriptor.name.clone().unwrap_or_else(|| name.clone());
            owner.bind_logical_name(logical, name.clone());
            names.push(name);
        }
        self.push_selectables(&names, metadata);
        self.finish_to_one(&target, table, names, referenced_table, &referenced, metadata, context);
        Ok(Progress::Done)
    }

    fn subclass_key(
        &self,
        with_fk: bool,
        explicit: &[Option<String>],
        metadata: &mut MetadataCollector,
        context: &BuildingContext<'_>
    ) -> Result<Progress> {
        let parent = self.target(metadata)?;
        let Some((parent_table, parent_key)) = metadata.primary_key_columns(&parent) else {
            return Ok(Progress::Deferred);
        };
        let table = metadata.value(self.value).table;
        if !with_fk && metadata.has_deferred_values(parent_table) {
            return Ok(Progress::Deferred);
        }

        let mut names = Vec::with_capacity(parent_key.len());
        for (index, source) in parent_key.iter().enumerate() {
            let name = explicit
                .get(index)
                .cloned()
                .flatten()
                .map(|n| context.column_name(&n))
                .unwrap_or_else(|| source.name.clone());
            let mut column = Column::typed_like(name.clone(), source);
            column.nullable = false;
            metadata.table_mut(table).add_column(column);
            names.push(name);
        }
        {
            let subclass_table = metadata.table_mut(table);
            subclass_table.primary_key = Some(crate::model::PrimaryKey {
                name:    None,
                columns: names.clone()
            });
        }
        self.push_selectables(&names, metadata);

        if with_fk {
            let fk_name = {
                let subclass_table = metadata.table(table);
                let parent = metadata.table(parent_table);
                context
                    .implicit_naming
                    .foreign_key_name(&subclass_table.name, &parent.name, &names)
            };
            metadata.table_mut(table).add_foreign_key(ForeignKey {
                name:               fk_name,
                columns:            names,
                referenced_table:   parent_table,
                referenced_entity:  Some(parent.clone()),
                referenced_columns: parent_key.iter().map(|c| c.name.clone()).collect(),
                no_constraint:      false
            });
        } else {
            let inherited: Vec<Column> = metadata.table(parent_table).columns().to_vec();
            let subclass_table = metadata.table_mut(table);
            for column in inherited {
                subclass_table.add_column(column);
            }
        }
        debug!(entity = %self.entity, parent = %parent, with_fk, "bound subclass key");
        Ok(Progress::Done)
    }

    fn copy_identifier_component(
        &self,
        component_property: &str,
        join_columns: &AnnotatedJoinColumns,
        metadata: &mut MetadataCollector,
        context: &BuildingContext<'_>
    ) -> Result<Progress> {
        let target = self.target(metadata)?;
        let Some((referenced_table, _)) = metadata.primary_key_columns(&target) else {
            return Ok(Progress::Deferred);
        };
        let Some(target_id) = metadata.identifier_value(&target) else {
            return Ok(Progress::Deferred);
        };
        let Some(id_value) = metadata.identifier_value(&self.entity) else {
            return Err(self.maps_id_error("the owner has no identifier"));
        };
        let Some(attribute) = metadata
            .value(id_value)
            .component()
            .and_then(|c| c.property(component_property))
            .and_then(|p| p.simple_value())
        else {
            return Err(self.maps_id_error(&format!(
                "identifier has no attribute '{component_property}'"
            )));
        };

        let target_selectables = metadata.value(target_id).selectables.clone();
        let target_table = metadata.value(target_id).table;
        let table = metadata.value(attribute).table;
        let existing = metadata.value(attribute).column_names();
        let mut names = Vec::new();
        let mut referenced = Vec::new();
        for (index, selectable) in target_selectables.iter().enumerate() {
            let Selectable::Column(source_name) = selectable else {
                debug!(
                    entity = %self.entity,
                    property = %self.property,
                    "skipping formula while copying identifier columns"
                );
                continue;
            };
            let Some(source) = metadata.table(target_table).column(source_name).cloned() else {
                continue;
            };
            let name = existing
                .get(index)
                .cloned()
                .unwrap_or_else(|| join_columns.physical_name(index, &source.name, context));
            let owner = metadata.table_mut(table);
            match owner.column_mut(&name) {
                Some(column) => {
                    copy_type(column, &source);
                    column.nullable = false;
                }
                None => {
                    let mut column = Column::typed_like(name.clone(), &source);
                    column.nullable = false;
                    owner.add_column(column);
                }
            }
            if !existing.contains(&name) {
                metadata
                    .value_mut(attribute)
                    .selectables
                    .push(Selectable::Column(name.clone()));
                metadata
                    .value_mut(id_value)
                    .selectables
                    .push(Selectable::Column(name.clone()));
            }
            names.push(name);
            referenced.push(source);
        }

        let value = metadata.value_mut(self.value);
        value.selectables = names.iter().cloned().map(Selectable::Column).collect();
        self.finish_to_one(&target, table, names, referenced_table, &referenced, metadata, context);
        Ok(Progress::Done)
    }

    fn pk_driven_maps_id(
        &self,
        join_columns: &AnnotatedJoinColumns,
        metadata: &mut MetadataCollector,
        context: &BuildingContext<'_>
    ) -> Result<Progress> {
        let target = self.target(metadata)?;
        let Some((referenced_table, referenced)) = metadata.primary_key_columns(&target) else {
            return Ok(Progress::Deferred);
        };
        let Some(id_value) = metadata.identifier_value(&self.entity) else {
            return Err(self.maps_id_error("the owner has no identifier"));
        };
        let Some(target_id) = metadata.identifier_value(&target) else {
            return Ok(Progress::Deferred);
        };
        let owner_type = metadata.value(id_value).type_name.clone();
        let target_type = metadata.value(target_id).type_name.clone();
        if let (Some(owner_type), Some(target_type)) = (&owner_type, &target_type)
            && owner_type != target_type
        {
            return Err(self.maps_id_error(&format!(
                "identifier type '{owner_type}' does not match identifier type '{target_type}' of '{target}'"
            )));
        }

        let table = metadata.value(id_value).table;
        let names = metadata.value(id_value).column_names();
        if names.len() != referenced.len() {
            return Err(self.arity_error(&target, names.len(), referenced.len()));
        }
        for (name, source) in names.iter().zip(&referenced) {
            if let Some(column) = metadata.table_mut(table).column_mut(name) {
                copy_type(column, source);
            }
        }
        metadata.value_mut(self.value).selectables =
            names.iter().cloned().map(Selectable::Column).collect();
        metadata.value_mut(id_value).identifier_generator = Some(
            GeneratorDefinition::new("", "ForeignGenerator").with_parameter("property", &self.property)
        );
        if join_columns.foreign_key_name().is_some() || join_columns.no_constraint() {
            debug!(entity = %self.entity, "maps_id join column settings apply to the shared key");
        }
        self.finish_to_one(&target, table, names, referenced_table, &referenced, metadata, context);
        Ok(Progress::Done)
    }

    fn push_selectables(&self, names: &[String], metadata: &mut MetadataCollector) {
        for id in std::iter::once(self.value).chain(self.enclosing.iter().copied()) {
            let value = metadata.value_mut(id);
            for name in names {
                value.selectables.push(Selectable::Column(name.clone()));
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn finish_to_one(
        &self,
        target: &str,
        table: TableId,
        columns: Vec<String>,
        referenced_table: TableId,
        referenced: &[Column],
        metadata: &mut MetadataCollector,
        context: &BuildingContext<'_>
    ) {
        let (explicit_name, no_constraint, unique) = match metadata.value(self.value).to_one() {
            Some(to_one) => (to_one.foreign_key_name.clone(), to_one.no_constraint, to_one.unique),
            None => (None, false, false)
        };
        if let ValueKind::ToOne(to_one) = &mut metadata.value_mut(self.value).kind {
            to_one.referenced_entity = target.to_string();
        }
        if unique {
            let owner = metadata.table(table);
            let name = context.implicit_naming.unique_key_name(&owner.name, &columns);
            metadata
                .table_mut(table)
                .add_unique_key(name, columns.clone(), false);
        }
        let name = explicit_name.unwrap_or_else(|| {
            context.implicit_naming.foreign_key_name(
                &metadata.table(table).name,
                &metadata.table(referenced_table).name,
                &columns
            )
        });
        let added = metadata.table_mut(table).add_foreign_key(ForeignKey {
            name,
            columns,
            referenced_table,
            referenced_entity: Some(target.to_string()),
            referenced_columns: referenced.iter().map(|c| c.name.clone()).collect(),
            no_constraint: no_constraint || !context.options.create_implicit_foreign_keys
        });
        debug!(
            entity = %self.entity,
            property = %self.property,
            target,
            added,
            kind = self.kind.describe(),
            "bound foreign key"
        );
    }

    fn arity_error(&self, target: &str, found: usize, expected: usize) -> BindError {
        BindError::unresolved(
            &self.entity,
            &self.property,
            format!("{found} join column(s) given but '{target}' has a {expected} column key")
        )
    }

    fn maps_id_error(&self, message: &str) -> BindError {
        BindError::unresolved(&self.entity, &self.property, format!("maps_id: {message}"))
    }
}

fn copy_type(target: &mut Column, source: &Column) {
    target.sql_type_code = source.sql_type_code;
    target.sql_type.clone_from(&source.sql_type);
    target.length = source.length;
    target.precision = source.precision;
    target.scale = source.scale;
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::second_pass::SecondPassQueue;

    #[test]
    fn identical_passes_are_distinct() {
        let mut queue = SecondPassQueue::default();
        let a = FkSecondPass::new(queue.next_handle(), "Order", "customer", ValueId(3), FkKind::SimpleToOne);
        let b = FkSecondPass::new(queue.next_handle(), "Order", "customer", ValueId(3), FkKind::SimpleToOne);
        assert_ne!(a, b);
        assert_eq!(a, a.clone());

        let set: HashSet<_> = [a.clone(), b.clone(), a].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn many_passes_never_collide() {
        let mut queue = SecondPassQueue::default();
        let passes: Vec<_> = (0..100)
            .map(|_| FkSecondPass::new(queue.next_handle(), "A", "b", ValueId(0), FkKind::SimpleToOne))
            .collect();
        let unique: HashSet<_> = passes.iter().map(FkSecondPass::handle).collect();
        assert_eq!(unique.len(), 100);
    }

    #[test]
    fn kinds_describe_themselves() {
        assert_eq!(FkKind::SimpleToOne.describe(), "simple-to-one-fk");
        let kind = FkKind::SubclassKey {
            with_fk: true,
            columns: Vec::new()
        };
        assert_eq!(kind.describe(), "subclass-key-fk");
    }
}
