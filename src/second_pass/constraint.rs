// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Structural constraints that need every column and subclass.
//!
//! All of these only add to table-scoped collections, which ignore repeat
//! contributions, so running one twice leaves the model unchanged.

use std::collections::BTreeMap;

use tracing::debug;

use super::Progress;
use crate::{
    binder::BuildingContext,
    dialect::SqlTypeCode,
    error::{BindError, Result},
    model::{CheckConstraint, MetadataCollector, PrimaryKey, Selectable, TableId}
};

/// Discriminator value meaning "rows with a `NULL` discriminator".
pub const NULL_DISCRIMINATOR: &str = "null";

/// Discriminator value meaning "rows with any other non-null discriminator".
pub const NOT_NULL_DISCRIMINATOR: &str = "not null";

/// Primary key of a root entity table, from its identifier columns.
#[derive(Debug, Clone)]
pub struct PrimaryKeySecondPass {
    entity: String
}

impl PrimaryKeySecondPass {
    /// Primary key of the root `entity`.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into()
        }
    }

    /// Root entity.
    #[must_use]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub(crate) fn execute(&self, metadata: &mut MetadataCollector) -> Result<Progress> {
        let Some(identifier) = metadata.entity(&self.entity).and_then(|e| e.identifier) else {
            return Err(BindError::mapping(format!(
                "entity '{}' has no identifier",
                self.entity
            )));
        };
        if !metadata.is_value_resolved(identifier) {
            return Ok(Progress::Deferred);
        }
        let value = metadata.value(identifier);
        let (table, columns) = (value.table, value.column_names());
        if columns.is_empty() {
            return Err(BindError::mapping(format!(
                "identifier of '{}' maps no physical column",
                self.entity
            )));
        }
        let table = metadata.table_mut(table);
        for name in &columns {
            if let Some(column) = table.column_mut(name) {
                column.nullable = false;
            }
        }
        if table.primary_key.is_none() {
            table.primary_key = Some(PrimaryKey {
                name: None,
                columns
            });
        }
        Ok(Progress::Done)
    }
}

/// A declared `unique_constraint`.
#[derive(Debug, Clone)]
pub struct UniqueKeySecondPass {
    entity:  String,
    table:   TableId,
    name:    Option<String>,
    columns: Vec<String>
}

impl UniqueKeySecondPass {
    /// Unique key over `columns` on `table`. Each entry is a logical or
    /// physical column name, or the name of a property of `entity`.
    pub fn new(entity: impl Into<String>, table: TableId, name: Option<String>, columns: Vec<String>) -> Self {
        Self {
            entity: entity.into(),
            table,
            name,
            columns
        }
    }

    /// Declaring entity.
    #[must_use]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub(crate) fn execute(
        &self,
        metadata: &mut MetadataCollector,
        context: &BuildingContext<'_>
    ) -> Result<Progress> {
        let mut physical = Vec::with_capacity(self.columns.len());
        for logical in &self.columns {
            let table = metadata.table(self.table);
            if let Some(name) = table.physical_column_name(logical) {
                push_unique(&mut physical, name.to_string());
                continue;
            }
            let from_property = metadata
                .find_property(&self.entity, logical)
                .and_then(|p| p.simple_value())
                .filter(|v| metadata.value(*v).table == self.table);
            match from_property {
                Some(value) if metadata.is_value_resolved(value) => {
                    for name in metadata.value(value).column_names() {
                        push_unique(&mut physical, name);
                    }
                }
                Some(_) => return Ok(Progress::Deferred),
                None if metadata.has_deferred_values(self.table) => return Ok(Progress::Deferred),
                None => {
                    return Err(BindError::unresolved(
                        &self.entity,
                        logical,
                        format!("unique constraint column not found on table '{}'", table.name)
                    ));
                }
            }
        }

        let table = metadata.table_mut(self.table);
        let name = self
            .name
            .clone()
            .unwrap_or_else(|| context.implicit_naming.unique_key_name(&table.name, &physical));
        let name = table.add_unique_key(name, physical, false);
        debug!(entity = %self.entity, key = %name, "bound unique key");
        Ok(Progress::Done)
    }
}

/// Unique key over the natural id properties of an entity.
#[derive(Debug, Clone)]
pub struct NaturalIdUniqueKeySecondPass {
    entity: String
}

impl NaturalIdUniqueKeySecondPass {
    /// Natural id of `entity`.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into()
        }
    }

    /// Entity.
    #[must_use]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub(crate) fn execute(
        &self,
        metadata: &mut MetadataCollector,
        context: &BuildingContext<'_>
    ) -> Result<Progress> {
        let Some(entity) = metadata.entity(&self.entity) else {
            return Err(BindError::unresolved(&self.entity, "", "unknown entity"));
        };
        let table = entity.table;
        let values: Vec<_> = entity
            .properties
            .iter()
            .filter(|p| p.natural_id)
            .filter_map(|p| p.simple_value())
            .collect();
        if values.is_empty() {
            return Ok(Progress::Done);
        }
        if values.iter().any(|v| !metadata.is_value_resolved(*v)) {
            return Ok(Progress::Deferred);
        }

        let mut columns = Vec::new();
        for value in values {
            for name in metadata.value(value).column_names() {
                push_unique(&mut columns, name);
            }
        }
        let table = metadata.table_mut(table);
        let name = context.implicit_naming.unique_key_name(&table.name, &columns);
        let name = table.add_unique_key(name, columns, true);
        debug!(entity = %self.entity, key = %name, "bound natural id unique key");
        Ok(Progress::Done)
    }
}

/// Discriminator values of a hierarchy: uniqueness and the `in (..)` check.
#[derive(Debug, Clone)]
pub struct DiscriminatorSecondPass {
    entity: String
}

impl DiscriminatorSecondPass {
    /// Discriminator of the hierarchy rooted at `entity`.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into()
        }
    }

    /// Root entity.
    #[must_use]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub(crate) fn execute(
        &self,
        metadata: &mut MetadataCollector,
        context: &BuildingContext<'_>
    ) -> Result<Progress> {
        let Some(discriminator) = metadata.entity(&self.entity).and_then(|e| e.discriminator) else {
            return Ok(Progress::Done);
        };
        let values = hierarchy_values(metadata, &self.entity);

        let mut seen: BTreeMap<&str, &str> = BTreeMap::new();
        for (entity, value) in &values {
            if let Some(other) = seen.insert(value.as_str(), entity.as_str()) {
                return Err(BindError::mapping(format!(
                    "discriminator value '{value}' is used by both '{other}' and '{entity}'"
                )));
            }
        }

        let special = values
            .iter()
            .any(|(_, v)| v == NULL_DISCRIMINATOR || v == NOT_NULL_DISCRIMINATOR);
        let value = metadata.value(discriminator);
        let column = match value.selectables.first() {
            Some(Selectable::Column(name)) => name.clone(),
            _ => return Ok(Progress::Done)
        };
        if !context.options.discriminator_check_constraints || special || values.len() < 2 {
            return Ok(Progress::Done);
        }

        let numeric = matches!(
            value.sql_type_code,
            Some(SqlTypeCode::Integer | SqlTypeCode::SmallInt | SqlTypeCode::TinyInt | SqlTypeCode::BigInt)
        );
        let literals: Vec<String> = values
            .iter()
            .map(|(_, v)| {
                if numeric {
                    v.clone()
                } else {
                    format!("'{}'", v.replace('\'', "''"))
                }
            })
            .collect();
        let table = value.table;
        metadata.table_mut(table).add_check(CheckConstraint {
            name:       None,
            expression: format!("{column} in ({})", literals.join(","))
        });
        Ok(Progress::Done)
    }
}

/// Discriminator nullability from the `null` discriminator value.
#[derive(Debug, Clone)]
pub struct NullableDiscriminatorSecondPass {
    entity: String
}

impl NullableDiscriminatorSecondPass {
    /// Discriminator of the hierarchy rooted at `entity`.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into()
        }
    }

    /// Root entity.
    #[must_use]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub(crate) fn execute(&self, metadata: &mut MetadataCollector) -> Result<Progress> {
        let Some(discriminator) = metadata.entity(&self.entity).and_then(|e| e.discriminator) else {
            return Ok(Progress::Done);
        };
        let nullable = hierarchy_values(metadata, &self.entity)
            .iter()
            .any(|(_, v)| v == NULL_DISCRIMINATOR);
        if !nullable {
            return Ok(Progress::Done);
        }
        let value = metadata.value(discriminator);
        let table = value.table;
        for name in value.column_names() {
            if let Some(column) = metadata.table_mut(table).column_mut(&name) {
                column.nullable = true;
            }
        }
        Ok(Progress::Done)
    }
}

fn hierarchy_values(metadata: &MetadataCollector, root: &str) -> Vec<(String, String)> {
    std::iter::once(root.to_string())
        .chain(metadata.all_subclasses(root))
        .filter_map(|name| {
            let value = metadata.entity(&name)?.discriminator_value.clone()?;
            Some((name, value))
        })
        .collect()
}

fn push_unique(columns: &mut Vec<String>, name: String) {
    if !columns.contains(&name) {
        columns.push(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Column, PersistentClass, SimpleValue, Table, ValueId, ValueKind};

    fn root_with_identifier(metadata: &mut MetadataCollector, columns: &[&str]) -> ValueId {
        let table = metadata.add_table(Table::new("orders", "Order"));
        let mut value = SimpleValue::new(table, ValueKind::Basic);
        for name in columns {
            metadata.table_mut(table).add_column(Column::new(*name));
            value.selectables.push(Selectable::Column((*name).to_string()));
        }
        let id = metadata.add_value(value);
        let mut class = PersistentClass::new("Order", "Order", table);
        class.identifier = Some(id);
        metadata.add_entity(class).unwrap();
        id
    }

    #[test]
    fn primary_key_from_identifier() {
        let mut metadata = MetadataCollector::new();
        let id = root_with_identifier(&mut metadata, &["id"]);
        let pass = PrimaryKeySecondPass::new("Order");
        assert_eq!(pass.execute(&mut metadata).unwrap(), Progress::Done);
        let table = metadata.table(metadata.value(id).table);
        assert_eq!(table.primary_key.as_ref().unwrap().columns, vec!["id".to_string()]);
        assert!(!table.column("id").unwrap().nullable);
    }

    #[test]
    fn primary_key_waits_for_identifier_columns() {
        let mut metadata = MetadataCollector::new();
        root_with_identifier(&mut metadata, &[]);
        let pass = PrimaryKeySecondPass::new("Order");
        assert_eq!(pass.execute(&mut metadata).unwrap(), Progress::Deferred);
    }

    #[test]
    fn hierarchy_values_follow_subclasses() {
        let mut metadata = MetadataCollector::new();
        root_with_identifier(&mut metadata, &["id"]);
        metadata.entity_mut("Order").unwrap().discriminator_value = Some("O".into());
        let table = metadata.entity("Order").unwrap().table;
        let mut sub = PersistentClass::new("RushOrder", "RushOrder", table);
        sub.superclass = Some("Order".into());
        sub.discriminator_value = Some(NULL_DISCRIMINATOR.into());
        metadata.add_entity(sub).unwrap();
        metadata
            .entity_mut("Order")
            .unwrap()
            .subclasses
            .push("RushOrder".into());

        let values = hierarchy_values(&metadata, "Order");
        assert_eq!(
            values,
            vec![
                ("Order".to_string(), "O".to_string()),
                ("RushOrder".to_string(), "null".to_string())
            ]
        );

        let discriminator = metadata.add_value(SimpleValue::new(table, ValueKind::Basic));
        metadata.table_mut(table).add_column({
            let mut column = Column::new("DTYPE");
            column.nullable = false;
            column
        });
        metadata
            .value_mut(discriminator)
            .selectables
            .push(Selectable::Column("DTYPE".into()));
        metadata.entity_mut("Order").unwrap().discriminator = Some(discriminator);
        NullableDiscriminatorSecondPass::new("Order")
            .execute(&mut metadata)
            .unwrap();
        assert!(metadata.table(table).column("DTYPE").unwrap().nullable);
    }

    #[test]
    fn repeated_columns_are_kept_once() {
        let mut columns = Vec::new();
        push_unique(&mut columns, "code".into());
        push_unique(&mut columns, "region".into());
        push_unique(&mut columns, "code".into());
        assert_eq!(columns, vec!["code".to_string(), "region".to_string()]);
    }
}
