// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Entity mappings.

use darling::FromMeta;

use super::{
    metadata::FilterReference,
    table::TableId,
    value::{Property, ValueId}
};

/// Inheritance mapping strategy of a hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InheritanceType {
    /// Whole hierarchy in one table with a discriminator.
    #[default]
    SingleTable,

    /// One table per class, joined on the primary key.
    Joined,

    /// One complete table per concrete class.
    TablePerClass
}

impl FromMeta for InheritanceType {
    fn from_string(value: &str) -> darling::Result<Self> {
        match value.to_lowercase().as_str() {
            "single_table" => Ok(Self::SingleTable),
            "joined" => Ok(Self::Joined),
            "table_per_class" => Ok(Self::TablePerClass),
            _ => Err(darling::Error::unknown_value(value))
        }
    }
}

/// Soft delete strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SoftDeleteStrategy {
    /// Boolean `deleted` flag, `true` when deleted.
    #[default]
    Deleted,

    /// Boolean `active` flag, `false` when deleted.
    Active,

    /// Nullable deletion timestamp.
    Timestamp
}

impl SoftDeleteStrategy {
    /// Column name used when none is given.
    #[must_use]
    pub const fn default_column_name(self) -> &'static str {
        match self {
            Self::Deleted => "deleted",
            Self::Active => "active",
            Self::Timestamp => "deleted_at"
        }
    }
}

impl FromMeta for SoftDeleteStrategy {
    fn from_string(value: &str) -> darling::Result<Self> {
        match value.to_lowercase().as_str() {
            "deleted" => Ok(Self::Deleted),
            "active" => Ok(Self::Active),
            "timestamp" => Ok(Self::Timestamp),
            _ => Err(darling::Error::unknown_value(value))
        }
    }
}

/// Soft delete indicator column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftDeleteMapping {
    /// Strategy.
    pub strategy: SoftDeleteStrategy,

    /// Table holding the indicator.
    pub table: TableId,

    /// Physical indicator column.
    pub column: String
}

/// An entity (or subclass) mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistentClass {
    /// Entity name: the struct identifier.
    pub entity_name: String,

    /// JPA entity name: `entity(name = ..)` or the struct identifier.
    pub jpa_entity_name: String,

    /// Primary table of this class.
    pub table: TableId,

    /// Direct superclass entity.
    pub superclass: Option<String>,

    /// Direct subclass entities, in binding order.
    pub subclasses: Vec<String>,

    /// Inheritance strategy of the hierarchy.
    pub inheritance: InheritanceType,

    /// Identifier property, on the root.
    pub identifier_property: Option<Property>,

    /// Identifier value, on the root.
    pub identifier: Option<ValueId>,

    /// Key joining a joined subclass table to its parent.
    pub key: Option<ValueId>,

    /// Declared properties, in declaration order.
    pub properties: Vec<Property>,

    /// Discriminator value, on the root.
    pub discriminator: Option<ValueId>,

    /// Discriminator value of this class.
    pub discriminator_value: Option<String>,

    /// Always restrict queries by discriminator.
    pub force_discriminator: bool,

    /// Discriminator column is written on insert.
    pub discriminator_insertable: bool,

    /// Resolved filters.
    pub filters: Vec<FilterReference>,

    /// Soft delete indicator.
    pub soft_delete: Option<SoftDeleteMapping>,

    /// Restriction applied when loading.
    pub sql_restriction: Option<String>
}

impl PersistentClass {
    /// Create a root or subclass mapping with no properties.
    pub fn new(
        entity_name: impl Into<String>,
        jpa_entity_name: impl Into<String>,
        table: TableId
    ) -> Self {
        Self {
            entity_name: entity_name.into(),
            jpa_entity_name: jpa_entity_name.into(),
            table,
            superclass: None,
            subclasses: Vec::new(),
            inheritance: InheritanceType::SingleTable,
            identifier_property: None,
            identifier: None,
            key: None,
            properties: Vec::new(),
            discriminator: None,
            discriminator_value: None,
            force_discriminator: false,
            discriminator_insertable: true,
            filters: Vec::new(),
            soft_delete: None,
            sql_restriction: None
        }
    }

    /// Whether this class is the root of its hierarchy.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.superclass.is_none()
    }

    /// Declared property by name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Add a property, replacing none.
    pub fn add_property(&mut self, property: Property) {
        self.properties.push(property);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inheritance_from_meta() {
        assert_eq!(
            InheritanceType::from_string("JOINED").unwrap(),
            InheritanceType::Joined
        );
        assert!(InheritanceType::from_string("flat").is_err());
    }

    #[test]
    fn soft_delete_defaults() {
        assert_eq!(SoftDeleteStrategy::default(), SoftDeleteStrategy::Deleted);
        assert_eq!(SoftDeleteStrategy::Timestamp.default_column_name(), "deleted_at");
        assert_eq!(
            SoftDeleteStrategy::from_string("active").unwrap(),
            SoftDeleteStrategy::Active
        );
    }

    #[test]
    fn new_class_is_root() {
        let class = PersistentClass::new("Order", "Order", TableId(0));
        assert!(class.is_root());
        assert!(class.property("id").is_none());
        assert!(class.discriminator_insertable);
    }
}
