// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Relational values and properties.
//!
//! A [`SimpleValue`] is what one attribute maps to: scalar column(s), an
//! embedded component, a to-one association or an `any` association. Values
//! live in an arena owned by the metadata collector and are addressed by
//! [`ValueId`], so second passes can hold on to them without borrowing the
//! model.
//!
//! A value is *deferred* while it has no selectables yet; the second pass
//! that owns it fills the column list in once referenced entities are known.

use std::collections::BTreeMap;

use serde::Deserialize;

use super::{collection::CollectionId, generator::GeneratorDefinition, table::TableId};
use crate::dialect::SqlTypeCode;

/// Index of a value inside the value arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub(crate) usize);

/// Something a value selects: a physical column or a formula.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selectable {
    /// Physical column name on the value's table.
    Column(String),

    /// SQL formula text.
    Formula(String)
}

impl Selectable {
    /// Column name, if this is a column.
    #[must_use]
    pub fn column_name(&self) -> Option<&str> {
        match self {
            Self::Column(name) => Some(name),
            Self::Formula(_) => None
        }
    }

    /// Whether this is a formula.
    #[must_use]
    pub fn is_formula(&self) -> bool {
        matches!(self, Self::Formula(_))
    }
}

/// How time-zone-aware temporal values are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeZoneStorageKind {
    /// Use the dialect's `TIMESTAMP WITH TIME ZONE`.
    #[default]
    Native,

    /// Normalize to the local zone, dropping the offset.
    Normalize,

    /// Normalize to UTC, dropping the offset.
    NormalizeUtc,

    /// Store the offset in a separate column.
    Column,

    /// Native when supported, otherwise a separate column.
    Auto,

    /// Use the configured default.
    Default
}

impl TimeZoneStorageKind {
    /// Parse from the attribute / property spelling.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().replace('-', "_").as_str() {
            "native" => Some(Self::Native),
            "normalize" => Some(Self::Normalize),
            "normalize_utc" => Some(Self::NormalizeUtc),
            "column" => Some(Self::Column),
            "auto" => Some(Self::Auto),
            "default" => Some(Self::Default),
            _ => None
        }
    }
}

/// Data of a to-one association value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToOne {
    /// Target entity as written; resolved to an entity name by a second pass.
    pub referenced_entity: String,

    /// Referenced property, for `mapped_by` or explicit referenced columns.
    pub referenced_property: Option<String>,

    /// One-to-one: the foreign key columns are unique.
    pub unique: bool,

    /// Inverse side of a one-to-one; owns no columns.
    pub inverse: bool,

    /// Lazy fetching.
    pub lazy: bool,

    /// Explicit foreign key name.
    pub foreign_key_name: Option<String>,

    /// Skip the foreign key constraint.
    pub no_constraint: bool
}

/// Nested aggregate mapping for struct / JSON / XML components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate {
    /// Single column on the owning table holding the whole aggregate.
    pub column: String,

    /// Aggregate type code (`Struct`, `Json`, `StructArray`, ...).
    pub type_code: SqlTypeCode,

    /// Structured type name, when qualified.
    pub struct_name: Option<String>,

    /// Schema of the structured type.
    pub struct_schema: Option<String>,

    /// Catalog of the structured type.
    pub struct_catalog: Option<String>,

    /// Nested attribute columns, in declaration order.
    pub columns: Vec<super::table::Column>
}

/// Data of an embedded component value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    /// Embeddable class name.
    pub type_name: String,

    /// Nested properties.
    pub properties: Vec<Property>,

    /// Whether this component is an embedded identifier.
    pub embedded_id: bool,

    /// Aggregate mapping, for struct-like components.
    pub aggregate: Option<Aggregate>
}

impl Component {
    /// Nested property by name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// Strategy deriving implicit `any` discriminator values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImplicitDiscriminatorStrategy {
    /// Use the full entity name.
    FullName,

    /// Use the short (unqualified) entity name.
    ShortName,

    /// A custom strategy class.
    Custom(String)
}

/// Data of an `any` association value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnyValue {
    /// Discriminator value.
    pub discriminator: ValueId,

    /// Key value.
    pub key: ValueId,

    /// Explicit discriminator value → entity mappings.
    pub discriminator_values: BTreeMap<String, String>,

    /// Strategy for values without an explicit mapping.
    pub implicit_strategy: Option<ImplicitDiscriminatorStrategy>,

    /// Lazy fetching.
    pub lazy: bool
}

/// What a [`SimpleValue`] maps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueKind {
    /// Scalar column(s).
    Basic,

    /// To-one association.
    ToOne(ToOne),

    /// Embedded component.
    Component(Component),

    /// Polymorphic `any` association.
    Any(AnyValue)
}

/// A relational value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleValue {
    /// Table the selectables live on.
    pub table: TableId,

    /// Columns and formulas, in order. Empty while deferred.
    pub selectables: Vec<Selectable>,

    /// What this value maps.
    pub kind: ValueKind,

    /// Rust type name of the attribute (`i64`, `Uuid`, `Address`).
    pub type_name: Option<String>,

    /// Type code chosen for the value.
    pub sql_type_code: Option<SqlTypeCode>,

    /// Identifier generator, for identifier values.
    pub identifier_generator: Option<GeneratorDefinition>,

    /// Time-zone storage for temporal values.
    pub time_zone_storage: Option<TimeZoneStorageKind>
}

impl SimpleValue {
    /// Create a value with no selectables yet.
    pub fn new(table: TableId, kind: ValueKind) -> Self {
        Self {
            table,
            selectables: Vec::new(),
            kind,
            type_name: None,
            sql_type_code: None,
            identifier_generator: None,
            time_zone_storage: None
        }
    }

    /// Whether the value still waits for its columns.
    #[must_use]
    pub fn is_deferred(&self) -> bool {
        self.selectables.is_empty()
    }

    /// Physical column names, skipping formulas.
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.selectables
            .iter()
            .filter_map(|s| s.column_name().map(str::to_string))
            .collect()
    }

    /// Whether any selectable is a formula.
    #[must_use]
    pub fn has_formula(&self) -> bool {
        self.selectables.iter().any(Selectable::is_formula)
    }

    /// To-one data, if this is a to-one value.
    #[must_use]
    pub fn to_one(&self) -> Option<&ToOne> {
        match &self.kind {
            ValueKind::ToOne(to_one) => Some(to_one),
            _ => None
        }
    }

    /// Component data, if this is a component value.
    #[must_use]
    pub fn component(&self) -> Option<&Component> {
        match &self.kind {
            ValueKind::Component(component) => Some(component),
            _ => None
        }
    }

    /// Mutable component data.
    pub fn component_mut(&mut self) -> Option<&mut Component> {
        match &mut self.kind {
            ValueKind::Component(component) => Some(component),
            _ => None
        }
    }
}

/// How a property is accessed at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyAccess {
    /// Direct field access.
    Field,

    /// Synthetic property mirroring a list index into the child entity.
    IndexBackref
}

/// What a property maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyValue {
    /// A single value.
    Simple(ValueId),

    /// A collection.
    Collection(CollectionId)
}

/// A mapped attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    /// Attribute name.
    pub name: String,

    /// Access strategy.
    pub access: PropertyAccess,

    /// Mapped value.
    pub value: PropertyValue,

    /// Derived from the nullability of the value's columns.
    pub optional: bool,

    /// Included in inserts.
    pub insertable: bool,

    /// Included in updates.
    pub updatable: bool,

    /// Part of the natural id.
    pub natural_id: bool,

    /// Natural id may change.
    pub natural_id_mutable: bool,

    /// Lazy loading.
    pub lazy: bool
}

impl Property {
    /// Create a field-access property with default flags.
    pub fn new(name: impl Into<String>, value: PropertyValue) -> Self {
        Self {
            name: name.into(),
            access: PropertyAccess::Field,
            value,
            optional: true,
            insertable: true,
            updatable: true,
            natural_id: false,
            natural_id_mutable: false,
            lazy: false
        }
    }

    /// Simple value id, if this is not a collection property.
    #[must_use]
    pub fn simple_value(&self) -> Option<ValueId> {
        match self.value {
            PropertyValue::Simple(id) => Some(id),
            PropertyValue::Collection(_) => None
        }
    }

    /// Collection id, if this is a collection property.
    #[must_use]
    pub fn collection(&self) -> Option<CollectionId> {
        match self.value {
            PropertyValue::Collection(id) => Some(id),
            PropertyValue::Simple(_) => None
        }
    }
}
