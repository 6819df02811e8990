// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! The relational mapping model produced by a bind.
//!
//! # Ownership
//!
//! | Object | Owned by | Referenced through |
//! |--------|----------|--------------------|
//! | [`Table`] | [`Database`] | [`TableId`] |
//! | [`SimpleValue`] | [`MetadataCollector`] arena | [`ValueId`] |
//! | [`Collection`] | [`MetadataCollector`] arena | [`CollectionId`] |
//! | [`PersistentClass`] | [`MetadataCollector`] entity map | entity name |
//! | [`Property`] | its entity or component | - |
//!
//! Ids are plain indices. Nothing in the model holds a reference into
//! another part of the model, so second passes can keep ids across waves.

mod collection;
mod entity;
mod generator;
mod metadata;
mod table;
mod value;

pub use collection::{
    Collection, CollectionCapabilities, CollectionElement, CollectionId, CollectionKind,
    CollectionState
};
pub use entity::{InheritanceType, PersistentClass, SoftDeleteMapping, SoftDeleteStrategy};
pub use generator::{GeneratorDefinition, GeneratorKind, GlobalGenerator};
pub use metadata::{
    FetchMode, FetchOverride, FetchProfile, FilterDefinition, FilterReference, MetadataCollector,
    NamedEntityGraph
};
pub use table::{
    AuxiliaryObject, CheckConstraint, Column, Database, ForeignKey, PrimaryKey, Table, TableId,
    UniqueKey, UserDefinedType
};
pub use value::{
    Aggregate, AnyValue, Component, ImplicitDiscriminatorStrategy, Property, PropertyAccess,
    PropertyValue, Selectable, SimpleValue, TimeZoneStorageKind, ToOne, ValueId, ValueKind
};

/// Generator configuration keys.
pub mod generator_keys {
    pub use super::generator::{
        CATALOG, ENTITY_NAME, IDENTITY_TABLES, IMPLICIT_NAME_BASE, INCREMENT_SIZE, INITIAL_VALUE,
        JPA_ENTITY_NAME, SCHEMA, SEGMENT_COLUMN, SEGMENT_VALUE, SEQUENCE_NAME, TABLE_NAME,
        TARGET_COLUMN, TARGET_TABLE, VALUE_COLUMN
    };
}
