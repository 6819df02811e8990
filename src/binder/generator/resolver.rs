// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Request → definition.
//!
//! One `match` over [`GeneratorRequest`]. Every branch ends in a
//! [`GeneratorDefinition`]; the legacy configuration of the target is merged
//! in last, so explicit parameters always win.

use std::collections::BTreeMap;

use tracing::debug;

use super::{
    helper::{
        self, GENERIC_GENERATOR, SEQUENCE_GENERATOR, TABLE_GENERATOR, UUID_GENERATOR,
        LocalizedMatch, find_localized
    },
    strategies::{self, ASSIGNED, IDENTITY, SEQUENCE_STYLE, TABLE, UUID}
};
use crate::{
    binder::{BuildingContext, ClassKind},
    error::{BindError, Result},
    model::{
        GeneratorDefinition, GeneratorKind, MetadataCollector, TableId, generator_keys as keys
    },
    source::{
        MemberRef,
        attrs::{
            GeneratedValueAttr, GenerationType, GenericGeneratorAttr, SequenceGeneratorAttr,
            TableGeneratorAttr, UuidGeneratorAttr
        }
    }
};

/// What an identifier asked for.
///
/// Names are never blank: a blank `generator` is the unnamed variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratorRequest {
    /// No generation: the application assigns identifiers.
    Assigned,

    /// `strategy = "uuid"`.
    Uuid {
        /// Generator name.
        name: Option<String>
    },

    /// `strategy = "identity"`.
    Identity,

    /// `strategy = "sequence"`.
    Sequence {
        /// Generator name.
        name: Option<String>
    },

    /// `strategy = "table"`.
    Table {
        /// Generator name.
        name: Option<String>
    },

    /// `strategy = "auto"`.
    Auto {
        /// Generator name.
        name: Option<String>
    },

    /// A registered custom generator attribute.
    Custom {
        /// Attribute name.
        attribute:      String,
        /// Implementation.
        implementation: String
    },

    /// A legacy strategy or generator name given directly (idbag identifiers).
    Named {
        /// Strategy or generator name.
        name: String
    }
}

impl GeneratorRequest {
    /// Request described by `generated_value`.
    #[must_use]
    pub fn from_generated_value(attr: &GeneratedValueAttr) -> Self {
        let name = attr
            .generator
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);
        match attr.strategy {
            GenerationType::Uuid => Self::Uuid {
                name
            },
            GenerationType::Identity => Self::Identity,
            GenerationType::Sequence => Self::Sequence {
                name
            },
            GenerationType::Table => Self::Table {
                name
            },
            GenerationType::Auto => Self::Auto {
                name
            }
        }
    }
}

/// The table and columns a generator produces values for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorTarget {
    /// Entity name.
    pub entity:             String,
    /// JPA entity name.
    pub jpa_entity:         String,
    /// Physical table.
    pub table:              String,
    /// Table schema.
    pub schema:             Option<String>,
    /// Table catalog.
    pub catalog:            Option<String>,
    /// Base of implicit sequence and segment names.
    pub implicit_name_base: String,
    /// Physical key columns.
    pub columns:            Vec<String>,
    /// Identity-capable tables of the hierarchy root.
    pub identity_tables:    Vec<String>
}

impl GeneratorTarget {
    /// Target for the identifier of `entity` on `table`.
    ///
    /// # Errors
    ///
    /// Unknown entity.
    pub fn for_entity(
        metadata: &MetadataCollector,
        entity: &str,
        table: TableId,
        columns: Vec<String>
    ) -> Result<Self> {
        let Some(class) = metadata.entity(entity) else {
            return Err(BindError::unresolved(entity, "", "unknown entity"));
        };
        let root = metadata
            .root_entity(entity)
            .map_or(entity, |r| r.entity_name.as_str());
        let mut identity_tables = Vec::new();
        for name in std::iter::once(root.to_string()).chain(metadata.all_subclasses(root)) {
            if let Some(member) = metadata.entity(&name) {
                let qualified = metadata.table(member.table).qualified_name();
                if !identity_tables.contains(&qualified) {
                    identity_tables.push(qualified);
                }
            }
        }
        let physical = metadata.table(table);
        let implicit_name_base = if physical.is_subselect() {
            class.jpa_entity_name.clone()
        } else {
            physical.name.clone()
        };
        Ok(Self {
            entity: class.entity_name.clone(),
            jpa_entity: class.jpa_entity_name.clone(),
            table: physical.name.clone(),
            schema: physical.schema.clone(),
            catalog: physical.catalog.clone(),
            implicit_name_base,
            columns,
            identity_tables
        })
    }

    /// Target for an idbag identifier column on a collection table.
    #[must_use]
    pub fn for_collection_table(
        metadata: &MetadataCollector,
        owner: &str,
        table: TableId,
        column: String
    ) -> Self {
        let physical = metadata.table(table);
        let jpa_entity = metadata
            .entity(owner)
            .map_or_else(|| owner.to_string(), |e| e.jpa_entity_name.clone());
        Self {
            entity: owner.to_string(),
            jpa_entity,
            table: physical.name.clone(),
            schema: physical.schema.clone(),
            catalog: physical.catalog.clone(),
            implicit_name_base: physical.name.clone(),
            columns: vec![column],
            identity_tables: vec![physical.qualified_name()]
        }
    }

    /// Configuration every generator receives.
    #[must_use]
    pub fn legacy_config(&self) -> BTreeMap<String, String> {
        let mut config = BTreeMap::new();
        config.insert(keys::TARGET_TABLE.to_string(), self.table.clone());
        config.insert(keys::TARGET_COLUMN.to_string(), self.columns.join(","));
        config.insert(keys::ENTITY_NAME.to_string(), self.entity.clone());
        config.insert(keys::JPA_ENTITY_NAME.to_string(), self.jpa_entity.clone());
        config.insert(
            keys::IMPLICIT_NAME_BASE.to_string(),
            self.implicit_name_base.clone()
        );
        config.insert(
            keys::IDENTITY_TABLES.to_string(),
            self.identity_tables.join(",")
        );
        if let Some(schema) = &self.schema {
            config.insert(keys::SCHEMA.to_string(), schema.clone());
        }
        if let Some(catalog) = &self.catalog {
            config.insert(keys::CATALOG.to_string(), catalog.clone());
        }
        config
    }
}

/// Resolve a request into a definition.
///
/// # Errors
///
/// Identity generation on a dialect without identity columns, declarations
/// that do not decode, and generator names that are neither declared nor
/// loadable classes.
pub fn resolve_generator(
    request: &GeneratorRequest,
    target: &GeneratorTarget,
    member: MemberRef,
    metadata: &MetadataCollector,
    context: &BuildingContext<'_>
) -> Result<GeneratorDefinition> {
    let mut definition = match request {
        GeneratorRequest::Assigned => GeneratorDefinition::new("", ASSIGNED),
        GeneratorRequest::Identity => identity(context)?,
        GeneratorRequest::Uuid {
            name
        } => {
            let name = name.as_deref().unwrap_or_default();
            find_localized::<UuidGeneratorAttr>(context, member, UUID_GENERATOR, name)?
                .map(LocalizedMatch::into_inner)
                .map_or_else(|| GeneratorDefinition::new(name, UUID), |attr| {
                    helper::uuid_definition(&attr)
                })
        }
        GeneratorRequest::Sequence {
            name: None
        } => unnamed_sequence(target, member, context)?,
        GeneratorRequest::Sequence {
            name: Some(name)
        } => named_sequence(name, member, metadata, context)?,
        GeneratorRequest::Table {
            name: None
        } => unnamed_table(target, member, context)?,
        GeneratorRequest::Table {
            name: Some(name)
        } => named_table(name, member, metadata, context)?,
        GeneratorRequest::Auto {
            name: None
        } => unnamed_auto(target, member, context)?,
        GeneratorRequest::Auto {
            name: Some(name)
        } => named_auto(name, target, member, metadata, context)?,
        GeneratorRequest::Custom {
            attribute,
            implementation
        } => custom(attribute, implementation, member, context)?,
        GeneratorRequest::Named {
            name
        } => named_auto(name, target, member, metadata, context)?
    };
    definition.merge_missing(&target.legacy_config());
    debug!(
        entity = %target.entity,
        table = %target.table,
        strategy = %definition.strategy,
        name = %definition.name,
        "resolved identifier generator"
    );
    Ok(definition)
}

fn identity(context: &BuildingContext<'_>) -> Result<GeneratorDefinition> {
    if !context.dialect.supports_identity_columns() {
        return Err(BindError::unsupported(
            context.dialect.name(),
            "identity columns"
        ));
    }
    Ok(GeneratorDefinition::new("", IDENTITY))
}

fn implicit_sequence_name(target: &GeneratorTarget, context: &BuildingContext<'_>) -> String {
    format!(
        "{}{}",
        target.implicit_name_base, context.options.default_sequence_suffix
    )
}

fn unnamed_sequence(
    target: &GeneratorTarget,
    member: MemberRef,
    context: &BuildingContext<'_>
) -> Result<GeneratorDefinition> {
    let attr = find_localized::<SequenceGeneratorAttr>(context, member, SEQUENCE_GENERATOR, "")?
        .map(LocalizedMatch::into_inner)
        .unwrap_or_default();
    Ok(helper::sequence_definition(
        &attr,
        context.options,
        &implicit_sequence_name(target, context)
    ))
}

fn named_sequence(
    name: &str,
    member: MemberRef,
    metadata: &MetadataCollector,
    context: &BuildingContext<'_>
) -> Result<GeneratorDefinition> {
    let localized =
        find_localized::<SequenceGeneratorAttr>(context, member, SEQUENCE_GENERATOR, name)?;
    let attr = match localized {
        Some(LocalizedMatch::Exact(attr)) => attr,
        other => {
            if let Some(global) = global(metadata, name, GeneratorKind::Sequence) {
                return Ok(global);
            }
            other.map(LocalizedMatch::into_inner).unwrap_or_default()
        }
    };
    let attr = SequenceGeneratorAttr {
        name: name.to_string(),
        ..attr
    };
    Ok(helper::sequence_definition(&attr, context.options, name))
}

fn unnamed_table(
    target: &GeneratorTarget,
    member: MemberRef,
    context: &BuildingContext<'_>
) -> Result<GeneratorDefinition> {
    let attr = find_localized::<TableGeneratorAttr>(context, member, TABLE_GENERATOR, "")?
        .map(LocalizedMatch::into_inner)
        .unwrap_or_default();
    Ok(helper::table_definition(
        &attr,
        context.options,
        &target.implicit_name_base
    ))
}

fn named_table(
    name: &str,
    member: MemberRef,
    metadata: &MetadataCollector,
    context: &BuildingContext<'_>
) -> Result<GeneratorDefinition> {
    let localized = find_localized::<TableGeneratorAttr>(context, member, TABLE_GENERATOR, name)?;
    let attr = match localized {
        Some(LocalizedMatch::Exact(attr)) => attr,
        other => {
            if let Some(global) = global(metadata, name, GeneratorKind::Table) {
                return Ok(global);
            }
            other.map(LocalizedMatch::into_inner).unwrap_or_default()
        }
    };
    let attr = TableGeneratorAttr {
        name: name.to_string(),
        ..attr
    };
    Ok(helper::table_definition(&attr, context.options, name))
}

fn unnamed_auto(
    target: &GeneratorTarget,
    member: MemberRef,
    context: &BuildingContext<'_>
) -> Result<GeneratorDefinition> {
    let uuid_typed = context
        .member_scope(member)
        .and_then(|(m, _, _)| m.field_type().scalar_name())
        .is_some_and(|name| name == "Uuid");
    if uuid_typed {
        return Ok(GeneratorDefinition::new("", UUID));
    }
    match strategies::legacy_implementation("native", context.dialect) {
        Some(IDENTITY) => identity(context),
        _ => unnamed_sequence(target, member, context)
    }
}

fn named_auto(
    name: &str,
    target: &GeneratorTarget,
    member: MemberRef,
    metadata: &MetadataCollector,
    context: &BuildingContext<'_>
) -> Result<GeneratorDefinition> {
    if let Some(global) = global(metadata, name, GeneratorKind::Sequence) {
        return Ok(global);
    }
    if let Some(global) = global(metadata, name, GeneratorKind::Table) {
        return Ok(global);
    }
    if let Some(implementation) = strategies::legacy_implementation(name, context.dialect) {
        return legacy(name, implementation, target, context);
    }
    if let Some(attr) =
        find_localized::<SequenceGeneratorAttr>(context, member, SEQUENCE_GENERATOR, name)?
            .and_then(LocalizedMatch::exact)
    {
        return Ok(helper::sequence_definition(&attr, context.options, name));
    }
    if let Some(attr) = find_localized::<TableGeneratorAttr>(context, member, TABLE_GENERATOR, name)?
        .and_then(LocalizedMatch::exact)
    {
        return Ok(helper::table_definition(&attr, context.options, name));
    }
    named_generic(name, member, metadata, context)
}

fn legacy(
    name: &str,
    implementation: &str,
    target: &GeneratorTarget,
    context: &BuildingContext<'_>
) -> Result<GeneratorDefinition> {
    let definition = match implementation {
        IDENTITY => identity(context)?,
        SEQUENCE_STYLE => helper::sequence_definition(
            &SequenceGeneratorAttr::default(),
            context.options,
            &implicit_sequence_name(target, context)
        ),
        TABLE => helper::table_definition(
            &TableGeneratorAttr::default(),
            context.options,
            &target.implicit_name_base
        ),
        other => GeneratorDefinition::new("", other)
    };
    Ok(GeneratorDefinition {
        name: name.to_string(),
        ..definition
    })
}

fn named_generic(
    name: &str,
    member: MemberRef,
    metadata: &MetadataCollector,
    context: &BuildingContext<'_>
) -> Result<GeneratorDefinition> {
    if let Some(global) = global(metadata, name, GeneratorKind::Generic)
        .or_else(|| global(metadata, name, GeneratorKind::Uuid))
    {
        return Ok(global);
    }
    if let Some(attr) =
        find_localized::<GenericGeneratorAttr>(context, member, GENERIC_GENERATOR, name)?
            .and_then(LocalizedMatch::exact)
    {
        return helper::generic_definition(&attr, context);
    }
    if let Some(attr) = find_localized::<UuidGeneratorAttr>(context, member, UUID_GENERATOR, name)?
        .and_then(LocalizedMatch::exact)
    {
        return Ok(helper::uuid_definition(&attr));
    }
    let class = context
        .classes
        .load(name, ClassKind::IdentifierGenerator)?;
    Ok(GeneratorDefinition::new(name, class.name))
}

fn custom(
    attribute: &str,
    implementation: &str,
    member: MemberRef,
    context: &BuildingContext<'_>
) -> Result<GeneratorDefinition> {
    match helper::find_custom(context, member) {
        Some((usage, found)) if usage.name() == attribute => {
            helper::custom_definition(usage, found)
        }
        _ => Ok(GeneratorDefinition::new(attribute, implementation))
    }
}

fn global(metadata: &MetadataCollector, name: &str, kind: GeneratorKind) -> Option<GeneratorDefinition> {
    metadata
        .global_generator(name)
        .filter(|g| g.kind == kind)
        .map(|g| g.definition.clone())
}
