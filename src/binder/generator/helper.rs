// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Generator attributes to definitions, and where to look for them.

use darling::FromMeta;

use super::strategies::{self, SEQUENCE_STYLE, TABLE, UUID};
use crate::{
    binder::{BuildingContext, ClassKind},
    config::BindingOptions,
    error::Result,
    model::{GeneratorDefinition, GeneratorKind, GlobalGenerator, generator_keys as keys},
    source::{
        AnnotationTarget, AnnotationUsage, MemberRef,
        attrs::{GenericGeneratorAttr, Parameters, SequenceGeneratorAttr, TableGeneratorAttr, UuidGeneratorAttr}
    }
};

/// Default table of `table_generator`.
pub const DEFAULT_GENERATOR_TABLE: &str = "hibernate_sequences";

/// Default segment column of `table_generator`.
pub const DEFAULT_SEGMENT_COLUMN: &str = "sequence_name";

/// Default value column of `table_generator`.
pub const DEFAULT_VALUE_COLUMN: &str = "next_val";

/// Attribute names of the generator declarations.
pub const SEQUENCE_GENERATOR: &str = "sequence_generator";
/// See [`SEQUENCE_GENERATOR`].
pub const TABLE_GENERATOR: &str = "table_generator";
/// See [`SEQUENCE_GENERATOR`].
pub const GENERIC_GENERATOR: &str = "generic_generator";
/// See [`SEQUENCE_GENERATOR`].
pub const UUID_GENERATOR: &str = "uuid_generator";

/// Generator declarations that carry a name.
pub trait NamedGenerator: FromMeta + Default {
    /// Declared name; empty for anonymous declarations.
    fn generator_name(&self) -> &str;
}

impl NamedGenerator for SequenceGeneratorAttr {
    fn generator_name(&self) -> &str {
        &self.name
    }
}

impl NamedGenerator for TableGeneratorAttr {
    fn generator_name(&self) -> &str {
        &self.name
    }
}

impl NamedGenerator for GenericGeneratorAttr {
    fn generator_name(&self) -> &str {
        &self.name
    }
}

impl NamedGenerator for UuidGeneratorAttr {
    fn generator_name(&self) -> &str {
        &self.name
    }
}

/// `sequence_generator` as a definition.
///
/// `fallback_sequence` names the sequence when the attribute does not.
#[must_use]
pub fn sequence_definition(
    attr: &SequenceGeneratorAttr,
    options: &BindingOptions,
    fallback_sequence: &str
) -> GeneratorDefinition {
    let sequence = attr
        .sequence_name
        .clone()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| fallback_sequence.to_string());
    let mut definition = GeneratorDefinition::new(&attr.name, SEQUENCE_STYLE)
        .with_parameter(keys::SEQUENCE_NAME, sequence)
        .with_parameter(
            keys::INITIAL_VALUE,
            attr.initial_value
                .unwrap_or(options.default_initial_value)
                .to_string()
        )
        .with_parameter(
            keys::INCREMENT_SIZE,
            attr.allocation_size
                .unwrap_or(options.default_allocation_size)
                .to_string()
        );
    scope(&mut definition, attr.schema.as_deref(), attr.catalog.as_deref());
    definition
}

/// `table_generator` as a definition.
///
/// `fallback_segment` is the segment value when the attribute has none.
#[must_use]
pub fn table_definition(
    attr: &TableGeneratorAttr,
    options: &BindingOptions,
    fallback_segment: &str
) -> GeneratorDefinition {
    let mut definition = GeneratorDefinition::new(&attr.name, TABLE)
        .with_parameter(
            keys::TABLE_NAME,
            attr.table.as_deref().unwrap_or(DEFAULT_GENERATOR_TABLE)
        )
        .with_parameter(
            keys::SEGMENT_COLUMN,
            attr.pk_column_name
                .as_deref()
                .unwrap_or(DEFAULT_SEGMENT_COLUMN)
        )
        .with_parameter(
            keys::VALUE_COLUMN,
            attr.value_column_name
                .as_deref()
                .unwrap_or(DEFAULT_VALUE_COLUMN)
        )
        .with_parameter(
            keys::SEGMENT_VALUE,
            attr.pk_column_value
                .as_deref()
                .unwrap_or(fallback_segment)
        )
        .with_parameter(
            keys::INITIAL_VALUE,
            attr.initial_value
                .unwrap_or(options.default_initial_value)
                .to_string()
        )
        .with_parameter(
            keys::INCREMENT_SIZE,
            attr.allocation_size
                .unwrap_or(options.default_allocation_size)
                .to_string()
        );
    scope(&mut definition, attr.schema.as_deref(), attr.catalog.as_deref());
    definition
}

/// `uuid_generator` as a definition.
#[must_use]
pub fn uuid_definition(attr: &UuidGeneratorAttr) -> GeneratorDefinition {
    let definition = GeneratorDefinition::new(&attr.name, UUID);
    match &attr.style {
        Some(style) => definition.with_parameter("style", style.to_lowercase()),
        None => definition
    }
}

/// `generic_generator` as a definition.
///
/// The strategy is a legacy name or a class known to the resolver.
///
/// # Errors
///
/// Class-loading failure for an unknown strategy class.
pub fn generic_definition(
    attr: &GenericGeneratorAttr,
    context: &BuildingContext<'_>
) -> Result<GeneratorDefinition> {
    let strategy = match strategies::legacy_implementation(&attr.strategy, context.dialect) {
        Some(implementation) => implementation.to_string(),
        None => {
            context
                .classes
                .load(&attr.strategy, ClassKind::IdentifierGenerator)?
                .name
        }
    };
    let mut definition = GeneratorDefinition::new(&attr.name, strategy);
    definition.parameters.extend(attr.parameters.0.clone());
    Ok(definition)
}

/// A generator declared through a registered custom attribute.
///
/// # Errors
///
/// Payloads that are not `key = value` lists.
pub fn custom_definition(usage: &AnnotationUsage, implementation: &str) -> Result<GeneratorDefinition> {
    let parameters: Parameters = usage.parse()?;
    let mut definition = GeneratorDefinition::new(usage.name(), implementation);
    definition.parameters = parameters.0;
    Ok(definition)
}

fn scope(definition: &mut GeneratorDefinition, schema: Option<&str>, catalog: Option<&str>) {
    if let Some(schema) = schema {
        definition
            .parameters
            .insert(keys::SCHEMA.to_string(), schema.to_string());
    }
    if let Some(catalog) = catalog {
        definition
            .parameters
            .insert(keys::CATALOG.to_string(), catalog.to_string());
    }
}

/// Outcome of a localized generator lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalizedMatch<T> {
    /// A declaration with the requested name.
    Exact(T),

    /// An anonymous declaration, usable when nothing else matches.
    Anonymous(T)
}

impl<T> LocalizedMatch<T> {
    /// The declaration, however it matched.
    pub fn into_inner(self) -> T {
        match self {
            Self::Exact(found) | Self::Anonymous(found) => found
        }
    }

    /// The declaration, only for exact matches.
    pub fn exact(self) -> Option<T> {
        match self {
            Self::Exact(found) => Some(found),
            Self::Anonymous(_) => None
        }
    }
}

/// Find a generator declaration for `name` around `member`.
///
/// Looks at the member, then its declaring class, then the class's package.
/// An exact name match at any level wins; otherwise the first anonymous
/// declaration, in the same order, is a possible match.
///
/// # Errors
///
/// Declarations that do not decode.
pub fn find_localized<T: NamedGenerator>(
    context: &BuildingContext<'_>,
    member: MemberRef,
    attribute: &str,
    name: &str
) -> Result<Option<LocalizedMatch<T>>> {
    let Some((member, class, package)) = context.member_scope(member) else {
        return Ok(None);
    };
    let levels = [
        member.repeated(attribute),
        class.repeated(attribute),
        package.map_or_else(Vec::new, |p| p.repeated(attribute))
    ];
    let mut fallback = None;
    for usages in levels {
        for usage in usages {
            let declared: T = usage.parse()?;
            if declared.generator_name() == name {
                return Ok(Some(LocalizedMatch::Exact(declared)));
            }
            if fallback.is_none() && declared.generator_name().is_empty() {
                fallback = Some(LocalizedMatch::Anonymous(declared));
            }
        }
    }
    Ok(fallback)
}

/// First registered custom generator attribute: member, class, package.
pub fn find_custom<'a>(
    context: &BuildingContext<'a>,
    member: MemberRef
) -> Option<(&'a AnnotationUsage, &'a str)> {
    let (member, class, package) = context.member_scope(member)?;
    let registry = context.generator_types;
    member
        .meta_annotated(registry)
        .or_else(|| class.meta_annotated(registry))
        .or_else(|| package.and_then(|p| p.meta_annotated(registry)))
}

/// Named generator declarations on `target`, as global registrations.
///
/// Anonymous declarations are local by nature and are skipped.
///
/// # Errors
///
/// Declarations that do not decode, or unknown generic strategies.
pub fn global_generators(
    target: &impl AnnotationTarget,
    context: &BuildingContext<'_>
) -> Result<Vec<GlobalGenerator>> {
    let options = context.options;
    let mut generators = Vec::new();
    for attr in target.parse_repeated::<SequenceGeneratorAttr>(SEQUENCE_GENERATOR)? {
        if !attr.name.is_empty() {
            generators.push(GlobalGenerator {
                kind:       GeneratorKind::Sequence,
                definition: sequence_definition(&attr, options, &attr.name)
            });
        }
    }
    for attr in target.parse_repeated::<TableGeneratorAttr>(TABLE_GENERATOR)? {
        if !attr.name.is_empty() {
            generators.push(GlobalGenerator {
                kind:       GeneratorKind::Table,
                definition: table_definition(&attr, options, &attr.name)
            });
        }
    }
    for attr in target.parse_repeated::<GenericGeneratorAttr>(GENERIC_GENERATOR)? {
        if !attr.name.is_empty() {
            generators.push(GlobalGenerator {
                kind:       GeneratorKind::Generic,
                definition: generic_definition(&attr, context)?
            });
        }
    }
    for attr in target.parse_repeated::<UuidGeneratorAttr>(UUID_GENERATOR)? {
        if !attr.name.is_empty() {
            generators.push(GlobalGenerator {
                kind:       GeneratorKind::Uuid,
                definition: uuid_definition(&attr)
            });
        }
    }
    Ok(generators)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_defaults() {
        let options = BindingOptions::default();
        let attr = SequenceGeneratorAttr {
            name: "order_ids".into(),
            ..Default::default()
        };
        let definition = sequence_definition(&attr, &options, "order_ids");
        assert_eq!(definition.strategy, SEQUENCE_STYLE);
        assert_eq!(definition.parameter(keys::SEQUENCE_NAME), Some("order_ids"));
        assert_eq!(definition.parameter(keys::INCREMENT_SIZE), Some("50"));
        assert_eq!(definition.parameter(keys::INITIAL_VALUE), Some("1"));
        assert_eq!(definition.parameter(keys::SCHEMA), None);
    }

    #[test]
    fn table_defaults() {
        let options = BindingOptions::default();
        let attr = TableGeneratorAttr {
            name: "ids".into(),
            schema: Some("billing".into()),
            allocation_size: Some(10),
            ..Default::default()
        };
        let definition = table_definition(&attr, &options, "orders");
        assert_eq!(definition.parameter(keys::TABLE_NAME), Some(DEFAULT_GENERATOR_TABLE));
        assert_eq!(definition.parameter(keys::SEGMENT_VALUE), Some("orders"));
        assert_eq!(definition.parameter(keys::INCREMENT_SIZE), Some("10"));
        assert_eq!(definition.parameter(keys::SCHEMA), Some("billing"));
    }

    #[test]
    fn uuid_style_is_kept() {
        let attr = UuidGeneratorAttr {
            name:  String::new(),
            style: Some("TIME".into())
        };
        assert_eq!(uuid_definition(&attr).parameter("style"), Some("time"));
    }
}
