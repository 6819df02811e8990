// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! First-pass binders and the [`MetadataBuilder`] driver.
//!
//! Binding runs in two phases. The first pass walks the source model once,
//! turning every attribute it can bind locally into model objects and
//! queueing a second pass for every piece that needs another entity. The
//! second phase drains that queue in waves until nothing is left.
//!
//! # Driver order
//!
//! | Step | Work |
//! |------|------|
//! | 1 | package and class level registrations: global generators, filter definitions, fetch profiles, database objects |
//! | 2 | entities ordered superclass first |
//! | 3 | each entity bound by the entity binder |
//! | 4 | second passes processed to completion |
//!
//! # Module Structure
//!
//! - `entity` - entity classes, inheritance and discriminators
//! - `property` - member dispatch and embedded components
//! - `basic`, `to_one`, `any`, `aggregate`, `collection` - per-shape binders
//! - `column`, `join_column` - annotated column descriptors
//! - [`generator`] - identifier generator requests and resolution
//! - `support` - filters, fetch profiles, soft delete, dialect overrides
//! - `classes` - class resolution for named implementations
//! - `context` - the read-only [`BuildingContext`]

mod aggregate;
mod any;
mod basic;
mod classes;
mod collection;
mod column;
mod context;
mod entity;
pub mod generator;
mod join_column;
mod property;
pub(crate) mod support;
#[cfg(test)]
pub(crate) mod test_support;
mod to_one;

use std::collections::BTreeMap;

use tracing::{debug, info};

pub(crate) use self::basic::{explicit_type_code, infer_type_code};
pub use self::{
    classes::{BUILTIN_GENERATORS, ClassHandle, ClassKind, ClassRegistry, ClassResolver, short_name},
    column::{AnnotatedColumn, AnnotatedColumns, ColumnSet, ColumnsBuilder, Nullability},
    context::BuildingContext,
    entity::{DISCRIMINATOR_LENGTH, default_discriminator_value},
    generator::{GeneratorRequest, GeneratorTarget, generator_request, resolve_generator, strategies},
    join_column::{AnnotatedJoinColumn, AnnotatedJoinColumns},
    support::DialectOverrides
};
use crate::{
    config::BindingOptions,
    dialect::{DatabaseDialect, Dialect},
    error::{BindError, Result},
    model::MetadataCollector,
    naming::{IdentityPhysicalNaming, ImplicitNamingStrategy, JpaImplicitNamingStrategy, PhysicalNamingStrategy},
    source::{AnnotationTarget, ClassDetails, GeneratorTypeRegistry, SourceModel}
};

/// Binds a [`SourceModel`] into a [`MetadataCollector`].
///
/// # Example
///
/// ```rust
/// use std::str::FromStr;
///
/// use entity_binder::{binder::MetadataBuilder, source::SourceModel};
///
/// let sources = SourceModel::from_str(
///     r#"
///     #[entity]
///     struct Customer {
///         #[id]
///         id: i64,
///         name: String
///     }
///     "#
/// )
/// .unwrap();
/// let metadata = MetadataBuilder::new().build(&sources).unwrap();
/// assert!(metadata.entity("Customer").is_some());
/// ```
#[derive(Debug)]
pub struct MetadataBuilder {
    options:         BindingOptions,
    dialect:         Box<dyn Dialect>,
    implicit_naming: Box<dyn ImplicitNamingStrategy>,
    physical_naming: Box<dyn PhysicalNamingStrategy>,
    overrides:       DialectOverrides,
    generator_types: GeneratorTypeRegistry,
    classes:         Box<dyn ClassResolver>
}

impl Default for MetadataBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataBuilder {
    /// PostgreSQL, JPA implicit naming, identity physical naming and the
    /// built-in class registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            options:         BindingOptions::default(),
            dialect:         Box::new(DatabaseDialect::Postgres),
            implicit_naming: Box::new(JpaImplicitNamingStrategy),
            physical_naming: Box::new(IdentityPhysicalNaming),
            overrides:       DialectOverrides::default(),
            generator_types: GeneratorTypeRegistry::default(),
            classes:         Box::new(ClassRegistry::default())
        }
    }

    /// Replace the options.
    #[must_use]
    pub fn options(mut self, options: BindingOptions) -> Self {
        self.options = options;
        self
    }

    /// Target dialect.
    #[must_use]
    pub fn dialect(mut self, dialect: impl Dialect + 'static) -> Self {
        self.dialect = Box::new(dialect);
        self
    }

    /// Implicit naming strategy.
    #[must_use]
    pub fn implicit_naming(mut self, naming: impl ImplicitNamingStrategy + 'static) -> Self {
        self.implicit_naming = Box::new(naming);
        self
    }

    /// Physical naming strategy.
    #[must_use]
    pub fn physical_naming(mut self, naming: impl PhysicalNamingStrategy + 'static) -> Self {
        self.physical_naming = Box::new(naming);
        self
    }

    /// Dialect override registry.
    #[must_use]
    pub fn overrides(mut self, overrides: DialectOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Custom generator attributes.
    #[must_use]
    pub fn generator_types(mut self, registry: GeneratorTypeRegistry) -> Self {
        self.generator_types = registry;
        self
    }

    /// Class resolver for named implementations.
    #[must_use]
    pub fn class_resolver(mut self, resolver: impl ClassResolver + 'static) -> Self {
        self.classes = Box::new(resolver);
        self
    }

    fn context<'a>(&'a self, sources: &'a SourceModel) -> BuildingContext<'a> {
        BuildingContext {
            options: &self.options,
            dialect: self.dialect.as_ref(),
            implicit_naming: self.implicit_naming.as_ref(),
            physical_naming: self.physical_naming.as_ref(),
            overrides: &self.overrides,
            generator_types: &self.generator_types,
            classes: self.classes.as_ref(),
            sources
        }
    }

    /// Bind every entity of `sources`, then run the second passes.
    ///
    /// # Errors
    ///
    /// The first error raised by a binder or a second pass. Nothing is
    /// returned on failure.
    pub fn build(&self, sources: &SourceModel) -> Result<MetadataCollector> {
        let context = self.context(sources);
        let mut metadata = MetadataCollector::new();

        for package in sources.packages() {
            bind_registrations(package, &mut metadata, &context)?;
        }
        for class in sources.classes() {
            bind_registrations(class, &mut metadata, &context)?;
        }

        let ordered = hierarchy_order(sources)?;
        info!(
            entities = ordered.len(),
            dialect = %self.dialect.name(),
            "binding entities"
        );
        for class in ordered {
            entity::bind_entity(class, &mut metadata, &context)?;
        }

        debug!(
            pending = metadata.pending_second_passes().len(),
            "first pass finished"
        );
        metadata.process_second_passes(&context)?;
        Ok(metadata)
    }
}

/// Registrations a package or class makes independently of any entity.
fn bind_registrations(
    target: &impl AnnotationTarget,
    metadata: &mut MetadataCollector,
    context: &BuildingContext<'_>
) -> Result<()> {
    if context.options.global_generator_scope {
        for generator in generator::global_generators(target, context)? {
            metadata.add_global_generator(generator)?;
        }
    }
    support::bind_filter_definitions(target, metadata)?;
    for pass in support::bind_fetch_profiles(target, metadata)? {
        metadata.add_second_pass(pass.into());
    }
    support::bind_database_objects(target, metadata, context)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    Active,
    Done
}

/// Entity classes with every superclass ahead of its subclasses.
///
/// Classes keep their declaration order otherwise.
fn hierarchy_order(sources: &SourceModel) -> Result<Vec<&ClassDetails>> {
    let entities: Vec<&ClassDetails> = sources.classes().iter().filter(|c| c.is_entity()).collect();
    let mut by_name: BTreeMap<String, usize> = BTreeMap::new();
    let mut parents = Vec::with_capacity(entities.len());
    for (index, class) in entities.iter().enumerate() {
        let (jpa_name, extends) = entity::entity_names(class)?;
        by_name.insert(class.name().to_string(), index);
        by_name.entry(jpa_name).or_insert(index);
        parents.push(extends);
    }

    let mut state: Vec<Option<Visit>> = vec![None; entities.len()];
    let mut ordered = Vec::with_capacity(entities.len());
    for start in 0..entities.len() {
        let mut chain = Vec::new();
        let mut current = start;
        loop {
            match state[current] {
                Some(Visit::Done) => break,
                Some(Visit::Active) => {
                    return Err(BindError::mapping(format!(
                        "entity '{}' is its own superclass",
                        entities[current].name()
                    )));
                }
                None => {}
            }
            state[current] = Some(Visit::Active);
            chain.push(current);
            let Some(parent) = parents[current].as_deref() else {
                break;
            };
            let Some(&next) = by_name.get(parent) else {
                return Err(BindError::unresolved(
                    entities[current].name(),
                    "",
                    format!("unknown superclass '{parent}'")
                ));
            };
            current = next;
        }
        for index in chain.into_iter().rev() {
            state[index] = Some(Visit::Done);
            ordered.push(entities[index]);
        }
    }
    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::error::ErrorKind;

    fn names(source: &str) -> Result<Vec<String>> {
        let sources = SourceModel::from_str(source).unwrap();
        Ok(hierarchy_order(&sources)?
            .into_iter()
            .map(|c| c.name().to_string())
            .collect())
    }

    #[test]
    fn superclasses_come_first() {
        let order = names(
            r#"
            #[entity(extends = "Mammal")]
            struct Dog {}
            #[entity(name = "Mammal", extends = "Animal")]
            struct MammalEntity {}
            #[embeddable]
            struct Tag {}
            #[entity]
            struct Animal {}
            "#
        )
        .unwrap();
        assert_eq!(order, vec!["Animal", "MammalEntity", "Dog"]);
    }

    #[test]
    fn cycles_and_unknown_parents() {
        let err = names(
            r#"
            #[entity(extends = "B")]
            struct A {}
            #[entity(extends = "A")]
            struct B {}
            "#
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Mapping);

        let err = names(
            r#"
            #[entity(extends = "Nowhere")]
            struct A {}
            "#
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnresolvedReference);
    }

    #[test]
    fn builds_a_simple_entity() {
        let sources = SourceModel::from_str(
            r#"
            #[entity]
            #[table(name = "customers")]
            struct Customer {
                #[id]
                id: i64,
                name: String
            }
            "#
        )
        .unwrap();
        let metadata = MetadataBuilder::new().build(&sources).unwrap();
        let customer = metadata.entity("Customer").unwrap();
        let table = metadata.table(customer.table);
        assert_eq!(table.name, "customers");
        assert_eq!(
            table.primary_key.as_ref().unwrap().columns,
            vec!["id".to_string()]
        );
        assert!(metadata.pending_second_passes().is_empty());
    }
}
