// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Identifier generators, resolved once keys exist.

use super::Progress;
use crate::{
    binder::{
        BuildingContext, GeneratorRequest, GeneratorTarget, resolve_generator,
        strategies::{self, IDENTITY}
    },
    error::{BindError, Result},
    model::{CollectionId, MetadataCollector},
    source::MemberRef
};

/// Generator of an entity identifier.
#[derive(Debug, Clone)]
pub struct IdGeneratorSecondPass {
    entity:  String,
    member:  MemberRef,
    request: GeneratorRequest
}

impl IdGeneratorSecondPass {
    /// Generator for the identifier `member` of `entity`.
    pub fn new(entity: impl Into<String>, member: MemberRef, request: GeneratorRequest) -> Self {
        Self {
            entity: entity.into(),
            member,
            request
        }
    }

    /// Entity.
    #[must_use]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Requested generation.
    #[must_use]
    pub fn request(&self) -> &GeneratorRequest {
        &self.request
    }

    pub(crate) fn execute(
        &self,
        metadata: &mut MetadataCollector,
        context: &BuildingContext<'_>
    ) -> Result<Progress> {
        let Some((table, columns)) = metadata.primary_key_columns(&self.entity) else {
            return Ok(Progress::Deferred);
        };
        let Some(value) = metadata.identifier_value(&self.entity) else {
            return Err(BindError::mapping(format!(
                "entity '{}' has no identifier",
                self.entity
            )));
        };
        let names: Vec<String> = columns.into_iter().map(|c| c.name).collect();
        let target = GeneratorTarget::for_entity(metadata, &self.entity, table, names.clone())?;
        let definition = resolve_generator(&self.request, &target, self.member, metadata, context)?;

        if definition.strategy == IDENTITY {
            let table = metadata.table_mut(table);
            for name in &names {
                if let Some(column) = table.column_mut(name) {
                    column.identity = true;
                }
            }
        }
        metadata.value_mut(value).identifier_generator = Some(definition);
        Ok(Progress::Done)
    }
}

/// Generator of an idbag identifier.
#[derive(Debug, Clone)]
pub struct IdBagIdGeneratorSecondPass {
    collection: CollectionId,
    owner:      String,
    property:   String,
    member:     MemberRef,
    generator:  String
}

impl IdBagIdGeneratorSecondPass {
    /// Generator `generator` for the identifier of `collection`.
    pub fn new(
        collection: CollectionId,
        owner: impl Into<String>,
        property: impl Into<String>,
        member: MemberRef,
        generator: impl Into<String>
    ) -> Self {
        Self {
            collection,
            owner: owner.into(),
            property: property.into(),
            member,
            generator: generator.into()
        }
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

    pub(crate) fn execute(
        &self,
        metadata: &mut MetadataCollector,
        context: &BuildingContext<'_>
    ) -> Result<Progress> {
        let collection = metadata.collection(self.collection);
        let (Some(identifier), Some(table)) = (collection.identifier, collection.collection_table)
        else {
            return Ok(Progress::Deferred);
        };
        let Some(column) = metadata.value(identifier).column_names().into_iter().next() else {
            return Ok(Progress::Deferred);
        };

        let target = GeneratorTarget::for_collection_table(metadata, &self.owner, table, column);
        let request = GeneratorRequest::Named {
            name: self.generator.clone()
        };
        let definition = resolve_generator(&request, &target, self.member, metadata, context)?;
        if strategies::is_illegal_collection_id_implementation(&definition.strategy) {
            return Err(BindError::mapping(format!(
                "collection id of '{}.{}' cannot use generator '{}' ({})",
                self.owner, self.property, self.generator, definition.strategy
            )));
        }
        metadata.value_mut(identifier).identifier_generator = Some(definition);
        Ok(Progress::Done)
    }
}
