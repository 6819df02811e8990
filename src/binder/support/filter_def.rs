// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Filter definitions and filter references.

use tracing::debug;

use crate::{
    error::{BindError, Result},
    model::{CollectionId, FilterDefinition, MetadataCollector},
    second_pass::FilterSecondPass,
    source::{
        AnnotationTarget,
        attrs::{FilterAttr, FilterDefAttr}
    }
};

/// Register every `filter_def` declared on `target`.
///
/// # Errors
///
/// Blank names, undecodable payloads and duplicate definitions.
pub(crate) fn bind_filter_definitions(
    target: &impl AnnotationTarget,
    metadata: &mut MetadataCollector
) -> Result<()> {
    for attr in target.parse_repeated::<FilterDefAttr>("filter_def")? {
        if attr.name.trim().is_empty() {
            return Err(BindError::annotation(target.location(), "'filter_def' needs a name"));
        }
        debug!(filter = %attr.name, location = %target.location(), "registered filter definition");
        metadata.add_filter_definition(FilterDefinition {
            name:                 attr.name,
            default_condition:    attr.default_condition.filter(|c| !c.trim().is_empty()),
            parameters:           attr.parameters.0,
            apply_to_load_by_key: attr.apply_to_load_by_key
        })?;
    }
    Ok(())
}

/// Pass resolving the `filter` references on `target`, if there are any.
///
/// `collection` selects the collection form; `owner` is then its role.
///
/// # Errors
///
/// Undecodable payloads.
pub(crate) fn filter_pass(
    target: &impl AnnotationTarget,
    owner: &str,
    collection: Option<CollectionId>
) -> Result<Option<FilterSecondPass>> {
    let filters: Vec<FilterAttr> = target.parse_repeated("filter")?;
    if filters.is_empty() {
        return Ok(None);
    }
    if let Some(blank) = filters.iter().find(|f| f.name.trim().is_empty()) {
        return Err(BindError::annotation(
            target.location(),
            format!("'filter' needs a name (condition {:?})", blank.condition)
        ));
    }
    Ok(Some(match collection {
        Some(id) => FilterSecondPass::collection(owner, id, filters),
        None => FilterSecondPass::entity(owner, filters)
    }))
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::source::SourceModel;

    #[test]
    fn definitions_are_registered() {
        let sources = SourceModel::from_str(
            r#"
            #![filter_def(name = "tenant", default_condition = "tenant_id = :tenant", parameters(tenant = "i64"))]
            #![filter_def(name = "active")]
            "#
        )
        .unwrap();
        let mut metadata = MetadataCollector::new();
        bind_filter_definitions(&sources.packages()[0], &mut metadata).unwrap();

        let tenant = metadata.filter_definition("tenant").unwrap();
        assert_eq!(tenant.default_condition.as_deref(), Some("tenant_id = :tenant"));
        assert_eq!(tenant.parameters.get("tenant").map(String::as_str), Some("i64"));
        assert!(metadata.filter_definition("active").unwrap().default_condition.is_none());
    }

    #[test]
    fn duplicates_and_blank_names_fail() {
        let sources = SourceModel::from_str(
            r#"
            #![filter_def(name = "tenant")]
            #![filter_def(name = "tenant")]
            "#
        )
        .unwrap();
        let mut metadata = MetadataCollector::new();
        assert!(bind_filter_definitions(&sources.packages()[0], &mut metadata).is_err());

        let sources = SourceModel::from_str("#![filter_def(default_condition = \"1 = 1\")]").unwrap();
        let mut metadata = MetadataCollector::new();
        assert!(bind_filter_definitions(&sources.packages()[0], &mut metadata).is_err());
    }
}
