// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Auxiliary database objects.

use tracing::debug;

use crate::{
    binder::{BuildingContext, ClassKind},
    error::{BindError, Result},
    model::{AuxiliaryObject, MetadataCollector},
    source::{AnnotationTarget, attrs::DatabaseObjectAttr}
};

/// Register the `database_object` declarations of `target`.
///
/// The class is resolved through the building context's
/// [`ClassResolver`](crate::binder::ClassResolver); objects scoped to other
/// dialect families are still recorded with their scopes.
///
/// # Errors
///
/// Missing class names and classes that do not resolve to an auxiliary
/// database object.
pub(crate) fn bind_database_objects(
    target: &impl AnnotationTarget,
    metadata: &mut MetadataCollector,
    context: &BuildingContext<'_>
) -> Result<()> {
    for attr in target.parse_repeated::<DatabaseObjectAttr>("database_object")? {
        if attr.class.trim().is_empty() {
            return Err(BindError::annotation(target.location(), "'database_object' needs a class"));
        }
        let handle = context
            .classes
            .load(&attr.class, ClassKind::AuxiliaryDatabaseObject)?;
        debug!(class = %handle.name, scopes = ?attr.dialects.0, "registered auxiliary database object");
        metadata
            .database_mut()
            .add_auxiliary_object(AuxiliaryObject {
                class_name:     handle.name,
                dialect_scopes: attr.dialects.0
            });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{binder::test_support::Fixture, error::ErrorKind};

    #[test]
    fn registered_class_is_recorded() {
        let mut fixture = Fixture::new(
            r#"#![database_object(class = "audit::Triggers", dialects("postgres"))]"#
        );
        fixture.classes.register("Triggers", ClassKind::AuxiliaryDatabaseObject);
        let context = fixture.context();
        let mut metadata = MetadataCollector::new();

        bind_database_objects(&fixture.sources.packages()[0], &mut metadata, &context).unwrap();
        let objects = metadata.database().auxiliary_objects();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].class_name, "Triggers");
        assert_eq!(objects[0].dialect_scopes, vec!["postgres".to_string()]);
    }

    #[test]
    fn unknown_class_fails_to_load() {
        let fixture = Fixture::new(r#"#![database_object(class = "Missing")]"#);
        let context = fixture.context();
        let mut metadata = MetadataCollector::new();
        let err = bind_database_objects(&fixture.sources.packages()[0], &mut metadata, &context)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ClassLoading);
    }
}
