// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Custom class resolution.
//!
//! A few attributes name classes by string: legacy generator strategies,
//! custom `any` discriminator strategies and auxiliary database objects.
//! The binder never instantiates anything; it asks a [`ClassResolver`]
//! whether the name denotes something of the expected kind, and fails with a
//! class-loading error when it does not.

use std::{collections::BTreeMap, fmt};

use crate::error::{BindError, Result};

/// What a resolved class is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    /// An identifier generator implementation.
    IdentifierGenerator,

    /// An implicit `any` discriminator strategy.
    ImplicitDiscriminatorStrategy,

    /// An auxiliary database object producer.
    AuxiliaryDatabaseObject
}

/// A resolved class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassHandle {
    /// Canonical class name.
    pub name: String,

    /// Kind.
    pub kind: ClassKind
}

/// Resolves class names (class loader plus bean producer).
pub trait ClassResolver: fmt::Debug {
    /// Resolve `name` and check it is of `kind`.
    ///
    /// # Errors
    ///
    /// [`BindError::ClassLoading`] when the name is unknown or of another kind.
    fn load(&self, name: &str, kind: ClassKind) -> Result<ClassHandle>;
}

/// Built-in generator implementations.
pub const BUILTIN_GENERATORS: &[&str] = &[
    "NativeGenerator",
    "Assigned",
    "SequenceStyleGenerator",
    "TableGenerator",
    "IdentityGenerator",
    "IncrementGenerator",
    "ForeignGenerator",
    "UUIDHexGenerator",
    "UUIDGenerator",
    "UuidGenerator",
    "SelectGenerator",
    "GUIDGenerator"
];

/// Default [`ClassResolver`]: the built-in generators plus registrations.
///
/// Names match on the full name or on the last `.`/`::` separated segment,
/// so `org.example.IncrementGenerator` resolves to `IncrementGenerator`.
#[derive(Debug, Clone)]
pub struct ClassRegistry {
    classes: BTreeMap<String, ClassKind>
}

impl Default for ClassRegistry {
    fn default() -> Self {
        let classes = BUILTIN_GENERATORS
            .iter()
            .map(|name| ((*name).to_string(), ClassKind::IdentifierGenerator))
            .collect();
        Self {
            classes
        }
    }
}

impl ClassRegistry {
    /// Register a class.
    pub fn register(&mut self, name: impl Into<String>, kind: ClassKind) {
        self.classes.insert(name.into(), kind);
    }

    /// Builder-style [`register`](Self::register).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, kind: ClassKind) -> Self {
        self.register(name, kind);
        self
    }

    fn find(&self, name: &str) -> Option<(&str, ClassKind)> {
        if let Some((key, kind)) = self.classes.get_key_value(name) {
            return Some((key, *kind));
        }
        let short = short_name(name);
        self.classes
            .iter()
            .find(|(key, _)| short_name(key) == short)
            .map(|(key, kind)| (key.as_str(), *kind))
    }
}

impl ClassResolver for ClassRegistry {
    fn load(&self, name: &str, kind: ClassKind) -> Result<ClassHandle> {
        match self.find(name) {
            Some((found, found_kind)) if found_kind == kind => Ok(ClassHandle {
                name: found.to_string(),
                kind
            }),
            Some((_, found_kind)) => Err(BindError::class_loading(
                name,
                format!("expected {kind:?} but found {found_kind:?}")
            )),
            None => Err(BindError::class_loading(name, "class is not registered"))
        }
    }
}

/// Last segment of a `.` or `::` separated class name.
#[must_use]
pub fn short_name(name: &str) -> &str {
    name.rsplit(['.', ':']).next().unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn builtins_resolve_by_short_name() {
        let registry = ClassRegistry::default();
        let handle = registry
            .load("org.example.IncrementGenerator", ClassKind::IdentifierGenerator)
            .unwrap();
        assert_eq!(handle.name, "IncrementGenerator");
    }

    #[test]
    fn unknown_class_is_class_loading_error() {
        let registry = ClassRegistry::default();
        let err = registry
            .load("com.acme.Missing", ClassKind::IdentifierGenerator)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ClassLoading);
    }

    #[test]
    fn kind_mismatch_is_class_loading_error() {
        let registry = ClassRegistry::default().with("AuditTrigger", ClassKind::AuxiliaryDatabaseObject);
        assert!(registry
            .load("AuditTrigger", ClassKind::AuxiliaryDatabaseObject)
            .is_ok());
        let err = registry
            .load("AuditTrigger", ClassKind::IdentifierGenerator)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ClassLoading);
    }

    #[test]
    fn short_names() {
        assert_eq!(short_name("a.b.C"), "C");
        assert_eq!(short_name("crate::ids::Snowflake"), "Snowflake");
        assert_eq!(short_name("Plain"), "Plain");
    }
}
