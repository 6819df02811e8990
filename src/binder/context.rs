// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Building context shared by every binder and second pass.

use super::{classes::ClassResolver, support::DialectOverrides};
use crate::{
    config::BindingOptions,
    dialect::Dialect,
    naming::{ImplicitNamingStrategy, PhysicalNamingStrategy},
    source::{ClassDetails, GeneratorTypeRegistry, MemberDetails, MemberRef, PackageDetails, SourceModel}
};

/// Read-only collaborators of one bind.
///
/// Everything here is borrowed from the [`MetadataBuilder`](super::MetadataBuilder)
/// and the [`SourceModel`]; the only mutable state of a bind is the
/// [`MetadataCollector`](crate::model::MetadataCollector).
#[derive(Debug, Clone, Copy)]
pub struct BuildingContext<'a> {
    /// Options.
    pub options:         &'a BindingOptions,
    /// Dialect.
    pub dialect:         &'a dyn Dialect,
    /// Implicit naming.
    pub implicit_naming: &'a dyn ImplicitNamingStrategy,
    /// Physical naming.
    pub physical_naming: &'a dyn PhysicalNamingStrategy,
    /// Dialect override registry.
    pub overrides:       &'a DialectOverrides,
    /// Custom generator attributes.
    pub generator_types: &'a GeneratorTypeRegistry,
    /// Class resolution.
    pub classes:         &'a dyn ClassResolver,
    /// Source model being bound.
    pub sources:         &'a SourceModel
}

impl<'a> BuildingContext<'a> {
    /// Physical table name for a logical one.
    #[must_use]
    pub fn table_name(&self, logical: &str) -> String {
        self.physical_naming.to_physical_table_name(logical)
    }

    /// Physical column name for a logical one.
    #[must_use]
    pub fn column_name(&self, logical: &str) -> String {
        self.physical_naming.to_physical_column_name(logical)
    }

    /// Member with its declaring class and package.
    #[must_use]
    pub fn member_scope(
        &self,
        at: MemberRef
    ) -> Option<(&'a MemberDetails, &'a ClassDetails, Option<&'a PackageDetails>)> {
        let class = self.sources.class_at(at.class)?;
        let member = class.members().get(at.member)?;
        Some((member, class, self.sources.package_of(class)))
    }
}
