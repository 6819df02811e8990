// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Shared fixture for binder unit tests.

use std::str::FromStr;

use super::{BuildingContext, ClassRegistry, DialectOverrides};
use crate::{
    config::BindingOptions,
    dialect::{DatabaseDialect, Dialect},
    naming::{IdentityPhysicalNaming, JpaImplicitNamingStrategy},
    source::{GeneratorTypeRegistry, MemberDetails, MemberRef, SourceModel}
};

pub(crate) struct Fixture {
    pub options:   BindingOptions,
    pub overrides: DialectOverrides,
    pub types:     GeneratorTypeRegistry,
    pub classes:   ClassRegistry,
    pub sources:   SourceModel
}

impl Fixture {
    pub fn new(source: &str) -> Self {
        Self {
            options:   BindingOptions::default(),
            overrides: DialectOverrides::default(),
            types:     GeneratorTypeRegistry::default(),
            classes:   ClassRegistry::default(),
            sources:   SourceModel::from_str(source).unwrap()
        }
    }

    pub fn context(&self) -> BuildingContext<'_> {
        self.context_with(&DatabaseDialect::Postgres)
    }

    pub fn context_with<'a>(&'a self, dialect: &'a dyn Dialect) -> BuildingContext<'a> {
        BuildingContext {
            options: &self.options,
            dialect,
            implicit_naming: &JpaImplicitNamingStrategy,
            physical_naming: &IdentityPhysicalNaming,
            overrides: &self.overrides,
            generator_types: &self.types,
            classes: &self.classes,
            sources: &self.sources
        }
    }

    pub fn member(&self, class: &str, member: &str) -> &MemberDetails {
        self.sources.class(class).unwrap().member(member).unwrap()
    }

    pub fn member_ref(&self, class: &str, member: &str) -> MemberRef {
        self.sources.member_ref(class, member).unwrap()
    }
}
