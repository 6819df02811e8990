// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Dialect-conditional attribute overrides.
//!
//! A member may carry `#[formula("..")]` together with any number of
//! `#[formula_override(dialect = "oracle", value = "..")]`. The first override
//! whose dialect family and version bounds match wins over the base value.
//!
//! Which base attributes accept overrides, and under which name, is decided by
//! a [`DialectOverrides`] registry owned by the builder and passed to every
//! binder through the context.

use std::collections::BTreeMap;

use crate::{
    dialect::Dialect,
    error::Result,
    source::{AnnotationTarget, attrs::DialectOverrideAttr}
};

const OVERRIDABLE: [&str; 6] = [
    "formula",
    "column_default",
    "check",
    "sql_restriction",
    "discriminator_formula",
    "order_by"
];

/// Base attribute → override attribute.
#[derive(Debug, Clone)]
pub struct DialectOverrides {
    overrides: BTreeMap<String, String>
}

impl Default for DialectOverrides {
    fn default() -> Self {
        let overrides = OVERRIDABLE
            .iter()
            .map(|base| ((*base).to_string(), format!("{base}_override")))
            .collect();
        Self {
            overrides
        }
    }
}

impl DialectOverrides {
    /// A registry without any overridable attribute.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            overrides: BTreeMap::new()
        }
    }

    /// Make `base` overridable through `override_name`.
    pub fn register(&mut self, base: impl Into<String>, override_name: impl Into<String>) {
        self.overrides.insert(base.into(), override_name.into());
    }

    /// Builder-style [`register`](Self::register).
    #[must_use]
    pub fn with(mut self, base: impl Into<String>, override_name: impl Into<String>) -> Self {
        self.register(base, override_name);
        self
    }

    /// Override attribute registered for `base`.
    #[must_use]
    pub fn override_name(&self, base: &str) -> Option<&str> {
        self.overrides.get(base).map(String::as_str)
    }

    /// Resolve a single-string attribute, honouring matching overrides.
    ///
    /// # Errors
    ///
    /// Undecodable base or override payloads.
    pub fn resolve_string<T: AnnotationTarget + ?Sized>(
        &self,
        target: &T,
        base: &str,
        dialect: &dyn Dialect
    ) -> Result<Option<String>> {
        if let Some(name) = self.override_name(base) {
            let candidates: Vec<DialectOverrideAttr> = target.parse_repeated(name)?;
            if let Some(winner) = candidates.into_iter().find(|o| applies(o, dialect)) {
                return Ok(Some(winner.value));
            }
        }
        target.string_argument(base)
    }
}

fn applies(candidate: &DialectOverrideAttr, dialect: &dyn Dialect) -> bool {
    let major = dialect.version().major;
    dialect.matches(&candidate.dialect)
        && candidate.before_major.is_none_or(|bound| major < bound)
        && candidate.same_or_after_major.is_none_or(|bound| major >= bound)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::{
        dialect::DatabaseDialect,
        source::{ClassDetails, SourceModel}
    };

    fn model() -> SourceModel {
        SourceModel::from_str(
            r#"
            #[entity]
            struct Item {
                #[formula("a + b")]
                #[formula_override(dialect = "oracle", value = "nvl(a, 0) + b")]
                #[formula_override(dialect = "postgres", before_major = 12, value = "coalesce(a, 0) + b")]
                total: i64,

                #[check("x > 0")]
                #[constraint_override(dialect = "h2", value = "x >= 0")]
                x: i32
            }
            "#
        )
        .unwrap()
    }

    fn item(model: &SourceModel) -> &ClassDetails {
        model.class("Item").unwrap()
    }

    #[test]
    fn base_value_without_matching_override() {
        let model = model();
        let total = item(&model).member("total").unwrap();
        let value = DialectOverrides::default()
            .resolve_string(total, "formula", &DatabaseDialect::H2)
            .unwrap();
        assert_eq!(value.as_deref(), Some("a + b"));
    }

    #[test]
    fn family_and_version_bounds() {
        let model = model();
        let total = item(&model).member("total").unwrap();
        let overrides = DialectOverrides::default();

        let oracle = overrides
            .resolve_string(total, "formula", &DatabaseDialect::Oracle)
            .unwrap();
        assert_eq!(oracle.as_deref(), Some("nvl(a, 0) + b"));

        let old = DatabaseDialect::Postgres.with_version(11, 0);
        let value = overrides.resolve_string(total, "formula", &old).unwrap();
        assert_eq!(value.as_deref(), Some("coalesce(a, 0) + b"));

        let new = DatabaseDialect::Postgres.with_version(16, 0);
        let value = overrides.resolve_string(total, "formula", &new).unwrap();
        assert_eq!(value.as_deref(), Some("a + b"));
    }

    #[test]
    fn substitute_registry() {
        let model = model();
        let x = item(&model).member("x").unwrap();

        let default = DialectOverrides::default()
            .resolve_string(x, "check", &DatabaseDialect::H2)
            .unwrap();
        assert_eq!(default.as_deref(), Some("x > 0"));

        let custom = DialectOverrides::empty().with("check", "constraint_override");
        let value = custom.resolve_string(x, "check", &DatabaseDialect::H2).unwrap();
        assert_eq!(value.as_deref(), Some("x >= 0"));
    }
}
