// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Binding options.
//!
//! [`BindingOptions`] carries every knob the binder consults. It deserializes
//! with serde (every field has a default, so partial documents are fine) and
//! can also be read from a flat property map:
//!
//! ```rust,ignore
//! let mut props = HashMap::new();
//! props.insert("entity_binder.default_schema".to_string(), "core".to_string());
//! props.insert("entity_binder.implicit_list_classification".to_string(), "list".to_string());
//! let options = BindingOptions::from_properties(&props)?;
//! ```
//!
//! # Keys
//!
//! | Property | Field | Default |
//! |----------|-------|---------|
//! | `entity_binder.default_schema` | `default_schema` | none |
//! | `entity_binder.default_catalog` | `default_catalog` | none |
//! | `entity_binder.implicit_list_classification` | `implicit_list_classification` | `bag` |
//! | `entity_binder.global_generator_scope` | `global_generator_scope` | `true` |
//! | `entity_binder.discriminator_check_constraints` | `discriminator_check_constraints` | `true` |
//! | `entity_binder.default_time_zone_storage` | `default_time_zone_storage` | `native` |
//! | `entity_binder.default_allocation_size` | `default_allocation_size` | `50` |
//! | `entity_binder.default_initial_value` | `default_initial_value` | `1` |
//! | `entity_binder.default_sequence_suffix` | `default_sequence_suffix` | `_seq` |
//! | `entity_binder.create_implicit_foreign_keys` | `create_implicit_foreign_keys` | `true` |

use std::collections::HashMap;

use serde::Deserialize;

use crate::{
    error::{BindError, Result},
    model::TimeZoneStorageKind
};

/// Prefix shared by all property keys.
pub const PROPERTY_PREFIX: &str = "entity_binder.";

/// How a plain `Vec<T>` attribute without index configuration is classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImplicitListClassification {
    /// Unordered bag semantics.
    #[default]
    Bag,

    /// Positional list with an implicit index column.
    List
}

impl ImplicitListClassification {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "bag" => Some(Self::Bag),
            "list" => Some(Self::List),
            _ => None
        }
    }
}

/// Options consulted while binding.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BindingOptions {
    /// Schema applied to tables that do not name one.
    pub default_schema: Option<String>,

    /// Catalog applied to tables that do not name one.
    pub default_catalog: Option<String>,

    /// Classification of plain `Vec<T>` attributes.
    pub implicit_list_classification: ImplicitListClassification,

    /// Register named generators globally so any entity can use them.
    pub global_generator_scope: bool,

    /// Emit `in (...)` check constraints for discriminator columns.
    pub discriminator_check_constraints: bool,

    /// Strategy used when an attribute asks for the default storage.
    pub default_time_zone_storage: TimeZoneStorageKind,

    /// Allocation size for generators that do not set one.
    pub default_allocation_size: i64,

    /// Initial value for generators that do not set one.
    pub default_initial_value: i64,

    /// Suffix appended to implicit per-entity sequence names.
    pub default_sequence_suffix: String,

    /// Create foreign key constraints for to-one associations.
    pub create_implicit_foreign_keys: bool
}

impl Default for BindingOptions {
    fn default() -> Self {
        Self {
            default_schema: None,
            default_catalog: None,
            implicit_list_classification: ImplicitListClassification::Bag,
            global_generator_scope: true,
            discriminator_check_constraints: true,
            default_time_zone_storage: TimeZoneStorageKind::Native,
            default_allocation_size: 50,
            default_initial_value: 1,
            default_sequence_suffix: "_seq".to_string(),
            create_implicit_foreign_keys: true
        }
    }
}

impl BindingOptions {
    /// Read options from a flat property map.
    ///
    /// Keys without the [`PROPERTY_PREFIX`] are ignored; unknown keys with
    /// the prefix are ignored too. Malformed values are errors.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::Mapping`] when a value cannot be interpreted.
    pub fn from_properties(properties: &HashMap<String, String>) -> Result<Self> {
        let mut options = Self::default();

        for (key, value) in properties {
            let Some(name) = key.strip_prefix(PROPERTY_PREFIX) else {
                continue;
            };
            match name {
                "default_schema" => options.default_schema = non_blank(value),
                "default_catalog" => options.default_catalog = non_blank(value),
                "implicit_list_classification" => {
                    options.implicit_list_classification =
                        ImplicitListClassification::parse(value)
                            .ok_or_else(|| invalid_value(key, value))?;
                }
                "global_generator_scope" => {
                    options.global_generator_scope = parse_bool(key, value)?;
                }
                "discriminator_check_constraints" => {
                    options.discriminator_check_constraints = parse_bool(key, value)?;
                }
                "default_time_zone_storage" => {
                    options.default_time_zone_storage = TimeZoneStorageKind::parse(value)
                        .ok_or_else(|| invalid_value(key, value))?;
                }
                "default_allocation_size" => {
                    options.default_allocation_size = parse_int(key, value)?;
                }
                "default_initial_value" => {
                    options.default_initial_value = parse_int(key, value)?;
                }
                "default_sequence_suffix" => {
                    options.default_sequence_suffix = value.clone();
                }
                "create_implicit_foreign_keys" => {
                    options.create_implicit_foreign_keys = parse_bool(key, value)?;
                }
                _ => {}
            }
        }

        Ok(options)
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(invalid_value(key, value))
    }
}

fn parse_int(key: &str, value: &str) -> Result<i64> {
    value.trim().parse().map_err(|_| invalid_value(key, value))
}

fn invalid_value(key: &str, value: &str) -> BindError {
    BindError::mapping(format!("invalid value '{value}' for setting '{key}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn defaults() {
        let options = BindingOptions::default();
        assert!(options.global_generator_scope);
        assert!(options.discriminator_check_constraints);
        assert_eq!(options.default_allocation_size, 50);
        assert_eq!(options.default_sequence_suffix, "_seq");
        assert_eq!(
            options.implicit_list_classification,
            ImplicitListClassification::Bag
        );
    }

    #[test]
    fn reads_prefixed_properties() {
        let options = BindingOptions::from_properties(&props(&[
            ("entity_binder.default_schema", "core"),
            ("entity_binder.implicit_list_classification", "LIST"),
            ("entity_binder.default_allocation_size", "10"),
            ("entity_binder.default_time_zone_storage", "column"),
            ("hibernate.show_sql", "true")
        ]))
        .unwrap();

        assert_eq!(options.default_schema.as_deref(), Some("core"));
        assert_eq!(
            options.implicit_list_classification,
            ImplicitListClassification::List
        );
        assert_eq!(options.default_allocation_size, 10);
        assert_eq!(options.default_time_zone_storage, TimeZoneStorageKind::Column);
    }

    #[test]
    fn rejects_malformed_values() {
        let result = BindingOptions::from_properties(&props(&[(
            "entity_binder.global_generator_scope",
            "maybe"
        )]));
        assert!(result.is_err());
    }

    #[test]
    fn blank_schema_is_none() {
        let options =
            BindingOptions::from_properties(&props(&[("entity_binder.default_schema", "  ")]))
                .unwrap();
        assert!(options.default_schema.is_none());
    }

    #[test]
    fn deserializes_partial_json() {
        let options: BindingOptions = serde_json::from_str(
            r#"{ "default_catalog": "main", "discriminator_check_constraints": false }"#
        )
        .unwrap();
        assert_eq!(options.default_catalog.as_deref(), Some("main"));
        assert!(!options.discriminator_check_constraints);
        assert!(options.global_generator_scope);
    }
}
