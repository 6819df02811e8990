// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Identifier generator definitions.
//!
//! The binder never runs a generator. It only records which implementation
//! an identifier uses and the string configuration that implementation will
//! be built with.

use std::collections::BTreeMap;

/// Configuration key: physical table of the entity.
pub const TARGET_TABLE: &str = "target_table";

/// Configuration key: physical primary key column.
pub const TARGET_COLUMN: &str = "target_column";

/// Configuration key: entity name.
pub const ENTITY_NAME: &str = "entity_name";

/// Configuration key: JPA entity name.
pub const JPA_ENTITY_NAME: &str = "jpa_entity_name";

/// Configuration key: base for implicit sequence / segment names.
pub const IMPLICIT_NAME_BASE: &str = "implicit_name_base";

/// Configuration key: comma-joined identity-capable tables of the root.
pub const IDENTITY_TABLES: &str = "identity_tables";

/// Configuration key: sequence name.
pub const SEQUENCE_NAME: &str = "sequence_name";

/// Configuration key: first value.
pub const INITIAL_VALUE: &str = "initial_value";

/// Configuration key: allocation / increment size.
pub const INCREMENT_SIZE: &str = "increment_size";

/// Configuration key: table generator table.
pub const TABLE_NAME: &str = "table_name";

/// Configuration key: table generator segment column.
pub const SEGMENT_COLUMN: &str = "segment_column_name";

/// Configuration key: table generator segment value.
pub const SEGMENT_VALUE: &str = "segment_value";

/// Configuration key: table generator value column.
pub const VALUE_COLUMN: &str = "value_column_name";

/// Configuration key: schema.
pub const SCHEMA: &str = "schema";

/// Configuration key: catalog.
pub const CATALOG: &str = "catalog";

/// A bound generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorDefinition {
    /// Generator name; empty for anonymous generators.
    pub name: String,

    /// Implementation (strategy) name.
    pub strategy: String,

    /// String configuration.
    pub parameters: BTreeMap<String, String>
}

impl GeneratorDefinition {
    /// Create a definition with no parameters.
    pub fn new(name: impl Into<String>, strategy: impl Into<String>) -> Self {
        Self {
            name:       name.into(),
            strategy:   strategy.into(),
            parameters: BTreeMap::new()
        }
    }

    /// Add a parameter, builder style.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Parameter by key.
    #[must_use]
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }

    /// Merge parameters that are not set yet.
    pub fn merge_missing(&mut self, parameters: &BTreeMap<String, String>) {
        for (key, value) in parameters {
            self.parameters
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }
}

/// Kind of a globally registered generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorKind {
    /// `sequence_generator`.
    Sequence,

    /// `table_generator`.
    Table,

    /// `generic_generator`.
    Generic,

    /// `uuid_generator`.
    Uuid
}

/// A named generator visible to every entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalGenerator {
    /// Kind.
    pub kind: GeneratorKind,

    /// Definition without entity-specific configuration.
    pub definition: GeneratorDefinition
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_explicit_values() {
        let mut definition =
            GeneratorDefinition::new("a", "SequenceStyleGenerator").with_parameter(SEQUENCE_NAME, "a_seq");
        let mut defaults = BTreeMap::new();
        defaults.insert(SEQUENCE_NAME.to_string(), "other".to_string());
        defaults.insert(TARGET_TABLE.to_string(), "orders".to_string());
        definition.merge_missing(&defaults);
        assert_eq!(definition.parameter(SEQUENCE_NAME), Some("a_seq"));
        assert_eq!(definition.parameter(TARGET_TABLE), Some("orders"));
    }
}
