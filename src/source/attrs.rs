// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Typed attribute payloads.
//!
//! Key/value shaped attributes are decoded with `darling::FromMeta`. Every
//! struct here derives `Default` and carries `#[darling(default)]`, so a bare
//! attribute (`#[id]`, `#[entity]`) and a partial one decode the same way:
//! unset keys keep their default.
//!
//! Literal-list shapes (`columns("a", "b")`, `parameters(k = "v")`) go through
//! the two small hand-written decoders [`StringList`] and [`Parameters`].
//!
//! ```rust,ignore
//! #[column(name = "email_address", nullable = false, unique)]
//! #[join_table(
//!     name = "order_products",
//!     join_column(name = "order_id"),
//!     inverse_join_column(name = "product_id")
//! )]
//! ```

use std::collections::BTreeMap;

use darling::{FromMeta, ast::NestedMeta};
use syn::{Expr, ExprLit, Lit, Meta};

use crate::{
    dialect::SqlTypeCode,
    model::{FetchMode, InheritanceType, SoftDeleteStrategy}
};

/// A list of string literals: `attr("a", "b")`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringList(pub Vec<String>);

impl FromMeta for StringList {
    fn from_list(items: &[NestedMeta]) -> darling::Result<Self> {
        let mut values = Vec::with_capacity(items.len());
        let mut errors = darling::Error::accumulator();
        for item in items {
            match item {
                NestedMeta::Lit(Lit::Str(lit)) => values.push(lit.value()),
                other => errors.push(darling::Error::custom("expected a string literal").with_span(other))
            }
        }
        errors.finish_with(Self(values))
    }

    fn from_string(value: &str) -> darling::Result<Self> {
        Ok(Self(value.split(',').map(|s| s.trim().to_string()).collect()))
    }
}

/// Free-form `key = value` parameters: `parameters(region = "eu", size = 10)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters(pub BTreeMap<String, String>);

impl FromMeta for Parameters {
    fn from_word() -> darling::Result<Self> {
        Ok(Self::default())
    }

    fn from_list(items: &[NestedMeta]) -> darling::Result<Self> {
        let mut values = BTreeMap::new();
        let mut errors = darling::Error::accumulator();
        for item in items {
            let NestedMeta::Meta(Meta::NameValue(pair)) = item else {
                errors.push(darling::Error::custom("expected `key = value`").with_span(item));
                continue;
            };
            let key = pair
                .path
                .get_ident()
                .map(ToString::to_string)
                .unwrap_or_default();
            match expr_to_string(&pair.value) {
                Some(value) if !key.is_empty() => {
                    values.insert(key, value);
                }
                _ => errors.push(darling::Error::custom("unsupported parameter").with_span(pair))
            }
        }
        errors.finish_with(Self(values))
    }
}

/// Render a literal expression as a string.
#[must_use]
pub fn expr_to_string(expr: &Expr) -> Option<String> {
    let Expr::Lit(ExprLit {
        lit, ..
    }) = expr
    else {
        return None;
    };
    match lit {
        Lit::Str(s) => Some(s.value()),
        Lit::Int(i) => Some(i.base10_digits().to_string()),
        Lit::Float(f) => Some(f.base10_digits().to_string()),
        Lit::Bool(b) => Some(b.value.to_string()),
        Lit::Char(c) => Some(c.value().to_string()),
        _ => None
    }
}

/// `#[entity(name = "..", extends = "..")]`.
#[derive(Debug, Clone, Default, FromMeta)]
#[darling(default)]
pub struct EntityAttr {
    /// JPA entity name.
    pub name:    Option<String>,
    /// Superclass entity.
    pub extends: Option<String>
}

/// `#[table(name, schema, catalog)]`.
#[derive(Debug, Clone, Default, FromMeta)]
#[darling(default)]
pub struct TableAttr {
    /// Table name.
    pub name:    Option<String>,
    /// Schema.
    pub schema:  Option<String>,
    /// Catalog.
    pub catalog: Option<String>
}

/// `#[unique_constraint(name = "..", columns("a", "b"))]`.
#[derive(Debug, Clone, Default, FromMeta)]
#[darling(default)]
pub struct UniqueConstraintAttr {
    /// Constraint name.
    pub name:    Option<String>,
    /// Logical column names.
    pub columns: StringList
}

/// `#[inheritance(strategy = "..")]`.
#[derive(Debug, Clone, Default, FromMeta)]
#[darling(default)]
pub struct InheritanceAttr {
    /// Strategy.
    pub strategy: InheritanceType
}

/// Discriminator column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiscriminatorType {
    /// Character string.
    #[default]
    String,

    /// Single character.
    Char,

    /// Integer.
    Integer
}

impl FromMeta for DiscriminatorType {
    fn from_string(value: &str) -> darling::Result<Self> {
        match value.to_lowercase().as_str() {
            "string" => Ok(Self::String),
            "char" => Ok(Self::Char),
            "integer" | "int" => Ok(Self::Integer),
            _ => Err(darling::Error::unknown_value(value))
        }
    }
}

/// `#[discriminator_column(..)]`.
#[derive(Debug, Clone, Default, FromMeta)]
#[darling(default)]
pub struct DiscriminatorColumnAttr {
    /// Column name.
    pub name:               Option<String>,
    /// Value type.
    pub discriminator_type: DiscriminatorType,
    /// Length for string discriminators.
    pub length:             Option<u32>,
    /// Explicit column definition.
    pub column_definition:  Option<String>
}

/// `#[discriminator_options(force, insert = false)]`.
#[derive(Debug, Clone, Default, FromMeta)]
#[darling(default)]
pub struct DiscriminatorOptionsAttr {
    /// Always restrict by discriminator.
    pub force:  bool,
    /// Write the discriminator on insert (default `true`).
    pub insert: Option<bool>
}

/// `#[primary_key_join_column(name, referenced_column_name)]`.
#[derive(Debug, Clone, Default, FromMeta)]
#[darling(default)]
pub struct PrimaryKeyJoinColumnAttr {
    /// Key column on the subclass table.
    pub name:                   Option<String>,
    /// Referenced column on the parent table.
    pub referenced_column_name: Option<String>
}

/// `#[struct_type(name, schema, catalog)]`.
#[derive(Debug, Clone, Default, FromMeta)]
#[darling(default)]
pub struct StructAttr {
    /// Structured type name.
    pub name:    Option<String>,
    /// Schema.
    pub schema:  Option<String>,
    /// Catalog.
    pub catalog: Option<String>
}

/// `#[sequence_generator(..)]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, FromMeta)]
#[darling(default)]
pub struct SequenceGeneratorAttr {
    /// Generator name; empty means "any".
    pub name:            String,
    /// Database sequence.
    pub sequence_name:   Option<String>,
    /// Schema.
    pub schema:          Option<String>,
    /// Catalog.
    pub catalog:         Option<String>,
    /// First value.
    pub initial_value:   Option<i64>,
    /// Allocation size.
    pub allocation_size: Option<i64>
}

/// `#[table_generator(..)]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, FromMeta)]
#[darling(default)]
pub struct TableGeneratorAttr {
    /// Generator name; empty means "any".
    pub name:              String,
    /// Generator table.
    pub table:             Option<String>,
    /// Schema.
    pub schema:            Option<String>,
    /// Catalog.
    pub catalog:           Option<String>,
    /// Segment column.
    pub pk_column_name:    Option<String>,
    /// Value column.
    pub value_column_name: Option<String>,
    /// Segment value.
    pub pk_column_value:   Option<String>,
    /// First value.
    pub initial_value:     Option<i64>,
    /// Allocation size.
    pub allocation_size:   Option<i64>
}

/// `#[generic_generator(name, strategy, parameters(..))]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, FromMeta)]
#[darling(default)]
pub struct GenericGeneratorAttr {
    /// Generator name.
    pub name:       String,
    /// Legacy strategy or implementation name.
    pub strategy:   String,
    /// Configuration.
    pub parameters: Parameters
}

/// `#[uuid_generator(name, style)]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, FromMeta)]
#[darling(default)]
pub struct UuidGeneratorAttr {
    /// Generator name; empty means "any".
    pub name:  String,
    /// `random` (default) or `time`.
    pub style: Option<String>
}

/// Identifier generation strategies of `generated_value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenerationType {
    /// Random UUID.
    Uuid,

    /// Identity column.
    Identity,

    /// Database sequence.
    Sequence,

    /// Table-backed generator.
    Table,

    /// Pick one.
    #[default]
    Auto
}

impl FromMeta for GenerationType {
    fn from_string(value: &str) -> darling::Result<Self> {
        match value.to_lowercase().as_str() {
            "uuid" => Ok(Self::Uuid),
            "identity" => Ok(Self::Identity),
            "sequence" => Ok(Self::Sequence),
            "table" => Ok(Self::Table),
            "auto" => Ok(Self::Auto),
            _ => Err(darling::Error::unknown_value(value))
        }
    }
}

/// `#[generated_value(strategy, generator)]`.
#[derive(Debug, Clone, Default, FromMeta)]
#[darling(default)]
pub struct GeneratedValueAttr {
    /// Strategy.
    pub strategy:  GenerationType,
    /// Generator name.
    pub generator: Option<String>
}

/// `#[filter_def(name, default_condition, parameters(..), apply_to_load_by_key)]`.
#[derive(Debug, Clone, Default, FromMeta)]
#[darling(default)]
pub struct FilterDefAttr {
    /// Filter name.
    pub name:                 String,
    /// Default condition.
    pub default_condition:    Option<String>,
    /// Parameter name → type.
    pub parameters:           Parameters,
    /// Apply when loading by key.
    pub apply_to_load_by_key: bool
}

/// `#[filter(name, condition)]`.
#[derive(Debug, Clone, Default, FromMeta)]
#[darling(default)]
pub struct FilterAttr {
    /// Filter name.
    pub name:      String,
    /// Condition overriding the definition's default.
    pub condition: Option<String>
}

/// `fetch_override(entity, association, mode)` inside a fetch profile.
#[derive(Debug, Clone, Default, FromMeta)]
#[darling(default)]
pub struct FetchOverrideAttr {
    /// Entity name.
    pub entity:      String,
    /// Association property.
    pub association: String,
    /// Fetch mode.
    pub mode:        FetchMode
}

/// `#[fetch_profile(name, fetch_override(..), ..)]`.
#[derive(Debug, Clone, Default, FromMeta)]
#[darling(default)]
pub struct FetchProfileAttr {
    /// Profile name.
    pub name:           String,
    /// Overrides.
    #[darling(multiple)]
    pub fetch_override: Vec<FetchOverrideAttr>
}

/// `#[fetch_profile_override(profile, mode)]` on an association.
#[derive(Debug, Clone, Default, FromMeta)]
#[darling(default)]
pub struct FetchProfileOverrideAttr {
    /// Profile name.
    pub profile: String,
    /// Fetch mode.
    pub mode:    FetchMode
}

/// `#[named_entity_graph(name, attribute_nodes(..), include_all_attributes)]`.
#[derive(Debug, Clone, Default, FromMeta)]
#[darling(default)]
pub struct NamedEntityGraphAttr {
    /// Graph name; defaults to the JPA entity name.
    pub name:                   Option<String>,
    /// Attribute nodes.
    pub attribute_nodes:        StringList,
    /// Include every attribute of the entity.
    pub include_all_attributes: bool
}

/// `#[soft_delete(strategy, column_name)]`.
#[derive(Debug, Clone, Default, FromMeta)]
#[darling(default)]
pub struct SoftDeleteAttr {
    /// Strategy.
    pub strategy:    SoftDeleteStrategy,
    /// Indicator column.
    pub column_name: Option<String>
}

/// `#[database_object(class = "..", dialects("postgres"))]`.
#[derive(Debug, Clone, Default, FromMeta)]
#[darling(default)]
pub struct DatabaseObjectAttr {
    /// Producing class.
    pub class:    String,
    /// Dialect families the object applies to.
    pub dialects: StringList
}

/// `#[natural_id(mutable)]`.
#[derive(Debug, Clone, Default, FromMeta)]
#[darling(default)]
pub struct NaturalIdAttr {
    /// Whether the natural id may change.
    pub mutable: bool
}

/// `#[column(..)]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, FromMeta)]
#[darling(default)]
pub struct ColumnAttr {
    /// Column name.
    pub name:              Option<String>,
    /// Nullability; derived from the field type when absent.
    pub nullable:          Option<bool>,
    /// Insertable (default `true`).
    pub insertable:        Option<bool>,
    /// Updatable (default `true`).
    pub updatable:         Option<bool>,
    /// Single-column uniqueness.
    pub unique:            bool,
    /// Secondary table holding the column.
    pub table:             Option<String>,
    /// Length.
    pub length:            Option<u32>,
    /// Precision.
    pub precision:         Option<u32>,
    /// Scale.
    pub scale:             Option<u32>,
    /// Column definition (SQL type).
    pub column_definition: Option<String>
}

/// `#[columns(column(..), column(..))]`.
#[derive(Debug, Clone, Default, FromMeta)]
#[darling(default)]
pub struct ColumnsAttr {
    /// Columns.
    #[darling(multiple)]
    pub column: Vec<ColumnAttr>
}

/// `#[join_column(..)]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, FromMeta)]
#[darling(default)]
pub struct JoinColumnAttr {
    /// Column name.
    pub name:                   Option<String>,
    /// Referenced column on the target.
    pub referenced_column_name: Option<String>,
    /// Nullability (default `true`).
    pub nullable:               Option<bool>,
    /// Insertable (default `true`).
    pub insertable:             Option<bool>,
    /// Updatable (default `true`).
    pub updatable:              Option<bool>,
    /// Uniqueness.
    pub unique:                 bool,
    /// Table holding the column.
    pub table:                  Option<String>,
    /// Foreign key constraint name.
    pub foreign_key:            Option<String>,
    /// Do not create a constraint.
    pub no_constraint:          bool
}

/// `#[join_table(name, schema, catalog, join_column(..), inverse_join_column(..))]`.
#[derive(Debug, Clone, Default, FromMeta)]
#[darling(default)]
pub struct JoinTableAttr {
    /// Table name.
    pub name:                Option<String>,
    /// Schema.
    pub schema:              Option<String>,
    /// Catalog.
    pub catalog:             Option<String>,
    /// Columns pointing at the owner.
    #[darling(multiple)]
    pub join_column:         Vec<JoinColumnAttr>,
    /// Columns pointing at the target.
    #[darling(multiple)]
    pub inverse_join_column: Vec<JoinColumnAttr>
}

/// `#[collection_table(name, schema, join_column(..))]`.
#[derive(Debug, Clone, Default, FromMeta)]
#[darling(default)]
pub struct CollectionTableAttr {
    /// Table name.
    pub name:        Option<String>,
    /// Schema.
    pub schema:      Option<String>,
    /// Catalog.
    pub catalog:     Option<String>,
    /// Columns pointing at the owner.
    #[darling(multiple)]
    pub join_column: Vec<JoinColumnAttr>
}

/// Association attributes: `many_to_one`, `one_to_one`, `one_to_many`,
/// `many_to_many`, `element_collection`.
#[derive(Debug, Clone, Default, FromMeta)]
#[darling(default)]
pub struct AssociationAttr {
    /// Target entity, when the field type does not name it.
    pub target:    Option<String>,
    /// Owning property on the target.
    pub mapped_by: Option<String>,
    /// Optionality (default `true`).
    pub optional:  Option<bool>,
    /// Fetch mode: `lazy` or `eager`.
    pub fetch:     Option<String>
}

impl AssociationAttr {
    /// Whether the association is fetched lazily.
    #[must_use]
    pub fn is_lazy(&self, default: bool) -> bool {
        match self.fetch.as_deref().map(str::to_lowercase).as_deref() {
            Some("lazy") => true,
            Some("eager") => false,
            _ => default
        }
    }
}

/// `#[order_column(name, nullable)]`.
#[derive(Debug, Clone, Default, FromMeta)]
#[darling(default)]
pub struct OrderColumnAttr {
    /// Column name.
    pub name:     Option<String>,
    /// Nullability (default `true`).
    pub nullable: Option<bool>
}

/// `#[collection_id(column(..), generator = "..")]`.
#[derive(Debug, Clone, Default, FromMeta)]
#[darling(default)]
pub struct CollectionIdAttr {
    /// Identifier column.
    pub column:    Option<ColumnAttr>,
    /// Generator name or legacy strategy.
    pub generator: Option<String>
}

/// `#[any(optional, fetch)]`.
#[derive(Debug, Clone, Default, FromMeta)]
#[darling(default)]
pub struct AnyAttr {
    /// Optionality (default `true`).
    pub optional: Option<bool>,
    /// Fetch mode.
    pub fetch:    Option<String>
}

/// `#[any_discriminator_value(discriminator, entity)]`.
#[derive(Debug, Clone, Default, FromMeta)]
#[darling(default)]
pub struct AnyDiscriminatorValueAttr {
    /// Stored discriminator value.
    pub discriminator: String,
    /// Entity it selects.
    pub entity:        String
}

/// Implicit `any` discriminator value strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImplicitValueStrategy {
    /// Full entity name.
    FullName,

    /// Short entity name.
    ShortName,

    /// Custom implementation.
    #[default]
    Custom
}

impl FromMeta for ImplicitValueStrategy {
    fn from_string(value: &str) -> darling::Result<Self> {
        match value.to_lowercase().as_str() {
            "full_name" => Ok(Self::FullName),
            "short_name" => Ok(Self::ShortName),
            "custom" => Ok(Self::Custom),
            _ => Err(darling::Error::unknown_value(value))
        }
    }
}

/// `#[any_discriminator_implicit_values(strategy, implementation)]`.
#[derive(Debug, Clone, Default, FromMeta)]
#[darling(default)]
pub struct AnyImplicitValuesAttr {
    /// Selector.
    pub strategy:       ImplicitValueStrategy,
    /// Implementation class for `custom`.
    pub implementation: Option<String>
}

/// `#[time_zone_column(name, insertable, updatable)]`.
#[derive(Debug, Clone, Default, FromMeta)]
#[darling(default)]
pub struct TimeZoneColumnAttr {
    /// Column name.
    pub name: Option<String>
}

/// `#[<base>_override(dialect, before_major, same_or_after_major, value)]`.
#[derive(Debug, Clone, Default, FromMeta)]
#[darling(default)]
pub struct DialectOverrideAttr {
    /// Dialect family.
    pub dialect:             String,
    /// Applies to versions strictly below this major.
    pub before_major:        Option<u16>,
    /// Applies to versions at or above this major.
    pub same_or_after_major: Option<u16>,
    /// Replacement value.
    pub value:               String
}

/// Parse a `jdbc_type_code("..")` argument.
///
/// # Errors
///
/// Unknown type code names.
pub fn parse_type_code(value: &str) -> darling::Result<SqlTypeCode> {
    SqlTypeCode::from_string(value)
}

#[cfg(test)]
mod tests {
    use syn::{Attribute, parse_quote};

    use super::*;

    fn meta(attr: Attribute) -> Meta {
        attr.meta
    }

    #[test]
    fn column_attr_partial() {
        let attr: Attribute = parse_quote!(#[column(name = "email", nullable = false, unique)]);
        let column = ColumnAttr::from_meta(&meta(attr)).unwrap();
        assert_eq!(column.name.as_deref(), Some("email"));
        assert_eq!(column.nullable, Some(false));
        assert!(column.unique);
        assert_eq!(column.updatable, None);
    }

    #[test]
    fn join_table_with_nested_columns() {
        let attr: Attribute = parse_quote!(#[join_table(
            name = "order_products",
            join_column(name = "order_id"),
            inverse_join_column(name = "product_id"),
            inverse_join_column(name = "product_version")
        )]);
        let table = JoinTableAttr::from_meta(&meta(attr)).unwrap();
        assert_eq!(table.name.as_deref(), Some("order_products"));
        assert_eq!(table.join_column.len(), 1);
        assert_eq!(table.inverse_join_column.len(), 2);
    }

    #[test]
    fn string_list_and_parameters() {
        let attr: Attribute = parse_quote!(#[unique_constraint(name = "uk_email", columns("email", "tenant"))]);
        let uc = UniqueConstraintAttr::from_meta(&meta(attr)).unwrap();
        assert_eq!(uc.columns.0, vec!["email".to_string(), "tenant".to_string()]);

        let attr: Attribute =
            parse_quote!(#[generic_generator(name = "g", strategy = "increment", parameters(step = 5, region = "eu"))]);
        let generic = GenericGeneratorAttr::from_meta(&meta(attr)).unwrap();
        assert_eq!(generic.parameters.0.get("step").map(String::as_str), Some("5"));
        assert_eq!(generic.parameters.0.get("region").map(String::as_str), Some("eu"));
    }

    #[test]
    fn string_list_rejects_non_strings() {
        let attr: Attribute = parse_quote!(#[unique_constraint(columns(1, 2))]);
        assert!(UniqueConstraintAttr::from_meta(&meta(attr)).is_err());
    }

    #[test]
    fn fetch_profile_multiple_overrides() {
        let attr: Attribute = parse_quote!(#[fetch_profile(
            name = "with-lines",
            fetch_override(entity = "Order", association = "lines", mode = "join"),
            fetch_override(entity = "Order", association = "customer", mode = "select")
        )]);
        let profile = FetchProfileAttr::from_meta(&meta(attr)).unwrap();
        assert_eq!(profile.fetch_override.len(), 2);
        assert_eq!(profile.fetch_override[1].mode, FetchMode::Select);
    }

    #[test]
    fn enum_payloads() {
        assert_eq!(GenerationType::from_string("SEQUENCE").unwrap(), GenerationType::Sequence);
        assert_eq!(
            DiscriminatorType::from_string("int").unwrap(),
            DiscriminatorType::Integer
        );
        assert!(ImplicitValueStrategy::from_string("long_name").is_err());
        assert_eq!(parse_type_code("json").unwrap(), SqlTypeCode::Json);
    }

    #[test]
    fn association_fetch() {
        let attr: Attribute = parse_quote!(#[many_to_one(fetch = "LAZY", optional = false)]);
        let association = AssociationAttr::from_meta(&meta(attr)).unwrap();
        assert!(association.is_lazy(false));
        assert_eq!(association.optional, Some(false));
    }
}
