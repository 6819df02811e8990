// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Column descriptors and the column set builder.
//!
//! [`ColumnsBuilder`] reads a member's `column`, `columns`, `formula` and
//! `join_column` attributes and produces a [`ColumnSet`]: either plain
//! columns ([`AnnotatedColumns`]) or join columns
//! ([`AnnotatedJoinColumns`]), never both.
//!
//! | Member carries | Result |
//! |----------------|--------|
//! | nothing | one implicit column named after the property |
//! | `column(..)` / `columns(..)` | explicit columns |
//! | `formula("..")` | one formula |
//! | `join_column(..)` | explicit join columns |
//! | `many_to_one` / `one_to_one` | implicit join columns, named in a second pass |
//! | `one_to_many` / `element_collection` / `many_to_many` | join columns left to the collection |
//! | `any` | join columns; `columns` is rejected |
//!
//! Sibling columns must agree on nullability, insertability, updatability and
//! table. The check runs as soon as the set is built.

use super::{context::BuildingContext, join_column::AnnotatedJoinColumns};
use crate::{
    dialect::SqlTypeCode,
    error::{BindError, Result},
    model::{Column, MetadataCollector, Selectable, TableId},
    source::{
        AnnotationTarget, MemberDetails,
        attrs::{AssociationAttr, ColumnAttr, ColumnsAttr, JoinColumnAttr}
    }
};

/// Nullability policy imposed by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Nullability {
    /// Every column is nullable (single-table subclass attributes).
    ForcedNull,

    /// Every column is not null (identifiers, collection keys).
    ForcedNotNull,

    /// Columns keep their own setting.
    #[default]
    NoConstraint
}

/// One column or formula.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedColumn {
    /// Explicit logical name.
    pub logical_name:      Option<String>,
    /// Formula text.
    pub formula:           Option<String>,
    /// Nullability.
    pub nullable:          bool,
    /// Written on insert.
    pub insertable:        bool,
    /// Written on update.
    pub updatable:         bool,
    /// Single-column uniqueness.
    pub unique:            bool,
    /// Explicit table.
    pub explicit_table:    Option<String>,
    /// Length.
    pub length:            Option<u32>,
    /// Precision.
    pub precision:         Option<u32>,
    /// Scale.
    pub scale:             Option<u32>,
    /// Column definition.
    pub column_definition: Option<String>,
    /// Default value.
    pub default_value:     Option<String>,
    /// Check constraint.
    pub check:             Option<String>
}

impl AnnotatedColumn {
    /// A column whose name is derived from the property.
    #[must_use]
    pub fn implicit(nullable: bool) -> Self {
        Self {
            logical_name: None,
            formula: None,
            nullable,
            insertable: true,
            updatable: true,
            unique: false,
            explicit_table: None,
            length: None,
            precision: None,
            scale: None,
            column_definition: None,
            default_value: None,
            check: None
        }
    }

    /// A column with an explicit name.
    #[must_use]
    pub fn named(name: impl Into<String>, nullable: bool) -> Self {
        Self {
            logical_name: Some(name.into()),
            ..Self::implicit(nullable)
        }
    }

    /// A formula.
    #[must_use]
    pub fn formula(text: impl Into<String>) -> Self {
        Self {
            formula: Some(text.into()),
            insertable: false,
            updatable: false,
            ..Self::implicit(true)
        }
    }

    /// From a `column` attribute.
    #[must_use]
    pub fn from_attr(attr: &ColumnAttr, nullable_default: bool) -> Self {
        Self {
            logical_name:      attr.name.clone().filter(|n| !n.is_empty()),
            formula:           None,
            nullable:          attr.nullable.unwrap_or(nullable_default),
            insertable:        attr.insertable.unwrap_or(true),
            updatable:         attr.updatable.unwrap_or(true),
            unique:            attr.unique,
            explicit_table:    attr.table.clone(),
            length:            attr.length,
            precision:         attr.precision,
            scale:             attr.scale,
            column_definition: attr.column_definition.clone(),
            default_value:     None,
            check:             None
        }
    }

    /// Whether this is a formula.
    #[must_use]
    pub fn is_formula(&self) -> bool {
        self.formula.is_some()
    }

    /// Whether the name is still to be derived.
    #[must_use]
    pub fn is_implicit(&self) -> bool {
        self.logical_name.is_none() && self.formula.is_none()
    }

    /// Physical column described by this descriptor.
    #[must_use]
    pub fn to_column(&self, physical_name: impl Into<String>, type_code: Option<SqlTypeCode>) -> Column {
        Column {
            sql_type_code: type_code,
            sql_type: self.column_definition.clone(),
            nullable: self.nullable,
            unique: self.unique,
            length: self.length,
            precision: self.precision,
            scale: self.scale,
            default_value: self.default_value.clone(),
            check: self.check.clone(),
            ..Column::new(physical_name)
        }
    }
}

/// The columns of one property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedColumns {
    property_path: String,
    columns:       Vec<AnnotatedColumn>
}

impl AnnotatedColumns {
    /// Group columns under a property.
    ///
    /// # Errors
    ///
    /// See [`check_property_consistency`](Self::check_property_consistency).
    pub fn new(property_path: impl Into<String>, columns: Vec<AnnotatedColumn>) -> Result<Self> {
        let columns = Self {
            property_path: property_path.into(),
            columns
        };
        columns.check_property_consistency()?;
        Ok(columns)
    }

    /// Dotted path of the property.
    #[must_use]
    pub fn property_path(&self) -> &str {
        &self.property_path
    }

    /// Descriptors in declaration order.
    #[must_use]
    pub fn columns(&self) -> &[AnnotatedColumn] {
        &self.columns
    }

    /// Explicit table shared by the columns.
    #[must_use]
    pub fn explicit_table_name(&self) -> Option<&str> {
        self.columns.iter().find_map(|c| c.explicit_table.as_deref())
    }

    /// Whether every physical column is nullable.
    #[must_use]
    pub fn nullable(&self) -> bool {
        self.physical().all(|c| c.nullable)
    }

    /// Whether the property is written on insert.
    #[must_use]
    pub fn insertable(&self) -> bool {
        self.physical().all(|c| c.insertable) && self.physical().next().is_some()
    }

    /// Whether the property is written on update.
    #[must_use]
    pub fn updatable(&self) -> bool {
        self.physical().all(|c| c.updatable) && self.physical().next().is_some()
    }

    fn physical(&self) -> impl Iterator<Item = &AnnotatedColumn> {
        self.columns.iter().filter(|c| !c.is_formula())
    }

    /// Force or relax nullability.
    pub fn apply_nullability(&mut self, nullability: Nullability) {
        let forced = match nullability {
            Nullability::ForcedNull => true,
            Nullability::ForcedNotNull => false,
            Nullability::NoConstraint => return
        };
        for column in self.columns.iter_mut().filter(|c| !c.is_formula()) {
            column.nullable = forced;
        }
    }

    /// Set the default value of every physical column.
    pub fn apply_default_value(&mut self, value: Option<String>) {
        if value.is_none() {
            return;
        }
        for column in self.columns.iter_mut().filter(|c| !c.is_formula()) {
            column.default_value.clone_from(&value);
        }
    }

    /// Set the check constraint of every physical column.
    pub fn apply_check(&mut self, check: Option<String>) {
        if check.is_none() {
            return;
        }
        for column in self.columns.iter_mut().filter(|c| !c.is_formula()) {
            column.check.clone_from(&check);
        }
    }

    /// Verify that sibling columns agree on nullability, insertability,
    /// updatability and explicit table. Formulas are ignored.
    ///
    /// # Errors
    ///
    /// [`BindError::InconsistentColumns`] naming the differing setting.
    pub fn check_property_consistency(&self) -> Result<()> {
        check_shared_settings(
            &self.property_path,
            "columns",
            self.physical().map(|c| SharedSettings {
                nullable:   c.nullable,
                insertable: c.insertable,
                updatable:  c.updatable,
                table:      c.explicit_table.as_deref()
            })
        )
    }

    /// Create the physical columns on `table` and return the selectables.
    ///
    /// Implicit columns are named from `implicit_name`; every column is
    /// registered under its logical name.
    pub fn bind(
        &self,
        table: TableId,
        implicit_name: &str,
        type_code: Option<SqlTypeCode>,
        metadata: &mut MetadataCollector,
        context: &BuildingContext<'_>
    ) -> Vec<Selectable> {
        let mut selectables = Vec::with_capacity(self.columns.len());
        let mut unique = Vec::new();
        for column in &self.columns {
            if let Some(formula) = &column.formula {
                selectables.push(Selectable::Formula(formula.clone()));
                continue;
            }
            let logical = column
                .logical_name
                .clone()
                .unwrap_or_else(|| implicit_name.to_string());
            let physical = context.column_name(&logical);
            let target = metadata.table_mut(table);
            target.add_column(column.to_column(physical.clone(), type_code));
            target.bind_logical_name(logical, physical.clone());
            if column.unique {
                unique.push(physical.clone());
            }
            selectables.push(Selectable::Column(physical));
        }
        for column in unique {
            let target = metadata.table_mut(table);
            let name = context
                .implicit_naming
                .unique_key_name(&target.name, std::slice::from_ref(&column));
            target.add_unique_key(name, vec![column], false);
        }
        selectables
    }
}

/// Columns of a property: plain or join columns, never mixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSet {
    /// Plain columns and formulas.
    Columns(AnnotatedColumns),

    /// Foreign key columns.
    JoinColumns(AnnotatedJoinColumns)
}

/// Builds the [`ColumnSet`] of one member.
#[derive(Debug)]
pub struct ColumnsBuilder<'m, 'c> {
    member:        &'m MemberDetails,
    context:       &'c BuildingContext<'c>,
    property_path: String,
    nullability:   Nullability
}

const TO_ONE: [&str; 2] = ["many_to_one", "one_to_one"];
const PLURAL: [&str; 3] = ["one_to_many", "many_to_many", "element_collection"];

impl<'m, 'c> ColumnsBuilder<'m, 'c> {
    /// Start a builder for `member`, bound under `property_path`.
    #[must_use]
    pub fn new(
        member: &'m MemberDetails,
        context: &'c BuildingContext<'c>,
        property_path: impl Into<String>
    ) -> Self {
        Self {
            member,
            context,
            property_path: property_path.into(),
            nullability: Nullability::NoConstraint
        }
    }

    /// Impose a nullability policy.
    #[must_use]
    pub fn nullability(mut self, nullability: Nullability) -> Self {
        self.nullability = nullability;
        self
    }

    /// Default nullability of the member's columns.
    fn nullable_default(&self) -> bool {
        let field = self.member.field_type();
        if field.is_optional() {
            return true;
        }
        !field.is_primitive()
    }

    /// Build the column set.
    ///
    /// # Errors
    ///
    /// Malformed combinations (`any` with `columns`, `any` without join
    /// columns, columns mixed with join columns) and inconsistent siblings.
    pub fn build(self) -> Result<ColumnSet> {
        let member = self.member;
        let join_columns: Vec<JoinColumnAttr> = member.parse_repeated("join_column")?;
        let has_columns = member.has("column") || member.has("columns") || member.has("formula");

        if member.has("any") {
            if member.has("columns") {
                return Err(BindError::annotation(
                    member.location(),
                    "'any' may not use 'columns'"
                ));
            }
            if join_columns.is_empty() {
                return Err(BindError::annotation(
                    member.location(),
                    "'any' requires at least one 'join_column'"
                ));
            }
            let mut joins = AnnotatedJoinColumns::explicit(&self.property_path, &join_columns, true)?;
            joins.apply_nullability(self.nullability);
            return Ok(ColumnSet::JoinColumns(joins));
        }

        if !join_columns.is_empty() {
            if has_columns {
                return Err(BindError::annotation(
                    member.location(),
                    "'join_column' may not be combined with 'column', 'columns' or 'formula'"
                ));
            }
            let nullable = self.association_nullable()?;
            let mut joins = AnnotatedJoinColumns::explicit(&self.property_path, &join_columns, nullable)?;
            joins.apply_nullability(self.nullability);
            return Ok(ColumnSet::JoinColumns(joins.with_mapped_by(self.mapped_by()?)));
        }

        if TO_ONE.iter().any(|a| member.has(a)) {
            let nullable = self.association_nullable()?;
            let mut joins = AnnotatedJoinColumns::implicit(&self.property_path, nullable);
            joins.apply_nullability(self.nullability);
            return Ok(ColumnSet::JoinColumns(joins.with_mapped_by(self.mapped_by()?)));
        }

        if PLURAL.iter().any(|a| member.has(a)) {
            let joins = AnnotatedJoinColumns::implicit(&self.property_path, true);
            return Ok(ColumnSet::JoinColumns(joins.with_mapped_by(self.mapped_by()?)));
        }

        self.build_columns().map(ColumnSet::Columns)
    }

    /// Build plain columns only.
    ///
    /// # Errors
    ///
    /// Inconsistent siblings and undecodable attributes.
    pub fn build_columns(self) -> Result<AnnotatedColumns> {
        let member = self.member;
        let nullable = self.nullable_default();
        let overrides = self.context.overrides;
        let dialect = self.context.dialect;

        let mut columns = if let Some(formula) = overrides.resolve_string(member, "formula", dialect)? {
            vec![AnnotatedColumn::formula(formula)]
        } else if let Some(group) = member.parse_direct::<ColumnsAttr>("columns")? {
            group
                .column
                .iter()
                .map(|attr| AnnotatedColumn::from_attr(attr, nullable))
                .collect()
        } else {
            let attrs: Vec<ColumnAttr> = member.parse_repeated("column")?;
            if attrs.is_empty() {
                vec![AnnotatedColumn::implicit(nullable)]
            } else {
                attrs
                    .iter()
                    .map(|attr| AnnotatedColumn::from_attr(attr, nullable))
                    .collect()
            }
        };
        if columns.is_empty() {
            columns.push(AnnotatedColumn::implicit(nullable));
        }

        let mut set = AnnotatedColumns::new(self.property_path, columns)?;
        set.apply_nullability(self.nullability);
        set.apply_default_value(overrides.resolve_string(member, "column_default", dialect)?);
        set.apply_check(overrides.resolve_string(member, "check", dialect)?);
        Ok(set)
    }

    fn association(&self) -> Result<Option<AssociationAttr>> {
        for name in TO_ONE.iter().chain(PLURAL.iter()) {
            if let Some(attr) = self.member.parse_direct::<AssociationAttr>(name)? {
                return Ok(Some(attr));
            }
        }
        Ok(None)
    }

    fn association_nullable(&self) -> Result<bool> {
        let optional = self
            .association()?
            .and_then(|a| a.optional)
            .unwrap_or_else(|| self.member.field_type().is_optional());
        Ok(optional)
    }

    fn mapped_by(&self) -> Result<Option<String>> {
        Ok(self.association()?.and_then(|a| a.mapped_by))
    }
}

/// Settings every column of one property must share.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SharedSettings<'a> {
    pub nullable:   bool,
    pub insertable: bool,
    pub updatable:  bool,
    pub table:      Option<&'a str>
}

impl SharedSettings<'_> {
    fn first_difference(&self, other: &Self) -> Option<&'static str> {
        if self.nullable != other.nullable {
            Some("nullable")
        } else if self.insertable != other.insertable {
            Some("insertable")
        } else if self.updatable != other.updatable {
            Some("updatable")
        } else if self.table != other.table {
            Some("table")
        } else {
            None
        }
    }
}

/// Fail on the first column whose settings differ from the first one.
///
/// `what` names the columns in the error message.
pub(crate) fn check_shared_settings<'a>(
    property_path: &str,
    what: &str,
    settings: impl IntoIterator<Item = SharedSettings<'a>>
) -> Result<()> {
    let mut settings = settings.into_iter();
    let Some(first) = settings.next() else {
        return Ok(());
    };
    for other in settings {
        if let Some(setting) = first.first_difference(&other) {
            return Err(BindError::inconsistent(
                property_path,
                format!("{what} disagree on '{setting}'")
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::{
        binder::{ClassRegistry, DialectOverrides},
        config::BindingOptions,
        dialect::DatabaseDialect,
        error::ErrorKind,
        naming::{IdentityPhysicalNaming, JpaImplicitNamingStrategy},
        source::{GeneratorTypeRegistry, SourceModel}
    };

    struct Fixture {
        options:   BindingOptions,
        overrides: DialectOverrides,
        types:     GeneratorTypeRegistry,
        classes:   ClassRegistry,
        sources:   SourceModel
    }

    impl Fixture {
        fn new(source: &str) -> Self {
            Self {
                options:   BindingOptions::default(),
                overrides: DialectOverrides::default(),
                types:     GeneratorTypeRegistry::default(),
                classes:   ClassRegistry::default(),
                sources:   SourceModel::from_str(source).unwrap()
            }
        }

        fn context(&self) -> BuildingContext<'_> {
            BuildingContext {
                options:         &self.options,
                dialect:         &DatabaseDialect::Postgres,
                implicit_naming: &JpaImplicitNamingStrategy,
                physical_naming: &IdentityPhysicalNaming,
                overrides:       &self.overrides,
                generator_types: &self.types,
                classes:         &self.classes,
                sources:         &self.sources
            }
        }

        fn build(&self, member: &str) -> Result<ColumnSet> {
            let context = self.context();
            let member = self.sources.class("Item").unwrap().member(member).unwrap();
            ColumnsBuilder::new(member, &context, format!("Item.{}", member.name())).build()
        }
    }

    const SOURCE: &str = r#"
        #[entity]
        struct Item {
            plain: String,
            count: i32,
            maybe: Option<i32>,
            #[column(name = "a", updatable = false)]
            #[column(name = "b")]
            split: String,
            #[columns(column(name = "lo", nullable = false), column(name = "hi", nullable = false))]
            range: Range,
            #[formula("price * quantity")]
            total: i64,
            #[many_to_one]
            owner: Owner,
            #[many_to_one(optional = false)]
            #[join_column(name = "parent_code", referenced_column_name = "code")]
            parent: Parent,
            #[any]
            #[columns(column(name = "t"))]
            #[join_column(name = "target_id")]
            bad_any: Target,
            #[any]
            #[column(name = "target_type")]
            empty_any: Target,
            #[many_to_one]
            #[column(name = "x")]
            #[join_column(name = "y")]
            mixed: Owner,
            #[column_default("0")]
            #[check("stock >= 0")]
            stock: i32
        }
    "#;

    #[test]
    fn implicit_column_nullability_follows_type() {
        let fixture = Fixture::new(SOURCE);
        let ColumnSet::Columns(plain) = fixture.build("plain").unwrap() else {
            panic!("expected columns");
        };
        assert!(plain.columns()[0].is_implicit());
        assert!(plain.nullable());

        let ColumnSet::Columns(count) = fixture.build("count").unwrap() else {
            panic!("expected columns");
        };
        assert!(!count.nullable());

        let ColumnSet::Columns(maybe) = fixture.build("maybe").unwrap() else {
            panic!("expected columns");
        };
        assert!(maybe.nullable());
    }

    #[test]
    fn columns_differing_in_updatable_are_rejected() {
        let fixture = Fixture::new(SOURCE);
        let err = fixture.build("split").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StructuralInconsistency);
    }

    #[test]
    fn grouped_columns_and_formula() {
        let fixture = Fixture::new(SOURCE);
        let ColumnSet::Columns(range) = fixture.build("range").unwrap() else {
            panic!("expected columns");
        };
        assert_eq!(range.columns().len(), 2);
        assert!(!range.nullable());

        let ColumnSet::Columns(total) = fixture.build("total").unwrap() else {
            panic!("expected columns");
        };
        assert!(total.columns()[0].is_formula());
        assert!(!total.insertable());
    }

    #[test]
    fn associations_produce_join_columns() {
        let fixture = Fixture::new(SOURCE);
        let ColumnSet::JoinColumns(owner) = fixture.build("owner").unwrap() else {
            panic!("expected join columns");
        };
        assert!(owner.is_implicit());
        assert!(!owner.nullable());

        let ColumnSet::JoinColumns(parent) = fixture.build("parent").unwrap() else {
            panic!("expected join columns");
        };
        assert!(parent.references_columns());
        assert!(!parent.nullable());
    }

    #[test]
    fn any_rules_are_eager() {
        let fixture = Fixture::new(SOURCE);
        let err = fixture.build("bad_any").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedAnnotation);
        assert!(err.to_string().contains("'any' may not use 'columns'"));

        let err = fixture.build("empty_any").unwrap_err();
        assert!(err.to_string().contains("requires at least one 'join_column'"));
    }

    #[test]
    fn columns_never_mix_with_join_columns() {
        let fixture = Fixture::new(SOURCE);
        let err = fixture.build("mixed").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedAnnotation);
    }

    #[test]
    fn defaults_and_checks_are_applied() {
        let fixture = Fixture::new(SOURCE);
        let ColumnSet::Columns(stock) = fixture.build("stock").unwrap() else {
            panic!("expected columns");
        };
        assert_eq!(stock.columns()[0].default_value.as_deref(), Some("0"));
        assert_eq!(stock.columns()[0].check.as_deref(), Some("stock >= 0"));
    }

    #[test]
    fn forced_nullability() {
        let mut set = AnnotatedColumns::new(
            "Item.code",
            vec![AnnotatedColumn::named("a", false), AnnotatedColumn::named("b", false)]
        )
        .unwrap();
        set.apply_nullability(Nullability::ForcedNull);
        assert!(set.nullable());
    }

    #[test]
    fn shared_settings_report_the_first_difference() {
        let base = SharedSettings {
            nullable:   true,
            insertable: true,
            updatable:  true,
            table:      None
        };
        let moved = SharedSettings {
            table: Some("audit"),
            ..base
        };
        assert!(check_shared_settings("Item.range", "columns", [base, base]).is_ok());
        assert!(check_shared_settings("Item.range", "columns", Vec::<SharedSettings<'_>>::new()).is_ok());

        let err = check_shared_settings("Item.range", "join columns", [base, moved]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StructuralInconsistency);
        assert!(err.to_string().contains("join columns disagree on 'table'"));
    }
}
