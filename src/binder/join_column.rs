// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Join column descriptors.
//!
//! [`AnnotatedJoinColumns`] describes the foreign key columns of one
//! association property. Explicit join columns come from `join_column`
//! attributes; implicit ones only carry a nullability template, their names
//! are derived from the referenced columns once the target entity is known.

use super::{
    column::{Nullability, SharedSettings, check_shared_settings},
    context::BuildingContext
};
use crate::{
    error::Result,
    source::attrs::JoinColumnAttr
};

/// One join column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedJoinColumn {
    /// Explicit logical name.
    pub name:              Option<String>,
    /// Explicit referenced column.
    pub referenced_column: Option<String>,
    /// Nullability.
    pub nullable:          bool,
    /// Written on insert.
    pub insertable:        bool,
    /// Written on update.
    pub updatable:         bool,
    /// Unique.
    pub unique:            bool,
    /// Explicit table.
    pub explicit_table:    Option<String>
}

impl AnnotatedJoinColumn {
    /// Template for implicit join columns.
    #[must_use]
    pub fn implicit(nullable: bool) -> Self {
        Self {
            name: None,
            referenced_column: None,
            nullable,
            insertable: true,
            updatable: true,
            unique: false,
            explicit_table: None
        }
    }

    /// From a `join_column` attribute.
    #[must_use]
    pub fn from_attr(attr: &JoinColumnAttr, nullable_default: bool) -> Self {
        Self {
            name:              attr.name.clone().filter(|n| !n.is_empty()),
            referenced_column: attr.referenced_column_name.clone().filter(|n| !n.is_empty()),
            nullable:          attr.nullable.unwrap_or(nullable_default),
            insertable:        attr.insertable.unwrap_or(true),
            updatable:         attr.updatable.unwrap_or(true),
            unique:            attr.unique,
            explicit_table:    attr.table.clone()
        }
    }
}

/// The join columns of one property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedJoinColumns {
    property_path:    String,
    property_name:    String,
    columns:          Vec<AnnotatedJoinColumn>,
    template:         AnnotatedJoinColumn,
    mapped_by:        Option<String>,
    foreign_key_name: Option<String>,
    no_constraint:    bool
}

impl AnnotatedJoinColumns {
    /// Explicit join columns.
    ///
    /// # Errors
    ///
    /// Sibling columns that disagree, see
    /// [`check_property_consistency`](Self::check_property_consistency).
    pub fn explicit(
        property_path: impl Into<String>,
        attrs: &[JoinColumnAttr],
        nullable_default: bool
    ) -> Result<Self> {
        let property_path = property_path.into();
        let columns: Vec<_> = attrs
            .iter()
            .map(|attr| AnnotatedJoinColumn::from_attr(attr, nullable_default))
            .collect();
        let template = columns
            .first()
            .cloned()
            .unwrap_or_else(|| AnnotatedJoinColumn::implicit(nullable_default));
        let joins = Self {
            property_name: last_segment(&property_path).to_string(),
            property_path,
            columns,
            template,
            mapped_by: None,
            foreign_key_name: attrs.iter().find_map(|a| a.foreign_key.clone()),
            no_constraint: attrs.iter().any(|a| a.no_constraint)
        };
        joins.check_property_consistency()?;
        Ok(joins)
    }

    /// Implicit join columns derived from the referenced key later.
    #[must_use]
    pub fn implicit(property_path: impl Into<String>, nullable: bool) -> Self {
        let property_path = property_path.into();
        Self {
            property_name: last_segment(&property_path).to_string(),
            property_path,
            columns: Vec::new(),
            template: AnnotatedJoinColumn::implicit(nullable),
            mapped_by: None,
            foreign_key_name: None,
            no_constraint: false
        }
    }

    /// Set the owning property on the other side.
    #[must_use]
    pub fn with_mapped_by(mut self, mapped_by: Option<String>) -> Self {
        self.mapped_by = mapped_by.filter(|m| !m.is_empty());
        self
    }

    /// Dotted path of the property.
    #[must_use]
    pub fn property_path(&self) -> &str {
        &self.property_path
    }

    /// Name of the property (last path segment).
    #[must_use]
    pub fn property_name(&self) -> &str {
        &self.property_name
    }

    /// Explicit columns.
    #[must_use]
    pub fn columns(&self) -> &[AnnotatedJoinColumn] {
        &self.columns
    }

    /// Whether no column was declared.
    #[must_use]
    pub fn is_implicit(&self) -> bool {
        self.columns.is_empty()
    }

    /// Owning property on the other side.
    #[must_use]
    pub fn mapped_by(&self) -> Option<&str> {
        self.mapped_by.as_deref()
    }

    /// Explicit foreign key name.
    #[must_use]
    pub fn foreign_key_name(&self) -> Option<&str> {
        self.foreign_key_name.as_deref()
    }

    /// Skip the foreign key constraint.
    #[must_use]
    pub fn no_constraint(&self) -> bool {
        self.no_constraint
    }

    /// Whether any column names its referenced column.
    #[must_use]
    pub fn references_columns(&self) -> bool {
        self.columns.iter().any(|c| c.referenced_column.is_some())
    }

    /// Whether every column has an explicit name and none names a referenced column.
    #[must_use]
    pub fn is_fully_named(&self) -> bool {
        !self.columns.is_empty()
            && self
                .columns
                .iter()
                .all(|c| c.name.is_some() && c.referenced_column.is_none())
    }

    /// Column spec at `index`, falling back to the template.
    #[must_use]
    pub fn column_at(&self, index: usize) -> &AnnotatedJoinColumn {
        self.columns.get(index).unwrap_or(&self.template)
    }

    /// Whether the columns are nullable.
    #[must_use]
    pub fn nullable(&self) -> bool {
        self.column_at(0).nullable
    }

    /// Whether the columns are unique.
    #[must_use]
    pub fn unique(&self) -> bool {
        self.column_at(0).unique
    }

    /// Force or relax nullability.
    pub fn apply_nullability(&mut self, nullability: Nullability) {
        let forced = match nullability {
            Nullability::ForcedNull => true,
            Nullability::ForcedNotNull => false,
            Nullability::NoConstraint => return
        };
        self.template.nullable = forced;
        for column in &mut self.columns {
            column.nullable = forced;
        }
    }

    /// Explicit column matching a referenced column name.
    #[must_use]
    pub fn column_for_referenced(&self, referenced: &str) -> Option<&AnnotatedJoinColumn> {
        self.columns.iter().find(|c| {
            c.referenced_column
                .as_deref()
                .is_some_and(|r| r.eq_ignore_ascii_case(referenced))
        })
    }

    /// Physical name of the column joining to `referenced_column` at `index`.
    #[must_use]
    pub fn physical_name(
        &self,
        index: usize,
        referenced_column: &str,
        context: &BuildingContext<'_>
    ) -> String {
        let explicit = self
            .column_for_referenced(referenced_column)
            .or_else(|| self.columns.get(index))
            .and_then(|c| c.name.as_deref());
        match explicit {
            Some(name) => context.column_name(name),
            None => context.column_name(
                &context
                    .implicit_naming
                    .join_column_name(&self.property_name, referenced_column)
            )
        }
    }

    /// Verify that sibling columns agree on nullability, insertability,
    /// updatability and explicit table.
    ///
    /// # Errors
    ///
    /// [`BindError::InconsistentColumns`](crate::error::BindError::InconsistentColumns)
    /// naming the differing setting.
    pub fn check_property_consistency(&self) -> Result<()> {
        check_shared_settings(
            &self.property_path,
            "join columns",
            self.columns.iter().map(|c| SharedSettings {
                nullable:   c.nullable,
                insertable: c.insertable,
                updatable:  c.updatable,
                table:      c.explicit_table.as_deref()
            })
        )
    }
}

fn last_segment(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn attr(name: &str, nullable: Option<bool>) -> JoinColumnAttr {
        JoinColumnAttr {
            name: Some(name.to_string()),
            nullable,
            ..JoinColumnAttr::default()
        }
    }

    #[test]
    fn explicit_columns_must_agree() {
        let err = AnnotatedJoinColumns::explicit(
            "Order.customer",
            &[attr("a", Some(false)), attr("b", Some(true))],
            true
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StructuralInconsistency);
    }

    #[test]
    fn implicit_template() {
        let mut joins = AnnotatedJoinColumns::implicit("Order.customer", true);
        assert!(joins.is_implicit());
        assert!(joins.nullable());
        joins.apply_nullability(Nullability::ForcedNotNull);
        assert!(!joins.column_at(3).nullable);
        assert_eq!(joins.property_name(), "customer");
    }

    #[test]
    fn referenced_column_lookup() {
        let joins = AnnotatedJoinColumns::explicit(
            "Order.customer",
            &[JoinColumnAttr {
                name: Some("cust_code".into()),
                referenced_column_name: Some("code".into()),
                ..JoinColumnAttr::default()
            }],
            true
        )
        .unwrap();
        assert!(joins.references_columns());
        assert!(!joins.is_fully_named());
        assert!(joins.column_for_referenced("CODE").is_some());
    }

    #[test]
    fn mapped_by_ignores_blank() {
        let joins = AnnotatedJoinColumns::implicit("Order.lines", true).with_mapped_by(Some(String::new()));
        assert_eq!(joins.mapped_by(), None);
    }
}
