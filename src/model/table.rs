// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Tables, columns and table-scoped constraints.
//!
//! Tables are owned by the [`Database`] namespace and referenced everywhere
//! else through [`TableId`]. Every mutator here tolerates repeat
//! contributions: adding a column, unique key or foreign key that is already
//! present never duplicates it, because second passes touching the same table
//! run in no particular order.
//!
//! | Collection | Idempotent by |
//! |------------|---------------|
//! | columns | physical column name |
//! | unique keys | column set (and name) |
//! | foreign keys | column list |
//! | checks | constraint text |

use std::collections::BTreeMap;

use crate::dialect::SqlTypeCode;

/// Index of a table inside [`Database`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(pub(crate) usize);

/// A physical column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Physical name.
    pub name: String,

    /// Abstract type code, when known.
    pub sql_type_code: Option<SqlTypeCode>,

    /// Explicit column definition (`column_definition`).
    pub sql_type: Option<String>,

    /// Whether the column accepts `NULL`.
    pub nullable: bool,

    /// Single-column uniqueness.
    pub unique: bool,

    /// Length for character and binary types.
    pub length: Option<u32>,

    /// Numeric precision.
    pub precision: Option<u32>,

    /// Numeric scale.
    pub scale: Option<u32>,

    /// Default value expression.
    pub default_value: Option<String>,

    /// Column-level check expression.
    pub check: Option<String>,

    /// Database identity column.
    pub identity: bool
}

impl Column {
    /// Create a nullable column with no type information.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name:          name.into(),
            sql_type_code: None,
            sql_type:      None,
            nullable:      true,
            unique:        false,
            length:        None,
            precision:     None,
            scale:         None,
            default_value: None,
            check:         None,
            identity:      false
        }
    }

    /// Copy the type information of `other` into a column named `name`.
    ///
    /// Used for foreign key columns, which take their type from the column
    /// they reference.
    #[must_use]
    pub fn typed_like(name: impl Into<String>, other: &Self) -> Self {
        Self {
            sql_type_code: other.sql_type_code,
            sql_type: other.sql_type.clone(),
            length: other.length,
            precision: other.precision,
            scale: other.scale,
            ..Self::new(name)
        }
    }
}

/// Primary key of a table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PrimaryKey {
    /// Constraint name, if explicit.
    pub name: Option<String>,

    /// Column names in key order.
    pub columns: Vec<String>
}

/// A unique key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueKey {
    /// Constraint name.
    pub name: String,

    /// Column names.
    pub columns: Vec<String>,

    /// Whether this key backs a natural id.
    pub natural_id: bool
}

impl UniqueKey {
    /// Whether this key covers exactly `columns`, in any order.
    #[must_use]
    pub fn covers(&self, columns: &[String]) -> bool {
        self.columns.len() == columns.len() && columns.iter().all(|c| self.columns.contains(c))
    }
}

/// A foreign key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    /// Constraint name.
    pub name: String,

    /// Referencing columns on the owning table.
    pub columns: Vec<String>,

    /// Referenced table.
    pub referenced_table: TableId,

    /// Referenced entity, when the key points at an entity table.
    pub referenced_entity: Option<String>,

    /// Referenced columns, aligned with `columns`.
    pub referenced_columns: Vec<String>,

    /// Whether the constraint should not be exported.
    pub no_constraint: bool
}

/// A table-level check constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckConstraint {
    /// Constraint name, if explicit.
    pub name: Option<String>,

    /// Boolean SQL expression.
    pub expression: String
}

/// A mapped table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    /// Physical table name.
    pub name: String,

    /// Logical name before physical naming was applied.
    pub logical_name: String,

    /// Schema.
    pub schema: Option<String>,

    /// Catalog.
    pub catalog: Option<String>,

    /// Subselect text for entities mapped to a query.
    pub subselect: Option<String>,

    /// Whether this table only exists as a union of subclass tables.
    pub abstract_union: bool,

    /// Primary key, once known.
    pub primary_key: Option<PrimaryKey>,

    columns:             Vec<Column>,
    logical_to_physical: BTreeMap<String, String>,
    unique_keys:         Vec<UniqueKey>,
    foreign_keys:        Vec<ForeignKey>,
    checks:              Vec<CheckConstraint>
}

impl Table {
    /// Create an empty table.
    pub fn new(name: impl Into<String>, logical_name: impl Into<String>) -> Self {
        Self {
            name:                name.into(),
            logical_name:        logical_name.into(),
            schema:              None,
            catalog:             None,
            subselect:           None,
            abstract_union:      false,
            primary_key:         None,
            columns:             Vec::new(),
            logical_to_physical: BTreeMap::new(),
            unique_keys:         Vec::new(),
            foreign_keys:        Vec::new(),
            checks:              Vec::new()
        }
    }

    /// Qualified name, `catalog.schema.name` with absent parts omitted.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        [self.catalog.as_deref(), self.schema.as_deref(), Some(self.name.as_str())]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Whether this table is backed by a subselect.
    #[must_use]
    pub fn is_subselect(&self) -> bool {
        self.subselect.is_some()
    }

    /// All columns in insertion order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Look up a column by physical name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Mutable lookup by physical name.
    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// Add a column unless one with the same physical name exists.
    ///
    /// Returns `true` when the column was added.
    pub fn add_column(&mut self, column: Column) -> bool {
        if self.column(&column.name).is_some() {
            return false;
        }
        self.columns.push(column);
        true
    }

    /// Remember which physical column a logical name resolved to.
    pub fn bind_logical_name(&mut self, logical: impl Into<String>, physical: impl Into<String>) {
        self.logical_to_physical.insert(logical.into(), physical.into());
    }

    /// Resolve a logical or physical column name.
    #[must_use]
    pub fn physical_column_name(&self, logical: &str) -> Option<&str> {
        if let Some(physical) = self.logical_to_physical.get(logical) {
            return Some(physical);
        }
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(logical))
            .map(|c| c.name.as_str())
    }

    /// Unique keys.
    #[must_use]
    pub fn unique_keys(&self) -> &[UniqueKey] {
        &self.unique_keys
    }

    /// Add a unique key.
    ///
    /// A key with the same column set is reused; a key with the same name
    /// gains any missing columns. Returns the name of the key that now holds
    /// the columns.
    pub fn add_unique_key(&mut self, name: String, columns: Vec<String>, natural_id: bool) -> String {
        if let Some(existing) = self.unique_keys.iter_mut().find(|uk| uk.covers(&columns)) {
            existing.natural_id |= natural_id;
            return existing.name.clone();
        }
        if let Some(existing) = self.unique_keys.iter_mut().find(|uk| uk.name == name) {
            for column in columns {
                if !existing.columns.contains(&column) {
                    existing.columns.push(column);
                }
            }
            existing.natural_id |= natural_id;
            return existing.name.clone();
        }
        self.unique_keys.push(UniqueKey {
            name: name.clone(),
            columns,
            natural_id
        });
        name
    }

    /// Foreign keys.
    #[must_use]
    pub fn foreign_keys(&self) -> &[ForeignKey] {
        &self.foreign_keys
    }

    /// Add a foreign key unless one over the same column list exists.
    ///
    /// Returns `true` when the key was added.
    pub fn add_foreign_key(&mut self, foreign_key: ForeignKey) -> bool {
        if self.foreign_keys.iter().any(|fk| fk.columns == foreign_key.columns) {
            return false;
        }
        self.foreign_keys.push(foreign_key);
        true
    }

    /// Check constraints.
    #[must_use]
    pub fn checks(&self) -> &[CheckConstraint] {
        &self.checks
    }

    /// Add a check constraint unless the same expression is present.
    pub fn add_check(&mut self, check: CheckConstraint) {
        if !self.checks.iter().any(|c| c.expression == check.expression) {
            self.checks.push(check);
        }
    }
}

/// A database-level user-defined (structured) type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDefinedType {
    /// Type name.
    pub name: String,

    /// Schema.
    pub schema: Option<String>,

    /// Catalog.
    pub catalog: Option<String>,

    /// Attribute columns in declaration order.
    pub columns: Vec<Column>
}

/// An auxiliary database object contributed by a custom class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuxiliaryObject {
    /// Class that produces the object.
    pub class_name: String,

    /// Dialect families the object is restricted to; empty means all.
    pub dialect_scopes: Vec<String>
}

/// The database namespace: every table, type and auxiliary object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Database {
    tables:             Vec<Table>,
    user_defined_types: Vec<UserDefinedType>,
    auxiliary_objects:  Vec<AuxiliaryObject>
}

impl Database {
    /// Add a table, or return the existing one with the same qualified name.
    pub fn add_table(&mut self, table: Table) -> TableId {
        let qualified = table.qualified_name();
        if let Some(index) = self
            .tables
            .iter()
            .position(|t| t.qualified_name() == qualified)
        {
            return TableId(index);
        }
        self.tables.push(table);
        TableId(self.tables.len() - 1)
    }

    /// All tables.
    #[must_use]
    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    /// Table by id.
    #[must_use]
    pub fn table(&self, id: TableId) -> &Table {
        &self.tables[id.0]
    }

    /// Mutable table by id.
    pub fn table_mut(&mut self, id: TableId) -> &mut Table {
        &mut self.tables[id.0]
    }

    /// Find a table by physical or qualified name.
    #[must_use]
    pub fn find_table(&self, name: &str) -> Option<TableId> {
        self.tables
            .iter()
            .position(|t| t.name == name || t.qualified_name() == name)
            .map(TableId)
    }

    /// Registered user-defined types.
    #[must_use]
    pub fn user_defined_types(&self) -> &[UserDefinedType] {
        &self.user_defined_types
    }

    /// Find a user-defined type by name.
    #[must_use]
    pub fn user_defined_type(&self, name: &str) -> Option<&UserDefinedType> {
        self.user_defined_types.iter().find(|t| t.name == name)
    }

    /// Register a user-defined type. Returns `false` when the name is taken.
    pub fn add_user_defined_type(&mut self, udt: UserDefinedType) -> bool {
        if self.user_defined_type(&udt.name).is_some() {
            return false;
        }
        self.user_defined_types.push(udt);
        true
    }

    /// Auxiliary objects.
    #[must_use]
    pub fn auxiliary_objects(&self) -> &[AuxiliaryObject] {
        &self.auxiliary_objects
    }

    /// Register an auxiliary object.
    pub fn add_auxiliary_object(&mut self, object: AuxiliaryObject) {
        if !self.auxiliary_objects.contains(&object) {
            self.auxiliary_objects.push(object);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| (*n).to_string()).collect()
    }

    #[test]
    fn add_column_is_idempotent() {
        let mut table = Table::new("orders", "orders");
        assert!(table.add_column(Column::new("id")));
        assert!(!table.add_column(Column::new("id")));
        assert_eq!(table.columns().len(), 1);
    }

    #[test]
    fn unique_key_reused_by_column_set() {
        let mut table = Table::new("users", "users");
        let first = table.add_unique_key("UK_a".into(), cols(&["email", "tenant"]), false);
        let second = table.add_unique_key("UK_b".into(), cols(&["tenant", "email"]), true);
        assert_eq!(first, second);
        assert_eq!(table.unique_keys().len(), 1);
        assert!(table.unique_keys()[0].natural_id);
    }

    #[test]
    fn unique_key_with_same_name_gains_columns_once() {
        let mut table = Table::new("users", "users");
        table.add_unique_key("UK_x".into(), cols(&["a"]), false);
        table.add_unique_key("UK_x".into(), cols(&["a", "b"]), false);
        table.add_unique_key("UK_x".into(), cols(&["b"]), false);
        assert_eq!(table.unique_keys().len(), 1);
        assert_eq!(table.unique_keys()[0].columns, cols(&["a", "b"]));
    }

    #[test]
    fn foreign_key_idempotent_by_columns() {
        let mut table = Table::new("orders", "orders");
        let fk = ForeignKey {
            name:               "FK1".into(),
            columns:            cols(&["customer_id"]),
            referenced_table:   TableId(0),
            referenced_entity:  None,
            referenced_columns: cols(&["id"]),
            no_constraint:      false
        };
        assert!(table.add_foreign_key(fk.clone()));
        assert!(!table.add_foreign_key(ForeignKey {
            name: "FK2".into(),
            ..fk
        }));
        assert_eq!(table.foreign_keys().len(), 1);
    }

    #[test]
    fn qualified_names_and_lookup() {
        let mut db = Database::default();
        let mut table = Table::new("orders", "Order");
        table.schema = Some("sales".into());
        let id = db.add_table(table.clone());
        assert_eq!(db.add_table(table), id);
        assert_eq!(db.table(id).qualified_name(), "sales.orders");
        assert_eq!(db.find_table("sales.orders"), Some(id));
    }

    #[test]
    fn logical_names_resolve() {
        let mut table = Table::new("users", "users");
        table.add_column(Column::new("email_address"));
        table.bind_logical_name("emailAddress", "email_address");
        assert_eq!(table.physical_column_name("emailAddress"), Some("email_address"));
        assert_eq!(table.physical_column_name("EMAIL_ADDRESS"), Some("email_address"));
        assert_eq!(table.physical_column_name("missing"), None);
    }
}
