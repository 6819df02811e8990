// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Naming strategies.
//!
//! Names go through two steps. The [`ImplicitNamingStrategy`] decides the
//! *logical* name of anything the attributes leave unnamed; the
//! [`PhysicalNamingStrategy`] then turns every logical name, explicit or
//! implicit, into the identifier stored in the model.
//!
//! # JPA defaults ([`JpaImplicitNamingStrategy`])
//!
//! | Object | Logical name |
//! |--------|--------------|
//! | entity table | JPA entity name |
//! | basic column | attribute name |
//! | join column | `<attribute>_<referenced column>` |
//! | join table | `<owner table>_<target table>` |
//! | collection table | `<owner entity>_<attribute>` |
//! | collection key column | `<owner entity>_<referenced column>` |
//! | discriminator column | `DTYPE` |
//! | list index column | `<attribute>_ORDER` |
//! | unique key | `UK` + base-35 digest |
//! | foreign key | `FK` + base-35 digest |

use std::fmt;

use convert_case::{Case, Casing};
use sha2::{Digest, Sha256};

/// Decides logical names for unnamed objects.
pub trait ImplicitNamingStrategy: fmt::Debug {
    /// Primary table of an entity.
    fn primary_table_name(&self, jpa_entity_name: &str) -> String {
        jpa_entity_name.to_string()
    }

    /// Column of a basic attribute. `attribute_path` may be dotted for
    /// embedded attributes; only the last segment is used.
    fn basic_column_name(&self, attribute_path: &str) -> String {
        attribute_path
            .rsplit('.')
            .next()
            .unwrap_or(attribute_path)
            .to_string()
    }

    /// Join column of an association attribute.
    fn join_column_name(&self, attribute_name: &str, referenced_column: &str) -> String {
        format!("{attribute_name}_{referenced_column}")
    }

    /// Key column of a collection or join table pointing back at the owner.
    fn collection_key_column_name(&self, owner_entity: &str, referenced_column: &str) -> String {
        format!("{owner_entity}_{referenced_column}")
    }

    /// Join table of a many-to-many or unidirectional one-to-many.
    fn join_table_name(&self, owner_table: &str, target_table: &str) -> String {
        format!("{owner_table}_{target_table}")
    }

    /// Collection table of an element collection.
    fn collection_table_name(&self, owner_entity: &str, attribute_name: &str) -> String {
        format!("{owner_entity}_{attribute_name}")
    }

    /// Discriminator column.
    fn discriminator_column_name(&self) -> String {
        "DTYPE".to_string()
    }

    /// List index column.
    fn list_index_column_name(&self, attribute_name: &str) -> String {
        format!("{attribute_name}_ORDER")
    }

    /// Unique key constraint.
    fn unique_key_name(&self, table: &str, columns: &[String]) -> String {
        hashed_name("UK", table, columns)
    }

    /// Foreign key constraint.
    fn foreign_key_name(&self, table: &str, referenced_table: &str, columns: &[String]) -> String {
        let mut parts = Vec::with_capacity(columns.len() + 1);
        parts.push(referenced_table.to_string());
        parts.extend(columns.iter().cloned());
        hashed_name("FK", table, &parts)
    }
}

/// JPA-compliant implicit naming.
#[derive(Debug, Clone, Copy, Default)]
pub struct JpaImplicitNamingStrategy;

impl ImplicitNamingStrategy for JpaImplicitNamingStrategy {}

/// Turns logical names into physical identifiers.
pub trait PhysicalNamingStrategy: fmt::Debug {
    /// Physical table name.
    fn to_physical_table_name(&self, logical: &str) -> String;

    /// Physical column name.
    fn to_physical_column_name(&self, logical: &str) -> String;

    /// Physical sequence name.
    fn to_physical_sequence_name(&self, logical: &str) -> String {
        self.to_physical_table_name(logical)
    }
}

/// Keeps logical names unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityPhysicalNaming;

impl PhysicalNamingStrategy for IdentityPhysicalNaming {
    fn to_physical_table_name(&self, logical: &str) -> String {
        logical.to_string()
    }

    fn to_physical_column_name(&self, logical: &str) -> String {
        logical.to_string()
    }
}

/// Converts names to `snake_case`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnakeCasePhysicalNaming;

impl PhysicalNamingStrategy for SnakeCasePhysicalNaming {
    fn to_physical_table_name(&self, logical: &str) -> String {
        logical.to_case(Case::Snake)
    }

    fn to_physical_column_name(&self, logical: &str) -> String {
        logical.to_case(Case::Snake)
    }
}

/// Build a constraint name from a prefix and a digest of table and columns.
///
/// The digest is order-sensitive in the columns, stable across runs and
/// rendered in base 35, so names never contain `z`.
#[must_use]
pub fn hashed_name(prefix: &str, table: &str, columns: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("table`{table}`").as_bytes());
    for column in columns {
        hasher.update(format!("column`{column}`").as_bytes());
    }
    let digest = hasher.finalize();
    let mut head = [0_u8; 16];
    head.copy_from_slice(&digest[..16]);
    format!("{prefix}{}", to_base35(u128::from_be_bytes(head)))
}

fn to_base35(mut value: u128) -> String {
    const DIGITS: &[u8; 35] = b"0123456789abcdefghijklmnopqrstuvwxy";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 35) as usize]);
        value /= 35;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| (*n).to_string()).collect()
    }

    #[test]
    fn jpa_defaults() {
        let naming = JpaImplicitNamingStrategy;
        assert_eq!(naming.join_column_name("customer", "id"), "customer_id");
        assert_eq!(naming.join_table_name("Order", "Product"), "Order_Product");
        assert_eq!(naming.collection_table_name("Order", "tags"), "Order_tags");
        assert_eq!(naming.discriminator_column_name(), "DTYPE");
        assert_eq!(naming.list_index_column_name("lines"), "lines_ORDER");
        assert_eq!(naming.basic_column_name("address.city"), "city");
    }

    #[test]
    fn hashed_names_are_stable_and_prefixed() {
        let a = hashed_name("UK", "users", &cols(&["email"]));
        let b = hashed_name("UK", "users", &cols(&["email"]));
        let c = hashed_name("UK", "users", &cols(&["login"]));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("UK"));
        assert!(!a[2..].contains('z'));
    }

    #[test]
    fn foreign_key_name_depends_on_target() {
        let naming = JpaImplicitNamingStrategy;
        let a = naming.foreign_key_name("orders", "customers", &cols(&["customer_id"]));
        let b = naming.foreign_key_name("orders", "clients", &cols(&["customer_id"]));
        assert!(a.starts_with("FK"));
        assert_ne!(a, b);
    }

    #[test]
    fn base35_digits() {
        assert_eq!(to_base35(0), "0");
        assert_eq!(to_base35(34), "y");
        assert_eq!(to_base35(35), "10");
    }

    #[test]
    fn snake_case_physical_naming() {
        let naming = SnakeCasePhysicalNaming;
        assert_eq!(naming.to_physical_table_name("OrderLine"), "order_line");
        assert_eq!(naming.to_physical_column_name("customerId"), "customer_id");
        assert_eq!(IdentityPhysicalNaming.to_physical_column_name("customerId"), "customerId");
    }
}
