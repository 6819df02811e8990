// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Collection mappings.
//!
//! Each plural attribute becomes one [`Collection`]. Its lifecycle is a small
//! state machine driven by the binder and the collection second pass:
//!
//! ```text
//! Constructed ──first pass──▶ FirstPassBound ──second pass──▶ SecondPassComplete
//! ```
//!
//! The kind decides which parts a collection needs. Instead of a binder
//! class per kind, [`CollectionKind::capabilities`] is a lookup table:
//!
//! | Kind | indexed | order_by | collection id | primitive elements |
//! |------|---------|----------|---------------|--------------------|
//! | `Bag` | no | yes | no | no |
//! | `Set` | no | yes | no | no |
//! | `List` | yes | no | no | no |
//! | `Array` | yes | no | no | no |
//! | `PrimitiveArray` | yes | no | no | yes |
//! | `IdBag` | no | yes | yes | no |

use super::{
    table::TableId,
    value::{SimpleValue, ValueId}
};
use crate::error::{BindError, Result};

/// Index of a collection inside the collection arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionId(pub(crate) usize);

/// Collection classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    /// Unordered, duplicates allowed.
    Bag,

    /// Unordered, unique elements.
    Set,

    /// Positional list.
    List,

    /// Array of objects.
    Array,

    /// Array of primitives.
    PrimitiveArray,

    /// Bag with a surrogate identifier column.
    IdBag
}

/// Capability flags of a [`CollectionKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionCapabilities {
    /// Needs an index column.
    pub indexed: bool,

    /// Accepts an `order_by` fragment.
    pub allows_order_by: bool,

    /// Needs `collection_id`.
    pub requires_collection_id: bool,

    /// Elements are primitives.
    pub primitive_elements: bool
}

impl CollectionKind {
    /// Capability table lookup.
    #[must_use]
    pub const fn capabilities(self) -> CollectionCapabilities {
        match self {
            Self::Bag | Self::Set => CollectionCapabilities {
                indexed:                false,
                allows_order_by:        true,
                requires_collection_id: false,
                primitive_elements:     false
            },
            Self::List | Self::Array => CollectionCapabilities {
                indexed:                true,
                allows_order_by:        false,
                requires_collection_id: false,
                primitive_elements:     false
            },
            Self::PrimitiveArray => CollectionCapabilities {
                indexed:                true,
                allows_order_by:        false,
                requires_collection_id: false,
                primitive_elements:     true
            },
            Self::IdBag => CollectionCapabilities {
                indexed:                false,
                allows_order_by:        true,
                requires_collection_id: true,
                primitive_elements:     false
            }
        }
    }

    /// Lower-case name used in messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bag => "bag",
            Self::Set => "set",
            Self::List => "list",
            Self::Array => "array",
            Self::PrimitiveArray => "primitive array",
            Self::IdBag => "id bag"
        }
    }
}

/// Collection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CollectionState {
    /// Created, nothing bound.
    Constructed,

    /// Role, owner, table and element type known.
    FirstPassBound,

    /// Key, element, index and identifier resolved.
    SecondPassComplete
}

/// What a collection holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionElement {
    /// Element type known, columns not bound yet.
    Pending,

    /// Basic values in the collection table.
    Basic(ValueId),

    /// Embeddable values in the collection table.
    Component(ValueId),

    /// Entities reached through a join table.
    ManyToMany(ValueId),

    /// Entities whose table holds the key.
    OneToMany {
        /// Resolved entity name.
        referenced_entity: String
    }
}

/// A collection mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    /// `Owner.property`.
    pub role: String,

    /// Owning entity name.
    pub owner: String,

    /// Property name on the owner.
    pub property: String,

    /// Classification.
    pub kind: CollectionKind,

    /// Lifecycle state.
    pub state: CollectionState,

    /// Table holding the key columns. Unknown until the second pass for
    /// associations with an implicit join table.
    pub collection_table: Option<TableId>,

    /// Foreign key back to the owner.
    pub key: Option<ValueId>,

    /// Element mapping.
    pub element: CollectionElement,

    /// Index value for lists and arrays.
    pub index: Option<ValueId>,

    /// First index value (`list_index_base`).
    pub base_index: i32,

    /// Surrogate identifier for id bags.
    pub identifier: Option<ValueId>,

    /// The other side owns the association.
    pub inverse: bool,

    /// Property on the other side that owns the association.
    pub mapped_by: Option<String>,

    /// SQL order fragment.
    pub order_by: Option<String>,

    /// Restriction applied when loading.
    pub sql_restriction: Option<String>,

    /// Resolved filter conditions by name.
    pub filters: Vec<super::metadata::FilterReference>,

    /// Soft delete column, if any.
    pub soft_delete: Option<super::entity::SoftDeleteMapping>,

    /// Lazy loading.
    pub lazy: bool,

    cached_keys: Option<Vec<String>>
}

impl Collection {
    /// Create a collection in the `Constructed` state.
    pub fn new(owner: impl Into<String>, property: impl Into<String>, kind: CollectionKind) -> Self {
        let owner = owner.into();
        let property = property.into();
        Self {
            role: format!("{owner}.{property}"),
            owner,
            property,
            kind,
            state: CollectionState::Constructed,
            collection_table: None,
            key: None,
            element: CollectionElement::Pending,
            index: None,
            base_index: 0,
            identifier: None,
            inverse: false,
            mapped_by: None,
            order_by: None,
            sql_restriction: None,
            filters: Vec::new(),
            soft_delete: None,
            lazy: true,
            cached_keys: None
        }
    }

    /// Advance the lifecycle.
    ///
    /// # Errors
    ///
    /// States only move forward; anything else is a mapping error.
    pub fn advance(&mut self, next: CollectionState) -> Result<()> {
        if next <= self.state {
            return Err(BindError::mapping(format!(
                "collection '{}' cannot move from {:?} to {:?}",
                self.role, self.state, next
            )));
        }
        self.state = next;
        Ok(())
    }

    /// Whether the elements are entities stored in their own table.
    #[must_use]
    pub fn is_one_to_many(&self) -> bool {
        matches!(self.element, CollectionElement::OneToMany { .. })
    }

    /// Build the all-keys cache from the key and index values.
    pub fn cache_keys(&mut self, key: &SimpleValue, index: Option<&SimpleValue>) {
        let mut keys = key.column_names();
        if let Some(index) = index {
            keys.extend(index.column_names());
        }
        self.cached_keys = Some(keys);
    }

    /// Key and index columns, available once the second pass completed.
    #[must_use]
    pub fn cached_keys(&self) -> Option<&[String]> {
        self.cached_keys.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_table() {
        assert!(CollectionKind::List.capabilities().indexed);
        assert!(!CollectionKind::List.capabilities().allows_order_by);
        assert!(CollectionKind::Set.capabilities().allows_order_by);
        assert!(CollectionKind::IdBag.capabilities().requires_collection_id);
        assert!(CollectionKind::PrimitiveArray.capabilities().primitive_elements);
        assert!(!CollectionKind::Bag.capabilities().indexed);
    }

    #[test]
    fn state_only_moves_forward() {
        let mut collection = Collection::new("Order", "lines", CollectionKind::Bag);
        assert_eq!(collection.role, "Order.lines");
        collection.advance(CollectionState::FirstPassBound).unwrap();
        assert!(collection.advance(CollectionState::FirstPassBound).is_err());
        collection.advance(CollectionState::SecondPassComplete).unwrap();
        assert!(collection.advance(CollectionState::Constructed).is_err());
    }
}
