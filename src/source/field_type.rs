// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Field type classification.
//!
//! Binders only need the *shape* of a field's type: is it optional, plural,
//! an array, a map, and what is the element type called. [`FieldType`]
//! captures exactly that from a `syn::Type`.
//!
//! | Rust type | Shape |
//! |-----------|-------|
//! | `T` | `Scalar` |
//! | `Option<T>` | `Optional(T)` |
//! | `Box<T>`, `Rc<T>`, `Arc<T>`, `&T` | same as `T` |
//! | `Vec<T>`, `VecDeque<T>`, `LinkedList<T>` | `Plural` (ordered) |
//! | `HashSet<T>`, `BTreeSet<T>` | `Plural` (set) |
//! | `[T; N]`, `Box<[T]>` | `Array` |
//! | `HashMap<K, V>`, `BTreeMap<K, V>` | `Map` |

use quote::ToTokens;
use syn::{GenericArgument, PathArguments, Type};

/// Rust primitive type names.
const PRIMITIVES: &[&str] = &[
    "bool", "char", "i8", "i16", "i32", "i64", "i128", "isize", "u8", "u16", "u32", "u64",
    "u128", "usize", "f32", "f64"
];

/// Plural container kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluralContainer {
    /// `Vec<T>`
    Vec,
    /// `VecDeque<T>`
    VecDeque,
    /// `LinkedList<T>`
    LinkedList,
    /// `HashSet<T>`
    HashSet,
    /// `BTreeSet<T>`
    BTreeSet
}

impl PluralContainer {
    /// Whether the container has set semantics.
    #[must_use]
    pub const fn is_set(self) -> bool {
        matches!(self, Self::HashSet | Self::BTreeSet)
    }
}

/// Shape of a field type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    /// A single value, named by the last path segment.
    Scalar {
        /// Type name (`String`, `Uuid`, `Customer`, `DateTime`).
        name: String
    },

    /// `Option<T>`.
    Optional(Box<FieldType>),

    /// A plural container.
    Plural {
        /// Container kind.
        container: PluralContainer,
        /// Element type.
        element:   Box<FieldType>
    },

    /// Fixed-size or boxed array.
    Array {
        /// Element type.
        element: Box<FieldType>
    },

    /// Map.
    Map {
        /// Key type.
        key:   Box<FieldType>,
        /// Value type.
        value: Box<FieldType>
    }
}

impl FieldType {
    /// Classify a `syn::Type`.
    #[must_use]
    pub fn classify(ty: &Type) -> Self {
        match ty {
            Type::Path(path) => {
                let Some(segment) = path.path.segments.last() else {
                    return Self::scalar(ty);
                };
                let ident = segment.ident.to_string();
                let args = generic_types(&segment.arguments);
                match (ident.as_str(), args.as_slice()) {
                    ("Option", [inner]) => Self::Optional(Box::new(Self::classify(inner))),
                    ("Box" | "Rc" | "Arc", [Type::Slice(slice)]) => Self::Array {
                        element: Box::new(Self::classify(&slice.elem))
                    },
                    ("Box" | "Rc" | "Arc", [inner]) => Self::classify(inner),
                    ("Vec", [inner]) => Self::plural(PluralContainer::Vec, inner),
                    ("VecDeque", [inner]) => Self::plural(PluralContainer::VecDeque, inner),
                    ("LinkedList", [inner]) => Self::plural(PluralContainer::LinkedList, inner),
                    ("HashSet", [inner]) => Self::plural(PluralContainer::HashSet, inner),
                    ("BTreeSet", [inner]) => Self::plural(PluralContainer::BTreeSet, inner),
                    ("HashMap" | "BTreeMap", [key, value]) => Self::Map {
                        key:   Box::new(Self::classify(key)),
                        value: Box::new(Self::classify(value))
                    },
                    _ => Self::Scalar {
                        name: ident
                    }
                }
            }
            Type::Array(array) => Self::Array {
                element: Box::new(Self::classify(&array.elem))
            },
            Type::Reference(reference) => Self::classify(&reference.elem),
            Type::Group(group) => Self::classify(&group.elem),
            Type::Paren(paren) => Self::classify(&paren.elem),
            other => Self::scalar(other)
        }
    }

    fn scalar(ty: &Type) -> Self {
        Self::Scalar {
            name: ty.to_token_stream().to_string().replace(' ', "")
        }
    }

    fn plural(container: PluralContainer, element: &Type) -> Self {
        Self::Plural {
            container,
            element: Box::new(Self::classify(element))
        }
    }

    /// Whether the field may be absent.
    #[must_use]
    pub fn is_optional(&self) -> bool {
        matches!(self, Self::Optional(_))
    }

    /// Strip one level of `Option`.
    #[must_use]
    pub fn unwrap_optional(&self) -> &Self {
        match self {
            Self::Optional(inner) => inner,
            other => other
        }
    }

    /// Whether the field holds many values.
    #[must_use]
    pub fn is_plural(&self) -> bool {
        matches!(
            self.unwrap_optional(),
            Self::Plural { .. } | Self::Array { .. } | Self::Map { .. }
        )
    }

    /// Name of a scalar type, looking through `Option`.
    #[must_use]
    pub fn scalar_name(&self) -> Option<&str> {
        match self.unwrap_optional() {
            Self::Scalar {
                name
            } => Some(name),
            _ => None
        }
    }

    /// Element type of plural shapes (map value for maps).
    #[must_use]
    pub fn element(&self) -> Option<&Self> {
        match self.unwrap_optional() {
            Self::Plural {
                element, ..
            }
            | Self::Array {
                element
            } => Some(&**element),
            Self::Map {
                value, ..
            } => Some(&**value),
            _ => None
        }
    }

    /// Name of the element type of plural shapes.
    #[must_use]
    pub fn element_name(&self) -> Option<&str> {
        self.element().and_then(Self::scalar_name)
    }

    /// Name of the type an association points at: the element for plurals,
    /// the scalar otherwise.
    #[must_use]
    pub fn target_name(&self) -> Option<&str> {
        if self.is_plural() {
            self.element_name()
        } else {
            self.scalar_name()
        }
    }

    /// Whether this is a byte vector, mapped as binary rather than plural.
    #[must_use]
    pub fn is_bytes(&self) -> bool {
        match self.unwrap_optional() {
            Self::Plural {
                container: PluralContainer::Vec,
                element
            }
            | Self::Array {
                element
            } => element.scalar_name() == Some("u8"),
            _ => false
        }
    }

    /// Whether the type names a Rust primitive.
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        self.scalar_name().is_some_and(is_primitive)
    }
}

/// Whether `name` is a Rust primitive type name.
#[must_use]
pub fn is_primitive(name: &str) -> bool {
    PRIMITIVES.contains(&name)
}

fn generic_types(arguments: &PathArguments) -> Vec<&Type> {
    match arguments {
        PathArguments::AngleBracketed(args) => args
            .args
            .iter()
            .filter_map(|arg| match arg {
                GenericArgument::Type(ty) => Some(ty),
                _ => None
            })
            .collect(),
        _ => Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use syn::parse_quote;

    use super::*;

    #[test]
    fn scalars_and_options() {
        let ty: Type = parse_quote!(Option<Box<Customer>>);
        let shape = FieldType::classify(&ty);
        assert!(shape.is_optional());
        assert_eq!(shape.scalar_name(), Some("Customer"));

        let ty: Type = parse_quote!(chrono::DateTime<chrono::Utc>);
        assert_eq!(FieldType::classify(&ty).scalar_name(), Some("DateTime"));
    }

    #[test]
    fn plural_shapes() {
        let ty: Type = parse_quote!(Vec<OrderLine>);
        let shape = FieldType::classify(&ty);
        assert!(shape.is_plural());
        assert_eq!(shape.element_name(), Some("OrderLine"));

        let ty: Type = parse_quote!(std::collections::BTreeSet<String>);
        match FieldType::classify(&ty) {
            FieldType::Plural {
                container, ..
            } => assert!(container.is_set()),
            other => panic!("unexpected shape {other:?}")
        }
    }

    #[test]
    fn arrays_and_maps() {
        let ty: Type = parse_quote!([i32; 4]);
        let shape = FieldType::classify(&ty);
        assert!(matches!(shape, FieldType::Array { .. }));
        assert!(shape.element().is_some_and(FieldType::is_primitive));

        let ty: Type = parse_quote!(Box<[Address]>);
        assert!(matches!(FieldType::classify(&ty), FieldType::Array { .. }));

        let ty: Type = parse_quote!(HashMap<String, i64>);
        let shape = FieldType::classify(&ty);
        assert!(matches!(shape, FieldType::Map { .. }));
        assert_eq!(shape.element_name(), Some("i64"));
    }

    #[test]
    fn byte_vectors() {
        let ty: Type = parse_quote!(Vec<u8>);
        assert!(FieldType::classify(&ty).is_bytes());
        let ty: Type = parse_quote!(Vec<u16>);
        assert!(!FieldType::classify(&ty).is_bytes());
    }

    #[test]
    fn target_name_of_plural_and_scalar() {
        let ty: Type = parse_quote!(Vec<Product>);
        assert_eq!(FieldType::classify(&ty).target_name(), Some("Product"));
        let ty: Type = parse_quote!(Customer);
        assert_eq!(FieldType::classify(&ty).target_name(), Some("Customer"));
    }
}
