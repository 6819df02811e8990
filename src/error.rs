// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Binding errors.
//!
//! Every failure in the binder is a synchronous [`BindError`] returned through
//! [`Result`]. Nothing is retried and nothing is downgraded to a warning: the
//! caller is expected to abort the whole metadata build.
//!
//! # Taxonomy
//!
//! | Variant | Kind | Raised |
//! |---------|------|--------|
//! | [`BindError::Annotation`] | malformed annotation usage | first pass, eagerly |
//! | [`BindError::Mapping`] | generic mapping failure | first or second pass |
//! | [`BindError::UnresolvedReference`] | unknown entity / column / profile | second pass |
//! | [`BindError::InconsistentColumns`] | sibling columns disagree | end of a property's first pass |
//! | [`BindError::Unsupported`] | dialect cannot express a feature | first pass |
//! | [`BindError::ClassLoading`] | named class cannot be resolved | wherever a class name is resolved |
//! | [`BindError::Attribute`] | attribute payload does not parse | source model construction / first pass |
//! | [`BindError::Syntax`] | source text does not parse | source model construction |

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, BindError>;

/// Coarse classification of a [`BindError`].
///
/// Lets callers separate classpath-style problems from mapping-definition
/// problems without matching on messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Self-contradictory attribute usage on a single member or class.
    MalformedAnnotation,

    /// Mapping definition problem.
    Mapping,

    /// A second pass could not find what it refers to.
    UnresolvedReference,

    /// Sibling columns of one property disagree.
    StructuralInconsistency,

    /// The dialect cannot represent a requested feature.
    Unsupported,

    /// A named class could not be resolved.
    ClassLoading
}

/// Error raised while binding attributes into the mapping model.
#[derive(Debug, Error)]
pub enum BindError {
    /// Malformed annotation usage on one member or class.
    #[error("annotation error on '{location}': {message}")]
    Annotation {
        /// Qualified member or class name.
        location: String,
        /// What is wrong with the usage.
        message:  String
    },

    /// Generic mapping failure.
    #[error("mapping error: {0}")]
    Mapping(String),

    /// A deferred lookup failed once the full entity map was known.
    #[error("unresolved reference from '{entity}.{property}': {message}")]
    UnresolvedReference {
        /// Entity owning the property.
        entity:   String,
        /// Property whose binding failed.
        property: String,
        /// What could not be found.
        message:  String
    },

    /// Columns of one property disagree on their shared settings.
    #[error("inconsistent columns for property '{property}': {message}")]
    InconsistentColumns {
        /// Qualified property name.
        property: String,
        /// Which setting differs.
        message:  String
    },

    /// The dialect cannot represent a requested feature.
    #[error("dialect '{dialect}' does not support {feature}")]
    Unsupported {
        /// Dialect name.
        dialect: String,
        /// Requested feature.
        feature: String
    },

    /// A named class could not be loaded or instantiated.
    #[error("unable to load class '{class_name}': {reason}")]
    ClassLoading {
        /// Requested class name.
        class_name: String,
        /// Why resolution failed.
        reason:     String
    },

    /// Attribute payload could not be decoded.
    #[error(transparent)]
    Attribute(#[from] darling::Error),

    /// Source text could not be parsed.
    #[error(transparent)]
    Syntax(#[from] syn::Error)
}

impl BindError {
    /// Build an [`BindError::Annotation`] error.
    pub fn annotation(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Annotation {
            location: location.into(),
            message:  message.into()
        }
    }

    /// Build a [`BindError::Mapping`] error.
    pub fn mapping(message: impl Into<String>) -> Self {
        Self::Mapping(message.into())
    }

    /// Build an [`BindError::UnresolvedReference`] error.
    pub fn unresolved(
        entity: impl Into<String>,
        property: impl Into<String>,
        message: impl Into<String>
    ) -> Self {
        Self::UnresolvedReference {
            entity:   entity.into(),
            property: property.into(),
            message:  message.into()
        }
    }

    /// Build an [`BindError::InconsistentColumns`] error.
    pub fn inconsistent(property: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InconsistentColumns {
            property: property.into(),
            message:  message.into()
        }
    }

    /// Build an [`BindError::Unsupported`] error.
    pub fn unsupported(dialect: impl Into<String>, feature: impl Into<String>) -> Self {
        Self::Unsupported {
            dialect: dialect.into(),
            feature: feature.into()
        }
    }

    /// Build a [`BindError::ClassLoading`] error.
    pub fn class_loading(class_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ClassLoading {
            class_name: class_name.into(),
            reason:     reason.into()
        }
    }

    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Annotation { .. } | Self::Attribute(_) | Self::Syntax(_) => {
                ErrorKind::MalformedAnnotation
            }
            Self::Mapping(_) => ErrorKind::Mapping,
            Self::UnresolvedReference { .. } => ErrorKind::UnresolvedReference,
            Self::InconsistentColumns { .. } => ErrorKind::StructuralInconsistency,
            Self::Unsupported { .. } => ErrorKind::Unsupported,
            Self::ClassLoading { .. } => ErrorKind::ClassLoading
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annotation_message_names_location() {
        let err = BindError::annotation("Order.lines", "'@Any' may not use '@Columns'");
        assert_eq!(
            err.to_string(),
            "annotation error on 'Order.lines': '@Any' may not use '@Columns'"
        );
        assert_eq!(err.kind(), ErrorKind::MalformedAnnotation);
    }

    #[test]
    fn unresolved_names_entity_and_property() {
        let err = BindError::unresolved("Order", "customer", "unknown entity 'Client'");
        let msg = err.to_string();
        assert!(msg.contains("Order.customer"));
        assert!(msg.contains("Client"));
        assert_eq!(err.kind(), ErrorKind::UnresolvedReference);
    }

    #[test]
    fn class_loading_is_distinct_from_mapping() {
        let loading = BindError::class_loading("com.acme.Gen", "not registered");
        let mapping = BindError::mapping("bad generator");
        assert_eq!(loading.kind(), ErrorKind::ClassLoading);
        assert_eq!(mapping.kind(), ErrorKind::Mapping);
        assert_ne!(loading.kind(), mapping.kind());
    }

    #[test]
    fn unsupported_names_dialect() {
        let err = BindError::unsupported("MySQLDialect", "structured arrays");
        assert!(err.to_string().contains("MySQLDialect"));
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }

    #[test]
    fn darling_errors_convert() {
        let err: BindError = darling::Error::custom("bad").into();
        assert_eq!(err.kind(), ErrorKind::MalformedAnnotation);
    }
}
