// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Legacy string strategies.
//!
//! | Strategy | Implementation |
//! |----------|----------------|
//! | `native` | dialect choice: `SequenceStyleGenerator` or `IdentityGenerator` |
//! | `assigned` | `Assigned` |
//! | `sequence`, `enhanced-sequence` | `SequenceStyleGenerator` |
//! | `table`, `enhanced-table` | `TableGenerator` |
//! | `identity` | `IdentityGenerator` |
//! | `increment` | `IncrementGenerator` |
//! | `foreign` | `ForeignGenerator` |
//! | `uuid`, `uuid.hex` | `UUIDHexGenerator` |
//! | `uuid2` | `UUIDGenerator` |
//! | `select` | `SelectGenerator` |
//! | `guid` | `GUIDGenerator` |

use crate::dialect::Dialect;

/// `Assigned` implementation name.
pub const ASSIGNED: &str = "Assigned";

/// Sequence implementation name.
pub const SEQUENCE_STYLE: &str = "SequenceStyleGenerator";

/// Table implementation name.
pub const TABLE: &str = "TableGenerator";

/// Identity implementation name.
pub const IDENTITY: &str = "IdentityGenerator";

/// `uuid_generator` implementation name.
pub const UUID: &str = "UuidGenerator";

/// Implementation behind a legacy strategy name.
///
/// Matching ignores case. `None` for anything that is not a legacy name.
#[must_use]
pub fn legacy_implementation(strategy: &str, dialect: &dyn Dialect) -> Option<&'static str> {
    let implementation = match strategy.trim().to_lowercase().as_str() {
        "native" => match dialect.native_identifier_generator_strategy() {
            "identity" => IDENTITY,
            _ => SEQUENCE_STYLE
        },
        "assigned" => ASSIGNED,
        "sequence" | "enhanced-sequence" => SEQUENCE_STYLE,
        "table" | "enhanced-table" => TABLE,
        "identity" => IDENTITY,
        "increment" => "IncrementGenerator",
        "foreign" => "ForeignGenerator",
        "uuid" | "uuid.hex" => "UUIDHexGenerator",
        "uuid2" => "UUIDGenerator",
        "select" => "SelectGenerator",
        "guid" => "GUIDGenerator",
        _ => return None
    };
    Some(implementation)
}

/// Strategies that can never generate an idbag identifier.
#[must_use]
pub fn is_illegal_for_collection_id(strategy: &str) -> bool {
    matches!(
        strategy.trim().to_lowercase().as_str(),
        "identity" | "assigned" | "native"
    )
}

/// Implementations that can never generate an idbag identifier.
#[must_use]
pub fn is_illegal_collection_id_implementation(implementation: &str) -> bool {
    matches!(implementation, IDENTITY | ASSIGNED | "NativeGenerator")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::DatabaseDialect;

    #[test]
    fn legacy_names() {
        let dialect = DatabaseDialect::Postgres;
        assert_eq!(legacy_implementation("uuid", &dialect), Some("UUIDHexGenerator"));
        assert_eq!(legacy_implementation("uuid.hex", &dialect), Some("UUIDHexGenerator"));
        assert_eq!(legacy_implementation("uuid2", &dialect), Some("UUIDGenerator"));
        assert_eq!(legacy_implementation("Increment", &dialect), Some("IncrementGenerator"));
        assert_eq!(legacy_implementation("hilo", &dialect), None);
    }

    #[test]
    fn native_follows_dialect() {
        assert_eq!(
            legacy_implementation("native", &DatabaseDialect::Postgres),
            Some(SEQUENCE_STYLE)
        );
        assert_eq!(
            legacy_implementation("native", &DatabaseDialect::MySql),
            Some(IDENTITY)
        );
    }

    #[test]
    fn collection_id_restrictions() {
        for name in ["identity", "assigned", "native", "IDENTITY"] {
            assert!(is_illegal_for_collection_id(name), "{name}");
        }
        assert!(!is_illegal_for_collection_id("sequence"));
        assert!(is_illegal_collection_id_implementation(IDENTITY));
        assert!(!is_illegal_collection_id_implementation(SEQUENCE_STYLE));
    }
}
