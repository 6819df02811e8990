// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Identifier generator resolution.
//!
//! An identifier asks for generation with `generated_value(strategy,
//! generator)` or with a registered custom generator attribute. The request
//! becomes a [`GeneratorRequest`] in the first pass and is resolved in the
//! identifier's second pass, when every global registration is known.
//!
//! # Lookup order
//!
//! | Request | Tried in order |
//! |---------|----------------|
//! | `uuid` | `uuid_generator` on member, class, package |
//! | `identity` | identity column |
//! | `sequence` / `table`, unnamed | anonymous declaration, then implicit defaults |
//! | `sequence` / `table`, named | exact local declaration, global registration, anonymous declaration, synthetic default |
//! | `auto`, unnamed | UUID for `Uuid` fields, otherwise the dialect's native strategy |
//! | `auto`, named | global sequence, global table, legacy strategy, local sequence, local table, generic generator, class |
//! | custom attribute | member, class, package |
//!
//! Local declarations are searched on the member, then its class, then the
//! package; an exact name anywhere beats an anonymous declaration anywhere.
//!
//! # Module Structure
//!
//! - [`strategies`] - legacy string strategies
//! - `helper` - attribute to definition conversion and localized lookup
//! - `resolver` - the request dispatch

mod helper;
mod resolver;
pub mod strategies;

pub use self::resolver::{GeneratorRequest, GeneratorTarget, resolve_generator};
pub(crate) use self::helper::{find_custom, global_generators};
use crate::{
    binder::BuildingContext,
    error::Result,
    source::{AnnotationTarget, MemberRef, attrs::GeneratedValueAttr}
};

/// The request an identifier member makes, if any.
///
/// Registered custom generator attributes win over `generated_value`.
///
/// # Errors
///
/// `generated_value` payloads that do not decode.
pub fn generator_request(
    context: &BuildingContext<'_>,
    member: MemberRef
) -> Result<Option<GeneratorRequest>> {
    if let Some((usage, implementation)) = find_custom(context, member) {
        return Ok(Some(GeneratorRequest::Custom {
            attribute:      usage.name().to_string(),
            implementation: implementation.to_string()
        }));
    }
    let Some((details, _, _)) = context.member_scope(member) else {
        return Ok(None);
    };
    Ok(details
        .parse_direct::<GeneratedValueAttr>("generated_value")?
        .map(|attr| GeneratorRequest::from_generated_value(&attr)))
}
