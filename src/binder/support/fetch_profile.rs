// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Fetch profiles.
//!
//! Profiles are registered eagerly; every override becomes a
//! [`FetchOverrideSecondPass`] because the association it names may belong
//! to an entity that is not bound yet.

use crate::{
    error::{BindError, Result},
    model::MetadataCollector,
    second_pass::FetchOverrideSecondPass,
    source::{
        AnnotationTarget, MemberDetails,
        attrs::{FetchProfileAttr, FetchProfileOverrideAttr}
    }
};

/// Register the `fetch_profile` declarations of `target`.
///
/// # Errors
///
/// Blank names and undecodable payloads.
pub(crate) fn bind_fetch_profiles(
    target: &impl AnnotationTarget,
    metadata: &mut MetadataCollector
) -> Result<Vec<FetchOverrideSecondPass>> {
    let mut passes = Vec::new();
    for profile in target.parse_repeated::<FetchProfileAttr>("fetch_profile")? {
        if profile.name.trim().is_empty() {
            return Err(BindError::annotation(target.location(), "'fetch_profile' needs a name"));
        }
        metadata.add_fetch_profile(&profile.name);
        for entry in profile.fetch_override {
            passes.push(FetchOverrideSecondPass::new(
                &profile.name,
                entry.entity,
                entry.association,
                entry.mode
            ));
        }
    }
    Ok(passes)
}

/// `fetch_profile_override` entries of an association member of `entity`.
///
/// # Errors
///
/// Undecodable payloads.
pub(crate) fn fetch_profile_overrides(
    member: &MemberDetails,
    entity: &str
) -> Result<Vec<FetchOverrideSecondPass>> {
    Ok(member
        .parse_repeated::<FetchProfileOverrideAttr>("fetch_profile_override")?
        .into_iter()
        .map(|attr| FetchOverrideSecondPass::new(attr.profile, entity, member.name(), attr.mode))
        .collect())
}
