// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Supporting metadata helpers.
//!
//! Leaves consumed by the entity, property and collection binders. None of
//! them depends on another entity being bound.
//!
//! | Module | Produces |
//! |--------|----------|
//! | `dialect_overrides` | dialect-conditional attribute values |
//! | `filter_def` | filter definitions |
//! | `fetch_profile` | fetch profiles and their override passes |
//! | `named_graph` | named entity graph passes |
//! | `soft_delete` | soft delete indicator columns |
//! | `time_zone` | time-zone storage strategy of temporal attributes |
//! | `database_object` | auxiliary database objects |

mod database_object;
mod dialect_overrides;
mod fetch_profile;
mod filter_def;
mod named_graph;
mod soft_delete;
mod time_zone;

pub use self::dialect_overrides::DialectOverrides;
pub(crate) use self::{
    database_object::bind_database_objects,
    fetch_profile::{bind_fetch_profiles, fetch_profile_overrides},
    filter_def::{bind_filter_definitions, filter_pass},
    named_graph::named_graph_passes,
    soft_delete::bind_soft_delete,
    time_zone::{resolve_time_zone_storage, time_zone_type_code}
};
