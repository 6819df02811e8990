// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Time-zone storage of zoned temporal attributes.
//!
//! `time_zone_storage("..")` on a `DateTime`, `OffsetDateTime` or
//! `ZonedDateTime` field picks how the offset survives a round trip.
//! `default` defers to [`BindingOptions::default_time_zone_storage`]
//! and `auto` asks the dialect.
//!
//! [`BindingOptions::default_time_zone_storage`]: crate::config::BindingOptions::default_time_zone_storage

use crate::{
    binder::BuildingContext,
    dialect::SqlTypeCode,
    error::{BindError, Result},
    model::TimeZoneStorageKind,
    source::{AnnotationTarget, FieldType, MemberDetails}
};

const ZONED: [&str; 3] = ["DateTime", "OffsetDateTime", "ZonedDateTime"];

/// Whether the field holds an offset-carrying timestamp.
#[must_use]
pub(crate) fn is_zoned_temporal(field: &FieldType) -> bool {
    field.scalar_name().is_some_and(|name| ZONED.contains(&name))
}

/// Effective storage strategy of `member`, `None` for other types.
///
/// # Errors
///
/// An unknown strategy name, or the attribute on a non-zoned field.
pub(crate) fn resolve_time_zone_storage(
    member: &MemberDetails,
    context: &BuildingContext<'_>
) -> Result<Option<TimeZoneStorageKind>> {
    let requested = member
        .string_argument("time_zone_storage")?
        .map(|value| {
            TimeZoneStorageKind::parse(&value).ok_or_else(|| {
                BindError::annotation(
                    member.location(),
                    format!("unknown time zone storage '{value}'")
                )
            })
        })
        .transpose()?;

    if !is_zoned_temporal(member.field_type()) {
        if requested.is_some() {
            return Err(BindError::annotation(
                member.location(),
                "'time_zone_storage' only applies to zoned timestamps"
            ));
        }
        return Ok(None);
    }

    let mut kind = requested.unwrap_or(TimeZoneStorageKind::Default);
    if kind == TimeZoneStorageKind::Default {
        kind = context.options.default_time_zone_storage;
    }
    if kind == TimeZoneStorageKind::Auto || kind == TimeZoneStorageKind::Default {
        kind = if context.dialect.supports_time_zone_types() {
            TimeZoneStorageKind::Native
        } else {
            TimeZoneStorageKind::Column
        };
    }
    Ok(Some(kind))
}

/// Column type of a zoned timestamp stored with `kind`.
#[must_use]
pub(crate) fn time_zone_type_code(kind: TimeZoneStorageKind) -> SqlTypeCode {
    match kind {
        TimeZoneStorageKind::Native => SqlTypeCode::TimestampWithTimeZone,
        TimeZoneStorageKind::NormalizeUtc => SqlTypeCode::TimestampUtc,
        _ => SqlTypeCode::Timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{binder::test_support::Fixture, dialect::DatabaseDialect};

    const SOURCE: &str = r#"
        #[entity]
        struct Event {
            at: DateTime<Utc>,
            #[time_zone_storage("auto")]
            auto: OffsetDateTime,
            #[time_zone_storage("normalize_utc")]
            utc: DateTime<Utc>,
            #[time_zone_storage("column")]
            plain: i64,
            #[time_zone_storage("sideways")]
            bad: DateTime<Utc>
        }
    "#;

    #[test]
    fn default_comes_from_options() {
        let fixture = Fixture::new(SOURCE);
        let context = fixture.context();
        let member = fixture.member("Event", "at");
        assert_eq!(
            resolve_time_zone_storage(member, &context).unwrap(),
            Some(TimeZoneStorageKind::Native)
        );
    }

    #[test]
    fn auto_follows_dialect_support() {
        let fixture = Fixture::new(SOURCE);
        let member = fixture.member("Event", "auto");

        let postgres = fixture.context();
        assert_eq!(
            resolve_time_zone_storage(member, &postgres).unwrap(),
            Some(TimeZoneStorageKind::Column)
        );

        let oracle = fixture.context_with(&DatabaseDialect::Oracle);
        assert_eq!(
            resolve_time_zone_storage(member, &oracle).unwrap(),
            Some(TimeZoneStorageKind::Native)
        );
    }

    #[test]
    fn explicit_and_invalid_strategies() {
        let fixture = Fixture::new(SOURCE);
        let context = fixture.context();
        let utc = resolve_time_zone_storage(fixture.member("Event", "utc"), &context).unwrap();
        assert_eq!(utc, Some(TimeZoneStorageKind::NormalizeUtc));
        assert_eq!(time_zone_type_code(TimeZoneStorageKind::NormalizeUtc), SqlTypeCode::TimestampUtc);

        assert!(resolve_time_zone_storage(fixture.member("Event", "plain"), &context).is_err());
        assert!(resolve_time_zone_storage(fixture.member("Event", "bad"), &context).is_err());
    }
}
