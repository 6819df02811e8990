// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Soft delete indicator columns.
//!
//! | Strategy | Column type | Nullable | Default |
//! |----------|-------------|----------|---------|
//! | `deleted` | dialect boolean | no | `false` |
//! | `active` | dialect boolean | no | `true` |
//! | `timestamp` | `TIMESTAMP` | yes | none |

use tracing::debug;

use crate::{
    binder::BuildingContext,
    dialect::SqlTypeCode,
    model::{Column, MetadataCollector, SoftDeleteMapping, SoftDeleteStrategy, TableId},
    source::attrs::SoftDeleteAttr
};

/// Add the indicator column of `attr` to `table`.
pub(crate) fn bind_soft_delete(
    attr: &SoftDeleteAttr,
    table: TableId,
    metadata: &mut MetadataCollector,
    context: &BuildingContext<'_>
) -> SoftDeleteMapping {
    let logical = attr
        .column_name
        .clone()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| attr.strategy.default_column_name().to_string());
    let physical = context.column_name(&logical);

    let mut column = Column::new(physical.clone());
    match attr.strategy {
        SoftDeleteStrategy::Deleted | SoftDeleteStrategy::Active => {
            column.sql_type_code = Some(context.dialect.preferred_sql_type_code_for_boolean());
            column.nullable = false;
            column.default_value = Some(
                (attr.strategy == SoftDeleteStrategy::Active)
                    .to_string()
            );
        }
        SoftDeleteStrategy::Timestamp => {
            column.sql_type_code = Some(SqlTypeCode::Timestamp);
        }
    }

    let target = metadata.table_mut(table);
    target.add_column(column);
    target.bind_logical_name(logical, physical.clone());
    debug!(table = %target.name, column = %physical, strategy = ?attr.strategy, "bound soft delete column");

    SoftDeleteMapping {
        strategy: attr.strategy,
        table,
        column: physical
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{binder::test_support::Fixture, model::Table};

    #[test]
    fn boolean_strategies_are_not_null() {
        let fixture = Fixture::new("");
        let context = fixture.context();
        let mut metadata = MetadataCollector::new();
        let table = metadata.add_table(Table::new("orders", "Order"));

        let active = SoftDeleteAttr {
            strategy:    SoftDeleteStrategy::Active,
            column_name: None
        };
        let mapping = bind_soft_delete(&active, table, &mut metadata, &context);
        assert_eq!(mapping.column, "active");
        let column = metadata.table(table).column("active").unwrap();
        assert!(!column.nullable);
        assert_eq!(column.default_value.as_deref(), Some("true"));
        assert_eq!(column.sql_type_code, Some(SqlTypeCode::Boolean));
    }

    #[test]
    fn timestamp_strategy_is_nullable() {
        let fixture = Fixture::new("");
        let context = fixture.context();
        let mut metadata = MetadataCollector::new();
        let table = metadata.add_table(Table::new("orders", "Order"));

        let attr = SoftDeleteAttr {
            strategy:    SoftDeleteStrategy::Timestamp,
            column_name: Some("removed_at".into())
        };
        bind_soft_delete(&attr, table, &mut metadata, &context);
        let column = metadata.table(table).column("removed_at").unwrap();
        assert!(column.nullable);
        assert_eq!(column.sql_type_code, Some(SqlTypeCode::Timestamp));
    }
}
