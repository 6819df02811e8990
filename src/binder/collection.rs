// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Plural attributes.
//!
//! One function binds every collection; the kind only selects capabilities
//! from [`CollectionKind::capabilities`]:
//!
//! | Declaration | Kind |
//! |-------------|------|
//! | `collection_id(..)` | `IdBag` |
//! | `[T; N]` of a primitive | `PrimitiveArray` |
//! | `[T; N]`, `Box<[T]>` | `Array` |
//! | `HashSet`, `BTreeSet` | `Set` |
//! | `order_column(..)` | `List` |
//! | `bag` | `Bag` |
//! | anything else | `implicit_list_classification` |
//!
//! Malformed combinations are rejected before the collector is touched:
//! `order_by` on an indexed kind, `id_bag` without `collection_id`, idbag
//! generators that can never produce a surrogate key, `mapped_by` on an
//! element collection and `soft_delete` on a collection without its own
//! table. Everything depending on the owner's or the target's key is left to
//! a [`CollectionSecondPass`].

use tracing::debug;

use super::{
    basic::{explicit_type_code, infer_type_code, type_name},
    column::{ColumnSet, ColumnsBuilder},
    context::BuildingContext,
    generator::strategies,
    join_column::AnnotatedJoinColumns,
    property::{BoundValue, PropertyScope, bind_component},
    support::{fetch_profile_overrides, filter_pass}
};
use crate::{
    config::ImplicitListClassification,
    error::{BindError, Result},
    model::{
        Collection, CollectionElement, CollectionKind, CollectionState, MetadataCollector,
        PropertyValue, SimpleValue, Table, TableId, ValueKind
    },
    second_pass::{
        CollectionIdSpec, CollectionSecondPass, CollectionTarget, IndexSpec, JoinTableSpec
    },
    source::{
        AnnotationTarget, FieldType, MemberDetails, MemberRef,
        attrs::{
            AssociationAttr, CollectionIdAttr, CollectionTableAttr, JoinTableAttr,
            OrderColumnAttr, SoftDeleteAttr
        }
    }
};

/// Generator used for idbag identifiers without an explicit one.
pub const DEFAULT_COLLECTION_ID_GENERATOR: &str = "sequence";

const ASSOCIATIONS: [&str; 3] = ["one_to_many", "many_to_many", "element_collection"];

/// Whether `member` is a plural association or element collection.
#[must_use]
pub(crate) fn is_collection(member: &MemberDetails) -> bool {
    ASSOCIATIONS.iter().any(|name| member.has(name))
}

/// Kind of collection declared by `member`.
///
/// # Errors
///
/// Map attributes, non-plural types and `id_bag` without `collection_id`.
pub(crate) fn collection_kind(
    member: &MemberDetails,
    context: &BuildingContext<'_>
) -> Result<CollectionKind> {
    let field = member.field_type().unwrap_optional();
    if member.has("id_bag") && !member.has("collection_id") {
        return Err(BindError::annotation(
            member.location(),
            "'id_bag' requires 'collection_id'"
        ));
    }
    let kind = match field {
        FieldType::Map {
            ..
        } => {
            return Err(BindError::annotation(
                member.location(),
                "map collections are not supported"
            ));
        }
        _ if member.has("collection_id") => CollectionKind::IdBag,
        FieldType::Array {
            element
        } if element.is_primitive() => CollectionKind::PrimitiveArray,
        FieldType::Array {
            ..
        } => CollectionKind::Array,
        FieldType::Plural {
            container, ..
        } if container.is_set() => CollectionKind::Set,
        FieldType::Plural {
            ..
        } if member.has("order_column") => CollectionKind::List,
        FieldType::Plural {
            ..
        } if member.has("bag") => CollectionKind::Bag,
        FieldType::Plural {
            ..
        } => match context.options.implicit_list_classification {
            ImplicitListClassification::Bag => CollectionKind::Bag,
            ImplicitListClassification::List => CollectionKind::List
        },
        FieldType::Scalar {
            ..
        }
        | FieldType::Optional(_) => {
            return Err(BindError::annotation(
                member.location(),
                "a collection needs a plural field type"
            ));
        }
    };
    Ok(kind)
}

/// Checks that need nothing but the member itself.
fn validate(
    member: &MemberDetails,
    kind: CollectionKind,
    association: &str,
    attr: &AssociationAttr,
    context: &BuildingContext<'_>
) -> Result<Option<CollectionIdSpec>> {
    let capabilities = kind.capabilities();
    if member.has("order_by") && !capabilities.allows_order_by {
        return Err(BindError::annotation(
            member.location(),
            format!("'order_by' is not allowed on a {}", kind.as_str())
        ));
    }
    let mapped = attr.mapped_by.as_deref().is_some_and(|m| !m.is_empty());
    if association == "element_collection" && mapped {
        return Err(BindError::annotation(
            member.location(),
            "'element_collection' may not use 'mapped_by'"
        ));
    }
    if association == "one_to_many"
        && member.has("soft_delete")
        && !member.has("join_table")
        && (mapped || member.has("join_column"))
    {
        return Err(BindError::annotation(
            member.location(),
            "'soft_delete' needs a collection table, not the target's foreign key"
        ));
    }

    let Some(attr) = member.parse_direct::<CollectionIdAttr>("collection_id")? else {
        return Ok(None);
    };
    let generator = attr
        .generator
        .filter(|g| !g.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_COLLECTION_ID_GENERATOR.to_string());
    let illegal = strategies::is_illegal_for_collection_id(&generator)
        || strategies::legacy_implementation(&generator, context.dialect)
            .is_some_and(strategies::is_illegal_collection_id_implementation);
    if illegal {
        return Err(BindError::mapping(format!(
            "'{generator}' cannot generate the identifier of idbag '{}'",
            member.name()
        )));
    }
    Ok(Some(CollectionIdSpec {
        column: attr.column.and_then(|c| c.name),
        generator
    }))
}

/// Bind the plural attribute `member`, declared at `at`.
///
/// # Errors
///
/// Malformed combinations, undecodable payloads and whatever the element
/// binders raise for element collections.
pub(crate) fn bind_collection(
    at: MemberRef,
    member: &MemberDetails,
    scope: &PropertyScope<'_>,
    metadata: &mut MetadataCollector,
    context: &BuildingContext<'_>
) -> Result<BoundValue> {
    let Some(association) = ASSOCIATIONS.into_iter().find(|name| member.has(name)) else {
        return Err(BindError::annotation(member.location(), "not a collection"));
    };
    let attr = member
        .parse_direct::<AssociationAttr>(association)?
        .unwrap_or_default();
    let kind = collection_kind(member, context)?;
    let collection_id = validate(member, kind, association, &attr, context)?;

    let attribute = scope.attribute().to_string();
    let order_by = context
        .overrides
        .resolve_string(member, "order_by", context.dialect)?;
    let sql_restriction = context
        .overrides
        .resolve_string(member, "sql_restriction", context.dialect)?;
    let base_index = member
        .direct("list_index_base")
        .map(|usage| usage.int_argument())
        .transpose()?
        .map(i32::try_from)
        .transpose()
        .map_err(|_| BindError::annotation(member.location(), "'list_index_base' out of range"))?
        .unwrap_or(0);
    let soft_delete = member.parse_direct::<SoftDeleteAttr>("soft_delete")?;
    let index = if kind.capabilities().indexed {
        let order_column = member
            .parse_direct::<OrderColumnAttr>("order_column")?
            .unwrap_or_default();
        Some(IndexSpec {
            column:   order_column.name,
            nullable: order_column.nullable.unwrap_or(true)
        })
    } else {
        None
    };

    let target_name = attr
        .target
        .clone()
        .or_else(|| member.field_type().target_name().map(str::to_string));
    let (target, key_columns, join_table) = match association {
        "element_collection" => {
            let table_attr = member
                .parse_direct::<CollectionTableAttr>("collection_table")?
                .unwrap_or_default();
            let keys = if table_attr.join_column.is_empty() {
                AnnotatedJoinColumns::implicit(scope.path.as_str(), false)
            } else {
                AnnotatedJoinColumns::explicit(scope.path.as_str(), &table_attr.join_column, false)?
            };
            (CollectionTarget::Elements, keys, None)
        }
        _ => {
            let Some(target) = target_name.clone() else {
                return Err(BindError::annotation(
                    member.location(),
                    format!("'{association}' needs a 'target' when the element type does not name the entity")
                ));
            };
            let target = if association == "one_to_many" {
                CollectionTarget::OneToMany {
                    target
                }
            } else {
                CollectionTarget::ManyToMany {
                    target
                }
            };
            match member.parse_direct::<JoinTableAttr>("join_table")? {
                Some(table) => {
                    let keys = if table.join_column.is_empty() {
                        AnnotatedJoinColumns::implicit(scope.path.as_str(), false)
                    } else {
                        AnnotatedJoinColumns::explicit(scope.path.as_str(), &table.join_column, false)?
                    };
                    let inverse_join_columns = if table.inverse_join_column.is_empty() {
                        AnnotatedJoinColumns::implicit(scope.path.as_str(), false)
                    } else {
                        AnnotatedJoinColumns::explicit(
                            scope.path.as_str(),
                            &table.inverse_join_column,
                            false
                        )?
                    };
                    let spec = JoinTableSpec {
                        name: table.name,
                        schema: table.schema,
                        catalog: table.catalog,
                        inverse_join_columns
                    };
                    (target, keys.with_mapped_by(attr.mapped_by.clone()), Some(spec))
                }
                None => {
                    let ColumnSet::JoinColumns(keys) = ColumnsBuilder::new(member, context, scope.path.as_str())
                        .build()?
                    else {
                        return Err(BindError::annotation(
                            member.location(),
                            format!("'{association}' may not use 'column', 'columns' or 'formula'")
                        ));
                    };
                    (target, keys, None)
                }
            }
        }
    };

    let mut collection = Collection::new(scope.entity, attribute.as_str(), kind);
    collection.lazy = attr.is_lazy(true);
    collection.mapped_by = attr.mapped_by.clone().filter(|m| !m.is_empty());
    collection.order_by = order_by;
    collection.sql_restriction = sql_restriction;
    collection.base_index = base_index;
    let role = collection.role.clone();
    let id = metadata.add_collection(collection);

    if target == CollectionTarget::Elements {
        let table = bind_collection_table(member, scope, metadata, context)?;
        let element = bind_element(member, scope, table, metadata, context)?;
        let collection = metadata.collection_mut(id);
        collection.collection_table = Some(table);
        collection.element = element;
    }
    metadata.collection_mut(id).advance(CollectionState::FirstPassBound)?;

    let mut pass = CollectionSecondPass::new(id, scope.entity, attribute.as_str(), at, target, key_columns);
    if let Some(join_table) = join_table {
        pass = pass.with_join_table(join_table);
    }
    if let Some(index) = index {
        pass = pass.with_index(index);
    }
    if let Some(collection_id) = collection_id {
        pass = pass.with_collection_id(collection_id);
    }
    if let Some(soft_delete) = soft_delete {
        pass = pass.with_soft_delete(soft_delete);
    }
    debug!(
        role = %role,
        kind = kind.as_str(),
        target = ?target_name,
        "bound collection first pass"
    );
    metadata.add_second_pass(pass.into());
    if let Some(filters) = filter_pass(member, &role, Some(id))? {
        metadata.add_second_pass(filters.into());
    }
    for fetch in fetch_profile_overrides(member, scope.entity)? {
        metadata.add_second_pass(fetch.into());
    }

    Ok(BoundValue {
        value:      PropertyValue::Collection(id),
        optional:   true,
        insertable: true,
        updatable:  true,
        lazy:       attr.is_lazy(true)
    })
}

fn bind_collection_table(
    member: &MemberDetails,
    scope: &PropertyScope<'_>,
    metadata: &mut MetadataCollector,
    context: &BuildingContext<'_>
) -> Result<TableId> {
    let attr = member
        .parse_direct::<CollectionTableAttr>("collection_table")?
        .unwrap_or_default();
    let logical = attr.name.filter(|n| !n.trim().is_empty()).unwrap_or_else(|| {
        context
            .implicit_naming
            .collection_table_name(scope.jpa_entity, scope.attribute())
    });
    let mut table = Table::new(context.table_name(&logical), logical);
    table.schema = attr.schema.or_else(|| context.options.default_schema.clone());
    table.catalog = attr.catalog.or_else(|| context.options.default_catalog.clone());
    Ok(metadata.add_table(table))
}

/// Element of an element collection, bound on the collection table.
fn bind_element(
    member: &MemberDetails,
    scope: &PropertyScope<'_>,
    table: TableId,
    metadata: &mut MetadataCollector,
    context: &BuildingContext<'_>
) -> Result<CollectionElement> {
    let element_scope = PropertyScope {
        table,
        enclosing: Vec::new(),
        ..scope.clone()
    };
    let embeddable = member
        .field_type()
        .target_name()
        .and_then(|name| context.sources.class(name))
        .filter(|class| class.is_embeddable());
    if let Some(embeddable) = embeddable {
        let bound = bind_component(member, embeddable, &element_scope, false, &[], metadata, context)?;
        let PropertyValue::Simple(value) = bound.value else {
            return Err(BindError::mapping(format!("'{}' element is not a value", scope.path)));
        };
        return Ok(CollectionElement::Component(value));
    }
    if member
        .field_type()
        .element_name()
        .and_then(|name| context.sources.class(name))
        .is_some_and(|class| class.is_entity())
    {
        return Err(BindError::annotation(
            member.location(),
            "'element_collection' of entities needs 'one_to_many' or 'many_to_many'"
        ));
    }

    let columns = ColumnsBuilder::new(member, context, scope.path.as_str())
        .nullability(element_scope.nullability)
        .build_columns()?;
    let type_code = match explicit_type_code(member)? {
        Some(code) => Some(code),
        None => member
            .field_type()
            .unwrap_optional()
            .element()
            .and_then(|element| infer_type_code(element, context.dialect))
    };
    let implicit = context.implicit_naming.basic_column_name(&scope.path);
    let mut value = SimpleValue::new(table, ValueKind::Basic);
    value.selectables = columns.bind(table, &implicit, type_code, metadata, context);
    value.type_name = member
        .field_type()
        .element_name()
        .map(str::to_string)
        .or_else(|| Some(type_name(member)));
    value.sql_type_code = type_code;
    Ok(CollectionElement::Basic(metadata.add_value(value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        binder::test_support::Fixture,
        dialect::SqlTypeCode,
        error::ErrorKind,
        second_pass::SecondPass
    };

    const SOURCE: &str = r#"
        #[embeddable]
        struct Phone {
            number: String,
            kind: String
        }

        #[entity]
        struct Order {
            #[id]
            id: i64,
            #[one_to_many(mapped_by = "order")]
            lines: Vec<OrderLine>,
            #[one_to_many]
            #[order_column(name = "position")]
            #[join_column(name = "order_id", nullable = false)]
            ranked: Vec<OrderLine>,
            #[many_to_many]
            #[join_table(name = "order_tags", inverse_join_column(name = "tag_id"))]
            tags: HashSet<Tag>,
            #[element_collection]
            #[column(name = "note_text")]
            #[list_index_base(1)]
            #[order_column]
            notes: Vec<String>,
            #[element_collection]
            #[collection_table(name = "order_phones")]
            phones: BTreeSet<Phone>,
            #[element_collection]
            #[collection_id(column(name = "history_id"), generator = "increment")]
            history: Vec<String>,
            #[element_collection]
            #[collection_id(generator = "identity")]
            identity_bag: Vec<String>,
            #[element_collection]
            #[collection_id(generator = "assigned")]
            assigned_bag: Vec<String>,
            #[element_collection]
            #[collection_id(generator = "native")]
            native_bag: Vec<String>,
            #[element_collection]
            #[id_bag]
            missing_id: Vec<String>,
            #[one_to_many(mapped_by = "order")]
            #[order_column]
            #[order_by("id")]
            ordered_list: Vec<OrderLine>,
            #[element_collection]
            scores: [i32; 4],
            #[one_to_many(mapped_by = "order")]
            #[soft_delete]
            deleted_lines: Vec<OrderLine>,
            #[element_collection]
            by_key: HashMap<String, String>
        }
    "#;

    fn bind(fixture: &Fixture, member: &str) -> (MetadataCollector, Result<BoundValue>) {
        let context = fixture.context();
        let mut metadata = MetadataCollector::new();
        let table = metadata.add_table(Table::new("Order", "Order"));
        let scope = PropertyScope::root("Order", "Order", table).nested(member);
        let result = bind_collection(
            fixture.member_ref("Order", member),
            fixture.member("Order", member),
            &scope,
            &mut metadata,
            &context
        );
        (metadata, result)
    }

    fn kind_of(fixture: &Fixture, member: &str) -> Result<CollectionKind> {
        collection_kind(fixture.member("Order", member), &fixture.context())
    }

    #[test]
    fn kinds_from_types_and_attributes() {
        let fixture = Fixture::new(SOURCE);
        assert_eq!(kind_of(&fixture, "lines").unwrap(), CollectionKind::Bag);
        assert_eq!(kind_of(&fixture, "ranked").unwrap(), CollectionKind::List);
        assert_eq!(kind_of(&fixture, "tags").unwrap(), CollectionKind::Set);
        assert_eq!(kind_of(&fixture, "history").unwrap(), CollectionKind::IdBag);
        assert_eq!(kind_of(&fixture, "scores").unwrap(), CollectionKind::PrimitiveArray);
        assert!(kind_of(&fixture, "by_key").is_err());
        assert!(kind_of(&fixture, "missing_id").is_err());

        let mut fixture = Fixture::new(SOURCE);
        fixture.options.implicit_list_classification = ImplicitListClassification::List;
        assert_eq!(kind_of(&fixture, "lines").unwrap(), CollectionKind::List);
    }

    #[test]
    fn association_waits_for_second_pass() {
        let fixture = Fixture::new(SOURCE);
        let (metadata, bound) = bind(&fixture, "lines");
        let PropertyValue::Collection(id) = bound.unwrap().value else {
            panic!("expected a collection");
        };
        let collection = metadata.collection(id);
        assert_eq!(collection.role, "Order.lines");
        assert_eq!(collection.state, CollectionState::FirstPassBound);
        assert_eq!(collection.mapped_by.as_deref(), Some("order"));
        assert!(collection.collection_table.is_none());
        assert!(matches!(metadata.pending_second_passes()[0], SecondPass::Collection(_)));
    }

    #[test]
    fn element_collection_builds_its_table() {
        let fixture = Fixture::new(SOURCE);
        let (metadata, bound) = bind(&fixture, "notes");
        let PropertyValue::Collection(id) = bound.unwrap().value else {
            panic!("expected a collection");
        };
        let collection = metadata.collection(id);
        assert_eq!(collection.kind, CollectionKind::List);
        assert_eq!(collection.base_index, 1);
        let table = metadata.table(collection.collection_table.unwrap());
        assert_eq!(table.name, "Order_notes");
        let CollectionElement::Basic(element) = collection.element else {
            panic!("expected basic elements");
        };
        assert_eq!(metadata.value(element).column_names(), vec!["note_text".to_string()]);
        assert_eq!(metadata.value(element).sql_type_code, Some(SqlTypeCode::Varchar));
    }

    #[test]
    fn embeddable_elements_are_components() {
        let fixture = Fixture::new(SOURCE);
        let (metadata, bound) = bind(&fixture, "phones");
        let PropertyValue::Collection(id) = bound.unwrap().value else {
            panic!("expected a collection");
        };
        let collection = metadata.collection(id);
        assert_eq!(metadata.table(collection.collection_table.unwrap()).name, "order_phones");
        let CollectionElement::Component(element) = collection.element else {
            panic!("expected component elements");
        };
        assert_eq!(
            metadata.value(element).column_names(),
            vec!["number".to_string(), "kind".to_string()]
        );
    }

    #[test]
    fn illegal_idbag_generators_leave_no_trace() {
        let fixture = Fixture::new(SOURCE);
        for member in ["identity_bag", "assigned_bag", "native_bag"] {
            let (metadata, result) = bind(&fixture, member);
            let err = result.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Mapping, "{member}");
            assert!(metadata.collections().is_empty());
            assert!(metadata.pending_second_passes().is_empty());
            assert_eq!(metadata.database().tables().len(), 1);
            assert_eq!(metadata.value_count(), 0);
        }
        let (_, result) = bind(&fixture, "history");
        assert!(result.is_ok());
    }

    #[test]
    fn malformed_collections() {
        let fixture = Fixture::new(SOURCE);
        for member in ["missing_id", "ordered_list", "deleted_lines", "by_key"] {
            let (metadata, result) = bind(&fixture, member);
            assert_eq!(result.unwrap_err().kind(), ErrorKind::MalformedAnnotation, "{member}");
            assert!(metadata.collections().is_empty());
        }
    }
}
