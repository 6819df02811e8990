// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

use quote::quote;

use super::{
    attrs::{ColumnAttr, EntityAttr, SequenceGeneratorAttr},
    *
};

fn model() -> SourceModel {
    SourceModel::from_tokens(quote! {
        #![sequence_generator(name = "ids", sequence_name = "global_ids")]

        /// An order.
        #[entity(name = "PurchaseOrder")]
        #[table(name = "orders")]
        struct Order {
            #[id]
            id: i64,

            #[column(name = "order_number", nullable = false)]
            #[column(name = "ignored")]
            number: String,

            #[snowflake_id(node = 3)]
            external: i64,

            note: Option<String>
        }

        mod billing {
            #![filter_def(name = "tenant", default_condition = "tenant_id = :tenant")]

            #[embeddable]
            struct Address {
                city: String
            }
        }

        struct Marker;
    })
    .unwrap()
}

#[test]
fn collects_classes_members_and_packages() {
    let model = model();
    assert_eq!(model.classes().len(), 3);
    assert_eq!(model.packages().len(), 2);
    assert_eq!(model.packages()[1].name(), "crate::billing");

    let order = model.class("Order").unwrap();
    assert!(order.is_entity());
    assert_eq!(order.members().len(), 4);
    assert!(order.member("note").unwrap().field_type().is_optional());
    assert_eq!(order.member("id").unwrap().location(), "Order.id");

    let address = model.class("Address").unwrap();
    assert!(address.is_embeddable());
    assert_eq!(model.package_of(address).unwrap().name(), "crate::billing");
}

#[test]
fn doc_comments_are_not_annotations() {
    let model = model();
    let order = model.class("Order").unwrap();
    assert!(!order.has("doc"));
    assert_eq!(order.annotations().len(), 2);
}

#[test]
fn direct_and_repeated_lookups() {
    let model = model();
    let number = model.class("Order").unwrap().member("number").unwrap();
    assert_eq!(number.repeated("column").len(), 2);

    let first: ColumnAttr = number.parse_direct("column").unwrap().unwrap();
    assert_eq!(first.name.as_deref(), Some("order_number"));

    let all: Vec<ColumnAttr> = number.parse_repeated("column").unwrap();
    assert_eq!(all[1].name.as_deref(), Some("ignored"));
}

#[test]
fn bare_words_decode_to_default() {
    let model = model();
    let order = model.class("Order").unwrap();
    let entity: EntityAttr = order.parse_direct("entity").unwrap().unwrap();
    assert_eq!(entity.name.as_deref(), Some("PurchaseOrder"));

    let id = order.member("id").unwrap();
    let column: Option<ColumnAttr> = id.parse_direct("column").unwrap();
    assert!(column.is_none());
    assert!(id.direct("id").unwrap().is_word());
}

#[test]
fn package_annotations() {
    let model = model();
    let package = &model.packages()[0];
    let generators: Vec<SequenceGeneratorAttr> = package.parse_repeated("sequence_generator").unwrap();
    assert_eq!(generators[0].sequence_name.as_deref(), Some("global_ids"));
    assert!(model.packages()[1].has("filter_def"));
}

#[test]
fn meta_annotated_lookup() {
    let model = model();
    let registry = GeneratorTypeRegistry::default().with("snowflake_id", "SnowflakeGenerator");
    let external = model.class("Order").unwrap().member("external").unwrap();
    let (usage, implementation) = external.meta_annotated(&registry).unwrap();
    assert_eq!(usage.name(), "snowflake_id");
    assert_eq!(implementation, "SnowflakeGenerator");

    let id = model.class("Order").unwrap().member("id").unwrap();
    assert!(id.meta_annotated(&registry).is_none());
}

#[test]
fn member_refs() {
    let model = model();
    let at = model.member_ref("Order", "note").unwrap();
    assert_eq!(model.member(at).unwrap().name(), "note");
    assert!(model.member_ref("Order", "missing").is_none());
}

#[test]
fn string_and_int_arguments() {
    let model = SourceModel::from_str(
        r#"
        #[entity]
        struct Item {
            #[formula("price * quantity")]
            #[list_index_base(1)]
            #[maps_id]
            total: i64
        }
        "#
    )
    .unwrap();
    let total = model.class("Item").unwrap().member("total").unwrap();
    assert_eq!(
        total.string_argument("formula").unwrap().as_deref(),
        Some("price * quantity")
    );
    assert_eq!(total.direct("list_index_base").unwrap().int_argument().unwrap(), 1);
    assert_eq!(total.direct("maps_id").unwrap().optional_string_argument().unwrap(), None);
}

#[test]
fn tuple_entities_are_rejected() {
    let result = SourceModel::from_str("#[entity] struct Id(i64);");
    assert!(result.is_err());

    let result = SourceModel::from_str("struct Plain(i64);");
    assert!(result.unwrap().classes().is_empty());
}

#[test]
fn duplicate_struct_names_are_rejected() {
    let result = SourceModel::from_str("struct A {} mod m { struct A {} }");
    assert!(result.is_err());
}
