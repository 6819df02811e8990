// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! # entity-binder
//!
//! Turns persistence attributes on Rust structs into a relational mapping
//! model: tables, columns, keys, constraints, collections, identifier
//! generators and inheritance hierarchies.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::str::FromStr;
//!
//! use entity_binder::{binder::MetadataBuilder, dialect::DatabaseDialect, source::SourceModel};
//!
//! let sources = SourceModel::from_str(
//!     r#"
//!     #[entity]
//!     #[table(name = "orders")]
//!     struct Order {
//!         #[id]
//!         #[generated_value(strategy = "sequence")]
//!         id: i64,
//!
//!         #[many_to_one]
//!         customer: Customer,
//!
//!         #[one_to_many(mapped_by = "order")]
//!         lines: Vec<OrderLine>
//!     }
//!
//!     #[entity]
//!     struct Customer {
//!         #[id]
//!         id: i64
//!     }
//!
//!     #[entity]
//!     struct OrderLine {
//!         #[id]
//!         id: i64,
//!
//!         #[many_to_one]
//!         order: Order
//!     }
//!     "#
//! )
//! .unwrap();
//!
//! let metadata = MetadataBuilder::new()
//!     .dialect(DatabaseDialect::Postgres)
//!     .build(&sources)
//!     .unwrap();
//!
//! let order = metadata.entity("Order").unwrap();
//! let table = metadata.table(order.table);
//! assert!(table.column("customer_id").is_some());
//! assert_eq!(table.foreign_keys().len(), 1);
//! ```
//!
//! ## Two Phases
//!
//! The first pass binds every attribute whose meaning is local to its
//! struct. Anything that needs another entity (join column types, foreign
//! keys, collection keys, generators, filters) is queued as a
//! [`SecondPass`](second_pass::SecondPass) and completed once the whole
//! entity map is known. The result does not depend on declaration order.
//!
//! | Phase | Produces |
//! |-------|----------|
//! | first pass | entities, tables, basic columns, component values, collection shells |
//! | second pass | join columns, foreign keys, primary keys, unique keys, collection tables, generators |
//!
//! ## Module Structure
//!
//! - [`source`] - the attribute source model parsed with `syn`
//! - [`binder`] - first-pass binders and [`MetadataBuilder`](binder::MetadataBuilder)
//! - [`second_pass`] - deferred work and its queue
//! - [`model`] - the produced mapping model
//! - [`dialect`], [`naming`], [`config`] - collaborators
//! - [`error`] - [`BindError`] and its [`ErrorKind`](error::ErrorKind)

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod binder;
pub mod config;
pub mod dialect;
pub mod error;
pub mod model;
pub mod naming;
pub mod second_pass;
pub mod source;

pub use binder::{BuildingContext, MetadataBuilder};
pub use config::BindingOptions;
pub use error::{BindError, ErrorKind, Result};
pub use model::MetadataCollector;
pub use source::SourceModel;
