// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Annotation source model.
//!
//! This is the inbound introspection facility the binders read from. A
//! [`SourceModel`] is built from Rust source: every `struct` becomes a
//! [`ClassDetails`], every named field a [`MemberDetails`], and the inner
//! attributes of a file (or inline module) its [`PackageDetails`].
//!
//! ```rust,ignore
//! let sources = SourceModel::from_tokens(quote! {
//!     #![sequence_generator(name = "ids", sequence_name = "global_ids")]
//!
//!     #[entity]
//!     #[table(name = "orders")]
//!     struct Order {
//!         #[id]
//!         #[generated_value(strategy = "sequence", generator = "ids")]
//!         id: i64,
//!         #[many_to_one]
//!         customer: Customer
//!     }
//! })?;
//! ```
//!
//! # Lookups
//!
//! Every element implements [`AnnotationTarget`]:
//!
//! | Method | Returns |
//! |--------|---------|
//! | [`direct`](AnnotationTarget::direct) | first attribute with the name |
//! | [`repeated`](AnnotationTarget::repeated) | every attribute with the name |
//! | [`has`](AnnotationTarget::has) | presence |
//! | [`parse_direct`](AnnotationTarget::parse_direct) | decoded payload of the first |
//! | [`parse_repeated`](AnnotationTarget::parse_repeated) | decoded payloads of all |
//! | [`string_argument`](AnnotationTarget::string_argument) | `attr("..")` argument |
//! | [`meta_annotated`](AnnotationTarget::meta_annotated) | first attribute registered as a generator type |
//!
//! Rust has no meta-annotations. "Annotated with `@IdGeneratorType`" becomes
//! "registered in the [`GeneratorTypeRegistry`]".

pub mod attrs;
mod field_type;

use std::{collections::BTreeMap, str::FromStr};

use darling::FromMeta;
use proc_macro2::TokenStream;
use syn::{AttrStyle, Attribute, Fields, Item, LitInt, LitStr, Meta, Type};

pub use self::field_type::{FieldType, PluralContainer, is_primitive};
use crate::error::{BindError, Result};

/// Position of a member inside a [`SourceModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemberRef {
    /// Class index.
    pub class:  usize,
    /// Member index within the class.
    pub member: usize
}

/// One attribute usage.
#[derive(Debug, Clone)]
pub struct AnnotationUsage {
    name: String,
    attr: Attribute
}

impl AnnotationUsage {
    fn new(attr: &Attribute) -> Option<Self> {
        let name = attr.path().segments.last()?.ident.to_string();
        Some(Self {
            name,
            attr: attr.clone()
        })
    }

    /// Attribute name (last path segment).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Underlying attribute.
    #[must_use]
    pub fn attribute(&self) -> &Attribute {
        &self.attr
    }

    /// Whether the attribute is a bare word (`#[id]`).
    #[must_use]
    pub fn is_word(&self) -> bool {
        matches!(self.attr.meta, Meta::Path(_))
    }

    /// Decode the payload. A bare word decodes to `T::default()`.
    ///
    /// # Errors
    ///
    /// Payloads that do not match `T`.
    pub fn parse<T: FromMeta + Default>(&self) -> Result<T> {
        match &self.attr.meta {
            Meta::Path(_) => Ok(T::default()),
            meta => Ok(T::from_meta(meta)?)
        }
    }

    /// Decode a single string argument: `attr("..")`.
    ///
    /// # Errors
    ///
    /// Anything but exactly one string literal.
    pub fn string_argument(&self) -> Result<String> {
        Ok(self.attr.parse_args::<LitStr>()?.value())
    }

    /// Decode an optional string argument: `attr` or `attr("..")`.
    ///
    /// # Errors
    ///
    /// A list that is not one string literal.
    pub fn optional_string_argument(&self) -> Result<Option<String>> {
        if self.is_word() {
            return Ok(None);
        }
        self.string_argument().map(Some)
    }

    /// Decode a single integer argument: `attr(1)`.
    ///
    /// # Errors
    ///
    /// Anything but exactly one integer literal.
    pub fn int_argument(&self) -> Result<i64> {
        Ok(self.attr.parse_args::<LitInt>()?.base10_parse()?)
    }
}

/// Maps attribute names to custom identifier generator implementations.
///
/// ```rust,ignore
/// let registry = GeneratorTypeRegistry::default().with("snowflake_id", "SnowflakeGenerator");
/// ```
#[derive(Debug, Clone, Default)]
pub struct GeneratorTypeRegistry {
    types: BTreeMap<String, String>
}

impl GeneratorTypeRegistry {
    /// Register `attribute` as producing `implementation`.
    pub fn register(&mut self, attribute: impl Into<String>, implementation: impl Into<String>) {
        self.types.insert(attribute.into(), implementation.into());
    }

    /// Builder-style [`register`](Self::register).
    #[must_use]
    pub fn with(mut self, attribute: impl Into<String>, implementation: impl Into<String>) -> Self {
        self.register(attribute, implementation);
        self
    }

    /// Implementation registered for `attribute`.
    #[must_use]
    pub fn lookup(&self, attribute: &str) -> Option<&str> {
        self.types.get(attribute).map(String::as_str)
    }
}

/// Something that carries attributes.
pub trait AnnotationTarget {
    /// Attributes in source order.
    fn annotations(&self) -> &[AnnotationUsage];

    /// Human-readable location for error messages.
    fn location(&self) -> String;

    /// First attribute named `name`.
    fn direct(&self, name: &str) -> Option<&AnnotationUsage> {
        self.annotations().iter().find(|a| a.name == name)
    }

    /// Every attribute named `name`.
    fn repeated(&self, name: &str) -> Vec<&AnnotationUsage> {
        self.annotations().iter().filter(|a| a.name == name).collect()
    }

    /// Whether an attribute named `name` is present.
    fn has(&self, name: &str) -> bool {
        self.direct(name).is_some()
    }

    /// Decode the first attribute named `name`.
    ///
    /// # Errors
    ///
    /// Payloads that do not match `T`.
    fn parse_direct<T: FromMeta + Default>(&self, name: &str) -> Result<Option<T>> {
        self.direct(name).map(AnnotationUsage::parse).transpose()
    }

    /// Decode every attribute named `name`.
    ///
    /// # Errors
    ///
    /// Payloads that do not match `T`.
    fn parse_repeated<T: FromMeta + Default>(&self, name: &str) -> Result<Vec<T>> {
        self.repeated(name)
            .into_iter()
            .map(AnnotationUsage::parse)
            .collect()
    }

    /// String argument of the first attribute named `name`.
    ///
    /// # Errors
    ///
    /// The attribute is present but does not hold one string literal.
    fn string_argument(&self, name: &str) -> Result<Option<String>> {
        self.direct(name)
            .map(AnnotationUsage::string_argument)
            .transpose()
    }

    /// First attribute registered as a generator type, with its implementation.
    fn meta_annotated<'r>(
        &self,
        registry: &'r GeneratorTypeRegistry
    ) -> Option<(&AnnotationUsage, &'r str)> {
        self.annotations()
            .iter()
            .find_map(|a| registry.lookup(&a.name).map(|implementation| (a, implementation)))
    }
}

/// Inner attributes of a source file or inline module.
#[derive(Debug, Clone)]
pub struct PackageDetails {
    name:        String,
    annotations: Vec<AnnotationUsage>
}

impl PackageDetails {
    /// Package name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl AnnotationTarget for PackageDetails {
    fn annotations(&self) -> &[AnnotationUsage] {
        &self.annotations
    }

    fn location(&self) -> String {
        format!("package {}", self.name)
    }
}

/// A named field of a struct.
#[derive(Debug, Clone)]
pub struct MemberDetails {
    name:            String,
    declaring_class: String,
    ty:              Type,
    field_type:      FieldType,
    annotations:     Vec<AnnotationUsage>
}

impl MemberDetails {
    /// Field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the declaring struct.
    #[must_use]
    pub fn declaring_class(&self) -> &str {
        &self.declaring_class
    }

    /// Declared type.
    #[must_use]
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    /// Classified type shape.
    #[must_use]
    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }
}

impl AnnotationTarget for MemberDetails {
    fn annotations(&self) -> &[AnnotationUsage] {
        &self.annotations
    }

    fn location(&self) -> String {
        format!("{}.{}", self.declaring_class, self.name)
    }
}

/// A struct.
#[derive(Debug, Clone)]
pub struct ClassDetails {
    name:        String,
    package:     usize,
    annotations: Vec<AnnotationUsage>,
    members:     Vec<MemberDetails>
}

impl ClassDetails {
    /// Struct name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Index of the package this struct was declared in.
    #[must_use]
    pub fn package_index(&self) -> usize {
        self.package
    }

    /// Named fields in declaration order.
    #[must_use]
    pub fn members(&self) -> &[MemberDetails] {
        &self.members
    }

    /// Field by name.
    #[must_use]
    pub fn member(&self, name: &str) -> Option<&MemberDetails> {
        self.members.iter().find(|m| m.name == name)
    }

    /// Whether this struct is an entity.
    #[must_use]
    pub fn is_entity(&self) -> bool {
        self.has("entity")
    }

    /// Whether this struct is an embeddable.
    #[must_use]
    pub fn is_embeddable(&self) -> bool {
        self.has("embeddable")
    }
}

impl AnnotationTarget for ClassDetails {
    fn annotations(&self) -> &[AnnotationUsage] {
        &self.annotations
    }

    fn location(&self) -> String {
        self.name.clone()
    }
}

/// Every struct, field and package attribute the binders can see.
#[derive(Debug, Clone, Default)]
pub struct SourceModel {
    packages: Vec<PackageDetails>,
    classes:  Vec<ClassDetails>
}

impl SourceModel {
    /// Create an empty model.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a model from one parsed file.
    ///
    /// # Errors
    ///
    /// See [`add_file`](Self::add_file).
    pub fn from_file(file: &syn::File) -> Result<Self> {
        let mut model = Self::new();
        model.add_file("crate", file)?;
        Ok(model)
    }

    /// Build a model from a token stream holding file contents.
    ///
    /// # Errors
    ///
    /// Tokens that do not parse as a file.
    pub fn from_tokens(tokens: TokenStream) -> Result<Self> {
        let file: syn::File = syn::parse2(tokens)?;
        Self::from_file(&file)
    }

    /// Add the structs of one file under a package name.
    ///
    /// Inline modules become packages of their own, named `package::module`.
    ///
    /// # Errors
    ///
    /// Tuple structs marked as entities or embeddables, and duplicate
    /// struct names.
    pub fn add_file(&mut self, package: impl Into<String>, file: &syn::File) -> Result<()> {
        self.add_items(package.into(), &file.attrs, &file.items)
    }

    fn add_items(&mut self, package: String, attrs: &[Attribute], items: &[Item]) -> Result<()> {
        let package_index = self.packages.len();
        self.packages.push(PackageDetails {
            name:        package.clone(),
            annotations: usages(attrs.iter().filter(|a| matches!(a.style, AttrStyle::Inner(_))))
        });

        for item in items {
            match item {
                Item::Struct(item) => self.add_struct(package_index, item)?,
                Item::Mod(module) => {
                    if let Some((_, content)) = &module.content {
                        let name = format!("{package}::{}", module.ident);
                        self.add_items(name, &module.attrs, content)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn add_struct(&mut self, package: usize, item: &syn::ItemStruct) -> Result<()> {
        let name = item.ident.to_string();
        if self.class(&name).is_some() {
            return Err(BindError::annotation(&name, "struct declared twice"));
        }
        let annotations = usages(item.attrs.iter());

        let members = match &item.fields {
            Fields::Named(fields) => fields
                .named
                .iter()
                .filter_map(|field| {
                    let ident = field.ident.as_ref()?;
                    Some(MemberDetails {
                        name:            ident.to_string(),
                        declaring_class: name.clone(),
                        ty:              field.ty.clone(),
                        field_type:      FieldType::classify(&field.ty),
                        annotations:     usages(field.attrs.iter())
                    })
                })
                .collect(),
            Fields::Unit => Vec::new(),
            Fields::Unnamed(_) => {
                if annotations
                    .iter()
                    .any(|a| a.name == "entity" || a.name == "embeddable")
                {
                    return Err(BindError::annotation(
                        &name,
                        "tuple structs cannot be mapped; use named fields"
                    ));
                }
                return Ok(());
            }
        };

        self.classes.push(ClassDetails {
            name,
            package,
            annotations,
            members
        });
        Ok(())
    }

    /// All packages.
    #[must_use]
    pub fn packages(&self) -> &[PackageDetails] {
        &self.packages
    }

    /// Package by index.
    #[must_use]
    pub fn package(&self, index: usize) -> Option<&PackageDetails> {
        self.packages.get(index)
    }

    /// All structs in declaration order.
    #[must_use]
    pub fn classes(&self) -> &[ClassDetails] {
        &self.classes
    }

    /// Struct by name.
    #[must_use]
    pub fn class(&self, name: &str) -> Option<&ClassDetails> {
        self.classes.iter().find(|c| c.name == name)
    }

    /// Index of a struct by name.
    #[must_use]
    pub fn class_index(&self, name: &str) -> Option<usize> {
        self.classes.iter().position(|c| c.name == name)
    }

    /// Struct by index.
    #[must_use]
    pub fn class_at(&self, index: usize) -> Option<&ClassDetails> {
        self.classes.get(index)
    }

    /// Member by reference.
    #[must_use]
    pub fn member(&self, at: MemberRef) -> Option<&MemberDetails> {
        self.classes.get(at.class)?.members.get(at.member)
    }

    /// Reference to a member by struct and field name.
    #[must_use]
    pub fn member_ref(&self, class: &str, member: &str) -> Option<MemberRef> {
        let class_index = self.class_index(class)?;
        let member_index = self.classes[class_index]
            .members
            .iter()
            .position(|m| m.name == member)?;
        Some(MemberRef {
            class:  class_index,
            member: member_index
        })
    }

    /// Package a struct was declared in.
    #[must_use]
    pub fn package_of(&self, class: &ClassDetails) -> Option<&PackageDetails> {
        self.packages.get(class.package)
    }
}

impl FromStr for SourceModel {
    type Err = BindError;

    fn from_str(source: &str) -> Result<Self> {
        let file = syn::parse_file(source)?;
        Self::from_file(&file)
    }
}

fn usages<'a>(attrs: impl Iterator<Item = &'a Attribute>) -> Vec<AnnotationUsage> {
    attrs
        .filter(|a| !a.path().is_ident("doc"))
        .filter_map(AnnotationUsage::new)
        .collect()
}

#[cfg(test)]
mod tests;
