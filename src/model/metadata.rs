// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! The metadata collector and its registries.
//!
//! [`MetadataCollector`] is the single shared, mutable state of a bind. It
//! owns the database namespace, the value and collection arenas, the entity
//! map keyed by entity name, the global registries (generators, filter
//! definitions, fetch profiles, named entity graphs) and the second-pass
//! queue.
//!
//! # Lifecycle
//!
//! 1. First pass: binders add entities, values, collections and tables and
//!    enqueue second passes with [`MetadataCollector::add_second_pass`].
//! 2. [`MetadataCollector::process_second_passes`] drains the queue in waves.
//!    No second pass adds an entity; the entity map is complete before the
//!    first wave runs.

use std::collections::BTreeMap;

use darling::FromMeta;
use tracing::{debug, trace};

use super::{
    collection::{Collection, CollectionId},
    entity::PersistentClass,
    generator::GlobalGenerator,
    table::{Column, Database, Table, TableId},
    value::{Property, SimpleValue, ValueId, ValueKind}
};
use crate::{
    binder::BuildingContext,
    error::{BindError, Result},
    second_pass::{Progress, SecondPass, SecondPassHandle, SecondPassQueue}
};

/// A filter definition (`filter_def`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterDefinition {
    /// Filter name.
    pub name: String,

    /// Condition used by references without their own.
    pub default_condition: Option<String>,

    /// Parameter name → type name.
    pub parameters: BTreeMap<String, String>,

    /// Applied when loading by key.
    pub apply_to_load_by_key: bool
}

/// A filter applied to an entity or collection, with its resolved condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterReference {
    /// Filter name.
    pub name: String,

    /// Effective condition.
    pub condition: String
}

/// Fetch mode of a fetch profile override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    /// Join fetch.
    #[default]
    Join,

    /// Separate select.
    Select,

    /// Subselect fetch.
    Subselect
}

impl FromMeta for FetchMode {
    fn from_string(value: &str) -> darling::Result<Self> {
        match value.to_lowercase().as_str() {
            "join" => Ok(Self::Join),
            "select" => Ok(Self::Select),
            "subselect" => Ok(Self::Subselect),
            _ => Err(darling::Error::unknown_value(value))
        }
    }
}

/// One association override in a fetch profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOverride {
    /// Entity name.
    pub entity: String,

    /// Association property.
    pub association: String,

    /// Fetch mode.
    pub mode: FetchMode
}

/// A fetch profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchProfile {
    /// Profile name.
    pub name: String,

    /// Resolved overrides.
    pub overrides: Vec<FetchOverride>
}

/// A named entity graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedEntityGraph {
    /// Graph name.
    pub name: String,

    /// Root entity name.
    pub entity: String,

    /// Attribute nodes.
    pub attribute_nodes: Vec<String>
}

/// Shared, mutable state of one bind.
#[derive(Debug, Default)]
pub struct MetadataCollector {
    database:       Database,
    entities:       BTreeMap<String, PersistentClass>,
    values:         Vec<SimpleValue>,
    collections:    Vec<Collection>,
    generators:     BTreeMap<String, GlobalGenerator>,
    filter_defs:    BTreeMap<String, FilterDefinition>,
    fetch_profiles: BTreeMap<String, FetchProfile>,
    entity_graphs:  BTreeMap<String, NamedEntityGraph>,
    second_passes:  SecondPassQueue
}

impl MetadataCollector {
    /// Create an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The database namespace.
    #[must_use]
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Mutable database namespace.
    pub fn database_mut(&mut self) -> &mut Database {
        &mut self.database
    }

    /// Add (or reuse) a table.
    pub fn add_table(&mut self, table: Table) -> TableId {
        self.database.add_table(table)
    }

    /// Table by id.
    #[must_use]
    pub fn table(&self, id: TableId) -> &Table {
        self.database.table(id)
    }

    /// Mutable table by id.
    pub fn table_mut(&mut self, id: TableId) -> &mut Table {
        self.database.table_mut(id)
    }

    /// Register an entity.
    ///
    /// # Errors
    ///
    /// Entity names and JPA entity names are unique.
    pub fn add_entity(&mut self, entity: PersistentClass) -> Result<()> {
        if self.entities.contains_key(&entity.entity_name)
            || self.resolve_entity_name(&entity.jpa_entity_name).is_some()
        {
            return Err(BindError::mapping(format!(
                "duplicate entity name '{}'",
                entity.jpa_entity_name
            )));
        }
        trace!(entity = %entity.entity_name, "registered entity");
        self.entities.insert(entity.entity_name.clone(), entity);
        Ok(())
    }

    /// Entity by entity name.
    #[must_use]
    pub fn entity(&self, name: &str) -> Option<&PersistentClass> {
        self.entities.get(name)
    }

    /// Mutable entity by entity name.
    pub fn entity_mut(&mut self, name: &str) -> Option<&mut PersistentClass> {
        self.entities.get_mut(name)
    }

    /// All entities keyed by entity name.
    #[must_use]
    pub fn entities(&self) -> &BTreeMap<String, PersistentClass> {
        &self.entities
    }

    /// Resolve an entity or JPA entity name to the entity name.
    #[must_use]
    pub fn resolve_entity_name(&self, name: &str) -> Option<&str> {
        if let Some((key, _)) = self.entities.get_key_value(name) {
            return Some(key);
        }
        self.entities
            .values()
            .find(|e| e.jpa_entity_name == name)
            .map(|e| e.entity_name.as_str())
    }

    /// Root of the hierarchy `name` belongs to.
    #[must_use]
    pub fn root_entity(&self, name: &str) -> Option<&PersistentClass> {
        let mut current = self.entities.get(name)?;
        while let Some(parent) = current.superclass.as_deref() {
            current = self.entities.get(parent)?;
        }
        Some(current)
    }

    /// Find a property on an entity or any of its superclasses.
    ///
    /// The identifier property is included.
    #[must_use]
    pub fn find_property(&self, entity: &str, name: &str) -> Option<&Property> {
        let mut current = self.entities.get(entity);
        while let Some(class) = current {
            if let Some(property) = class.property(name) {
                return Some(property);
            }
            if let Some(id) = &class.identifier_property
                && id.name == name
            {
                return Some(id);
            }
            current = class.superclass.as_deref().and_then(|p| self.entities.get(p));
        }
        None
    }

    /// Names of every attribute an entity exposes, inherited ones first.
    #[must_use]
    pub fn attribute_names(&self, entity: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current = self.entities.get(entity);
        while let Some(class) = current {
            chain.push(class);
            current = class.superclass.as_deref().and_then(|p| self.entities.get(p));
        }
        let mut names = Vec::new();
        for class in chain.into_iter().rev() {
            if let Some(id) = &class.identifier_property {
                names.push(id.name.clone());
            }
            names.extend(class.properties.iter().map(|p| p.name.clone()));
        }
        names
    }

    /// Identifier value of the hierarchy root.
    #[must_use]
    pub fn identifier_value(&self, entity: &str) -> Option<ValueId> {
        self.root_entity(entity).and_then(|root| root.identifier)
    }

    /// All subclasses of `entity`, depth first.
    #[must_use]
    pub fn all_subclasses(&self, entity: &str) -> Vec<String> {
        let mut result = Vec::new();
        let mut stack = vec![entity.to_string()];
        while let Some(name) = stack.pop() {
            if let Some(class) = self.entities.get(&name) {
                for sub in class.subclasses.iter().rev() {
                    result.push(sub.clone());
                    stack.push(sub.clone());
                }
            }
        }
        result
    }

    /// Add a value to the arena.
    pub fn add_value(&mut self, value: SimpleValue) -> ValueId {
        self.values.push(value);
        ValueId(self.values.len() - 1)
    }

    /// Value by id.
    #[must_use]
    pub fn value(&self, id: ValueId) -> &SimpleValue {
        &self.values[id.0]
    }

    /// Mutable value by id.
    pub fn value_mut(&mut self, id: ValueId) -> &mut SimpleValue {
        &mut self.values[id.0]
    }

    /// Number of values created so far.
    #[must_use]
    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    /// Whether a value and everything nested in it has its columns.
    #[must_use]
    pub fn is_value_resolved(&self, id: ValueId) -> bool {
        let value = self.value(id);
        match &value.kind {
            ValueKind::Component(component) => {
                !value.selectables.is_empty()
                    && component
                        .properties
                        .iter()
                        .filter_map(Property::simple_value)
                        .all(|nested| self.is_value_resolved(nested))
            }
            ValueKind::ToOne(to_one) if to_one.inverse => true,
            _ => !value.is_deferred()
        }
    }

    /// Whether any value mapped to `table` still waits for its columns.
    #[must_use]
    pub fn has_deferred_values(&self, table: TableId) -> bool {
        (0..self.values.len())
            .map(ValueId)
            .any(|id| self.values[id.0].table == table && !self.is_value_resolved(id))
    }

    /// Primary key of the table an entity's rows live in.
    ///
    /// Joined and table-per-class subclasses use their own key; single-table
    /// subclasses use the root identifier. `None` while the key is deferred.
    #[must_use]
    pub fn primary_key_columns(&self, entity: &str) -> Option<(TableId, Vec<Column>)> {
        let class = self.entities.get(entity)?;
        let value = match class.key {
            Some(key) => key,
            None => self.identifier_value(entity)?
        };
        if !self.is_value_resolved(value) {
            return None;
        }
        let value = self.value(value);
        let table = self.table(value.table);
        let columns = value
            .column_names()
            .iter()
            .map(|name| table.column(name).cloned())
            .collect::<Option<Vec<_>>>()?;
        Some((value.table, columns))
    }

    /// Add a collection to the arena.
    pub fn add_collection(&mut self, collection: Collection) -> CollectionId {
        self.collections.push(collection);
        CollectionId(self.collections.len() - 1)
    }

    /// Collection by id.
    #[must_use]
    pub fn collection(&self, id: CollectionId) -> &Collection {
        &self.collections[id.0]
    }

    /// Mutable collection by id.
    pub fn collection_mut(&mut self, id: CollectionId) -> &mut Collection {
        &mut self.collections[id.0]
    }

    /// All collections.
    #[must_use]
    pub fn collections(&self) -> &[Collection] {
        &self.collections
    }

    /// Collection by role (`Owner.property`).
    #[must_use]
    pub fn collection_by_role(&self, role: &str) -> Option<&Collection> {
        self.collections.iter().find(|c| c.role == role)
    }

    /// Register a global generator.
    ///
    /// Registering an identical definition twice is allowed.
    ///
    /// # Errors
    ///
    /// A different definition under a name already in use.
    pub fn add_global_generator(&mut self, generator: GlobalGenerator) -> Result<()> {
        let name = generator.definition.name.clone();
        if let Some(existing) = self.generators.get(&name) {
            if *existing == generator {
                return Ok(());
            }
            return Err(BindError::mapping(format!(
                "duplicate generator name '{name}' with a different definition"
            )));
        }
        debug!(generator = %name, kind = ?generator.kind, "registered global generator");
        self.generators.insert(name, generator);
        Ok(())
    }

    /// Global generator by exact name.
    #[must_use]
    pub fn global_generator(&self, name: &str) -> Option<&GlobalGenerator> {
        self.generators.get(name)
    }

    /// All global generators.
    #[must_use]
    pub fn global_generators(&self) -> &BTreeMap<String, GlobalGenerator> {
        &self.generators
    }

    /// Register a filter definition.
    ///
    /// # Errors
    ///
    /// Filter names are unique.
    pub fn add_filter_definition(&mut self, definition: FilterDefinition) -> Result<()> {
        if self.filter_defs.contains_key(&definition.name) {
            return Err(BindError::mapping(format!(
                "duplicate filter definition '{}'",
                definition.name
            )));
        }
        self.filter_defs.insert(definition.name.clone(), definition);
        Ok(())
    }

    /// Filter definition by name.
    #[must_use]
    pub fn filter_definition(&self, name: &str) -> Option<&FilterDefinition> {
        self.filter_defs.get(name)
    }

    /// All filter definitions.
    #[must_use]
    pub fn filter_definitions(&self) -> &BTreeMap<String, FilterDefinition> {
        &self.filter_defs
    }

    /// Register an empty fetch profile unless it exists.
    pub fn add_fetch_profile(&mut self, name: &str) {
        self.fetch_profiles
            .entry(name.to_string())
            .or_insert_with(|| FetchProfile {
                name:      name.to_string(),
                overrides: Vec::new()
            });
    }

    /// Fetch profile by name.
    #[must_use]
    pub fn fetch_profile(&self, name: &str) -> Option<&FetchProfile> {
        self.fetch_profiles.get(name)
    }

    /// Mutable fetch profile by name.
    pub fn fetch_profile_mut(&mut self, name: &str) -> Option<&mut FetchProfile> {
        self.fetch_profiles.get_mut(name)
    }

    /// All fetch profiles.
    #[must_use]
    pub fn fetch_profiles(&self) -> &BTreeMap<String, FetchProfile> {
        &self.fetch_profiles
    }

    /// Register a named entity graph.
    ///
    /// # Errors
    ///
    /// Graph names are unique.
    pub fn add_entity_graph(&mut self, graph: NamedEntityGraph) -> Result<()> {
        if self.entity_graphs.contains_key(&graph.name) {
            return Err(BindError::mapping(format!(
                "duplicate entity graph name '{}'",
                graph.name
            )));
        }
        self.entity_graphs.insert(graph.name.clone(), graph);
        Ok(())
    }

    /// Named entity graph by name.
    #[must_use]
    pub fn entity_graph(&self, name: &str) -> Option<&NamedEntityGraph> {
        self.entity_graphs.get(name)
    }

    /// All named entity graphs.
    #[must_use]
    pub fn entity_graphs(&self) -> &BTreeMap<String, NamedEntityGraph> {
        &self.entity_graphs
    }

    /// Enqueue a second pass.
    pub fn add_second_pass(&mut self, pass: SecondPass) {
        trace!(pass = pass.describe(), "queued second pass");
        self.second_passes.push(pass);
    }

    /// Issue a handle for a foreign key second pass.
    pub fn next_second_pass_handle(&mut self) -> SecondPassHandle {
        self.second_passes.next_handle()
    }

    /// Second passes waiting in the queue.
    #[must_use]
    pub fn pending_second_passes(&self) -> &[SecondPass] {
        self.second_passes.pending()
    }

    /// Drain the second-pass queue in waves until it is empty.
    ///
    /// Passes enqueued during a wave run in a later wave. A pass reporting
    /// [`Progress::Deferred`] is carried over to the next wave.
    ///
    /// # Errors
    ///
    /// The first error raised by any pass, or an unresolved reference when a
    /// wave neither completes a pass nor enqueues a new one.
    pub fn process_second_passes(&mut self, context: &BuildingContext<'_>) -> Result<()> {
        let mut wave = 0_usize;
        loop {
            let batch = self.second_passes.take_wave();
            if batch.is_empty() {
                return Ok(());
            }
            wave += 1;
            let size = batch.len();
            let mut deferred = Vec::new();
            let mut completed = 0_usize;

            for pass in batch {
                match pass.execute(self, context)? {
                    Progress::Done => completed += 1,
                    Progress::Deferred => deferred.push(pass)
                }
            }

            let enqueued = self.second_passes.pending().len();
            debug!(
                wave,
                size,
                completed,
                deferred = deferred.len(),
                enqueued,
                "second pass wave finished"
            );

            if completed == 0
                && enqueued == 0
                && let Some(stuck) = deferred.first()
            {
                return Err(stuck.unresolved_error());
            }
            self.second_passes.requeue(deferred);
        }
    }
}
