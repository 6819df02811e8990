// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Deferred binding work.
//!
//! First-pass binders cannot finish everything: a foreign key needs the
//! referenced entity's primary key, a collection needs both ends, a named
//! generator needs every global registration. Such work is captured in a
//! [`SecondPass`] and appended to the [`SecondPassQueue`] owned by the
//! [`MetadataCollector`](crate::model::MetadataCollector).
//!
//! # Draining
//!
//! The queue drains in waves. Each wave takes a snapshot of the pending
//! passes and runs them; passes enqueued while a wave runs wait for the next
//! wave. A pass whose inputs are not resolved yet reports
//! [`Progress::Deferred`] and is carried over. A wave that completes nothing
//! and enqueues nothing stops the bind with the first stuck pass's
//! unresolved-reference error.
//!
//! # Kinds
//!
//! | Variant | Completes |
//! |---------|-----------|
//! | [`SecondPass::ForeignKey`] | to-one columns, subclass keys, `maps_id` |
//! | [`SecondPass::Collection`] | collection key, element, index, identifier |
//! | [`SecondPass::IdGenerator`] | entity identifier generator |
//! | [`SecondPass::IdBagIdGenerator`] | idbag identifier generator |
//! | [`SecondPass::PrimaryKey`] | root table primary key |
//! | [`SecondPass::UniqueKey`] | declared unique constraints |
//! | [`SecondPass::NaturalIdUniqueKey`] | natural id unique key |
//! | [`SecondPass::Discriminator`] | discriminator values and check |
//! | [`SecondPass::NullableDiscriminator`] | discriminator nullability |
//! | [`SecondPass::Filter`] | filter conditions |
//! | [`SecondPass::FetchOverride`] | fetch profile overrides |
//! | [`SecondPass::NamedGraph`] | named entity graphs |
//! | [`SecondPass::AggregateComponent`] | struct columns and user-defined types |
//! | [`SecondPass::AnyDiscriminatorValues`] | `any` discriminator mappings |
//! | [`SecondPass::InverseOneToOne`] | `mapped_by` one-to-one validation |

mod collection;
mod constraint;
mod fk;
mod generator;
mod metadata;

pub use self::{
    collection::{CollectionIdSpec, CollectionSecondPass, CollectionTarget, IndexSpec, JoinTableSpec},
    constraint::{
        DiscriminatorSecondPass, NaturalIdUniqueKeySecondPass, NullableDiscriminatorSecondPass,
        PrimaryKeySecondPass, UniqueKeySecondPass
    },
    fk::{FkKind, FkSecondPass},
    generator::{IdBagIdGeneratorSecondPass, IdGeneratorSecondPass},
    metadata::{
        AggregateComponentSecondPass, AnyDiscriminatorValuesSecondPass, FetchOverrideSecondPass,
        FilterSecondPass, FilterTarget, InverseOneToOneSecondPass, NamedGraphSecondPass
    }
};
use crate::{
    binder::BuildingContext,
    error::{BindError, Result},
    model::MetadataCollector
};

/// Identity of a queued foreign key pass.
///
/// Issued by the queue from a counter; two passes are the same pass only if
/// their handles are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SecondPassHandle(u64);

impl SecondPassHandle {
    /// Numeric value.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Outcome of running a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// The pass finished.
    Done,

    /// Inputs are not resolved yet; run again in the next wave.
    Deferred
}

/// One unit of deferred work.
#[derive(Debug, Clone)]
pub enum SecondPass {
    /// Foreign key columns and constraints.
    ForeignKey(FkSecondPass),

    /// Collection completion.
    Collection(CollectionSecondPass),

    /// Entity identifier generator.
    IdGenerator(IdGeneratorSecondPass),

    /// Idbag identifier generator.
    IdBagIdGenerator(IdBagIdGeneratorSecondPass),

    /// Root primary key.
    PrimaryKey(PrimaryKeySecondPass),

    /// Declared unique constraint.
    UniqueKey(UniqueKeySecondPass),

    /// Natural id unique key.
    NaturalIdUniqueKey(NaturalIdUniqueKeySecondPass),

    /// Discriminator values and check constraint.
    Discriminator(DiscriminatorSecondPass),

    /// Discriminator nullability.
    NullableDiscriminator(NullableDiscriminatorSecondPass),

    /// Filter condition.
    Filter(FilterSecondPass),

    /// Fetch profile override.
    FetchOverride(FetchOverrideSecondPass),

    /// Named entity graph.
    NamedGraph(NamedGraphSecondPass),

    /// Struct columns and user-defined type.
    AggregateComponent(AggregateComponentSecondPass),

    /// `any` discriminator values.
    AnyDiscriminatorValues(AnyDiscriminatorValuesSecondPass),

    /// Inverse one-to-one.
    InverseOneToOne(InverseOneToOneSecondPass)
}

macro_rules! second_pass_from {
    ($($variant:ident($pass:ty)),+) => {
        $(
            impl From<$pass> for SecondPass {
                fn from(pass: $pass) -> Self {
                    Self::$variant(pass)
                }
            }
        )+
    };
}

second_pass_from!(
    ForeignKey(FkSecondPass),
    Collection(CollectionSecondPass),
    IdGenerator(IdGeneratorSecondPass),
    IdBagIdGenerator(IdBagIdGeneratorSecondPass),
    PrimaryKey(PrimaryKeySecondPass),
    UniqueKey(UniqueKeySecondPass),
    NaturalIdUniqueKey(NaturalIdUniqueKeySecondPass),
    Discriminator(DiscriminatorSecondPass),
    NullableDiscriminator(NullableDiscriminatorSecondPass),
    Filter(FilterSecondPass),
    FetchOverride(FetchOverrideSecondPass),
    NamedGraph(NamedGraphSecondPass),
    AggregateComponent(AggregateComponentSecondPass),
    AnyDiscriminatorValues(AnyDiscriminatorValuesSecondPass),
    InverseOneToOne(InverseOneToOneSecondPass)
);

impl SecondPass {
    /// Run the pass against the collector.
    ///
    /// # Errors
    ///
    /// Whatever the pass raises; every error aborts the bind.
    pub fn execute(
        &self,
        metadata: &mut MetadataCollector,
        context: &BuildingContext<'_>
    ) -> Result<Progress> {
        match self {
            Self::ForeignKey(pass) => pass.execute(metadata, context),
            Self::Collection(pass) => pass.execute(metadata, context),
            Self::IdGenerator(pass) => pass.execute(metadata, context),
            Self::IdBagIdGenerator(pass) => pass.execute(metadata, context),
            Self::PrimaryKey(pass) => pass.execute(metadata),
            Self::UniqueKey(pass) => pass.execute(metadata, context),
            Self::NaturalIdUniqueKey(pass) => pass.execute(metadata, context),
            Self::Discriminator(pass) => pass.execute(metadata, context),
            Self::NullableDiscriminator(pass) => pass.execute(metadata),
            Self::Filter(pass) => pass.execute(metadata),
            Self::FetchOverride(pass) => pass.execute(metadata),
            Self::NamedGraph(pass) => pass.execute(metadata),
            Self::AggregateComponent(pass) => pass.execute(metadata, context),
            Self::AnyDiscriminatorValues(pass) => pass.execute(metadata),
            Self::InverseOneToOne(pass) => pass.execute(metadata)
        }
    }

    /// Short name for logs.
    #[must_use]
    pub fn describe(&self) -> &'static str {
        match self {
            Self::ForeignKey(pass) => pass.kind().describe(),
            Self::Collection(_) => "collection",
            Self::IdGenerator(_) => "id-generator",
            Self::IdBagIdGenerator(_) => "idbag-id-generator",
            Self::PrimaryKey(_) => "primary-key",
            Self::UniqueKey(_) => "unique-key",
            Self::NaturalIdUniqueKey(_) => "natural-id-unique-key",
            Self::Discriminator(_) => "discriminator",
            Self::NullableDiscriminator(_) => "nullable-discriminator",
            Self::Filter(_) => "filter",
            Self::FetchOverride(_) => "fetch-override",
            Self::NamedGraph(_) => "named-graph",
            Self::AggregateComponent(_) => "aggregate-component",
            Self::AnyDiscriminatorValues(_) => "any-discriminator-values",
            Self::InverseOneToOne(_) => "inverse-one-to-one"
        }
    }

    /// Error reported when the pass is still deferred at the fixed point.
    #[must_use]
    pub fn unresolved_error(&self) -> BindError {
        let (entity, property) = match self {
            Self::ForeignKey(pass) => (pass.entity(), pass.property()),
            Self::Collection(pass) => (pass.owner(), pass.property()),
            Self::IdGenerator(pass) => (pass.entity(), ""),
            Self::IdBagIdGenerator(pass) => (pass.owner(), pass.property()),
            Self::PrimaryKey(pass) => (pass.entity(), ""),
            Self::UniqueKey(pass) => (pass.entity(), ""),
            Self::NaturalIdUniqueKey(pass) => (pass.entity(), ""),
            Self::Discriminator(pass) => (pass.entity(), ""),
            Self::NullableDiscriminator(pass) => (pass.entity(), ""),
            Self::Filter(pass) => (pass.owner(), ""),
            Self::FetchOverride(pass) => (pass.entity(), pass.association()),
            Self::NamedGraph(pass) => (pass.entity(), ""),
            Self::AggregateComponent(pass) => (pass.entity(), pass.property()),
            Self::AnyDiscriminatorValues(pass) => (pass.entity(), pass.property()),
            Self::InverseOneToOne(pass) => (pass.entity(), pass.property())
        };
        BindError::unresolved(
            entity,
            property,
            format!("{} could not be resolved", self.describe())
        )
    }
}

/// Pending second passes plus the handle counter.
#[derive(Debug, Default)]
pub struct SecondPassQueue {
    pending:     Vec<SecondPass>,
    next_handle: u64
}

impl SecondPassQueue {
    /// Issue the next handle.
    pub fn next_handle(&mut self) -> SecondPassHandle {
        let handle = SecondPassHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }

    /// Append a pass.
    pub fn push(&mut self, pass: SecondPass) {
        self.pending.push(pass);
    }

    /// Passes not yet taken by a wave.
    #[must_use]
    pub fn pending(&self) -> &[SecondPass] {
        &self.pending
    }

    /// Take every pending pass for one wave.
    pub fn take_wave(&mut self) -> Vec<SecondPass> {
        std::mem::take(&mut self.pending)
    }

    /// Put deferred passes back in front of those enqueued during the wave.
    pub fn requeue(&mut self, deferred: Vec<SecondPass>) {
        if deferred.is_empty() {
            return;
        }
        let enqueued = std::mem::replace(&mut self.pending, deferred);
        self.pending.extend(enqueued);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ValueId;

    fn fk(queue: &mut SecondPassQueue) -> FkSecondPass {
        FkSecondPass::new(
            queue.next_handle(),
            "Order",
            "customer",
            ValueId(0),
            FkKind::SimpleToOne
        )
    }

    #[test]
    fn handles_are_monotonic() {
        let mut queue = SecondPassQueue::default();
        let a = queue.next_handle();
        let b = queue.next_handle();
        assert!(b > a);
        assert_eq!(b.get(), a.get() + 1);
    }

    #[test]
    fn waves_and_requeue_order() {
        let mut queue = SecondPassQueue::default();
        let first = fk(&mut queue);
        let second = fk(&mut queue);
        queue.push(first.clone().into());
        queue.push(second.clone().into());

        let wave = queue.take_wave();
        assert_eq!(wave.len(), 2);
        assert!(queue.pending().is_empty());

        let late = fk(&mut queue);
        queue.push(late.clone().into());
        queue.requeue(vec![SecondPass::from(second.clone())]);

        let handles: Vec<_> = queue
            .pending()
            .iter()
            .filter_map(|p| match p {
                SecondPass::ForeignKey(fk) => Some(fk.handle()),
                _ => None
            })
            .collect();
        assert_eq!(handles, vec![second.handle(), late.handle()]);
    }

    #[test]
    fn describe_and_unresolved_error() {
        let mut queue = SecondPassQueue::default();
        let pass = SecondPass::from(fk(&mut queue));
        assert_eq!(pass.describe(), "simple-to-one-fk");
        let err = pass.unresolved_error();
        assert_eq!(err.kind(), crate::error::ErrorKind::UnresolvedReference);
        assert!(err.to_string().contains("customer"));
    }

    #[test]
    fn collection_descriptors_are_reachable() {
        let join_table = JoinTableSpec::implicit("Order.tags");
        assert!(join_table.inverse_join_columns.is_implicit());
        assert_eq!(IndexSpec::default().column, None);
        let id = CollectionIdSpec {
            column:    None,
            generator: "sequence".to_string()
        };
        assert_eq!(id.generator, "sequence");
    }
}
