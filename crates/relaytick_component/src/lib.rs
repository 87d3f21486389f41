//! # relaytick_component
//!
//! The "C" in ECS — entity identifiers, the component and relation
//! registries, the sparse containers they're built from, the archetype
//! graph entities are classified under, and the declarative query
//! descriptors systems use to ask for data.
//!
//! This crate provides:
//!
//! - [`Entity`]/[`Domain`] — packed 32-bit entity identifiers.
//! - [`Component`]/[`ComponentRegistry`] — the component contract and its
//!   registration-order id assignment.
//! - [`Relation`]/[`RelationRegistry`] — relation types and their
//!   per-`(relation, object)` virtual component ids.
//! - [`SparseMap`]/[`SparseSet`] — the sparse-set primitive everything
//!   above is built from.
//! - [`ArchetypeGraph`]/[`ArchetypeNode`] — structural classification of
//!   entities by component set.
//! - [`Query`] — declarative data access requirements for systems.

pub mod archetype;
pub mod component;
pub mod entity;
pub mod query;
pub mod relation;
pub mod sparse;

pub use archetype::{ArchetypeGraph, ArchetypeId, ArchetypeNode};
pub use component::{Component, ComponentError, ComponentId, ComponentMeta, ComponentRecord, ComponentRegistry};
pub use entity::{Domain, Entity, EntityAllocator};
pub use query::{Join, Query, RelationObject, RelationTerm, Term};
pub use relation::{Relation, RelationId, RelationRegistry};
pub use sparse::{SparseMap, SparseSet};
