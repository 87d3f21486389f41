//! Query descriptors for system data access declarations.
//!
//! A [`Query`] declares which component types a system reads, writes, and
//! requires or excludes the presence of, plus any relation-shaped access.
//! Systems declare queries at registration time; the scheduler uses them to
//! build the read/write dependency graph that determines execution order,
//! and the world uses them to match archetype nodes and bind runtime
//! arguments.

use serde::{Deserialize, Serialize};

use crate::component::ComponentId;
use crate::entity::Entity;
use crate::relation::RelationId;

/// A single non-relation term in a query's component access list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Term {
    /// Read-only access to a component's value.
    Read(ComponentId),
    /// Mutable access to a component's value.
    Write(ComponentId),
    /// Require the component's presence without reading its value.
    Has(ComponentId),
    /// Require the component's absence.
    Not(ComponentId),
    /// Fetch the matched entity's own id, no component access.
    Entity,
}

/// The object side of a relation term: a specific entity, or a wildcard
/// matching the relation against any object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationObject {
    /// Match this relation against any object.
    Any,
    /// Match this relation against exactly this object.
    Exact(Entity),
}

/// A relation-shaped term: require (or exclude) a `(relation, object)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationTerm {
    pub relation: RelationId,
    pub object: RelationObject,
    /// `false` turns this into an exclusion (no matching relation instance).
    pub required: bool,
}

/// A relational join between two queries: for each entity matched on the
/// left, iterate the right side restricted to the objects (or subjects)
/// connected to it by `relation`. `relation: None` performs a plain cross
/// join with no relation filtering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Join {
    pub relation: Option<RelationId>,
    pub right: Box<Query>,
}

/// A fully assembled query: the component terms, relation terms, optional
/// join, edge-triggered `In`/`Out` windows, and the `unique` cardinality
/// constraint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Query {
    /// Plain component terms (`Read`/`Write`/`Has`/`Not`/`Entity`).
    pub terms: Vec<Term>,
    /// Relation terms.
    pub relations: Vec<RelationTerm>,
    /// An optional join against a second query.
    pub join: Option<Join>,
    /// Components that must have been written (added or set) this tick to
    /// match — an edge-triggered "entered" filter.
    pub entered: Vec<ComponentId>,
    /// Components that must have been removed this tick to match — an
    /// edge-triggered "left" filter.
    pub left: Vec<ComponentId>,
    /// If `true`, the query is expected to match at most one entity; the
    /// world returns an error rather than silently picking one of several.
    pub unique: bool,
}

impl Query {
    /// Start building an empty query.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a read-only component requirement.
    #[must_use]
    pub fn read(mut self, id: ComponentId) -> Self {
        self.terms.push(Term::Read(id));
        self
    }

    /// Add a mutable component requirement.
    #[must_use]
    pub fn write(mut self, id: ComponentId) -> Self {
        self.terms.push(Term::Write(id));
        self
    }

    /// Require a component's presence without reading its value.
    #[must_use]
    pub fn has(mut self, id: ComponentId) -> Self {
        self.terms.push(Term::Has(id));
        self
    }

    /// Require a component's absence.
    #[must_use]
    pub fn not(mut self, id: ComponentId) -> Self {
        self.terms.push(Term::Not(id));
        self
    }

    /// Fetch the matched entity's own id.
    #[must_use]
    pub fn entity(mut self) -> Self {
        self.terms.push(Term::Entity);
        self
    }

    /// Require a relation instance against a specific object (or any
    /// object, with [`RelationObject::Any`]).
    #[must_use]
    pub fn relation(mut self, relation: RelationId, object: RelationObject) -> Self {
        self.relations.push(RelationTerm {
            relation,
            object,
            required: true,
        });
        self
    }

    /// Exclude entities holding a relation instance against a specific
    /// object (or any object).
    #[must_use]
    pub fn without_relation(mut self, relation: RelationId, object: RelationObject) -> Self {
        self.relations.push(RelationTerm {
            relation,
            object,
            required: false,
        });
        self
    }

    /// Join this query's matches against `right`, restricted by `relation`
    /// when given.
    #[must_use]
    pub fn join(mut self, relation: Option<RelationId>, right: Query) -> Self {
        self.join = Some(Join {
            relation,
            right: Box::new(right),
        });
        self
    }

    /// Match only entities where `id` was written (added or set) this tick.
    #[must_use]
    pub fn entered(mut self, id: ComponentId) -> Self {
        self.entered.push(id);
        self
    }

    /// Match only entities where `id` was removed this tick.
    #[must_use]
    pub fn left(mut self, id: ComponentId) -> Self {
        self.left.push(id);
        self
    }

    /// Mark the query as expecting at most one match.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Component ids read by this query: `Read` terms and `Has` terms alike
    /// — a system declaring `Has(C)` still observes whether `C` is present,
    /// so it must be ordered after whatever writes `C` just as a `Read(C)`
    /// system would. Used by the scheduler to build the read/write
    /// dependency graph (writer-order plus writers-before-readers edges).
    #[must_use]
    pub fn reads(&self) -> Vec<ComponentId> {
        self.terms
            .iter()
            .filter_map(|t| match t {
                Term::Read(id) | Term::Has(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    /// Component ids written (mutably) by this query.
    #[must_use]
    pub fn writes(&self) -> Vec<ComponentId> {
        self.terms
            .iter()
            .filter_map(|t| match t {
                Term::Write(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    /// All component ids this query requires to be present (`Read`,
    /// `Write`, `Has`), used to match archetype nodes.
    #[must_use]
    pub fn required(&self) -> Vec<ComponentId> {
        self.terms
            .iter()
            .filter_map(|t| match t {
                Term::Read(id) | Term::Write(id) | Term::Has(id) => Some(*id),
                Term::Not(_) | Term::Entity => None,
            })
            .collect()
    }

    /// All component ids this query requires to be absent (`Not`).
    #[must_use]
    pub fn excluded(&self) -> Vec<ComponentId> {
        self.terms
            .iter()
            .filter_map(|t| match t {
                Term::Not(id) => Some(*id),
                _ => None,
            })
            .collect()
    }
}
