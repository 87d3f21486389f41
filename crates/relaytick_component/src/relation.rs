//! Relations: a component-like definition whose "instance" is a pair
//! `(relation id, object entity)`.
//!
//! Instantiating a relation against an object materialises a **virtual
//! component id** on demand (spec §3/§4.1) — stable per `(relation,
//! object)` pair for the lifetime of the world. Attaching a relation to a
//! subject entity means attaching that virtual component id to the
//! subject's archetype, exactly like any other component. The registry
//! additionally keeps a reverse index (object → subjects) so that
//! destroying an object can fan out and detach the relation from every
//! subject that held it, and a back-index (virtual id → relation/object) so
//! a wildcard query (`Has(Rel)`, any object) can recognise a matching
//! column without knowing the object in advance.

use std::any::TypeId;
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::component::{ComponentId, ComponentRegistry};
use crate::entity::Entity;

/// A dense integer identifier for a registered relation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationId(pub u32);

/// A relation definition. Relations carry no payload of their own — the
/// pair `(relation, object)` *is* the data.
pub trait Relation: 'static {
    /// A human-readable name, used for the virtual component's [`ComponentMeta`](crate::ComponentMeta) name.
    fn name() -> &'static str;
}

/// Maps relation types to [`RelationId`]s and materialises/retires the
/// virtual component ids for `(relation, object)` instances.
#[derive(Default)]
pub struct RelationRegistry {
    by_type: HashMap<TypeId, RelationId>,
    names: Vec<&'static str>,
    /// Forward: (relation, object) -> the virtual component id that stands
    /// in for "has this relation to this object".
    virtual_ids: HashMap<(RelationId, Entity), ComponentId>,
    /// Reverse: (relation, object) -> every subject currently attached.
    reverse: HashMap<(RelationId, Entity), HashSet<Entity>>,
    /// Back-map: virtual component id -> the (relation, object) it encodes.
    back: HashMap<ComponentId, (RelationId, Entity)>,
}

impl RelationRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `R`, returning its [`RelationId`]. Idempotent.
    pub fn register<R: Relation>(&mut self) -> RelationId {
        let type_id = TypeId::of::<R>();
        if let Some(&id) = self.by_type.get(&type_id) {
            return id;
        }
        let id = RelationId(self.names.len() as u32);
        self.names.push(R::name());
        self.by_type.insert(type_id, id);
        id
    }

    /// Look up the id already assigned to `R`, if registered.
    #[must_use]
    pub fn id_of<R: Relation>(&self) -> Option<RelationId> {
        self.by_type.get(&TypeId::of::<R>()).copied()
    }

    /// Get or create the virtual [`ComponentId`] standing in for
    /// `(relation, object)`. Stable for the lifetime of the world.
    pub fn virtual_component(
        &mut self,
        components: &mut ComponentRegistry,
        relation: RelationId,
        object: Entity,
    ) -> ComponentId {
        if let Some(&id) = self.virtual_ids.get(&(relation, object)) {
            return id;
        }
        let name = self.names[relation.0 as usize];
        let id = components.register_virtual(name);
        self.virtual_ids.insert((relation, object), id);
        self.back.insert(id, (relation, object));
        id
    }

    /// Look up the virtual component id already materialised for
    /// `(relation, object)`, without creating one. Used by read-only query
    /// matching, which cannot allocate a fresh id mid-match.
    #[must_use]
    pub fn get_virtual(&self, relation: RelationId, object: Entity) -> Option<ComponentId> {
        self.virtual_ids.get(&(relation, object)).copied()
    }

    /// Record that `subject` now carries the `(relation, object)` virtual
    /// component. Called by the world immediately after it attaches the
    /// virtual component to the subject's archetype.
    pub fn attach(&mut self, relation: RelationId, object: Entity, subject: Entity) {
        self.reverse
            .entry((relation, object))
            .or_default()
            .insert(subject);
    }

    /// Record that `subject` no longer carries the `(relation, object)`
    /// virtual component.
    pub fn detach(&mut self, relation: RelationId, object: Entity, subject: Entity) {
        if let Some(subjects) = self.reverse.get_mut(&(relation, object)) {
            subjects.remove(&subject);
            if subjects.is_empty() {
                self.reverse.remove(&(relation, object));
            }
        }
    }

    /// All subjects currently attached to `(relation, object)`, in
    /// unspecified order.
    pub fn subjects_of(&self, relation: RelationId, object: Entity) -> impl Iterator<Item = Entity> + '_ {
        self.reverse
            .get(&(relation, object))
            .into_iter()
            .flatten()
            .copied()
    }

    /// Recover the `(relation, object)` pair a virtual component id encodes,
    /// if `id` is a relation instance at all.
    #[must_use]
    pub fn decode(&self, id: ComponentId) -> Option<(RelationId, Entity)> {
        self.back.get(&id).copied()
    }

    /// `true` if `id` is a virtual component for `relation`, against any
    /// object — used to match wildcard query terms (`Has(Rel)`).
    #[must_use]
    pub fn is_instance_of(&self, id: ComponentId, relation: RelationId) -> bool {
        matches!(self.back.get(&id), Some((r, _)) if *r == relation)
    }

    /// Fan out the destruction of `object`: for every relation instance
    /// `(relation, object)`, detach it from every subject and forget the
    /// registry state for it.
    ///
    /// Returns `(virtual_component_id, subjects)` pairs; the caller (the
    /// world) is responsible for removing `virtual_component_id` from each
    /// subject's archetype (spec §3: "Destroying an entity also deletes
    /// every relation pair where that entity is the object").
    pub fn fan_out_destroy(&mut self, object: Entity) -> Vec<(ComponentId, Vec<Entity>)> {
        let mut results = Vec::new();
        let keys: Vec<(RelationId, Entity)> = self
            .virtual_ids
            .keys()
            .copied()
            .filter(|(_, obj)| *obj == object)
            .collect();

        for key in keys {
            let id = self.virtual_ids.remove(&key).expect("key came from virtual_ids");
            self.back.remove(&id);
            let subjects: Vec<Entity> = self
                .reverse
                .remove(&key)
                .map(|set| set.into_iter().collect())
                .unwrap_or_default();
            results.push((id, subjects));
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Domain;

    struct ChildOf;
    impl Relation for ChildOf {
        fn name() -> &'static str {
            "ChildOf"
        }
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut relations = RelationRegistry::new();
        let a = relations.register::<ChildOf>();
        let b = relations.register::<ChildOf>();
        assert_eq!(a, b);
    }

    #[test]
    fn test_virtual_component_stable_per_pair() {
        let mut components = ComponentRegistry::new();
        let mut relations = RelationRegistry::new();
        let rel = relations.register::<ChildOf>();
        let parent = Entity::new(Domain(0), 1);
        let other = Entity::new(Domain(0), 2);

        let id1 = relations.virtual_component(&mut components, rel, parent);
        let id2 = relations.virtual_component(&mut components, rel, parent);
        let id3 = relations.virtual_component(&mut components, rel, other);

        assert_eq!(id1, id2);
        assert_ne!(id1, id3);
    }

    #[test]
    fn test_attach_detach_reverse_map() {
        let mut components = ComponentRegistry::new();
        let mut relations = RelationRegistry::new();
        let rel = relations.register::<ChildOf>();
        let parent = Entity::new(Domain(0), 1);
        let child = Entity::new(Domain(0), 2);

        relations.virtual_component(&mut components, rel, parent);
        relations.attach(rel, parent, child);
        assert_eq!(relations.subjects_of(rel, parent).collect::<Vec<_>>(), vec![child]);

        relations.detach(rel, parent, child);
        assert_eq!(relations.subjects_of(rel, parent).count(), 0);
    }

    #[test]
    fn test_fan_out_destroy_returns_subjects_and_clears_state() {
        let mut components = ComponentRegistry::new();
        let mut relations = RelationRegistry::new();
        let rel = relations.register::<ChildOf>();
        let parent = Entity::new(Domain(0), 1);
        let child_a = Entity::new(Domain(0), 2);
        let child_b = Entity::new(Domain(0), 3);

        let vid = relations.virtual_component(&mut components, rel, parent);
        relations.attach(rel, parent, child_a);
        relations.attach(rel, parent, child_b);

        let fanout = relations.fan_out_destroy(parent);
        assert_eq!(fanout.len(), 1);
        let (id, mut subjects) = fanout.into_iter().next().unwrap();
        assert_eq!(id, vid);
        subjects.sort();
        assert_eq!(subjects, vec![child_a, child_b]);

        // Registry state for the object is gone.
        assert!(relations.decode(vid).is_none());
        assert_eq!(relations.subjects_of(rel, parent).count(), 0);
    }
}
