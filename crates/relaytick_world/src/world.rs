//! The [`World`]: the canonical home of entity, component, relation, and
//! archetype state for one tick-driven simulation (spec's "World storage").
//!
//! A `World` is local to one domain — the authoritative producer runs one,
//! and every prediction consumer runs its own. Nothing here knows about the
//! network; replication and reconciliation (in `relaytick_replication`)
//! drive a `World` purely through its public contract (`spawn`/`despawn`/
//! `add`/`set`/`remove`/`get`/resources), the same surface a local system
//! uses.

use std::collections::HashMap;

use relaytick_component::{
    ArchetypeGraph, ArchetypeId, ArchetypeNode, Component, ComponentError, ComponentId,
    ComponentRegistry, Domain, Entity, EntityAllocator, Query, Relation, RelationId,
    RelationObject, RelationRegistry,
};
use thiserror::Error;

use crate::column::Column;

/// Errors raised by [`World`] operations.
#[derive(Debug, Error)]
pub enum WorldError {
    /// The entity has never been spawned, or has already been despawned.
    #[error("unknown entity {0}")]
    UnknownEntity(Entity),
    /// A typed accessor was used for a component that was never registered.
    #[error("component type not registered in this world")]
    UnknownComponent,
    /// `set` was called for a component the entity does not currently hold.
    #[error("entity {entity} has no component {component:?} to set")]
    NotPresent { entity: Entity, component: ComponentId },
    /// A relation type was used before being registered.
    #[error("relation type not registered in this world")]
    UnknownRelation,
    /// A resource accessor was used for a type that was never inserted.
    #[error("no resource of the requested type is present")]
    MissingResource,
    /// A query marked [`Query::unique`] matched more than one entity.
    #[error("unique query matched {0} entities, expected at most one")]
    UniqueViolation(usize),
    /// A component's payload failed to encode or decode.
    #[error(transparent)]
    Component(#[from] ComponentError),
}

/// The result of running a [`Query`] against a [`World`].
#[derive(Debug, Clone)]
pub enum QueryMatches {
    /// No join: the entities matching the query's terms.
    Single(Vec<Entity>),
    /// A join: `(left, right)` pairs connected by the join's relation (or
    /// every combination, when the join has no relation filter).
    Joined(Vec<(Entity, Entity)>),
}

impl QueryMatches {
    /// The matched entities, flattening a join's left side.
    #[must_use]
    pub fn entities(&self) -> Vec<Entity> {
        match self {
            QueryMatches::Single(entities) => entities.clone(),
            QueryMatches::Joined(pairs) => pairs.iter().map(|(left, _)| *left).collect(),
        }
    }
}

/// The canonical state of one simulation domain: entities, components,
/// relations, the archetype graph, and the current tick.
#[derive(Debug)]
pub struct World {
    domain: Domain,
    tick: u64,
    allocator: EntityAllocator,
    components: ComponentRegistry,
    relations: RelationRegistry,
    archetypes: ArchetypeGraph,
    columns: HashMap<ComponentId, Column>,
    rows: HashMap<Entity, u32>,
    nodes: HashMap<Entity, ArchetypeId>,
    next_row: u32,
    resources: HashMap<ComponentId, Vec<u8>>,
    /// Components removed during the current tick, keyed by component id —
    /// drained at the start of every `advance_tick`. Backs the `left` edge
    /// filter in [`Query`], since a cleared column cell carries no history
    /// of its own.
    removed_this_tick: HashMap<ComponentId, Vec<Entity>>,
}

impl World {
    /// Create an empty world for `domain`, at tick 0.
    #[must_use]
    pub fn new(domain: Domain) -> Self {
        Self {
            domain,
            tick: 0,
            allocator: EntityAllocator::new(domain),
            components: ComponentRegistry::new(),
            relations: RelationRegistry::new(),
            archetypes: ArchetypeGraph::new(),
            columns: HashMap::new(),
            rows: HashMap::new(),
            nodes: HashMap::new(),
            next_row: 0,
            resources: HashMap::new(),
            removed_this_tick: HashMap::new(),
        }
    }

    /// This world's domain tag.
    #[must_use]
    pub fn domain(&self) -> Domain {
        self.domain
    }

    /// The current tick counter.
    #[must_use]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Advance to the next tick, clearing the per-tick removal log. Returns
    /// the new tick number.
    pub fn advance_tick(&mut self) -> u64 {
        self.tick += 1;
        self.removed_this_tick.clear();
        self.tick
    }

    /// Force the tick counter to an exact value — used when rolling back to
    /// a checkpoint or fast-forwarding to a remote snapshot's tick.
    pub fn set_tick(&mut self, tick: u64) {
        self.tick = tick;
    }

    /// Read-only access to the component registry — needed by the wire
    /// codec to resolve a component id's name and size.
    #[must_use]
    pub fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    /// Mutable access to the component registry, for out-of-band
    /// registration (e.g. mirroring a remote peer's registration order).
    pub fn components_mut(&mut self) -> &mut ComponentRegistry {
        &mut self.components
    }

    /// Read-only access to the relation registry.
    #[must_use]
    pub fn relations(&self) -> &RelationRegistry {
        &self.relations
    }

    /// Read-only access to the archetype graph.
    #[must_use]
    pub fn archetypes(&self) -> &ArchetypeGraph {
        &self.archetypes
    }

    /// The world-unique row index assigned to `entity`, if it is alive.
    #[must_use]
    pub fn row_of(&self, entity: Entity) -> Option<u32> {
        self.rows.get(&entity).copied()
    }

    /// The archetype node `entity` currently belongs to, if it is alive.
    #[must_use]
    pub fn node_of(&self, entity: Entity) -> Option<&ArchetypeNode> {
        let id = *self.nodes.get(&entity)?;
        self.archetypes.node(id)
    }

    /// Register `T`, returning its [`ComponentId`] and ensuring its column
    /// exists.
    pub fn register<T: Component>(&mut self) -> ComponentId {
        let id = self.components.register::<T>();
        self.ensure_column(id);
        id
    }

    /// Register relation type `R`.
    pub fn register_relation<R: Relation>(&mut self) -> RelationId {
        self.relations.register::<R>()
    }

    fn ensure_column(&mut self, id: ComponentId) {
        if !self.columns.contains_key(&id) {
            let item_size = self.components.meta(id).map(|m| m.item_size).unwrap_or(0);
            self.columns.insert(id, Column::new(id, item_size));
        }
    }

    /// Spawn a new entity with no components, classified under the empty
    /// archetype node.
    pub fn spawn(&mut self) -> Entity {
        let entity = self.allocator.allocate();
        let row = self.next_row;
        self.next_row += 1;
        self.rows.insert(entity, row);
        let root = self.archetypes.root();
        self.archetypes.insert_entity(root, entity);
        self.nodes.insert(entity, root);
        entity
    }

    /// Every entity currently alive in this world, in no particular order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.rows.keys().copied()
    }

    /// Bring a specific, previously-known `entity` back to life under the
    /// empty archetype node, without going through the allocator.
    ///
    /// Used by checkpoint restore and by reconciliation's ghost map, both of
    /// which need to recreate an entity whose id was already decided
    /// elsewhere (a past tick, or the authoritative producer) rather than
    /// minting a fresh one. Returns `false` (no-op) if `entity` is already
    /// alive.
    pub fn resurrect(&mut self, entity: Entity) -> bool {
        if self.nodes.contains_key(&entity) {
            return false;
        }
        let row = self.next_row;
        self.next_row += 1;
        self.rows.insert(entity, row);
        let root = self.archetypes.root();
        self.archetypes.insert_entity(root, entity);
        self.nodes.insert(entity, root);
        true
    }

    /// Destroy `entity`: removes it from its archetype node, detaches every
    /// relation instance where it was the subject, and fans out the
    /// destruction of every relation instance where it was the object.
    pub fn despawn(&mut self, entity: Entity) -> Result<(), WorldError> {
        let node_id = *self.nodes.get(&entity).ok_or(WorldError::UnknownEntity(entity))?;

        // Detach every relation this entity was the subject of.
        let component_ids: Vec<ComponentId> = self
            .archetypes
            .node(node_id)
            .map(|n| n.component_ids().to_vec())
            .unwrap_or_default();
        for id in component_ids {
            if let Some((relation, object)) = self.relations.decode(id) {
                self.relations.detach(relation, object, entity);
            }
        }

        self.archetypes.remove_entity(node_id, entity);
        self.nodes.remove(&entity);
        self.rows.remove(&entity);

        // Fan out: every relation where this entity was the object gets
        // detached from every subject that held it.
        let fanout = self.relations.fan_out_destroy(entity);
        for (virtual_id, subjects) in fanout {
            for subject in subjects {
                self.remove_raw(subject, virtual_id)?;
            }
        }

        Ok(())
    }

    /// Attach (or overwrite) a component's raw bytes on `entity`, moving it
    /// to the neighbouring archetype node if it didn't already carry
    /// `component`.
    pub fn add_raw(&mut self, entity: Entity, component: ComponentId, bytes: &[u8]) -> Result<(), WorldError> {
        let row = *self.rows.get(&entity).ok_or(WorldError::UnknownEntity(entity))?;
        let node_id = *self.nodes.get(&entity).unwrap();
        let already_present = self.archetypes.node(node_id).is_some_and(|n| n.has(component));
        if !already_present {
            let target = self.archetypes.neighbour_add(node_id, component);
            self.archetypes.remove_entity(node_id, entity);
            self.archetypes.insert_entity(target, entity);
            self.nodes.insert(entity, target);
        }
        self.ensure_column(component);
        let tick = self.tick;
        self.columns.get_mut(&component).unwrap().set_raw(row, bytes, tick);
        Ok(())
    }

    /// Overwrite the value of a component `entity` already carries, without
    /// touching archetype membership.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::NotPresent`] if `entity` doesn't currently hold
    /// `component`.
    pub fn set_raw(&mut self, entity: Entity, component: ComponentId, bytes: &[u8]) -> Result<(), WorldError> {
        let row = *self.rows.get(&entity).ok_or(WorldError::UnknownEntity(entity))?;
        let node_id = *self.nodes.get(&entity).unwrap();
        if !self.archetypes.node(node_id).is_some_and(|n| n.has(component)) {
            return Err(WorldError::NotPresent { entity, component });
        }
        let tick = self.tick;
        self.columns.get_mut(&component).unwrap().set_raw(row, bytes, tick);
        Ok(())
    }

    /// Detach `component` from `entity`, moving it to the neighbouring
    /// archetype node. A no-op if the entity never carried it.
    pub fn remove_raw(&mut self, entity: Entity, component: ComponentId) -> Result<(), WorldError> {
        let node_id = *self.nodes.get(&entity).ok_or(WorldError::UnknownEntity(entity))?;
        if !self.archetypes.node(node_id).is_some_and(|n| n.has(component)) {
            return Ok(());
        }
        let target = self.archetypes.neighbour_remove(node_id, component);
        self.archetypes.remove_entity(node_id, entity);
        self.archetypes.insert_entity(target, entity);
        self.nodes.insert(entity, target);
        if let Some(row) = self.rows.get(&entity).copied()
            && let Some(column) = self.columns.get_mut(&component)
        {
            column.clear(row);
        }
        self.removed_this_tick.entry(component).or_default().push(entity);
        Ok(())
    }

    /// Read a component's raw bytes off `entity`, if present.
    #[must_use]
    pub fn get_raw(&self, entity: Entity, component: ComponentId) -> Option<&[u8]> {
        let row = *self.rows.get(&entity)?;
        self.columns.get(&component)?.get_raw(row)
    }

    /// `true` if `entity` currently carries `component`.
    #[must_use]
    pub fn has_raw(&self, entity: Entity, component: ComponentId) -> bool {
        self.nodes
            .get(&entity)
            .and_then(|id| self.archetypes.node(*id))
            .is_some_and(|n| n.has(component))
    }

    fn value_bytes<T: Component>(value: &T) -> Vec<u8> {
        let size = std::mem::size_of::<T>();
        // SAFETY: `value` is a valid, initialised `T` for the duration of
        // this read.
        unsafe { std::slice::from_raw_parts(value as *const T as *const u8, size).to_vec() }
    }

    /// Attach (or overwrite) `value` on `entity`.
    pub fn add<T: Component>(&mut self, entity: Entity, value: T) -> Result<(), WorldError> {
        let id = self.register::<T>();
        let bytes = Self::value_bytes(&value);
        std::mem::forget(value);
        self.add_raw(entity, id, &bytes)
    }

    /// Overwrite the value of a component `entity` already carries.
    pub fn set<T: Component>(&mut self, entity: Entity, value: T) -> Result<(), WorldError> {
        let id = self.components.id_of::<T>().ok_or(WorldError::UnknownComponent)?;
        let bytes = Self::value_bytes(&value);
        std::mem::forget(value);
        self.set_raw(entity, id, &bytes)
    }

    /// Read `entity`'s value of `T`, if present.
    #[must_use]
    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        let id = self.components.id_of::<T>()?;
        let bytes = self.get_raw(entity, id)?;
        // SAFETY: bytes were written by `add`/`set` for this exact `T`.
        Some(unsafe { &*(bytes.as_ptr() as *const T) })
    }

    /// `true` if `entity` currently carries a `T`.
    #[must_use]
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        match self.components.id_of::<T>() {
            Some(id) => self.has_raw(entity, id),
            None => false,
        }
    }

    /// Detach `T` from `entity`.
    pub fn remove<T: Component>(&mut self, entity: Entity) -> Result<(), WorldError> {
        let Some(id) = self.components.id_of::<T>() else {
            return Ok(());
        };
        self.remove_raw(entity, id)
    }

    /// Attach relation `R` from `subject` to `object`.
    pub fn attach_relation<R: Relation>(&mut self, subject: Entity, object: Entity) -> Result<(), WorldError> {
        let relation = self.relations.register::<R>();
        let vid = self.relations.virtual_component(&mut self.components, relation, object);
        self.ensure_column(vid);
        self.add_raw(subject, vid, &[])?;
        self.relations.attach(relation, object, subject);
        Ok(())
    }

    /// Detach relation `R` from `subject` to `object`.
    pub fn detach_relation<R: Relation>(&mut self, subject: Entity, object: Entity) -> Result<(), WorldError> {
        let relation = self.relations.id_of::<R>().ok_or(WorldError::UnknownRelation)?;
        self.detach_relation_raw(subject, relation, object)
    }

    /// Attach relation `relation` from `subject` to `object`, given a raw
    /// [`RelationId`] rather than a Rust type. Used when replaying a
    /// replicated transaction, where the relation is identified by the id
    /// the two peers already agree on rather than by a local trait impl.
    pub fn attach_relation_raw(&mut self, subject: Entity, relation: RelationId, object: Entity) -> Result<(), WorldError> {
        let vid = self.relations.virtual_component(&mut self.components, relation, object);
        self.ensure_column(vid);
        self.add_raw(subject, vid, &[])?;
        self.relations.attach(relation, object, subject);
        Ok(())
    }

    /// Detach relation `relation` from `subject` to `object`, given a raw
    /// [`RelationId`]. A no-op if no instance exists.
    pub fn detach_relation_raw(&mut self, subject: Entity, relation: RelationId, object: Entity) -> Result<(), WorldError> {
        let Some(vid) = self.relations.get_virtual(relation, object) else {
            return Ok(());
        };
        self.remove_raw(subject, vid)?;
        self.relations.detach(relation, object, subject);
        Ok(())
    }

    /// Insert (or overwrite) the single global instance of resource `T`.
    pub fn insert_resource<T: Component>(&mut self, value: T) {
        let id = self.register::<T>();
        let bytes = Self::value_bytes(&value);
        std::mem::forget(value);
        self.resources.insert(id, bytes);
    }

    /// Read the global instance of resource `T`, if inserted.
    #[must_use]
    pub fn resource<T: Component>(&self) -> Option<&T> {
        let id = self.components.id_of::<T>()?;
        let bytes = self.resources.get(&id)?;
        Some(unsafe { &*(bytes.as_ptr() as *const T) })
    }

    /// Mutably access the global instance of resource `T`, if inserted.
    pub fn resource_mut<T: Component>(&mut self) -> Option<&mut T> {
        let id = self.components.id_of::<T>()?;
        let bytes = self.resources.get_mut(&id)?;
        Some(unsafe { &mut *(bytes.as_mut_ptr() as *mut T) })
    }

    /// Remove the global instance of resource `T`. Returns `true` if one was
    /// present.
    pub fn remove_resource<T: Component>(&mut self) -> bool {
        match self.components.id_of::<T>() {
            Some(id) => self.resources.remove(&id).is_some(),
            None => false,
        }
    }

    fn node_passes_relation_terms(&self, query: &Query, node: &ArchetypeNode) -> bool {
        for term in &query.relations {
            let present = match term.object {
                RelationObject::Exact(object) => self
                    .relations
                    .get_virtual(term.relation, object)
                    .is_some_and(|vid| node.has(vid)),
                RelationObject::Any => node
                    .component_ids()
                    .iter()
                    .any(|&id| self.relations.is_instance_of(id, term.relation)),
            };
            if present != term.required {
                return false;
            }
        }
        true
    }

    fn passes_edge_filters(&self, query: &Query, entity: Entity, row: u32) -> bool {
        for &id in &query.entered {
            let Some(version) = self.columns.get(&id).and_then(|c| c.version(row)) else {
                return false;
            };
            if version as u64 != self.tick {
                return false;
            }
        }
        for &id in &query.left {
            let removed = self
                .removed_this_tick
                .get(&id)
                .is_some_and(|entities| entities.contains(&entity));
            if !removed {
                return false;
            }
        }
        true
    }

    fn match_entities(&mut self, query: &Query) -> Result<Vec<Entity>, WorldError> {
        let required = query.required();
        let excluded = query.excluded();
        let mut matched = Vec::new();
        for node in self.archetypes.matching(&required) {
            if excluded.iter().any(|id| node.has(*id)) {
                continue;
            }
            if !self.node_passes_relation_terms(query, node) {
                continue;
            }
            for &entity in node.entities() {
                let Some(row) = self.rows.get(&entity).copied() else {
                    continue;
                };
                if self.passes_edge_filters(query, entity, row) {
                    matched.push(entity);
                }
            }
        }
        if query.unique && matched.len() > 1 {
            return Err(WorldError::UniqueViolation(matched.len()));
        }
        let tick = self.tick;
        let writes = query.writes();
        if !writes.is_empty() {
            for &entity in &matched {
                let Some(row) = self.rows.get(&entity).copied() else {
                    continue;
                };
                for &id in &writes {
                    if let Some(column) = self.columns.get_mut(&id) {
                        column.get_raw_mut(row, tick);
                    }
                }
            }
        }
        Ok(matched)
    }

    /// Run `query` against the current state of the world.
    ///
    /// A plain query returns [`QueryMatches::Single`]. A query with a
    /// [`relaytick_component::Join`] returns [`QueryMatches::Joined`]: every
    /// `(left, right)` pair where `left` matched this query, `right` matched
    /// the join's nested query, and (when the join names a relation) one of
    /// the pair is the other's relation object.
    ///
    /// A `Write(C)` term stamps `C`'s version at `tick` for every matched
    /// row as soon as the query runs, independent of whether the caller
    /// goes on to actually mutate anything through `set`/`get_mut` — the
    /// declared intent to write is itself the observable event that
    /// `entered`/`left` filters and replication's change detection key off.
    pub fn query(&mut self, query: &Query) -> Result<QueryMatches, WorldError> {
        let left_matches = self.match_entities(query)?;
        let Some(join) = &query.join else {
            return Ok(QueryMatches::Single(left_matches));
        };
        let join_right = join.right.clone();
        let right_matches = self.match_entities(&join_right)?;
        let mut pairs = Vec::new();
        for &left in &left_matches {
            for &right in &right_matches {
                let connected = match join.relation {
                    None => true,
                    Some(relation) => {
                        self.is_relation_pair(relation, left, right) || self.is_relation_pair(relation, right, left)
                    }
                };
                if connected {
                    pairs.push((left, right));
                }
            }
        }
        Ok(QueryMatches::Joined(pairs))
    }

    fn is_relation_pair(&self, relation: RelationId, subject: Entity, object: Entity) -> bool {
        self.relations
            .get_virtual(relation, object)
            .is_some_and(|vid| self.has_raw(subject, vid))
    }
}
