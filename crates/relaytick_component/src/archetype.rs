//! The archetype graph: the directed graph of component-set nodes that
//! classifies every entity in a world.
//!
//! An archetype node is purely structural — the sorted vector of
//! [`ComponentId`]s that define it, the dense list of entities currently
//! classified under it, and a cache of the neighbour nodes reachable by
//! adding or removing one component. It holds no component *data*: that
//! lives in the world's per-component columnar stores, indexed by a
//! world-unique row number that survives an entity moving between nodes.
//! Keeping data out of the node is what makes a spawn/despawn/add/remove
//! transition a matter of moving an [`Entity`] between two `Vec`s rather
//! than copying bytes between two tables.

use std::collections::HashMap;

use crate::component::ComponentId;
use crate::entity::Entity;

/// Identifies an archetype node by the hash of its sorted component set.
///
/// Two nodes with the same component set — regardless of the order
/// components were added in — always resolve to the same [`ArchetypeId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArchetypeId(u64);

impl ArchetypeId {
    /// Compute the id for a sorted, deduplicated component set.
    fn from_sorted(component_ids: &[ComponentId]) -> Self {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        component_ids.hash(&mut hasher);
        Self(hasher.finish())
    }
}

/// One node of the archetype graph: entities sharing exactly one component
/// set, plus cached edges to adjacent nodes.
#[derive(Debug, Clone)]
pub struct ArchetypeNode {
    id: ArchetypeId,
    /// Sorted, deduplicated component ids that define this node.
    component_ids: Vec<ComponentId>,
    /// Dense membership list. An entity's position here has no meaning
    /// beyond membership — row indices for component data live in the
    /// world, not here.
    entities: Vec<Entity>,
    /// Cached neighbour reachable by adding one component id.
    add_edges: HashMap<ComponentId, ArchetypeId>,
    /// Cached neighbour reachable by removing one component id.
    remove_edges: HashMap<ComponentId, ArchetypeId>,
}

impl ArchetypeNode {
    fn new(id: ArchetypeId, component_ids: Vec<ComponentId>) -> Self {
        Self {
            id,
            component_ids,
            entities: Vec::new(),
            add_edges: HashMap::new(),
            remove_edges: HashMap::new(),
        }
    }

    /// This node's id.
    #[must_use]
    pub fn id(&self) -> ArchetypeId {
        self.id
    }

    /// The sorted component set that defines this node.
    #[must_use]
    pub fn component_ids(&self) -> &[ComponentId] {
        &self.component_ids
    }

    /// `true` if this node includes `component`.
    #[must_use]
    pub fn has(&self, component: ComponentId) -> bool {
        self.component_ids.binary_search(&component).is_ok()
    }

    /// Entities currently classified under this node, in membership order.
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Number of entities classified under this node.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// `true` if no entity is classified under this node.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// The directed graph of archetype nodes, indexed by component set.
///
/// Spawning with no components lands an entity on the empty root node;
/// every `add`/`remove` walks an edge to a (possibly newly created)
/// neighbour node.
#[derive(Debug)]
pub struct ArchetypeGraph {
    nodes: HashMap<ArchetypeId, ArchetypeNode>,
    by_components: HashMap<Vec<ComponentId>, ArchetypeId>,
    root: ArchetypeId,
}

impl Default for ArchetypeGraph {
    fn default() -> Self {
        let root = ArchetypeId::from_sorted(&[]);
        let mut nodes = HashMap::new();
        nodes.insert(root, ArchetypeNode::new(root, Vec::new()));
        let mut by_components = HashMap::new();
        by_components.insert(Vec::new(), root);
        Self {
            nodes,
            by_components,
            root,
        }
    }
}

impl ArchetypeGraph {
    /// Create a graph with only the empty root node.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The empty archetype every entity starts in at spawn time.
    #[must_use]
    pub fn root(&self) -> ArchetypeId {
        self.root
    }

    /// Look up a node by id.
    #[must_use]
    pub fn node(&self, id: ArchetypeId) -> Option<&ArchetypeNode> {
        self.nodes.get(&id)
    }

    /// Find or create the node for exactly this component set. `component_ids`
    /// need not be sorted or deduplicated.
    pub fn get_or_create(&mut self, component_ids: &[ComponentId]) -> ArchetypeId {
        let mut sorted = component_ids.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        if let Some(&id) = self.by_components.get(&sorted) {
            return id;
        }
        let id = ArchetypeId::from_sorted(&sorted);
        self.by_components.insert(sorted.clone(), id);
        self.nodes.insert(id, ArchetypeNode::new(id, sorted));
        id
    }

    /// The neighbour reached by adding `component` to the node at `from`,
    /// creating and caching it if this is the first time the edge is
    /// walked.
    ///
    /// # Panics
    ///
    /// Panics if `from` is not a node in this graph.
    pub fn neighbour_add(&mut self, from: ArchetypeId, component: ComponentId) -> ArchetypeId {
        if let Some(&cached) = self.nodes[&from].add_edges.get(&component) {
            return cached;
        }
        let mut target_components = self.nodes[&from].component_ids.clone();
        if !target_components.contains(&component) {
            target_components.push(component);
        }
        let target = self.get_or_create(&target_components);
        self.nodes.get_mut(&from).unwrap().add_edges.insert(component, target);
        self.nodes.get_mut(&target).unwrap().remove_edges.insert(component, from);
        target
    }

    /// The neighbour reached by removing `component` from the node at
    /// `from`, creating and caching it if this is the first time the edge
    /// is walked.
    ///
    /// # Panics
    ///
    /// Panics if `from` is not a node in this graph.
    pub fn neighbour_remove(&mut self, from: ArchetypeId, component: ComponentId) -> ArchetypeId {
        if let Some(&cached) = self.nodes[&from].remove_edges.get(&component) {
            return cached;
        }
        let target_components: Vec<ComponentId> = self.nodes[&from]
            .component_ids
            .iter()
            .copied()
            .filter(|&c| c != component)
            .collect();
        let target = self.get_or_create(&target_components);
        self.nodes.get_mut(&from).unwrap().remove_edges.insert(component, target);
        self.nodes.get_mut(&target).unwrap().add_edges.insert(component, from);
        target
    }

    /// Classify `entity` under `node`, appending it to the node's
    /// membership list.
    ///
    /// # Panics
    ///
    /// Panics if `node` is not a node in this graph.
    pub fn insert_entity(&mut self, node: ArchetypeId, entity: Entity) {
        self.nodes.get_mut(&node).unwrap().entities.push(entity);
    }

    /// Remove `entity` from `node`'s membership list via swap-remove.
    /// Returns `true` if it was present.
    ///
    /// # Panics
    ///
    /// Panics if `node` is not a node in this graph.
    pub fn remove_entity(&mut self, node: ArchetypeId, entity: Entity) -> bool {
        let entities = &mut self.nodes.get_mut(&node).unwrap().entities;
        if let Some(pos) = entities.iter().position(|&e| e == entity) {
            entities.swap_remove(pos);
            true
        } else {
            false
        }
    }

    /// Iterate every node currently in the graph.
    pub fn nodes(&self) -> impl Iterator<Item = &ArchetypeNode> {
        self.nodes.values()
    }

    /// Iterate the ids of every node whose component set is a superset of
    /// `required`, matching a query's required component set.
    pub fn matching(&self, required: &[ComponentId]) -> impl Iterator<Item = &ArchetypeNode> {
        self.nodes
            .values()
            .filter(move |node| required.iter().all(|c| node.has(*c)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_is_empty() {
        let graph = ArchetypeGraph::new();
        let root = graph.node(graph.root()).unwrap();
        assert!(root.component_ids().is_empty());
        assert!(root.is_empty());
    }

    #[test]
    fn test_component_set_order_independent() {
        let mut graph = ArchetypeGraph::new();
        let a = graph.get_or_create(&[ComponentId(1), ComponentId(2)]);
        let b = graph.get_or_create(&[ComponentId(2), ComponentId(1)]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_add_remove_edges_are_inverse_and_cached() {
        let mut graph = ArchetypeGraph::new();
        let root = graph.root();
        let with_health = graph.neighbour_add(root, ComponentId(0));
        assert_eq!(graph.node(with_health).unwrap().component_ids(), &[ComponentId(0)]);

        let back_to_root = graph.neighbour_remove(with_health, ComponentId(0));
        assert_eq!(back_to_root, root);

        // Walking the same edge again must return the same cached node, not
        // create a duplicate.
        let again = graph.neighbour_add(root, ComponentId(0));
        assert_eq!(again, with_health);
    }

    #[test]
    fn test_insert_and_remove_entity_membership() {
        let mut graph = ArchetypeGraph::new();
        let root = graph.root();
        let e = Entity::new(crate::entity::Domain(0), 1);
        graph.insert_entity(root, e);
        assert_eq!(graph.node(root).unwrap().len(), 1);
        assert!(graph.remove_entity(root, e));
        assert!(graph.node(root).unwrap().is_empty());
        assert!(!graph.remove_entity(root, e));
    }

    #[test]
    fn test_matching_finds_superset_nodes() {
        let mut graph = ArchetypeGraph::new();
        let health = ComponentId(0);
        let position = ComponentId(1);
        let just_health = graph.get_or_create(&[health]);
        let both = graph.get_or_create(&[health, position]);

        let matched: Vec<ArchetypeId> = graph.matching(&[health]).map(|n| n.id()).collect();
        assert!(matched.contains(&just_health));
        assert!(matched.contains(&both));

        let matched_both: Vec<ArchetypeId> = graph.matching(&[health, position]).map(|n| n.id()).collect();
        assert_eq!(matched_both, vec![both]);
    }
}
