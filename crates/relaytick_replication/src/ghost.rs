//! The ghost map: translates entity IDs from a remote domain's space into
//! the local entities standing in for them, allocating a fresh local
//! entity the first time a foreign one is seen.

use std::collections::HashMap;

use relaytick_component::Entity;
use relaytick_world::World;

/// Foreign entity → local entity, with last-touched tick tracked per
/// ghost so unreferenced ones can be garbage collected.
#[derive(Debug, Default)]
pub struct GhostMap {
    forward: HashMap<Entity, Entity>,
    last_seen: HashMap<Entity, u64>,
}

impl GhostMap {
    /// Create an empty ghost map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `foreign` to its local entity, spawning a fresh local
    /// entity on first sight. Updates the ghost's last-seen tick.
    pub fn resolve_or_spawn(&mut self, world: &mut World, foreign: Entity, tick: u64) -> Entity {
        let local = *self.forward.entry(foreign).or_insert_with(|| world.spawn());
        self.last_seen.insert(foreign, tick);
        local
    }

    /// Resolve `foreign` to its local entity if one has already been
    /// bound, without allocating. Updates the ghost's last-seen tick if
    /// found.
    pub fn resolve(&mut self, foreign: Entity, tick: u64) -> Option<Entity> {
        let local = self.forward.get(&foreign).copied();
        if local.is_some() {
            self.last_seen.insert(foreign, tick);
        }
        local
    }

    /// Evict ghosts that haven't been touched within `window` ticks of
    /// `current_tick`. Returns the local entities that were dropped from
    /// tracking (the entities themselves are not despawned here — that's
    /// driven by the normal `Despawn` op for that entity, should one
    /// arrive; eviction only stops this map from growing unbounded for
    /// entities the producer silently stopped mentioning).
    pub fn evict_stale(&mut self, current_tick: u64, window: u32) -> Vec<Entity> {
        let stale: Vec<Entity> = self
            .last_seen
            .iter()
            .filter(|&(_, &seen)| current_tick.saturating_sub(seen) > u64::from(window))
            .map(|(&foreign, _)| foreign)
            .collect();
        let mut dropped = Vec::with_capacity(stale.len());
        for foreign in stale {
            self.last_seen.remove(&foreign);
            if let Some(local) = self.forward.remove(&foreign) {
                dropped.push(local);
            }
        }
        dropped
    }

    /// Number of ghosts currently tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaytick_component::Domain;

    #[test]
    fn test_resolve_or_spawn_is_stable_per_foreign_entity() {
        let mut world = World::new(Domain(1));
        let mut ghosts = GhostMap::new();
        let foreign = Entity::new(Domain(0), 7);

        let first = ghosts.resolve_or_spawn(&mut world, foreign, 10);
        let second = ghosts.resolve_or_spawn(&mut world, foreign, 11);
        assert_eq!(first, second);
    }

    #[test]
    fn test_evict_stale_drops_ghosts_past_window() {
        let mut world = World::new(Domain(1));
        let mut ghosts = GhostMap::new();
        let foreign = Entity::new(Domain(0), 1);
        ghosts.resolve_or_spawn(&mut world, foreign, 0);

        assert!(ghosts.evict_stale(5, 10).is_empty());
        assert_eq!(ghosts.evict_stale(20, 10).len(), 1);
        assert!(ghosts.is_empty());
    }
}
