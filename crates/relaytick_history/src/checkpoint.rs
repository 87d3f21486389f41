//! A structural snapshot of a [`World`](relaytick_world::World): which
//! entities are alive, and the raw bytes of every tracked component on each
//! of them. Restoring a checkpoint overwrites tracked component values and
//! truncates any entity spawned after the capture tick.

use std::collections::HashMap;

use relaytick_component::{ComponentId, Entity};
use relaytick_world::World;

/// Captured world state at a single tick, limited to a configurable set of
/// tracked components.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    tick: u64,
    entities: Vec<Entity>,
    values: HashMap<ComponentId, HashMap<Entity, Vec<u8>>>,
}

impl Checkpoint {
    /// Capture every live entity and, for each component in `tracked`, the
    /// raw bytes of every entity that currently carries it.
    #[must_use]
    pub fn capture(world: &World, tracked: &[ComponentId]) -> Self {
        let entities: Vec<Entity> = world.entities().collect();
        let mut values: HashMap<ComponentId, HashMap<Entity, Vec<u8>>> = HashMap::new();
        for &component in tracked {
            let mut column = HashMap::new();
            for &entity in &entities {
                if let Some(bytes) = world.get_raw(entity, component) {
                    column.insert(entity, bytes.to_vec());
                }
            }
            values.insert(component, column);
        }
        let checkpoint = Self {
            tick: world.tick(),
            entities,
            values,
        };
        tracing::info!(tick = checkpoint.tick, entities = checkpoint.entities.len(), "captured checkpoint");
        checkpoint
    }

    /// The tick this checkpoint was captured at.
    #[must_use]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Restore `world` to exactly this checkpoint: despawn entities created
    /// after capture, resurrect ones despawned since, and overwrite every
    /// tracked component back to its captured value (or remove it if the
    /// entity didn't carry it at capture time).
    pub fn restore(&self, world: &mut World) {
        let captured: std::collections::HashSet<Entity> = self.entities.iter().copied().collect();
        let current: Vec<Entity> = world.entities().collect();

        for entity in current {
            if !captured.contains(&entity) {
                let _ = world.despawn(entity);
            }
        }
        for &entity in &self.entities {
            world.resurrect(entity);
        }

        for (&component, column) in &self.values {
            for &entity in &self.entities {
                match column.get(&entity) {
                    Some(bytes) => {
                        let _ = world.add_raw(entity, component, bytes);
                    }
                    None => {
                        let _ = world.remove_raw(entity, component);
                    }
                }
            }
        }

        world.set_tick(self.tick);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaytick_component::{Component, Domain};

    #[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Health {
        value: u32,
    }
    impl Component for Health {
        fn type_name() -> &'static str {
            "Health"
        }
    }

    #[test]
    fn test_capture_restore_roundtrip() {
        let mut world = World::new(Domain::PRODUCER);
        let e = world.spawn();
        world.add(e, Health { value: 10 }).unwrap();
        let health_id = world.components().id_of::<Health>().unwrap();

        let checkpoint = Checkpoint::capture(&world, &[health_id]);

        world.set(e, Health { value: 1 }).unwrap();
        let extra = world.spawn();
        world.add(extra, Health { value: 99 }).unwrap();
        world.advance_tick();

        checkpoint.restore(&mut world);

        assert_eq!(world.get::<Health>(e), Some(&Health { value: 10 }));
        assert_eq!(world.tick(), checkpoint.tick());
        assert!(world.node_of(extra).is_none());
    }

    #[test]
    fn test_restore_resurrects_despawned_entity() {
        let mut world = World::new(Domain::PRODUCER);
        let e = world.spawn();
        world.add(e, Health { value: 5 }).unwrap();
        let health_id = world.components().id_of::<Health>().unwrap();

        let checkpoint = Checkpoint::capture(&world, &[health_id]);
        world.despawn(e).unwrap();
        assert!(world.node_of(e).is_none());

        checkpoint.restore(&mut world);
        assert_eq!(world.get::<Health>(e), Some(&Health { value: 5 }));
    }
}
