//! Per-tick reverse-operation log, used to roll a world back to a target
//! tick without paying for a full checkpoint restore when the tick is still
//! within the recorded window.

use std::collections::VecDeque;

use relaytick_component::{ComponentId, Entity};
use relaytick_world::World;

/// A single reverse operation, derived from one forward mutation.
///
/// Applying this to a [`World`] undoes the forward mutation it was derived
/// from: a `Set(e,c,v')` whose previous value was `v` produces `Set(e,c,v)`;
/// `Add` produces `Remove`; `Spawn` produces `Despawn`; `Despawn` produces a
/// `Restore` carrying back everything the entity held.
#[derive(Debug, Clone)]
pub enum UndoOp {
    /// Write `previous` back over `component` on `entity`.
    Set {
        entity: Entity,
        component: ComponentId,
        previous: Vec<u8>,
    },
    /// Detach `component` from `entity` (undoes an `Add`).
    Remove { entity: Entity, component: ComponentId },
    /// Despawn `entity` (undoes a `Spawn`).
    Despawn { entity: Entity },
    /// Resurrect `entity` and restore the listed components (undoes a
    /// `Despawn`).
    Restore {
        entity: Entity,
        components: Vec<(ComponentId, Vec<u8>)>,
    },
}

impl UndoOp {
    fn apply(&self, world: &mut World) {
        match self {
            UndoOp::Set { entity, component, previous } => {
                let _ = world.add_raw(*entity, *component, previous);
            }
            UndoOp::Remove { entity, component } => {
                let _ = world.remove_raw(*entity, *component);
            }
            UndoOp::Despawn { entity } => {
                let _ = world.despawn(*entity);
            }
            UndoOp::Restore { entity, components } => {
                world.resurrect(*entity);
                for (component, bytes) in components {
                    let _ = world.add_raw(*entity, *component, bytes);
                }
            }
        }
    }
}

/// Every undo op recorded for one tick, in the order their forward
/// mutations were committed.
#[derive(Debug, Clone, Default)]
struct UndoEntry {
    ops: Vec<UndoOp>,
}

/// A windowed log of per-tick undo entries.
///
/// Entries older than the configured window are dropped as new ticks are
/// recorded, matching the checkpoint ring's retention so the two always
/// cover a comparable span of history.
#[derive(Debug)]
pub struct UndoLog {
    window: u32,
    entries: VecDeque<(u64, UndoEntry)>,
}

impl UndoLog {
    /// Create an undo log retaining at most `window` ticks of entries.
    #[must_use]
    pub fn new(window: u32) -> Self {
        Self {
            window,
            entries: VecDeque::new(),
        }
    }

    /// Record one undo op produced while committing mutations at `tick`.
    pub fn record(&mut self, tick: u64, op: UndoOp) {
        if self.entries.back().is_some_and(|(t, _)| *t == tick) {
            self.entries.back_mut().unwrap().1.ops.push(op);
        } else {
            self.entries.push_back((tick, UndoEntry { ops: vec![op] }));
        }
        while self.entries.len() as u32 > self.window.max(1) {
            self.entries.pop_front();
        }
    }

    /// The oldest tick this log still has an entry for, if any.
    #[must_use]
    pub fn floor(&self) -> Option<u64> {
        self.entries.front().map(|(tick, _)| *tick)
    }

    /// `true` if every tick in `(target, current]` has a recorded entry, so
    /// rolling back to `target` can be done by undo replay alone.
    #[must_use]
    pub fn covers(&self, current: u64, target: u64) -> bool {
        if target >= current {
            return true;
        }
        match self.floor() {
            Some(floor) => floor <= target + 1,
            None => false,
        }
    }

    /// Apply every recorded entry for `(target, current]` to `world`, in
    /// descending tick order, undoing the latest tick first. Entries newer
    /// than `target` are consumed (dropped from the log); earlier entries
    /// are kept.
    pub fn rollback(&mut self, world: &mut World, current: u64, target: u64) {
        while let Some((tick, _)) = self.entries.back() {
            if *tick <= target {
                break;
            }
            let (_, entry) = self.entries.pop_back().unwrap();
            for op in entry.ops.iter().rev() {
                op.apply(world);
            }
        }
        let _ = current;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaytick_component::Domain;

    #[test]
    fn test_covers_within_window() {
        let mut log = UndoLog::new(4);
        for tick in 1..=4 {
            log.record(tick, UndoOp::Despawn { entity: Entity::new(Domain::PRODUCER, 1) });
        }
        assert!(log.covers(4, 1));
        assert!(!log.covers(4, 0));
    }

    #[test]
    fn test_window_evicts_oldest_entries() {
        let mut log = UndoLog::new(2);
        for tick in 1..=5 {
            log.record(tick, UndoOp::Despawn { entity: Entity::new(Domain::PRODUCER, 1) });
        }
        assert_eq!(log.floor(), Some(4));
        assert!(!log.covers(5, 2));
    }

    #[test]
    fn test_rollback_replays_in_descending_order() {
        let mut world = World::new(Domain::PRODUCER);
        let e = world.spawn();
        let mut log = UndoLog::new(8);

        world.advance_tick();
        log.record(1, UndoOp::Despawn { entity: e });

        let e2 = world.spawn();
        world.advance_tick();
        log.record(2, UndoOp::Despawn { entity: e2 });

        log.rollback(&mut world, 2, 0);
        assert!(world.node_of(e).is_none());
        assert!(world.node_of(e2).is_none());
    }
}
