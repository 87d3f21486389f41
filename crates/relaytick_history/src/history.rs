//! Combines the undo log and the checkpoint ring into the single rollback
//! entry point reconciliation calls when remote data disagrees with a
//! consumer's prediction.

use relaytick_component::ComponentId;
use relaytick_world::World;

use crate::checkpoint::Checkpoint;
use crate::ring::CheckpointRing;
use crate::undo::{UndoLog, UndoOp};

/// Checkpoints plus the undo log that lets a world roll back to (and
/// resimulate from) an earlier tick.
#[derive(Debug)]
pub struct History {
    checkpoints: CheckpointRing,
    undo: UndoLog,
}

impl History {
    /// Create an empty history retaining `window` ticks of undo entries and
    /// checkpoints.
    #[must_use]
    pub fn new(window: u32) -> Self {
        Self {
            checkpoints: CheckpointRing::new(window),
            undo: UndoLog::new(window),
        }
    }

    /// Capture and retain a checkpoint of `world`'s current state.
    pub fn capture_checkpoint(&mut self, world: &World, tracked: &[ComponentId]) {
        self.checkpoints.push(Checkpoint::capture(world, tracked));
    }

    /// Record one undo op produced while committing a forward mutation at
    /// `tick`.
    pub fn record_undo(&mut self, tick: u64, op: UndoOp) {
        self.undo.record(tick, op);
    }

    /// Roll `world` back as close to `target_tick` as this history allows.
    ///
    /// Prefers exact undo-log replay when the window still covers every
    /// tick between `target_tick` and the world's current tick. Otherwise
    /// falls back to the nearest checkpoint at or before `target_tick`,
    /// landing on that checkpoint's tick rather than `target_tick` exactly —
    /// the caller is expected to resimulate forward from there. If neither
    /// covers the target, the world is left unchanged.
    ///
    /// Returns the tick `world` ends up at.
    pub fn rollback_to(&mut self, world: &mut World, target_tick: u64) -> u64 {
        let current = world.tick();
        if target_tick >= current {
            return current;
        }

        if self.undo.covers(current, target_tick) {
            self.undo.rollback(world, current, target_tick);
            world.set_tick(target_tick);
            tracing::info!(target_tick, via = "undo_log", "rolled back world");
            return target_tick;
        }

        if let Some(checkpoint) = self.checkpoints.nearest_at_or_before(target_tick) {
            let landed = checkpoint.tick();
            checkpoint.restore(world);
            tracing::info!(target_tick, landed_tick = landed, via = "checkpoint", "rolled back world");
            return landed;
        }

        tracing::warn!(target_tick, current, "rollback target outside retained history, world left unchanged");
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaytick_component::{Component, Domain};

    #[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Score {
        value: i32,
    }
    impl Component for Score {
        fn type_name() -> &'static str {
            "Score"
        }
    }

    #[test]
    fn test_rollback_via_undo_log_lands_exactly_on_target() {
        let mut world = World::new(Domain::PRODUCER);
        let e = world.spawn();
        world.add(e, Score { value: 0 }).unwrap();
        let score_id = world.components().id_of::<Score>().unwrap();
        let mut history = History::new(8);

        for tick in 1..=3u64 {
            world.advance_tick();
            let previous = world.get::<Score>(e).copied().unwrap();
            world.set(e, Score { value: tick as i32 }).unwrap();
            history.record_undo(
                tick,
                UndoOp::Set {
                    entity: e,
                    component: score_id,
                    previous: unsafe {
                        std::slice::from_raw_parts(&previous as *const Score as *const u8, std::mem::size_of::<Score>())
                    }
                    .to_vec(),
                },
            );
        }
        assert_eq!(world.get::<Score>(e).unwrap().value, 3);

        let landed = history.rollback_to(&mut world, 1);
        assert_eq!(landed, 1);
        assert_eq!(world.tick(), 1);
        assert_eq!(world.get::<Score>(e).unwrap().value, 1);
    }

    #[test]
    fn test_rollback_falls_back_to_checkpoint_outside_undo_window() {
        let mut world = World::new(Domain::PRODUCER);
        let e = world.spawn();
        world.add(e, Score { value: 7 }).unwrap();
        let score_id = world.components().id_of::<Score>().unwrap();

        let mut history = History::new(2);
        history.capture_checkpoint(&world, &[score_id]);

        for tick in 1..=5u64 {
            world.advance_tick();
            world.set(e, Score { value: tick as i32 }).unwrap();
            history.record_undo(tick, UndoOp::Despawn { entity: e });
        }

        let landed = history.rollback_to(&mut world, 0);
        assert_eq!(landed, 0);
        assert_eq!(world.get::<Score>(e).unwrap().value, 7);
    }

    #[test]
    fn test_rollback_target_in_future_is_noop() {
        let mut world = World::new(Domain::PRODUCER);
        world.set_tick(5);
        let mut history = History::new(4);
        assert_eq!(history.rollback_to(&mut world, 9), 5);
    }
}
