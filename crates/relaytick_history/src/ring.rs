//! A small windowed ring of [`Checkpoint`]s, kept in ascending tick order.

use std::collections::VecDeque;

use crate::checkpoint::Checkpoint;

/// Retains the last `window` checkpoints pushed to it.
#[derive(Debug)]
pub struct CheckpointRing {
    window: u32,
    checkpoints: VecDeque<Checkpoint>,
}

impl CheckpointRing {
    /// Create a ring retaining at most `window` checkpoints.
    #[must_use]
    pub fn new(window: u32) -> Self {
        Self {
            window: window.max(1),
            checkpoints: VecDeque::new(),
        }
    }

    /// Push a newly captured checkpoint, evicting the oldest once the
    /// window is exceeded.
    pub fn push(&mut self, checkpoint: Checkpoint) {
        self.checkpoints.push_back(checkpoint);
        while self.checkpoints.len() as u32 > self.window {
            self.checkpoints.pop_front();
        }
    }

    /// The most recent checkpoint at or before `tick`, if the window still
    /// covers it.
    #[must_use]
    pub fn nearest_at_or_before(&self, tick: u64) -> Option<&Checkpoint> {
        self.checkpoints.iter().rev().find(|c| c.tick() <= tick)
    }

    /// The most recently captured checkpoint, if any.
    #[must_use]
    pub fn latest(&self) -> Option<&Checkpoint> {
        self.checkpoints.back()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaytick_component::Domain;
    use relaytick_world::World;

    #[test]
    fn test_ring_evicts_beyond_window() {
        let mut ring = CheckpointRing::new(2);
        for tick in 0..4u64 {
            let mut world = World::new(Domain::PRODUCER);
            world.set_tick(tick);
            ring.push(Checkpoint::capture(&world, &[]));
        }
        assert!(ring.nearest_at_or_before(0).is_none());
        assert_eq!(ring.nearest_at_or_before(3).unwrap().tick(), 3);
        assert_eq!(ring.nearest_at_or_before(2).unwrap().tick(), 2);
    }

    #[test]
    fn test_nearest_at_or_before_skips_future_checkpoints() {
        let mut ring = CheckpointRing::new(4);
        for tick in [1u64, 5, 9] {
            let mut world = World::new(Domain::PRODUCER);
            world.set_tick(tick);
            ring.push(Checkpoint::capture(&world, &[]));
        }
        assert_eq!(ring.nearest_at_or_before(7).unwrap().tick(), 5);
        assert!(ring.nearest_at_or_before(0).is_none());
    }
}
