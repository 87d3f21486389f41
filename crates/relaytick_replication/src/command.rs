//! Ephemeral command entities: a consumer's locally-issued intent, spawned
//! under a `CommandOf` relation to the player entity and stamped with a
//! causal key so the consumer can recognise its own command echoed back in
//! a later producer transaction.

use relaytick_component::{ComponentId, Entity};
use relaytick_wire::CommandEntry;
use relaytick_world::World;

use crate::tags::{causal_key, CausalKey, CommandOf, IntentTick};

/// Buffers ephemeral command entities issued against `player` this tick and
/// packages them into wire [`CommandEntry`] records.
#[derive(Debug)]
pub struct CommandBuffer {
    domain_id: u8,
    seq: u32,
    issued: Vec<(Entity, u32)>,
}

impl CommandBuffer {
    /// Create a buffer for commands originating from `domain_id`.
    #[must_use]
    pub fn new(domain_id: u8) -> Self {
        Self {
            domain_id,
            seq: 0,
            issued: Vec::new(),
        }
    }

    /// Spawn an ephemeral entity carrying `payload` (already encoded as raw
    /// component bytes) for `component`, related to `player` via
    /// [`CommandOf`], tagged with the tick it was issued at and a fresh
    /// causal key. Returns the causal key so the caller can register it
    /// with a [`crate::reconcile::Reconciler`] for echo suppression.
    pub fn issue(
        &mut self,
        world: &mut World,
        player: Entity,
        component: ComponentId,
        payload: &[u8],
        tick: u64,
    ) -> Result<u32, relaytick_world::WorldError> {
        let key = causal_key(self.domain_id, tick, self.seq);
        self.seq += 1;

        let command_entity = world.spawn();
        world.add_raw(command_entity, component, payload)?;
        world.add(command_entity, IntentTick(tick))?;
        world.add(command_entity, CausalKey(key))?;
        world.attach_relation::<CommandOf>(command_entity, player)?;

        self.issued.push((command_entity, key));
        Ok(key)
    }

    /// Package every command issued since the last call into wire
    /// [`CommandEntry`] records, leaving the ephemeral entities themselves
    /// in the world (a local system is expected to consume and despawn
    /// them once applied).
    pub fn drain(&mut self, world: &World, component: ComponentId, player: Entity) -> Vec<CommandEntry> {
        self.issued
            .drain(..)
            .filter_map(|(entity, _key)| {
                let payload = world.get_raw(entity, component)?.to_vec();
                Some(CommandEntry {
                    target: player,
                    component,
                    payload: Some(payload),
                })
            })
            .collect()
    }
}
