//! Consumer-side reconciliation: buffers incoming transactions and
//! snapshots by tick, decides whether they require a rollback, and replays
//! them against a local [`World`] through [`relaytick_history::History`].

use std::collections::{BTreeMap, HashSet};

use relaytick_history::History;
use relaytick_wire::{Snapshot, Transaction, TransactionOp};
use relaytick_world::World;

use crate::error::ReplicationError;
use crate::ghost::GhostMap;

/// Applies remote transactions and snapshots to a local world, rolling the
/// world back first when a packet arrives for a tick already simulated.
#[derive(Debug)]
pub struct Reconciler {
    ghosts: GhostMap,
    incoming_transactions: BTreeMap<u64, Vec<Transaction>>,
    incoming_snapshots: BTreeMap<u64, Vec<Snapshot>>,
    suppressed_causal_keys: HashSet<u32>,
}

impl Reconciler {
    /// Create a reconciler with an empty ghost map and no buffered packets.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ghosts: GhostMap::new(),
            incoming_transactions: BTreeMap::new(),
            incoming_snapshots: BTreeMap::new(),
            suppressed_causal_keys: HashSet::new(),
        }
    }

    /// Read-only access to the ghost map, e.g. for periodic eviction.
    #[must_use]
    pub fn ghosts(&self) -> &GhostMap {
        &self.ghosts
    }

    /// Mutable access to the ghost map, for periodic eviction.
    pub fn ghosts_mut(&mut self) -> &mut GhostMap {
        &mut self.ghosts
    }

    /// Queue `transaction` for application at `tick`.
    pub fn ingest_transaction(&mut self, tick: u64, transaction: Transaction) {
        self.incoming_transactions.entry(tick).or_default().push(transaction);
    }

    /// Queue `snapshot` for application at `tick`.
    pub fn ingest_snapshot(&mut self, tick: u64, snapshot: Snapshot) {
        self.incoming_snapshots.entry(tick).or_default().push(snapshot);
    }

    /// Register a causal key as belonging to a locally-issued command, so
    /// the echo of it coming back from the authoritative producer is
    /// recognised and suppressed rather than re-applied.
    pub fn suppress_causal_key(&mut self, key: u32) {
        self.suppressed_causal_keys.insert(key);
    }

    /// The earliest buffered tick at or before `current_tick` that still
    /// needs applying, if one exists. Per the reconciliation algorithm, a
    /// packet timestamped at or after the world's current tick can be
    /// applied going forward without a rollback; an earlier one means the
    /// world must roll back to it first and resimulate.
    #[must_use]
    pub fn pending_rollback_target(&self, current_tick: u64) -> Option<u64> {
        let earliest_transaction = self.incoming_transactions.keys().next().copied();
        let earliest_snapshot = self.incoming_snapshots.keys().next().copied();
        let earliest = match (earliest_transaction, earliest_snapshot) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (None, None) => return None,
        };
        if earliest < current_tick {
            Some(earliest)
        } else {
            None
        }
    }

    /// Roll `world` back to the earliest tick a buffered packet requires
    /// (via `history`), then walk forward tick by tick up to and including
    /// `up_to_tick`: at each tick, apply that tick's buffered snapshots and
    /// transactions (snapshots first, transactions in `seq` order), then
    /// call `resimulate` so the caller can re-run its local systems against
    /// the now-corrected state before moving to the next tick.
    ///
    /// `resimulate` runs once per tick in `landed+1..=up_to_tick`, including
    /// ticks with no buffered remote data — prediction needs re-running
    /// just as much as the ticks that received a correction.
    pub fn reconcile<F>(
        &mut self,
        world: &mut World,
        history: &mut History,
        up_to_tick: u64,
        mut resimulate: F,
    ) -> Result<(), ReplicationError>
    where
        F: FnMut(&mut World),
    {
        let current = world.tick();
        let start = match self.pending_rollback_target(current) {
            Some(target) => {
                let landed = history.rollback_to(world, target);
                if landed == current {
                    self.drop_entries_at_or_before(target);
                    tracing::warn!(target, floor = current, "rollback target outside retained history, dropping buffered packets up to it");
                } else {
                    tracing::info!(target, landed, "reconciliation triggered rollback");
                }
                landed + 1
            }
            None => current + 1,
        };

        for tick in start..=up_to_tick {
            world.set_tick(tick);
            if let Some(snapshots) = self.incoming_snapshots.remove(&tick) {
                for snapshot in snapshots {
                    self.apply_snapshot(world, &snapshot)?;
                }
            }
            if let Some(mut transactions) = self.incoming_transactions.remove(&tick) {
                transactions.sort_by_key(|t| t.seq);
                for transaction in transactions {
                    self.apply_transaction(world, tick, &transaction)?;
                }
            }
            resimulate(world);
        }
        Ok(())
    }

    /// Discard every buffered transaction and snapshot at or before `tick`,
    /// used when a rollback request falls outside the retained history
    /// window and replaying it is no longer possible. Without this, the
    /// same stale entry would keep being reported as the pending rollback
    /// target on every later call.
    fn drop_entries_at_or_before(&mut self, tick: u64) {
        let stale_transactions: Vec<u64> = self.incoming_transactions.range(..=tick).map(|(&t, _)| t).collect();
        for t in stale_transactions {
            self.incoming_transactions.remove(&t);
        }
        let stale_snapshots: Vec<u64> = self.incoming_snapshots.range(..=tick).map(|(&t, _)| t).collect();
        for t in stale_snapshots {
            self.incoming_snapshots.remove(&t);
        }
    }

    fn apply_snapshot(&mut self, world: &mut World, snapshot: &Snapshot) -> Result<(), ReplicationError> {
        let blocks = snapshot.blocks()?;
        for block in blocks {
            let meta = world
                .components()
                .meta(block.component)
                .ok_or(ReplicationError::ProtocolMismatch(block.component))?
                .clone();
            let tick = world.tick();
            for (foreign, payload) in block.rows {
                let local = self.ghosts.resolve_or_spawn(world, foreign, tick);
                let raw = if meta.is_tag {
                    Vec::new()
                } else {
                    (meta.decode_fn)(&payload).map_err(|_| ReplicationError::ProtocolMismatch(block.component))?
                };
                if world.has_raw(local, block.component) {
                    world.set_raw(local, block.component, &raw).ok();
                } else {
                    world.add_raw(local, block.component, &raw).ok();
                }
            }
        }
        Ok(())
    }

    fn apply_transaction(&mut self, world: &mut World, tick: u64, transaction: &Transaction) -> Result<(), ReplicationError> {
        for op in &transaction.ops {
            self.apply_op(world, tick, op)?;
        }
        Ok(())
    }

    fn apply_op(&mut self, world: &mut World, tick: u64, op: &TransactionOp) -> Result<(), ReplicationError> {
        match op {
            TransactionOp::Spawn { entity, components, causal_key } => {
                if let Some(key) = causal_key
                    && self.suppressed_causal_keys.remove(key)
                {
                    tracing::debug!(key, "suppressing echo of locally-issued command");
                    return Ok(());
                }
                let local = self.ghosts.resolve_or_spawn(world, *entity, tick);
                for component in components {
                    let meta = world
                        .components()
                        .meta(component.id)
                        .ok_or(ReplicationError::ProtocolMismatch(component.id))?
                        .clone();
                    let raw = match &component.payload {
                        Some(payload) if !meta.is_tag => {
                            (meta.decode_fn)(payload).map_err(|_| ReplicationError::ProtocolMismatch(component.id))?
                        }
                        _ => Vec::new(),
                    };
                    world.add_raw(local, component.id, &raw).ok();
                    if let Some(rel) = &component.relation {
                        let object = self.ghosts.resolve_or_spawn(world, rel.object, tick);
                        world.attach_relation_raw(local, rel.relation, object).ok();
                    }
                }
                Ok(())
            }
            TransactionOp::Despawn { entity } => {
                let Some(local) = self.ghosts.resolve(*entity, tick) else {
                    tracing::debug!(?entity, "despawn for unknown ghost ignored");
                    return Ok(());
                };
                world.despawn(local).ok();
                Ok(())
            }
            TransactionOp::Set { entity, component, payload, version: _, relation } => {
                let Some(local) = self.ghosts.resolve(*entity, tick) else {
                    tracing::debug!(?entity, "set for unknown ghost ignored");
                    return Ok(());
                };
                let meta = world
                    .components()
                    .meta(*component)
                    .ok_or(ReplicationError::ProtocolMismatch(*component))?
                    .clone();
                let raw = match payload {
                    Some(payload) if !meta.is_tag => {
                        (meta.decode_fn)(payload).map_err(|_| ReplicationError::ProtocolMismatch(*component))?
                    }
                    _ => Vec::new(),
                };
                world.set_raw(local, *component, &raw).ok();
                if let Some(rel) = relation {
                    let object = self.ghosts.resolve_or_spawn(world, rel.object, tick);
                    world.attach_relation_raw(local, rel.relation, object).ok();
                }
                Ok(())
            }
            TransactionOp::Add { entity, component, payload, relation } => {
                let Some(local) = self.ghosts.resolve(*entity, tick) else {
                    tracing::debug!(?entity, "add for unknown ghost ignored");
                    return Ok(());
                };
                let meta = world
                    .components()
                    .meta(*component)
                    .ok_or(ReplicationError::ProtocolMismatch(*component))?
                    .clone();
                let raw = match payload {
                    Some(payload) if !meta.is_tag => {
                        (meta.decode_fn)(payload).map_err(|_| ReplicationError::ProtocolMismatch(*component))?
                    }
                    _ => Vec::new(),
                };
                world.add_raw(local, *component, &raw).ok();
                if let Some(rel) = relation {
                    let object = self.ghosts.resolve_or_spawn(world, rel.object, tick);
                    world.attach_relation_raw(local, rel.relation, object).ok();
                }
                Ok(())
            }
            TransactionOp::Remove { entity, component } => {
                let Some(local) = self.ghosts.resolve(*entity, tick) else {
                    tracing::debug!(?entity, "remove for unknown ghost ignored");
                    return Ok(());
                };
                world.remove_raw(local, *component).ok();
                Ok(())
            }
        }
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}
