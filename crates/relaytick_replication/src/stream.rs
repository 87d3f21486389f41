//! Producer-side emission: buffers ops for replicated entities over the
//! course of a tick, then flushes them into a [`Transaction`] and, on
//! configured intervals, a full [`Snapshot`].

use relaytick_component::ComponentId;
use relaytick_wire::{Snapshot, SnapshotBlock, Transaction, TransactionOp};
use relaytick_world::World;

use crate::config::ReplicationConfig;

/// Buffers one tick's worth of replicated mutations and the outgoing
/// transaction/snapshot queues a transport drains after the tick.
#[derive(Debug)]
pub struct ReplicationStream {
    domain_id: u8,
    seq: u64,
    pending_ops: Vec<TransactionOp>,
    transactions: Vec<Transaction>,
    snapshots: Vec<Snapshot>,
}

impl ReplicationStream {
    /// Create a stream for the producer's own `domain_id`.
    #[must_use]
    pub fn new(domain_id: u8) -> Self {
        Self {
            domain_id,
            seq: 0,
            pending_ops: Vec::new(),
            transactions: Vec::new(),
            snapshots: Vec::new(),
        }
    }

    /// Append one op for a mutation to a replication-eligible entity.
    /// Callers are expected to have already checked the entity carries
    /// the `Replicated` tag.
    pub fn record(&mut self, op: TransactionOp) {
        self.pending_ops.push(op);
    }

    /// Flush this tick's pending ops into a [`Transaction`] and, if
    /// `config.snapshot_interval` divides `tick`, a [`Snapshot`] of
    /// `config.snapshot_components`. Both are appended to this stream's
    /// outbound queues for the transport to drain.
    pub fn finish_tick(&mut self, tick: u64, world: &World, config: &ReplicationConfig) {
        if !self.pending_ops.is_empty() {
            let ops = std::mem::take(&mut self.pending_ops);
            let seq = self.seq;
            self.seq += 1;
            tracing::debug!(domain = self.domain_id, tick, seq, ops = ops.len(), "flushing transaction");
            self.transactions.push(Transaction {
                domain_id: self.domain_id,
                seq,
                ops,
            });
        }

        if config.snapshot_interval > 0 && tick % u64::from(config.snapshot_interval) == 0 {
            let snapshot = self.build_snapshot(world, &config.snapshot_components);
            tracing::debug!(tick, components = config.snapshot_components.len(), "emitting snapshot");
            self.snapshots.push(snapshot);
        }
    }

    fn build_snapshot(&self, world: &World, components: &[ComponentId]) -> Snapshot {
        let mut blocks = Vec::with_capacity(components.len());
        for &component in components {
            let rows: Vec<_> = world
                .entities()
                .filter_map(|entity| world.get_raw(entity, component).map(|bytes| (entity, bytes.to_vec())))
                .collect();
            blocks.push(SnapshotBlock { component, rows });
        }
        Snapshot::from_blocks(&blocks)
    }

    /// Drain every transaction queued since the last drain.
    pub fn drain_transactions(&mut self) -> Vec<Transaction> {
        std::mem::take(&mut self.transactions)
    }

    /// Drain every snapshot queued since the last drain.
    pub fn drain_snapshots(&mut self) -> Vec<Snapshot> {
        std::mem::take(&mut self.snapshots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaytick_component::{Component, Domain, Entity};

    #[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
    struct Position {
        x: f32,
    }
    impl Component for Position {
        fn type_name() -> &'static str {
            "Position"
        }
    }

    #[test]
    fn test_finish_tick_flushes_pending_ops_into_one_transaction() {
        let world = World::new(Domain::PRODUCER);
        let mut stream = ReplicationStream::new(0);
        stream.record(TransactionOp::Despawn { entity: Entity::new(Domain::PRODUCER, 1) });
        stream.record(TransactionOp::Despawn { entity: Entity::new(Domain::PRODUCER, 2) });

        stream.finish_tick(1, &world, &ReplicationConfig::new().with_snapshot_interval(0));
        let txns = stream.drain_transactions();
        assert_eq!(txns.len(), 1);
        assert_eq!(txns[0].seq, 0);
        assert_eq!(txns[0].ops.len(), 2);
        assert!(stream.drain_transactions().is_empty());
    }

    #[test]
    fn test_snapshot_emitted_on_configured_interval() {
        let mut world = World::new(Domain::PRODUCER);
        let e = world.spawn();
        world.add(e, Position { x: 1.0 }).unwrap();
        let position_id = world.components().id_of::<Position>().unwrap();

        let config = ReplicationConfig::new().with_snapshot_interval(2).with_snapshot_components(vec![position_id]);
        let mut stream = ReplicationStream::new(0);

        stream.finish_tick(1, &world, &config);
        assert!(stream.drain_snapshots().is_empty());

        stream.finish_tick(2, &world, &config);
        let snapshots = stream.drain_snapshots();
        assert_eq!(snapshots.len(), 1);
        let blocks = snapshots[0].blocks().unwrap();
        assert_eq!(blocks[0].rows.len(), 1);
    }

    #[test]
    fn test_seq_increments_once_per_flushed_transaction() {
        let world = World::new(Domain::PRODUCER);
        let mut stream = ReplicationStream::new(1);
        let config = ReplicationConfig::new().with_snapshot_interval(0);

        stream.record(TransactionOp::Despawn { entity: Entity::new(Domain::PRODUCER, 1) });
        stream.finish_tick(1, &world, &config);
        stream.record(TransactionOp::Despawn { entity: Entity::new(Domain::PRODUCER, 1) });
        stream.finish_tick(2, &world, &config);

        let txns = stream.drain_transactions();
        assert_eq!(txns[0].seq, 0);
        assert_eq!(txns[1].seq, 1);
    }
}
