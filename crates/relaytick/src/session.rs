//! The one piece this facade adds beyond re-exports: a `Session` that
//! sequences a tick the way `engine_app::TickLoop` drives the coordinator,
//! minus the transport — packets go in and out through plain method calls
//! rather than a NATS connection, which lives outside this crate's scope.

use relaytick_component::Domain;
use relaytick_history::History;
use relaytick_replication::{ReplicationConfig, ReplicationError, ReplicationStream};
use relaytick_schedule::ScheduleError;
use relaytick_system::SystemRunner;
use relaytick_wire::{Snapshot, Transaction, TransactionOp};
use relaytick_world::World;

/// Either half of a tick's work failing: the scheduler raised a cycle (or
/// missing-resource) error, or reconciliation hit a protocol-level error
/// replaying remote data.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error(transparent)]
    Replication(#[from] ReplicationError),
}

/// Owns one domain's `World`, its rollback history, its outbound
/// replication stream, and its inbound reconciler, and sequences a tick
/// across all four the way the reference deployment's driver loop would.
pub struct Session {
    world: World,
    history: History,
    config: ReplicationConfig,
    stream: ReplicationStream,
    reconciler: relaytick_replication::Reconciler,
}

impl Session {
    /// Create a session for `domain`, configured per `config`.
    #[must_use]
    pub fn new(domain: Domain, config: ReplicationConfig) -> Self {
        Self {
            world: World::new(domain),
            history: History::new(config.history_window),
            stream: ReplicationStream::new(domain.0),
            reconciler: relaytick_replication::Reconciler::new(),
            config,
        }
    }

    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    #[must_use]
    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut History {
        &mut self.history
    }

    #[must_use]
    pub fn reconciler(&self) -> &relaytick_replication::Reconciler {
        &self.reconciler
    }

    pub fn reconciler_mut(&mut self) -> &mut relaytick_replication::Reconciler {
        &mut self.reconciler
    }

    /// Append an op this tick produced for a `Replicated`-tagged entity to
    /// the outbound transaction stream.
    pub fn record_replicated_op(&mut self, op: TransactionOp) {
        self.stream.record(op);
    }

    /// Buffer an incoming remote transaction for later reconciliation.
    pub fn ingest_transaction(&mut self, tick: u64, transaction: Transaction) {
        self.reconciler.ingest_transaction(tick, transaction);
    }

    /// Buffer an incoming remote snapshot for later reconciliation.
    pub fn ingest_snapshot(&mut self, tick: u64, snapshot: Snapshot) {
        self.reconciler.ingest_snapshot(tick, snapshot);
    }

    /// Drain every transaction queued for transport since the last drain.
    pub fn drain_transactions(&mut self) -> Vec<Transaction> {
        self.stream.drain_transactions()
    }

    /// Drain every snapshot queued for transport since the last drain.
    pub fn drain_snapshots(&mut self) -> Vec<Snapshot> {
        self.stream.drain_snapshots()
    }

    /// Roll the world back to (at best) `target_tick` through `history`,
    /// without going through reconciliation. Returns the tick it landed on.
    pub fn rollback_to(&mut self, target_tick: u64) -> u64 {
        self.history.rollback_to(&mut self.world, target_tick)
    }

    /// Capture a checkpoint of the current world state immediately, outside
    /// the usual `checkpoint_interval` cadence. Useful for seeding history
    /// with a floor to roll back to before any undo entries exist.
    pub fn checkpoint_now(&mut self, tracked: &[relaytick_component::ComponentId]) {
        self.history.capture_checkpoint(&self.world, tracked);
    }

    /// Advance one tick: if buffered remote data requires it, roll back and
    /// resimulate forward through `runner` first (spec's consumer pipeline,
    /// steps 1–4 already having happened via `ingest_transaction`/
    /// `ingest_snapshot`), then advance to the next tick and run `runner`
    /// once more for it, then capture a checkpoint and flush the
    /// replication stream on their configured intervals (step 5).
    ///
    /// Returns the names of the systems that ran for the *new* current
    /// tick, in execution order.
    pub fn step(&mut self, runner: &mut SystemRunner) -> Result<Vec<String>, SessionError> {
        let current = self.world.tick();
        let mut last_error = None;
        self.reconciler
            .reconcile(&mut self.world, &mut self.history, current, |world| {
                if let Err(err) = runner.run_tick(world) {
                    last_error = Some(err);
                }
            })?;
        if let Some(err) = last_error {
            return Err(err.into());
        }

        self.world.advance_tick();
        let executed = runner.run_tick(&mut self.world)?;

        let tick = self.world.tick();
        if self.config.checkpoint_interval > 0 && tick % u64::from(self.config.checkpoint_interval) == 0 {
            self.history.capture_checkpoint(&self.world, &self.config.snapshot_components);
        }
        self.reconciler.ghosts_mut().evict_stale(tick, self.config.ghost_cleanup_window);
        self.stream.finish_tick(tick, &self.world, &self.config);

        Ok(executed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaytick_component::Query;

    #[test]
    fn test_step_advances_tick_and_runs_systems() {
        let mut session = Session::new(Domain::PRODUCER, ReplicationConfig::new());
        let mut runner = SystemRunner::new(1.0 / 60.0);
        runner.register("noop", Query::new(), Box::new(|_ctx| {}));

        let executed = session.step(&mut runner).unwrap();
        assert_eq!(executed, vec!["noop".to_string()]);
        assert_eq!(session.world().tick(), 1);
    }

    #[test]
    fn test_step_evicts_ghosts_past_the_cleanup_window() {
        use relaytick_component::Entity;
        use relaytick_wire::{Transaction, TransactionOp};

        let mut session = Session::new(
            Domain(1),
            ReplicationConfig::new()
                .with_checkpoint_interval(0)
                .with_history_window(128)
                .with_ghost_cleanup_window(5),
        );
        let mut runner = SystemRunner::new(1.0 / 60.0);
        runner.register("noop", Query::new(), Box::new(|_ctx| {}));

        // Seed a rollback floor, then get ahead of it before the correction
        // arrives, the same way the reconciliation integration test does.
        session.checkpoint_now(&[]);
        for _ in 0..3 {
            session.world_mut().advance_tick();
        }

        let foreign = Entity::new(Domain::PRODUCER, 1);
        session.ingest_transaction(
            1,
            Transaction { domain_id: 0, seq: 0, ops: vec![TransactionOp::Spawn { entity: foreign, components: vec![], causal_key: None }] },
        );

        // This step rolls back to the tick-0 checkpoint, resimulates through
        // the buffered spawn at tick 1, then advances to tick 4. The ghost
        // is only 3 ticks stale at that point, inside the cleanup window.
        session.step(&mut runner).unwrap();
        assert!(!session.reconciler().ghosts().is_empty());

        // Three more quiet ticks push it past the window.
        for _ in 0..3 {
            session.step(&mut runner).unwrap();
        }
        assert!(session.reconciler().ghosts().is_empty());
    }

    #[test]
    fn test_checkpoint_now_is_available_outside_the_configured_cadence() {
        let mut session = Session::new(Domain::PRODUCER, ReplicationConfig::new().with_checkpoint_interval(0));
        session.checkpoint_now(&[]);
        // A rollback to the present tick is always a no-op regardless of
        // whether a checkpoint exists; this just exercises that capturing
        // one on demand doesn't panic or require a system to have run.
        assert_eq!(session.rollback_to(0), 0);
    }
}
