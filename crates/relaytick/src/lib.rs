//! Networked, tick-based ECS runtime.
//!
//! This crate is a thin facade over the seven crates that do the actual
//! work — archetype storage and the query engine
//! ([`relaytick_component`], [`relaytick_world`]), the topological
//! scheduler ([`relaytick_schedule`]), rollback history
//! ([`relaytick_history`]), the wire protocol ([`relaytick_wire`]), the
//! synchronous system-binding layer ([`relaytick_system`]), and
//! replication/reconciliation ([`relaytick_replication`]) — plus one new
//! thing: [`Session`], which sequences all of them across a tick the way a
//! driver loop would.
//!
//! Downstream crates are expected to depend on this one rather than the
//! individual pieces directly, except where they need a type this facade
//! doesn't re-export.

mod session;

pub use session::{Session, SessionError};

pub use relaytick_component::{
    ArchetypeNode, Component, ComponentError, ComponentId, ComponentRegistry, Domain, Entity,
    Query, Relation, RelationId, RelationRegistry,
};
pub use relaytick_history::{Checkpoint, History, UndoLog, UndoOp};
pub use relaytick_replication::{
    causal_key, CausalKey, ClockSyncConfig, ClockSyncEstimator, CommandBuffer, CommandOf, GhostMap,
    IntentTick, Reconciler, Replicated, ReplicationConfig, ReplicationError, ReplicationStream,
};
pub use relaytick_schedule::{ScheduleError, Scheduler};
pub use relaytick_system::{SystemContext, SystemFn, SystemRunner};
pub use relaytick_wire::{
    ClientHandshake, Clocksync, Command, CommandEntry, FrameHeader, MessageKind, RelationRef,
    ServerHandshake, Snapshot, SnapshotBlock, SpawnComponent, Transaction, TransactionOp, WireError,
};
pub use relaytick_world::{World, WorldError};
