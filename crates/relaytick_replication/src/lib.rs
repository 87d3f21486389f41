//! Replication and reconciliation: the producer side that buffers and emits
//! transactions/snapshots for entities tagged `Replicated`, and the consumer
//! side that ingests them, rolls a predicted world back when they arrive
//! late, and resimulates forward. Clock-offset estimation and the ephemeral
//! command-entity convention used to carry player intent across the wire
//! both live here too, since all three exist purely to serve reconciliation.

mod clocksync;
mod command;
mod config;
mod error;
mod ghost;
mod reconcile;
mod stream;
mod tags;

pub use clocksync::ClockSyncEstimator;
pub use command::CommandBuffer;
pub use config::{ClockSyncConfig, ReplicationConfig};
pub use error::ReplicationError;
pub use ghost::GhostMap;
pub use reconcile::Reconciler;
pub use stream::ReplicationStream;
pub use tags::{causal_key, CausalKey, CommandOf, IntentTick, Replicated};
