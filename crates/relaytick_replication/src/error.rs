//! Errors raised while emitting or ingesting replication traffic.

use relaytick_component::ComponentId;

/// Errors from the replication and reconciliation layer.
#[derive(Debug, thiserror::Error)]
pub enum ReplicationError {
    /// An incoming transaction named a component ID this world never
    /// registered — a protocol mismatch between producer and consumer,
    /// fatal for the connection.
    #[error("transaction referenced unknown component id {0:?}")]
    ProtocolMismatch(ComponentId),

    /// A rollback was requested for a tick older than the retained
    /// history window. The caller drops the offending packet and
    /// continues rather than treating this as fatal.
    #[error("rollback to tick {requested} requested, but history only retains back to {floor}")]
    OutOfWindow { requested: u64, floor: u64 },

    /// An operation referenced a foreign entity with no ghost binding and
    /// no accompanying `Spawn` to create one.
    #[error("no ghost binding for foreign entity in this transaction")]
    UnknownGhost,

    /// A snapshot's byte blocks failed to parse.
    #[error(transparent)]
    Malformed(#[from] relaytick_wire::WireError),
}
