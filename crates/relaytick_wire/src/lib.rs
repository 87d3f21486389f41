//! # relaytick_wire
//!
//! The binary wire protocol replication traffic is framed in: little-endian
//! multibyte integers, LEB128 varints for entity/component ids, and one
//! struct per message kind under [`message`].

pub mod error;
pub mod message;
pub mod varint;

pub use error::WireError;
pub use message::{
    ClientHandshake, Clocksync, Command, CommandEntry, FrameHeader, MessageKind, RelationRef, ServerHandshake,
    Snapshot, SnapshotBlock, SpawnComponent, Transaction, TransactionOp, read_header, write_header,
};
pub use varint::{read_uvarint, write_uvarint};
