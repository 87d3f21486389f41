//! # relaytick_history
//!
//! Checkpoints and the undo log that let a [`relaytick_world::World`] roll
//! back to an earlier tick before reconciliation resimulates forward from
//! there.

pub mod checkpoint;
pub mod history;
pub mod ring;
pub mod undo;

pub use checkpoint::Checkpoint;
pub use history::History;
pub use ring::CheckpointRing;
pub use undo::{UndoLog, UndoOp};
