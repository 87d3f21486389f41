//! # relaytick_world
//!
//! The [`World`]: component registries, the archetype graph, per-component
//! columnar storage, and the tick counter that everything else in a
//! simulation domain is built on top of.

pub mod column;
pub mod world;

pub use column::Column;
pub use world::{QueryMatches, World, WorldError};
