//! # relaytick_system
//!
//! Binds named system functions to the queries they declare and runs them,
//! once per tick, in the order [`relaytick_schedule`] computes from those
//! declarations.

pub mod context;
pub mod runner;

pub use context::SystemContext;
pub use runner::{SystemFn, SystemRunner};
