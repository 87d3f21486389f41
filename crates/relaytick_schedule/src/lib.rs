//! # relaytick_schedule
//!
//! Turns registered systems' declared read/write access into a single,
//! deterministic topological execution order.

pub mod schedule;

pub use schedule::{Scheduler, ScheduleError, SystemDescriptor, build_order};
