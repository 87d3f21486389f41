//! Plain configuration structs for the replication and reconciliation
//! layer, matching the teacher's `TickConfig`/`SystemConfig` convention:
//! a `Default` impl plus `with_*` builder methods, no file-based config
//! parser.

use relaytick_component::ComponentId;

/// Tuning for producer-side emission and consumer-side history retention.
///
/// Numeric defaults aren't specified in the system this was distilled
/// from; the ones below are conservative choices for a 60Hz simulation,
/// recorded as an explicit decision rather than left to whoever
/// instantiates this type first.
#[derive(Debug, Clone)]
pub struct ReplicationConfig {
    /// Emit a full snapshot every this many ticks.
    pub snapshot_interval: u32,
    /// Components included in a snapshot block.
    pub snapshot_components: Vec<ComponentId>,
    /// Capture a checkpoint every this many ticks.
    pub checkpoint_interval: u32,
    /// Ticks of checkpoint + undo history retained for rollback.
    pub history_window: u32,
    /// Ticks of inactivity before an unreferenced ghost is garbage
    /// collected.
    pub ghost_cleanup_window: u32,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            snapshot_interval: 300,
            snapshot_components: Vec::new(),
            checkpoint_interval: 60,
            history_window: 120,
            ghost_cleanup_window: 300,
        }
    }
}

impl ReplicationConfig {
    /// Start from the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_snapshot_interval(mut self, ticks: u32) -> Self {
        self.snapshot_interval = ticks;
        self
    }

    #[must_use]
    pub fn with_snapshot_components(mut self, components: Vec<ComponentId>) -> Self {
        self.snapshot_components = components;
        self
    }

    #[must_use]
    pub fn with_checkpoint_interval(mut self, ticks: u32) -> Self {
        self.checkpoint_interval = ticks;
        self
    }

    #[must_use]
    pub fn with_history_window(mut self, ticks: u32) -> Self {
        self.history_window = ticks;
        self
    }

    #[must_use]
    pub fn with_ghost_cleanup_window(mut self, ticks: u32) -> Self {
        self.ghost_cleanup_window = ticks;
        self
    }
}

/// Tuning for the per-peer clock-offset estimator.
#[derive(Debug, Clone)]
pub struct ClockSyncConfig {
    /// Maximum samples kept per peer before the oldest is evicted.
    pub max_samples: usize,
}

impl Default for ClockSyncConfig {
    fn default() -> Self {
        Self { max_samples: 32 }
    }
}

impl ClockSyncConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples;
        self
    }
}
