//! Eviction Policy
//!
//! Bounds buffered media to a trailing window behind the playback cursor.
//! Removes are only planned when the resource is idle and no other Remove
//! is waiting, so at most one eviction is ever outstanding.

use super::config::EvictionConfig;
use super::segment::Operation;
use tracing::debug;

/// Session facts the policy decides on
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvictionContext {
    pub playing: bool,
    /// No mutation in flight against the resource
    pub resource_idle: bool,
    /// A Remove is already waiting in the queue
    pub remove_queued: bool,
    pub cursor: f64,
}

impl EvictionContext {
    fn eligible(&self) -> bool {
        self.playing && self.resource_idle && !self.remove_queued
    }
}

/// Planned-removal counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionStats {
    pub normal: u64,
    pub forced: u64,
    /// Attempts turned down by the context or the window
    pub declined: u64,
}

#[derive(Debug, Clone)]
pub struct EvictionPolicy {
    config: EvictionConfig,
    stats: EvictionStats,
}

impl EvictionPolicy {
    pub fn new(config: EvictionConfig) -> Self {
        EvictionPolicy {
            config,
            stats: EvictionStats::default(),
        }
    }

    pub fn config(&self) -> &EvictionConfig {
        &self.config
    }

    pub fn stats(&self) -> EvictionStats {
        self.stats
    }

    /// Plan a `Remove(0, cursor - retain)`.
    ///
    /// Normal eviction waits until the cursor passes `start_after_secs`;
    /// forced eviction (after a capacity failure) ignores that threshold.
    pub fn plan(&mut self, ctx: EvictionContext, forced: bool) -> Option<Operation> {
        if !ctx.eligible() {
            self.stats.declined += 1;
            return None;
        }
        if !forced && ctx.cursor <= self.config.start_after_secs {
            return None;
        }

        let end = ctx.cursor - self.config.retain_secs;
        if end <= 0.0 {
            debug!(cursor = ctx.cursor, forced, "nothing old enough to evict");
            self.stats.declined += 1;
            return None;
        }

        if forced {
            self.stats.forced += 1;
        } else {
            self.stats.normal += 1;
        }
        Some(Operation::Remove { start: 0.0, end })
    }
}
