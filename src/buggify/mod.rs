//! BUGGIFY - Deterministic Fault Injection
//!
//! Decision points in the simulated collaborators (buffer resource, segment
//! source, playback surface) ask `buggify!` whether to misbehave. Given the
//! same seed the same faults fire at the same places, so a failing DST seed
//! replays exactly.
//!
//! ```ignore
//! if buggify!(&mut self.rng, faults::buffer::CAPACITY_SQUEEZE, config.capacity_squeeze_prob) {
//!     return Err(SubmitError::CapacityExceeded);
//! }
//! ```

pub mod config;
pub mod faults;

pub use config::FaultConfig;
pub use faults::ALL_FAULTS;

use std::cell::RefCell;
use std::collections::BTreeMap;

/// Check/trigger counters per fault ID
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuggifyStats {
    pub checks: BTreeMap<String, u64>,
    pub triggers: BTreeMap<String, u64>,
}

impl BuggifyStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_check(&mut self, fault_id: &str) {
        *self.checks.entry(fault_id.to_string()).or_insert(0) += 1;
    }

    pub fn record_trigger(&mut self, fault_id: &str) {
        *self.triggers.entry(fault_id.to_string()).or_insert(0) += 1;
    }

    pub fn triggered(&self, fault_id: &str) -> u64 {
        self.triggers.get(fault_id).copied().unwrap_or(0)
    }

    pub fn total_triggered(&self) -> u64 {
        self.triggers.values().sum()
    }

    /// One `id: triggers/checks` line per fault that was checked
    pub fn summary(&self) -> String {
        let mut lines = vec!["BUGGIFY Statistics:".to_string()];
        for (id, checks) in &self.checks {
            lines.push(format!("  {}: {}/{}", id, self.triggered(id), checks));
        }
        lines.join("\n")
    }
}

thread_local! {
    static BUGGIFY_CONTEXT: RefCell<BuggifyContext> = RefCell::new(BuggifyContext::default());
}

/// Per-thread buggify context
#[derive(Debug, Default)]
struct BuggifyContext {
    config: FaultConfig,
    stats: BuggifyStats,
}

/// Set the buggify configuration for the current thread
pub fn set_config(config: FaultConfig) {
    BUGGIFY_CONTEXT.with(|ctx| {
        ctx.borrow_mut().config = config;
    });
}

/// Get current buggify stats for the thread
pub fn get_stats() -> BuggifyStats {
    BUGGIFY_CONTEXT.with(|ctx| ctx.borrow().stats.clone())
}

/// Reset stats for the current thread
pub fn reset_stats() {
    BUGGIFY_CONTEXT.with(|ctx| {
        ctx.borrow_mut().stats = BuggifyStats::new();
    });
}

/// Check a fault at the given site probability, scaled by the thread's config
#[inline]
pub fn should_buggify<R: crate::io::Rng + ?Sized>(
    rng: &mut R,
    fault_id: &str,
    probability: f64,
) -> bool {
    BUGGIFY_CONTEXT.with(|ctx| {
        let mut ctx = ctx.borrow_mut();
        ctx.stats.record_check(fault_id);

        let prob = ctx.config.effective(probability);
        if prob <= 0.0 {
            return false;
        }

        let triggered = rng.gen_range(0, 1_000_000) as f64 / 1_000_000.0 < prob;
        if triggered {
            ctx.stats.record_trigger(fault_id);
        }
        triggered
    })
}

/// Main fault injection interface
#[macro_export]
macro_rules! buggify {
    ($rng:expr, $fault_id:expr, $prob:expr) => {
        $crate::buggify::should_buggify($rng, $fault_id, $prob)
    };
}
