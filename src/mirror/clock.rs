//! Media clock
//!
//! Segment timestamps are milliseconds since the source started. The
//! production clock reads tokio's clock, so paused-time tests stay
//! deterministic; the simulated clock only moves when told to.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Milliseconds on a media timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MediaTimestamp(pub u64);

impl MediaTimestamp {
    pub const ZERO: MediaTimestamp = MediaTimestamp(0);

    pub fn from_millis(ms: u64) -> Self {
        MediaTimestamp(ms)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Position in seconds, as the playback surface sees it
    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / 1000.0
    }

    pub fn saturating_sub(&self, other: MediaTimestamp) -> Duration {
        Duration::from_millis(self.0.saturating_sub(other.0))
    }
}

impl std::ops::Add<Duration> for MediaTimestamp {
    type Output = MediaTimestamp;

    fn add(self, rhs: Duration) -> Self::Output {
        MediaTimestamp(self.0.saturating_add(rhs.as_millis() as u64))
    }
}

pub trait MirrorClock: Send + Sync + Clone + 'static {
    fn now(&self) -> MediaTimestamp;

    fn elapsed(&self, since: MediaTimestamp) -> Duration {
        self.now().saturating_sub(since)
    }
}

/// Wall clock measured from construction
#[derive(Debug, Clone)]
pub struct ProductionClock {
    origin: tokio::time::Instant,
}

impl Default for ProductionClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ProductionClock {
    pub fn new() -> Self {
        ProductionClock {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl MirrorClock for ProductionClock {
    fn now(&self) -> MediaTimestamp {
        MediaTimestamp(self.origin.elapsed().as_millis() as u64)
    }
}

/// Virtual clock for deterministic simulation. Clones share state.
#[derive(Debug, Clone)]
pub struct SimulatedClock {
    time_ms: Arc<AtomicU64>,
}

impl Default for SimulatedClock {
    fn default() -> Self {
        Self::new(0)
    }
}

impl SimulatedClock {
    pub fn new(start_ms: u64) -> Self {
        SimulatedClock {
            time_ms: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn advance(&self, duration: Duration) {
        self.advance_ms(duration.as_millis() as u64);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.time_ms.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, time_ms: u64) {
        self.time_ms.store(time_ms, Ordering::SeqCst);
    }

    pub fn current_ms(&self) -> u64 {
        self.time_ms.load(Ordering::SeqCst)
    }
}

impl MirrorClock for SimulatedClock {
    fn now(&self) -> MediaTimestamp {
        MediaTimestamp(self.current_ms())
    }
}
