//! Media backend: where a session gets its capture source and buffer
//!
//! A session acquires a fresh source and opens a fresh buffer each time it
//! starts. The buffer is handed the session's event sender; dropping the
//! buffer at the end of the session closes that channel.

use super::buffer::{BufferEventSender, BufferResource, MemoryBufferResource, MemoryBufferStats};
use super::clock::ProductionClock;
use super::error::AcquisitionError;
use super::source::{SegmentSource, SyntheticSource, SyntheticSourceConfig};
use crate::io::{ProductionRng, Rng, SimulatedRng};
use parking_lot::Mutex;
use std::sync::Arc;

pub trait MediaBackend: Send {
    type Source: SegmentSource;
    type Buffer: BufferResource;

    /// Acquire the capture device for a new session
    fn acquire_source(&mut self) -> Result<Self::Source, AcquisitionError>;

    /// Open an empty buffer that reports completions on `events`
    fn open_buffer(&mut self, events: BufferEventSender) -> Result<Self::Buffer, AcquisitionError>;
}

/// Synthetic capture into an in-process memory buffer
pub struct InMemoryBackend<R: Rng + 'static = ProductionRng> {
    source_config: SyntheticSourceConfig,
    capacity_bytes: usize,
    seed: u64,
    make_rng: fn(u64) -> R,
    acquisitions: u64,
    buffer_stats: Arc<Mutex<MemoryBufferStats>>,
}

impl InMemoryBackend {
    pub fn new(capacity_bytes: usize, source_config: SyntheticSourceConfig) -> Self {
        InMemoryBackend::with_rng(capacity_bytes, source_config, 0, |_| ProductionRng::new())
    }
}

impl InMemoryBackend<SimulatedRng> {
    /// Reproducible chunk sizes: session `n` uses `seed + n`
    pub fn seeded(seed: u64, capacity_bytes: usize, source_config: SyntheticSourceConfig) -> Self {
        InMemoryBackend::with_rng(capacity_bytes, source_config, seed, SimulatedRng::new)
    }
}

impl<R: Rng + 'static> InMemoryBackend<R> {
    fn with_rng(
        capacity_bytes: usize,
        source_config: SyntheticSourceConfig,
        seed: u64,
        make_rng: fn(u64) -> R,
    ) -> Self {
        InMemoryBackend {
            source_config,
            capacity_bytes,
            seed,
            make_rng,
            acquisitions: 0,
            buffer_stats: Arc::new(Mutex::new(MemoryBufferStats::default())),
        }
    }

    /// Counters of every buffer this backend has opened
    pub fn buffer_stats(&self) -> Arc<Mutex<MemoryBufferStats>> {
        self.buffer_stats.clone()
    }

    pub fn acquisitions(&self) -> u64 {
        self.acquisitions
    }
}

impl<R: Rng + 'static> MediaBackend for InMemoryBackend<R> {
    type Source = SyntheticSource<R, ProductionClock>;
    type Buffer = MemoryBufferResource;

    fn acquire_source(&mut self) -> Result<Self::Source, AcquisitionError> {
        let rng = (self.make_rng)(self.seed.wrapping_add(self.acquisitions));
        self.acquisitions += 1;
        Ok(SyntheticSource::new(
            self.source_config.clone(),
            rng,
            ProductionClock::new(),
        ))
    }

    fn open_buffer(&mut self, events: BufferEventSender) -> Result<Self::Buffer, AcquisitionError> {
        Ok(MemoryBufferResource::new(self.capacity_bytes, events).with_stats(self.buffer_stats.clone()))
    }
}
