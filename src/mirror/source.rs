//! Segment Source
//!
//! A source is acquired once per session, started with a cadence and
//! yields segments on an unbounded channel until stopped. Chunk sizes vary
//! and the timeline may have holes; consumers tolerate both.

use super::clock::{MediaTimestamp, MirrorClock, ProductionClock};
use super::error::AcquisitionError;
use super::segment::Segment;
use crate::buggify::faults::source as faults;
use crate::io::{ProductionRng, Rng};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Segments of one session, in arrival order
pub type SegmentStream = mpsc::UnboundedReceiver<Segment>;

pub trait SegmentSource: Send {
    /// Begin capture, emitting one segment per `cadence`
    fn start(&mut self, cadence: Duration) -> Result<SegmentStream, AcquisitionError>;

    /// Stop capture and close the stream; idempotent
    fn stop(&mut self);

    fn is_active(&self) -> bool;
}

/// Shape of synthetic capture
#[derive(Debug, Clone)]
pub struct SyntheticSourceConfig {
    /// Payload size range in bytes (min, max)
    pub chunk_bytes: (u64, u64),
    /// A tick produces no segment, leaving a hole in the timeline
    pub gap_probability: f64,
    /// `start` reports the device as unavailable
    pub acquire_fail_probability: f64,
}

impl Default for SyntheticSourceConfig {
    fn default() -> Self {
        SyntheticSourceConfig {
            chunk_bytes: (8 * 1024, 32 * 1024),
            gap_probability: 0.0,
            acquire_fail_probability: 0.0,
        }
    }
}

/// Timer-driven source producing filler payloads stamped by a clock
pub struct SyntheticSource<R: Rng + 'static = ProductionRng, C: MirrorClock = ProductionClock> {
    config: SyntheticSourceConfig,
    rng: Arc<Mutex<R>>,
    clock: C,
    task: Option<JoinHandle<()>>,
}

impl SyntheticSource {
    /// Entropy-seeded source on the wall clock
    pub fn production(config: SyntheticSourceConfig) -> Self {
        SyntheticSource::new(config, ProductionRng::new(), ProductionClock::new())
    }
}

impl<R: Rng + 'static, C: MirrorClock> SyntheticSource<R, C> {
    pub fn new(config: SyntheticSourceConfig, rng: R, clock: C) -> Self {
        SyntheticSource {
            config,
            rng: Arc::new(Mutex::new(rng)),
            clock,
            task: None,
        }
    }
}

impl<R: Rng + 'static, C: MirrorClock> SegmentSource for SyntheticSource<R, C> {
    fn start(&mut self, cadence: Duration) -> Result<SegmentStream, AcquisitionError> {
        self.stop();

        if crate::buggify!(
            &mut *self.rng.lock(),
            faults::ACQUIRE_FAIL,
            self.config.acquire_fail_probability
        ) {
            return Err(AcquisitionError::Unavailable("capture device busy".to_string()));
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| AcquisitionError::Unavailable("no async runtime".to_string()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let rng = self.rng.clone();
        let clock = self.clock.clone();
        let config = self.config.clone();

        self.task = Some(runtime.spawn(async move {
            let origin = clock.now();
            let mut last_end = MediaTimestamp::ZERO;
            let mut sequence = 0u64;
            let mut ticker = tokio::time::interval(cadence);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let now = MediaTimestamp(clock.elapsed(origin).as_millis() as u64);
                let duration = now.saturating_sub(last_end);
                if duration.is_zero() {
                    continue;
                }

                let bytes = {
                    let mut rng = rng.lock();
                    if crate::buggify!(&mut *rng, faults::CHUNK_GAP, config.gap_probability) {
                        None
                    } else {
                        let (min, max) = config.chunk_bytes;
                        Some(rng.gen_range(min, max.max(min + 1)) as usize)
                    }
                };

                if let Some(bytes) = bytes {
                    let segment = Segment::new(
                        sequence,
                        last_end.as_secs_f64(),
                        duration.as_secs_f64(),
                        vec![0u8; bytes],
                    );
                    sequence += 1;
                    if tx.send(segment).is_err() {
                        debug!("segment stream closed, stopping capture");
                        break;
                    }
                }
                last_end = now;
            }
        }));

        info!(cadence_ms = cadence.as_millis() as u64, "synthetic capture started");
        Ok(rx)
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            info!("synthetic capture stopped");
        }
    }

    fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl<R: Rng + 'static, C: MirrorClock> Drop for SyntheticSource<R, C> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct ManualSourceInner {
    sender: Option<mpsc::UnboundedSender<Segment>>,
    next_sequence: u64,
    fail_next: Option<AcquisitionError>,
    starts: u64,
    stops: u64,
}

/// Caller-driven source. Clones share state, so a test keeps one handle to
/// `emit` while the mirror owns another.
#[derive(Clone)]
pub struct ManualSource {
    inner: Arc<Mutex<ManualSourceInner>>,
}

impl Default for ManualSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualSource {
    pub fn new() -> Self {
        ManualSource {
            inner: Arc::new(Mutex::new(ManualSourceInner {
                sender: None,
                next_sequence: 0,
                fail_next: None,
                starts: 0,
                stops: 0,
            })),
        }
    }

    /// Make the next `start` fail
    pub fn fail_next_start(&self, error: AcquisitionError) {
        self.inner.lock().fail_next = Some(error);
    }

    /// Send a segment to the active stream. Returns false when stopped.
    pub fn emit(&self, segment: Segment) -> bool {
        let inner = self.inner.lock();
        match &inner.sender {
            Some(tx) => tx.send(segment).is_ok(),
            None => false,
        }
    }

    /// Emit a chunk with the next sequence number of this session
    pub fn emit_chunk(&self, start: f64, duration: f64, bytes: usize) -> bool {
        let sequence = {
            let mut inner = self.inner.lock();
            if inner.sender.is_none() {
                return false;
            }
            let seq = inner.next_sequence;
            inner.next_sequence += 1;
            seq
        };
        self.emit(Segment::new(sequence, start, duration, vec![0u8; bytes]))
    }

    pub fn starts(&self) -> u64 {
        self.inner.lock().starts
    }

    pub fn stops(&self) -> u64 {
        self.inner.lock().stops
    }
}

impl SegmentSource for ManualSource {
    fn start(&mut self, _cadence: Duration) -> Result<SegmentStream, AcquisitionError> {
        let mut inner = self.inner.lock();
        if let Some(error) = inner.fail_next.take() {
            return Err(error);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        inner.sender = Some(tx);
        inner.next_sequence = 0;
        inner.starts += 1;
        Ok(rx)
    }

    fn stop(&mut self) {
        let mut inner = self.inner.lock();
        if inner.sender.take().is_some() {
            inner.stops += 1;
        }
    }

    fn is_active(&self) -> bool {
        self.inner.lock().sender.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::SimulatedRng;

    #[tokio::test(start_paused = true)]
    async fn test_synthetic_source_emits_contiguous_chunks() {
        let mut source = SyntheticSource::new(
            SyntheticSourceConfig::default(),
            SimulatedRng::new(7),
            ProductionClock::new(),
        );
        let mut stream = source.start(Duration::from_millis(100)).unwrap();
        assert!(source.is_active());

        let mut segments = Vec::new();
        for _ in 0..5 {
            segments.push(stream.recv().await.unwrap());
        }

        for (i, seg) in segments.iter().enumerate() {
            assert_eq!(seg.sequence, i as u64);
            assert!((seg.duration - 0.1).abs() < 1e-9);
            assert!(seg.len() >= 8 * 1024 && seg.len() < 32 * 1024);
        }
        for pair in segments.windows(2) {
            assert!((pair[0].end() - pair[1].start).abs() < 1e-9);
        }

        source.stop();
        assert!(!source.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_closes_stream() {
        let mut source = SyntheticSource::new(
            SyntheticSourceConfig::default(),
            SimulatedRng::new(1),
            ProductionClock::new(),
        );
        let mut stream = source.start(Duration::from_millis(50)).unwrap();
        assert!(stream.recv().await.is_some());
        source.stop();
        // Drain anything already sent, then the channel closes
        while stream.recv().await.is_some() {}
    }

    #[tokio::test(start_paused = true)]
    async fn test_gaps_leave_holes() {
        let config = SyntheticSourceConfig {
            gap_probability: 0.5,
            ..Default::default()
        };
        let mut source = SyntheticSource::new(config, SimulatedRng::new(3), ProductionClock::new());
        let mut stream = source.start(Duration::from_millis(100)).unwrap();

        let mut prev_end = 0.0;
        let mut holes = 0;
        for _ in 0..20 {
            let seg = stream.recv().await.unwrap();
            if seg.start > prev_end + 1e-6 {
                holes += 1;
            }
            prev_end = seg.end();
        }
        assert!(holes > 0);
    }

    #[test]
    fn test_synthetic_source_needs_runtime() {
        let mut source = SyntheticSource::new(
            SyntheticSourceConfig::default(),
            SimulatedRng::new(1),
            ProductionClock::default(),
        );
        assert!(matches!(
            source.start(Duration::from_millis(100)),
            Err(AcquisitionError::Unavailable(_))
        ));
    }

    #[test]
    fn test_manual_source_lifecycle() {
        let handle = ManualSource::new();
        let mut source = handle.clone();

        assert!(!handle.emit_chunk(0.0, 0.1, 4));

        let mut stream = source.start(Duration::from_millis(100)).unwrap();
        assert!(handle.emit_chunk(0.0, 0.1, 4));
        assert!(handle.emit_chunk(0.1, 0.1, 4));
        assert_eq!(stream.try_recv().unwrap().sequence, 0);
        assert_eq!(stream.try_recv().unwrap().sequence, 1);

        source.stop();
        source.stop();
        assert_eq!(handle.stops(), 1);
        assert!(!handle.emit_chunk(0.2, 0.1, 4));
    }

    #[test]
    fn test_manual_source_acquire_failure() {
        let handle = ManualSource::new();
        handle.fail_next_start(AcquisitionError::PermissionDenied);
        let mut source = handle.clone();
        assert_eq!(
            source.start(Duration::from_millis(100)).unwrap_err(),
            AcquisitionError::PermissionDenied
        );
        assert!(source.start(Duration::from_millis(100)).is_ok());
        assert_eq!(handle.starts(), 1);
    }
}
