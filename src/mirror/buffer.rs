//! Buffer Resource Abstraction
//!
//! The buffer resource is a time-indexed append store that accepts exactly
//! one mutation at a time. Submission is synchronous and may be rejected
//! immediately (`SubmitError`); acceptance is acknowledged later by a
//! [`BufferEvent`] on the session's event channel.
//!
//! ## Implementations
//!
//! - `MemoryBufferResource`: in-process store with byte capacity
//! - `SimulatedBufferResource`: DST wrapper with buggify fault injection

use super::error::SubmitError;
use super::segment::{BufferedExtent, Operation, TimeRange};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Asynchronous outcome of an accepted submission
#[derive(Debug, Clone, PartialEq)]
pub enum BufferEvent {
    Completed,
    /// Mutation failed after acceptance
    Faulted(String),
}

/// Sender half handed to a resource when a session opens it
pub type BufferEventSender = mpsc::UnboundedSender<BufferEvent>;
pub type BufferEventReceiver = mpsc::UnboundedReceiver<BufferEvent>;

/// Create a per-session event channel
pub fn buffer_event_channel() -> (BufferEventSender, BufferEventReceiver) {
    mpsc::unbounded_channel()
}

/// Contract of the external buffer resource
pub trait BufferResource: Send {
    /// Begin a mutation. Callers guarantee no other mutation is outstanding.
    fn submit(&mut self, op: &Operation) -> Result<(), SubmitError>;

    /// Ranges currently buffered
    fn buffered_extent(&self) -> BufferedExtent;

    /// Drop all buffered media; called once when the session ends
    fn release(&mut self) {}
}

/// How `MemoryBufferResource` acknowledges mutations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleMode {
    /// Apply on submit and post `Completed` right away
    Immediate,
    /// Hold the mutation until `settle()` is called
    Deferred,
}

/// Counters shared with observers of a `MemoryBufferResource`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryBufferStats {
    pub appends: u64,
    pub removes: u64,
    pub capacity_rejections: u64,
    /// Submissions that arrived while another was outstanding
    pub overlapping_submissions: u64,
    pub bytes_buffered: usize,
    pub peak_bytes: usize,
}

#[derive(Debug, Clone)]
struct StoredSegment {
    range: TimeRange,
    bytes: usize,
}

/// In-process time-indexed store
pub struct MemoryBufferResource {
    segments: VecDeque<StoredSegment>,
    capacity_bytes: usize,
    bytes: usize,
    mode: SettleMode,
    pending: Option<Operation>,
    events: BufferEventSender,
    stats: Arc<Mutex<MemoryBufferStats>>,
}

impl MemoryBufferResource {
    pub fn new(capacity_bytes: usize, events: BufferEventSender) -> Self {
        MemoryBufferResource {
            segments: VecDeque::new(),
            capacity_bytes,
            bytes: 0,
            mode: SettleMode::Immediate,
            pending: None,
            events,
            stats: Arc::new(Mutex::new(MemoryBufferStats::default())),
        }
    }

    pub fn with_mode(mut self, mode: SettleMode) -> Self {
        self.mode = mode;
        self
    }

    /// Share an existing stats handle (so it outlives the session)
    pub fn with_stats(mut self, stats: Arc<Mutex<MemoryBufferStats>>) -> Self {
        self.stats = stats;
        self
    }

    pub fn stats_handle(&self) -> Arc<Mutex<MemoryBufferStats>> {
        self.stats.clone()
    }

    pub fn stats(&self) -> MemoryBufferStats {
        self.stats.lock().clone()
    }

    pub fn bytes_buffered(&self) -> usize {
        self.bytes
    }

    pub fn capacity_bytes(&self) -> usize {
        self.capacity_bytes
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Apply the deferred mutation and post its completion.
    /// Returns false when nothing was pending.
    pub fn settle(&mut self) -> bool {
        match self.pending.take() {
            Some(op) => {
                self.apply(&op);
                self.notify(BufferEvent::Completed);
                true
            }
            None => false,
        }
    }

    /// Abandon the deferred mutation and post a fault instead
    pub fn fail_pending(&mut self, reason: &str) -> bool {
        match self.pending.take() {
            Some(_) => {
                self.notify(BufferEvent::Faulted(reason.to_string()));
                true
            }
            None => false,
        }
    }

    /// Whether an append of `len` bytes fits
    pub fn fits(&self, len: usize) -> bool {
        self.bytes.saturating_add(len) <= self.capacity_bytes
    }

    fn notify(&self, event: BufferEvent) {
        // Receiver dropped means the session is gone; nothing to tell
        let _ = self.events.send(event);
    }

    fn apply(&mut self, op: &Operation) {
        match op {
            Operation::Append(segment) => {
                let stored = StoredSegment {
                    range: TimeRange::new(segment.start, segment.end()),
                    bytes: segment.len(),
                };
                // Keep segments ordered by start even if a chunk arrives late
                let idx = self
                    .segments
                    .iter()
                    .rposition(|s| s.range.start <= stored.range.start)
                    .map(|i| i + 1)
                    .unwrap_or(0);
                self.bytes += stored.bytes;
                self.segments.insert(idx, stored);

                let mut stats = self.stats.lock();
                stats.appends += 1;
                stats.bytes_buffered = self.bytes;
                stats.peak_bytes = stats.peak_bytes.max(self.bytes);
            }
            Operation::Remove { start, end } => {
                let (start, end) = (*start, *end);
                let mut freed = 0;
                self.segments.retain(|s| {
                    let inside = s.range.start >= start && s.range.end <= end;
                    if inside {
                        freed += s.bytes;
                    }
                    !inside
                });
                self.bytes -= freed;

                let mut stats = self.stats.lock();
                stats.removes += 1;
                stats.bytes_buffered = self.bytes;
            }
        }
    }
}

impl BufferResource for MemoryBufferResource {
    fn submit(&mut self, op: &Operation) -> Result<(), SubmitError> {
        if self.pending.is_some() {
            self.stats.lock().overlapping_submissions += 1;
            return Err(SubmitError::Fault(
                "mutation submitted while another is in progress".to_string(),
            ));
        }

        if let Operation::Append(segment) = op {
            if !self.fits(segment.len()) {
                self.stats.lock().capacity_rejections += 1;
                return Err(SubmitError::CapacityExceeded);
            }
        }

        match self.mode {
            SettleMode::Immediate => {
                self.apply(op);
                self.notify(BufferEvent::Completed);
            }
            SettleMode::Deferred => {
                self.pending = Some(op.clone());
            }
        }
        Ok(())
    }

    fn buffered_extent(&self) -> BufferedExtent {
        BufferedExtent::from_ranges(self.segments.iter().map(|s| s.range).collect())
    }

    fn release(&mut self) {
        self.pending = None;
        self.segments.clear();
        self.bytes = 0;
        self.stats.lock().bytes_buffered = 0;
    }
}

impl std::fmt::Debug for MemoryBufferResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBufferResource")
            .field("segments", &self.segments.len())
            .field("bytes", &self.bytes)
            .field("capacity_bytes", &self.capacity_bytes)
            .field("mode", &self.mode)
            .field("pending", &self.pending.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::segment::Segment;

    fn append(seq: u64, start: f64, bytes: usize) -> Operation {
        Operation::Append(Segment::new(seq, start, 0.1, vec![0u8; bytes]))
    }

    #[test]
    fn test_immediate_append_posts_completion() {
        let (tx, mut rx) = buffer_event_channel();
        let mut resource = MemoryBufferResource::new(1024, tx);

        resource.submit(&append(0, 0.0, 10)).unwrap();
        assert_eq!(rx.try_recv().unwrap(), BufferEvent::Completed);
        assert_eq!(resource.bytes_buffered(), 10);
        assert_eq!(resource.buffered_extent().end(), Some(0.1));
    }

    #[test]
    fn test_capacity_rejection_is_synchronous() {
        let (tx, mut rx) = buffer_event_channel();
        let mut resource = MemoryBufferResource::new(15, tx);

        resource.submit(&append(0, 0.0, 10)).unwrap();
        let _ = rx.try_recv();
        let err = resource.submit(&append(1, 0.1, 10)).unwrap_err();
        assert_eq!(err, SubmitError::CapacityExceeded);
        assert!(rx.try_recv().is_err(), "no completion for a rejected submit");
        assert_eq!(resource.stats().capacity_rejections, 1);
    }

    #[test]
    fn test_deferred_settle() {
        let (tx, mut rx) = buffer_event_channel();
        let mut resource = MemoryBufferResource::new(1024, tx).with_mode(SettleMode::Deferred);

        resource.submit(&append(0, 0.0, 10)).unwrap();
        assert!(resource.buffered_extent().is_empty());
        assert!(rx.try_recv().is_err());

        let overlap = resource.submit(&append(1, 0.1, 10)).unwrap_err();
        assert!(matches!(overlap, SubmitError::Fault(_)));
        assert_eq!(resource.stats().overlapping_submissions, 1);

        assert!(resource.settle());
        assert_eq!(rx.try_recv().unwrap(), BufferEvent::Completed);
        assert_eq!(resource.buffered_extent().end(), Some(0.1));
        assert!(!resource.settle());
    }

    #[test]
    fn test_stats_stay_bounded_across_cycles() {
        let (tx, _rx) = buffer_event_channel();
        let mut resource = MemoryBufferResource::new(1_000, tx);
        for i in 0..10_000u64 {
            let start = i as f64 * 0.1;
            resource.submit(&append(i, start, 1_000)).unwrap();
            resource
                .submit(&Operation::Remove { start: 0.0, end: start + 0.1 })
                .unwrap();
        }

        assert_eq!(resource.bytes_buffered(), 0);
        assert_eq!(
            resource.stats(),
            MemoryBufferStats {
                appends: 10_000,
                removes: 10_000,
                peak_bytes: 1_000,
                ..MemoryBufferStats::default()
            }
        );
    }

    #[test]
    fn test_remove_frees_covered_segments() {
        let (tx, _rx) = buffer_event_channel();
        let mut resource = MemoryBufferResource::new(1024, tx);
        for i in 0..10 {
            resource.submit(&append(i, i as f64 * 0.1, 10)).unwrap();
        }
        resource
            .submit(&Operation::Remove { start: 0.0, end: 0.55 })
            .unwrap();

        // Segments wholly inside [0, 0.55) are gone: 0.0..0.5
        assert_eq!(resource.bytes_buffered(), 50);
        let extent = resource.buffered_extent();
        assert!((extent.start().unwrap() - 0.5).abs() < 1e-9);
        assert!((extent.end().unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_gap_produces_two_ranges() {
        let (tx, _rx) = buffer_event_channel();
        let mut resource = MemoryBufferResource::new(1024, tx);
        resource.submit(&append(0, 0.0, 1)).unwrap();
        resource.submit(&append(1, 0.5, 1)).unwrap();
        assert_eq!(resource.buffered_extent().ranges().len(), 2);
    }

    #[test]
    fn test_fail_pending_posts_fault() {
        let (tx, mut rx) = buffer_event_channel();
        let mut resource = MemoryBufferResource::new(1024, tx).with_mode(SettleMode::Deferred);
        resource.submit(&append(0, 0.0, 1)).unwrap();
        assert!(resource.fail_pending("decode error"));
        assert_eq!(
            rx.try_recv().unwrap(),
            BufferEvent::Faulted("decode error".to_string())
        );
        assert!(resource.buffered_extent().is_empty());
    }

    #[test]
    fn test_release_clears_everything() {
        let (tx, _rx) = buffer_event_channel();
        let mut resource = MemoryBufferResource::new(1024, tx);
        resource.submit(&append(0, 0.0, 100)).unwrap();
        resource.release();
        assert_eq!(resource.bytes_buffered(), 0);
        assert!(resource.buffered_extent().is_empty());
    }
}
