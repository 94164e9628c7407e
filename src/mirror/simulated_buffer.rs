//! Simulated Buffer Resource with Fault Injection
//!
//! DST wrapper around a deferred `MemoryBufferResource`. The handle is
//! cloneable: the operation queue owns one clone, the harness keeps another
//! to advance virtual time and settle mutations.

use super::buffer::{
    BufferEventSender, BufferResource, MemoryBufferResource, MemoryBufferStats, SettleMode,
};
use super::error::SubmitError;
use super::segment::{BufferedExtent, Operation};
use crate::buggify::faults::buffer as faults;
use crate::io::Rng;
use parking_lot::Mutex;
use std::sync::Arc;

/// Fault probabilities and latency for the simulated resource
#[derive(Debug, Clone)]
pub struct SimulatedBufferConfig {
    /// Byte capacity of the underlying store
    pub capacity_bytes: usize,
    /// Spurious capacity rejections on append
    pub capacity_squeeze_prob: f64,
    /// Non-capacity rejections on submit
    pub submit_fault_prob: f64,
    /// Accepted mutation fails asynchronously
    pub mutation_fault_prob: f64,
    /// Completion latency range in virtual milliseconds (min, max)
    pub latency_range_ms: (u64, u64),
    /// Occasional extra-slow completion
    pub slow_completion_prob: f64,
    pub slow_completion_ms: u64,
}

impl Default for SimulatedBufferConfig {
    fn default() -> Self {
        SimulatedBufferConfig {
            capacity_bytes: 8 * 1024 * 1024,
            capacity_squeeze_prob: 0.01,
            submit_fault_prob: 0.005,
            mutation_fault_prob: 0.005,
            latency_range_ms: (1, 20),
            slow_completion_prob: 0.01,
            slow_completion_ms: 300,
        }
    }
}

impl SimulatedBufferConfig {
    /// High chaos configuration for stress testing
    pub fn high_chaos() -> Self {
        SimulatedBufferConfig {
            capacity_squeeze_prob: 0.05,
            submit_fault_prob: 0.02,
            mutation_fault_prob: 0.02,
            latency_range_ms: (1, 80),
            slow_completion_prob: 0.05,
            slow_completion_ms: 600,
            ..Default::default()
        }
    }

    /// No faults - for baseline testing
    pub fn no_faults() -> Self {
        SimulatedBufferConfig {
            capacity_squeeze_prob: 0.0,
            submit_fault_prob: 0.0,
            mutation_fault_prob: 0.0,
            slow_completion_prob: 0.0,
            ..Default::default()
        }
    }
}

/// Injected fault counters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulatedBufferStats {
    pub submissions: u64,
    pub capacity_rejections: u64,
    pub squeezed: u64,
    pub submit_faults: u64,
    pub mutation_faults: u64,
    pub slow_completions: u64,
    /// Submissions made while a mutation was still outstanding
    pub overlapping_submissions: u64,
}

/// How a submission ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionResult {
    Accepted,
    CapacityExceeded,
    Fault,
}

/// One entry of the submission log
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionRecord {
    pub at_ms: u64,
    /// Append sequence number, `None` for removes
    pub sequence: Option<u64>,
    /// Remove end bound, `None` for appends
    pub remove_end: Option<f64>,
    pub result: SubmissionResult,
}

struct SimulatedBufferInner<R: Rng> {
    store: MemoryBufferResource,
    rng: R,
    config: SimulatedBufferConfig,
    stats: SimulatedBufferStats,
    now_ms: u64,
    due_at_ms: Option<u64>,
    log: Vec<SubmissionRecord>,
}

/// Fault-injecting buffer resource for deterministic simulation
pub struct SimulatedBufferResource<R: Rng> {
    state: Arc<Mutex<SimulatedBufferInner<R>>>,
}

impl<R: Rng> Clone for SimulatedBufferResource<R> {
    fn clone(&self) -> Self {
        SimulatedBufferResource {
            state: self.state.clone(),
        }
    }
}

impl<R: Rng> SimulatedBufferResource<R> {
    pub fn new(rng: R, config: SimulatedBufferConfig, events: BufferEventSender) -> Self {
        let store =
            MemoryBufferResource::new(config.capacity_bytes, events).with_mode(SettleMode::Deferred);
        SimulatedBufferResource {
            state: Arc::new(Mutex::new(SimulatedBufferInner {
                store,
                rng,
                config,
                stats: SimulatedBufferStats::default(),
                now_ms: 0,
                due_at_ms: None,
                log: Vec::new(),
            })),
        }
    }

    /// Advance virtual time; settles the outstanding mutation once due.
    /// Returns true if a completion (or fault) was posted.
    pub fn advance_to(&self, now_ms: u64) -> bool {
        let mut s = self.state.lock();
        s.now_ms = s.now_ms.max(now_ms);

        match s.due_at_ms {
            Some(due) if s.now_ms >= due => {
                s.due_at_ms = None;
                let prob = s.config.mutation_fault_prob;
                let inner = &mut *s;
                if crate::buggify!(&mut inner.rng, faults::MUTATION_FAULT, prob) {
                    inner.stats.mutation_faults += 1;
                    inner.store.fail_pending("simulated mutation fault")
                } else {
                    inner.store.settle()
                }
            }
            _ => false,
        }
    }

    pub fn is_updating(&self) -> bool {
        self.state.lock().store.has_pending()
    }

    pub fn stats(&self) -> SimulatedBufferStats {
        self.state.lock().stats.clone()
    }

    pub fn store_stats(&self) -> MemoryBufferStats {
        self.state.lock().store.stats()
    }

    pub fn bytes_buffered(&self) -> usize {
        self.state.lock().store.bytes_buffered()
    }

    pub fn submission_log(&self) -> Vec<SubmissionRecord> {
        self.state.lock().log.clone()
    }
}

impl<R: Rng> SimulatedBufferInner<R> {
    fn record(&mut self, op: &Operation, result: SubmissionResult) {
        let remove_end = match op {
            Operation::Remove { end, .. } => Some(*end),
            Operation::Append(_) => None,
        };
        self.log.push(SubmissionRecord {
            at_ms: self.now_ms,
            sequence: op.sequence(),
            remove_end,
            result,
        });
    }

    fn submit(&mut self, op: &Operation) -> Result<(), SubmitError> {
        self.stats.submissions += 1;

        if self.store.has_pending() {
            self.stats.overlapping_submissions += 1;
        }

        let fault_prob = self.config.submit_fault_prob;
        if crate::buggify!(&mut self.rng, faults::SUBMIT_FAULT, fault_prob) {
            self.stats.submit_faults += 1;
            self.record(op, SubmissionResult::Fault);
            return Err(SubmitError::Fault("simulated submit fault".to_string()));
        }

        if op.is_append() {
            let squeeze_prob = self.config.capacity_squeeze_prob;
            if crate::buggify!(&mut self.rng, faults::CAPACITY_SQUEEZE, squeeze_prob) {
                self.stats.squeezed += 1;
                self.stats.capacity_rejections += 1;
                self.record(op, SubmissionResult::CapacityExceeded);
                return Err(SubmitError::CapacityExceeded);
            }
        }

        match self.store.submit(op) {
            Ok(()) => {
                let (min, max) = self.config.latency_range_ms;
                let mut latency = self.rng.gen_range(min, max.max(min + 1));
                let slow_prob = self.config.slow_completion_prob;
                if crate::buggify!(&mut self.rng, faults::SLOW_COMPLETION, slow_prob) {
                    self.stats.slow_completions += 1;
                    latency += self.config.slow_completion_ms;
                }
                self.due_at_ms = Some(self.now_ms + latency);
                self.record(op, SubmissionResult::Accepted);
                Ok(())
            }
            Err(SubmitError::CapacityExceeded) => {
                self.stats.capacity_rejections += 1;
                self.record(op, SubmissionResult::CapacityExceeded);
                Err(SubmitError::CapacityExceeded)
            }
            Err(e) => {
                self.record(op, SubmissionResult::Fault);
                Err(e)
            }
        }
    }
}

impl<R: Rng> BufferResource for SimulatedBufferResource<R> {
    fn submit(&mut self, op: &Operation) -> Result<(), SubmitError> {
        self.state.lock().submit(op)
    }

    fn buffered_extent(&self) -> BufferedExtent {
        self.state.lock().store.buffered_extent()
    }

    fn release(&mut self) {
        let mut s = self.state.lock();
        s.due_at_ms = None;
        s.store.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::SimulatedRng;
    use crate::mirror::buffer::{buffer_event_channel, BufferEvent};
    use crate::mirror::segment::Segment;

    fn append(seq: u64, bytes: usize) -> Operation {
        Operation::Append(Segment::new(seq, seq as f64 * 0.1, 0.1, vec![0u8; bytes]))
    }

    #[test]
    fn test_completion_waits_for_latency() {
        let (tx, mut rx) = buffer_event_channel();
        let config = SimulatedBufferConfig {
            latency_range_ms: (10, 11),
            ..SimulatedBufferConfig::no_faults()
        };
        let mut resource = SimulatedBufferResource::new(SimulatedRng::new(1), config, tx);
        let harness_handle = resource.clone();

        resource.submit(&append(0, 10)).unwrap();
        assert!(harness_handle.is_updating());
        assert!(!harness_handle.advance_to(5));
        assert!(rx.try_recv().is_err());

        assert!(harness_handle.advance_to(10));
        assert_eq!(rx.try_recv().unwrap(), BufferEvent::Completed);
        assert!(!harness_handle.is_updating());
        assert_eq!(resource.buffered_extent().end(), Some(0.1));
    }

    #[test]
    fn test_real_capacity_rejection_logged() {
        let (tx, _rx) = buffer_event_channel();
        let config = SimulatedBufferConfig {
            capacity_bytes: 5,
            ..SimulatedBufferConfig::no_faults()
        };
        let mut resource = SimulatedBufferResource::new(SimulatedRng::new(2), config, tx);

        assert_eq!(
            resource.submit(&append(0, 10)).unwrap_err(),
            SubmitError::CapacityExceeded
        );
        let log = resource.submission_log();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].sequence, Some(0));
        assert_eq!(log[0].result, SubmissionResult::CapacityExceeded);
        assert_eq!(resource.stats().capacity_rejections, 1);
    }

    #[test]
    fn test_forced_squeeze_rejects_appends_only() {
        let (tx, _rx) = buffer_event_channel();
        let config = SimulatedBufferConfig {
            capacity_squeeze_prob: 1.0,
            ..SimulatedBufferConfig::no_faults()
        };
        let mut resource = SimulatedBufferResource::new(SimulatedRng::new(3), config, tx);

        assert_eq!(
            resource.submit(&append(0, 1)).unwrap_err(),
            SubmitError::CapacityExceeded
        );
        assert!(resource
            .submit(&Operation::Remove { start: 0.0, end: 1.0 })
            .is_ok());
        assert_eq!(resource.stats().squeezed, 1);
    }

    #[test]
    fn test_mutation_fault_posts_faulted() {
        let (tx, mut rx) = buffer_event_channel();
        let config = SimulatedBufferConfig {
            mutation_fault_prob: 1.0,
            latency_range_ms: (1, 2),
            ..SimulatedBufferConfig::no_faults()
        };
        let mut resource = SimulatedBufferResource::new(SimulatedRng::new(4), config, tx);
        resource.submit(&append(0, 1)).unwrap();
        assert!(resource.advance_to(5));
        assert!(matches!(rx.try_recv().unwrap(), BufferEvent::Faulted(_)));
        assert!(resource.buffered_extent().is_empty());
        assert_eq!(resource.stats().mutation_faults, 1);
    }
}
