//! Operation Queue - sole mutator of the buffer resource
//!
//! ```text
//! append ──┐                        ┌── Completed ──► drain()
//!          ├──► [ op | op | op ] ──►│ resource (one in flight)
//! remove ──┘     ▲ urgent remove    └── CapacityExceeded ──► requeue at head
//! ```
//!
//! Submission happens only from `drain()`, and `drain()` refuses to submit
//! while an operation is in flight. The completion path (`on_complete`) is
//! the only place that clears the in-flight marker after a successful
//! submission, so at most one mutation is ever outstanding.

use super::buffer::BufferResource;
use super::error::SubmitError;
use super::segment::Operation;
use serde::Serialize;
use std::collections::VecDeque;
use tracing::{debug, warn};

/// What the last drain attempt did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Nothing submitted: busy, empty or detached
    Idle,
    /// One operation is now in flight
    Submitted,
    /// Head operation was rejected for capacity and is back at the head;
    /// the caller must run a forced eviction
    CapacityExceeded,
}

/// Queue counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub enqueued: u64,
    pub submitted: u64,
    pub completed: u64,
    pub capacity_retries: u64,
    /// Operations lost to resource faults
    pub dropped: u64,
    pub max_depth: usize,
}

/// FIFO of pending buffer mutations with a single in-flight slot
pub struct OperationQueue<R: BufferResource> {
    pending: VecDeque<Operation>,
    in_flight: Option<Operation>,
    resource: Option<R>,
    stats: QueueStats,
}

impl<R: BufferResource> Default for OperationQueue<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: BufferResource> OperationQueue<R> {
    /// Create a queue with no resource attached; drains are no-ops until `attach`
    pub fn new() -> Self {
        OperationQueue {
            pending: VecDeque::new(),
            in_flight: None,
            resource: None,
            stats: QueueStats::default(),
        }
    }

    /// Attach the resource and drain anything queued before it was ready
    pub fn attach(&mut self, resource: R) -> DrainOutcome {
        self.resource = Some(resource);
        self.drain()
    }

    /// Release the resource and forget all queue state
    pub fn detach(&mut self) -> Option<R> {
        self.clear();
        self.resource.take().map(|mut resource| {
            resource.release();
            resource
        })
    }

    /// Drop pending operations and abandon the in-flight one.
    /// A completion that arrives afterwards is ignored.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.in_flight = None;
    }

    pub fn resource(&self) -> Option<&R> {
        self.resource.as_ref()
    }

    pub fn is_attached(&self) -> bool {
        self.resource.is_some()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn in_flight(&self) -> Option<&Operation> {
        self.in_flight.as_ref()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn front(&self) -> Option<&Operation> {
        self.pending.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Operation> {
        self.pending.iter()
    }

    /// A remove is waiting (not counting the in-flight operation)
    pub fn has_pending_remove(&self) -> bool {
        self.pending.iter().any(Operation::is_remove)
    }

    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }

    /// Append to the tail, then drain
    pub fn enqueue(&mut self, op: Operation) -> DrainOutcome {
        self.push(op, false);
        self.drain()
    }

    /// Insert at the head, then drain
    pub fn enqueue_urgent(&mut self, op: Operation) -> DrainOutcome {
        self.push(op, true);
        self.drain()
    }

    /// Insert at the head without draining
    pub fn push_front(&mut self, op: Operation) {
        self.push(op, true);
    }

    /// Move the first waiting Remove to the head. Returns false if none is queued.
    pub fn promote_remove(&mut self) -> bool {
        match self.pending.iter().position(Operation::is_remove) {
            Some(0) => true,
            Some(idx) => {
                if let Some(op) = self.pending.remove(idx) {
                    self.pending.push_front(op);
                }
                true
            }
            None => false,
        }
    }

    fn push(&mut self, op: Operation, urgent: bool) {
        self.stats.enqueued += 1;
        if urgent {
            self.pending.push_front(op);
        } else {
            self.pending.push_back(op);
        }
        self.stats.max_depth = self.stats.max_depth.max(self.pending.len());
    }

    /// Submit the head operation if nothing is in flight.
    ///
    /// Resource faults drop the failed operation and move on to the next
    /// one; a capacity rejection puts the operation back at the head and
    /// returns `CapacityExceeded` without trying further.
    pub fn drain(&mut self) -> DrainOutcome {
        if self.in_flight.is_some() {
            return DrainOutcome::Idle;
        }
        let Some(resource) = self.resource.as_mut() else {
            return DrainOutcome::Idle;
        };

        while let Some(op) = self.pending.pop_front() {
            match resource.submit(&op) {
                Ok(()) => {
                    debug!(op = %op, "submitted buffer operation");
                    self.stats.submitted += 1;
                    self.in_flight = Some(op);
                    return DrainOutcome::Submitted;
                }
                Err(SubmitError::CapacityExceeded) => {
                    debug!(op = %op, "buffer full, requeueing at head");
                    self.stats.capacity_retries += 1;
                    self.pending.push_front(op);
                    return DrainOutcome::CapacityExceeded;
                }
                Err(SubmitError::Fault(reason)) => {
                    warn!(op = %op, %reason, "buffer rejected operation, dropping it");
                    self.stats.dropped += 1;
                }
            }
        }
        DrainOutcome::Idle
    }

    /// Completion signal from the resource: clear in-flight and drain again.
    /// Ignored when nothing is in flight (abandoned by `clear`).
    pub fn on_complete(&mut self) -> DrainOutcome {
        if self.in_flight.take().is_none() {
            debug!("ignoring completion with nothing in flight");
            return DrainOutcome::Idle;
        }
        self.stats.completed += 1;
        self.drain()
    }

    /// Asynchronous failure of the in-flight mutation: drop it and continue
    pub fn on_fault(&mut self, reason: &str) -> DrainOutcome {
        match self.in_flight.take() {
            Some(op) => {
                warn!(op = %op, %reason, "buffer operation failed, dropping it");
                self.stats.dropped += 1;
                self.drain()
            }
            None => DrainOutcome::Idle,
        }
    }
}
