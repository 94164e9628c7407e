//! Mirror session controller
//!
//! `Mirror` owns the whole lifecycle of a delayed mirror:
//!
//! ```text
//! Idle ─► Preparing ─► Buffering ─► Playing ─► Stopped ─► Idle
//!              │                       ▲
//!              └── delay == 0 ─────────┘ (passthrough)
//! ```
//!
//! It is sans-io: segment arrivals, buffer events and the three periodic
//! ticks are method calls. `MirrorActor` wires them to channels and timers,
//! the DST harness calls them directly in virtual time.

use super::backend::MediaBackend;
use super::buffer::{buffer_event_channel, BufferEvent, BufferEventReceiver, BufferResource};
use super::config::MirrorConfig;
use super::drift::{buffering_check, BufferingCheck, DriftAction, DriftController, DriftDecision};
use super::error::{AcquisitionError, MirrorError};
use super::eviction::{EvictionContext, EvictionPolicy};
use super::playback::PlaybackSurface;
use super::queue::{DrainOutcome, OperationQueue, QueueStats};
use super::segment::{BufferedExtent, Operation, Segment};
use super::source::{SegmentSource, SegmentStream};
use super::status::{Status, StatusSink};
use serde::Serialize;
use std::fmt;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    Idle,
    /// Acquiring the capture device
    Preparing,
    Buffering,
    Playing,
    /// Tearing the session down
    Stopped,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControllerState::Idle => "idle",
            ControllerState::Preparing => "preparing",
            ControllerState::Buffering => "buffering",
            ControllerState::Playing => "playing",
            ControllerState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Event streams of a freshly started session
#[derive(Debug)]
pub struct SessionStreams {
    pub session_id: u64,
    pub segments: SegmentStream,
    /// `None` for passthrough sessions, which have no buffer
    pub buffer_events: Option<BufferEventReceiver>,
}

/// Result of a buffering poll
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BufferingPoll {
    /// Not in the buffering phase; stop polling
    NotBuffering,
    Pending { progress: u8 },
    /// Playback started at `cursor`
    Started { cursor: f64 },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MirrorStats {
    pub sessions_started: u64,
    pub acquisition_failures: u64,
    /// Restarts caused by a delay change
    pub restarts: u64,
    pub segments_received: u64,
    /// Zero-length chunks, never enqueued
    pub empty_segments: u64,
    /// Arrived with no active session
    pub segments_dropped: u64,
    pub live_segments: u64,
    pub hard_corrections: u64,
    pub stall_skips: u64,
    pub evictions: u64,
    pub forced_evictions: u64,
    pub capacity_failures: u64,
    pub buffer_faults: u64,
    pub play_rejections: u64,
    /// Buffer events that arrived after their session ended
    pub stale_events: u64,
}

/// Point-in-time view of the controller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MirrorSnapshot {
    pub state: ControllerState,
    pub delay_seconds: u32,
    pub session_id: Option<u64>,
    pub cursor: f64,
    pub extent: BufferedExtent,
    pub queue_depth: usize,
    pub in_flight: bool,
    pub stall_count: u32,
    pub stats: MirrorStats,
    pub queue: Option<QueueStats>,
}

struct Session<B: MediaBackend> {
    id: u64,
    source: B::Source,
    /// `None` in passthrough mode
    queue: Option<OperationQueue<B::Buffer>>,
    /// An append is parked at the head after a capacity rejection
    capacity_blocked: bool,
}

/// Delayed-playback controller
pub struct Mirror<B: MediaBackend, P: PlaybackSurface, K: StatusSink> {
    config: MirrorConfig,
    backend: B,
    surface: P,
    sink: K,
    state: ControllerState,
    session: Option<Session<B>>,
    drift: DriftController,
    eviction: EvictionPolicy,
    stats: MirrorStats,
    last_session_id: u64,
}

impl<B: MediaBackend, P: PlaybackSurface, K: StatusSink> Mirror<B, P, K> {
    pub fn new(config: MirrorConfig, backend: B, surface: P, sink: K) -> Self {
        Mirror {
            drift: DriftController::new(config.drift.clone()),
            eviction: EvictionPolicy::new(config.eviction.clone()),
            config,
            backend,
            surface,
            sink,
            state: ControllerState::Idle,
            session: None,
            stats: MirrorStats::default(),
            last_session_id: 0,
        }
    }

    // ---------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------

    /// Start a session, tearing down any previous one first.
    ///
    /// Acquisition failure reports an error status and leaves the
    /// controller `Idle`.
    pub fn start(&mut self) -> Result<SessionStreams, MirrorError> {
        if self.session.is_some() {
            self.stop();
        }

        self.state = ControllerState::Preparing;
        self.sink.report(Status::RequestingDevice);

        match self.open_session() {
            Ok(streams) => Ok(streams),
            Err(e) => {
                error!(error = %e, "could not start mirror");
                self.stats.acquisition_failures += 1;
                self.state = ControllerState::Idle;
                self.sink.report(Status::error(e.to_string()));
                Err(e.into())
            }
        }
    }

    fn open_session(&mut self) -> Result<SessionStreams, AcquisitionError> {
        let mut source = self.backend.acquire_source()?;
        let segments = source.start(self.config.chunk_interval)?;

        self.last_session_id += 1;
        let id = self.last_session_id;
        self.stats.sessions_started += 1;
        self.surface.reset();
        self.drift.reset();

        if self.config.is_passthrough() {
            if let Err(e) = self.surface.play() {
                warn!(error = %e, "live playback start rejected");
                self.stats.play_rejections += 1;
            }
            self.session = Some(Session {
                id,
                source,
                queue: None,
                capacity_blocked: false,
            });
            self.state = ControllerState::Playing;
            info!(session = id, "mirror started in real-time mode");
            self.sink.report(Status::Realtime);
            return Ok(SessionStreams {
                session_id: id,
                segments,
                buffer_events: None,
            });
        }

        let (events_tx, events_rx) = buffer_event_channel();
        let resource = match self.backend.open_buffer(events_tx) {
            Ok(resource) => resource,
            Err(e) => {
                source.stop();
                return Err(e);
            }
        };
        let mut queue = OperationQueue::new();
        queue.attach(resource);

        self.session = Some(Session {
            id,
            source,
            queue: Some(queue),
            capacity_blocked: false,
        });
        self.state = ControllerState::Buffering;
        info!(session = id, delay_seconds = self.config.delay_seconds, "mirror started, buffering");
        self.sink.report(Status::Recording {
            delay: self.config.delay_seconds,
        });

        Ok(SessionStreams {
            session_id: id,
            segments,
            buffer_events: Some(events_rx),
        })
    }

    /// Tear the session down and return to `Idle`. Idempotent.
    pub fn stop(&mut self) {
        let Some(mut session) = self.session.take() else {
            self.state = ControllerState::Idle;
            return;
        };

        self.state = ControllerState::Stopped;
        session.source.stop();
        if let Some(mut queue) = session.queue.take() {
            let pending = queue.len();
            let in_flight = queue.is_in_flight();
            queue.detach();
            debug!(pending, in_flight, "operation queue flushed");
        }
        self.surface.pause();
        self.surface.reset();
        self.drift.reset();

        self.state = ControllerState::Idle;
        info!(session = session.id, "mirror stopped");
        self.sink.report(Status::Idle);
    }

    /// Change the delay; an active session restarts from scratch
    pub fn set_delay(&mut self, delay_seconds: u32) -> Result<Option<SessionStreams>, MirrorError> {
        self.config.delay_seconds = delay_seconds;
        if self.session.is_none() {
            return Ok(None);
        }

        info!(delay_seconds, "delay changed, restarting session");
        self.stats.restarts += 1;
        self.stop();
        self.start().map(Some)
    }

    // ---------------------------------------------------------------
    // Events
    // ---------------------------------------------------------------

    pub fn on_segment(&mut self, segment: Segment) {
        let Some(session) = self.session.as_mut() else {
            self.stats.segments_dropped += 1;
            return;
        };
        if segment.is_empty() {
            self.stats.empty_segments += 1;
            return;
        }
        self.stats.segments_received += 1;

        let outcome = match session.queue.as_mut() {
            Some(queue) => queue.enqueue(Operation::Append(segment)),
            None => {
                self.surface.present_live(&segment);
                self.stats.live_segments += 1;
                return;
            }
        };
        self.after_drain(outcome);
    }

    pub fn on_buffer_event(&mut self, event: BufferEvent) {
        let Some(queue) = self.session.as_mut().and_then(|s| s.queue.as_mut()) else {
            debug!(?event, "buffer event without a buffered session");
            self.stats.stale_events += 1;
            return;
        };

        let outcome = match event {
            BufferEvent::Completed => queue.on_complete(),
            BufferEvent::Faulted(reason) => {
                self.stats.buffer_faults += 1;
                queue.on_fault(&reason)
            }
        };
        self.after_drain(outcome);
    }

    fn after_drain(&mut self, outcome: DrainOutcome) {
        match outcome {
            DrainOutcome::Idle => {}
            DrainOutcome::Submitted => {
                if let Some(session) = self.session.as_mut() {
                    let append_through = session
                        .queue
                        .as_ref()
                        .and_then(OperationQueue::in_flight)
                        .is_some_and(Operation::is_append);
                    if append_through {
                        session.capacity_blocked = false;
                    }
                }
            }
            DrainOutcome::CapacityExceeded => {
                self.stats.capacity_failures += 1;
                if let Some(session) = self.session.as_mut() {
                    session.capacity_blocked = true;
                }
                warn!(cursor = self.surface.cursor(), "buffer full, forcing eviction");
                // A second rejection stays parked until the next drain
                if self.evict(true) == Some(DrainOutcome::CapacityExceeded) {
                    self.stats.capacity_failures += 1;
                }
            }
        }
    }

    /// Plan and queue a removal. Returns the drain outcome if anything was queued.
    fn evict(&mut self, forced: bool) -> Option<DrainOutcome> {
        let playing = self.state == ControllerState::Playing;
        let cursor = self.surface.cursor();
        let queue = self.session.as_mut()?.queue.as_mut()?;

        // A normal remove stuck behind the parked append must go first
        if forced && playing && !queue.is_in_flight() && queue.promote_remove() {
            debug!("forced eviction promotes the queued remove");
            return Some(queue.drain());
        }

        let ctx = EvictionContext {
            playing,
            resource_idle: !queue.is_in_flight(),
            remove_queued: queue.has_pending_remove(),
            cursor,
        };
        let op = self.eviction.plan(ctx, forced)?;

        info!(op = %op, forced, cursor, "evicting old media");
        if forced {
            self.stats.forced_evictions += 1;
            Some(queue.enqueue_urgent(op))
        } else {
            self.stats.evictions += 1;
            Some(queue.enqueue(op))
        }
    }

    // ---------------------------------------------------------------
    // Periodic work
    // ---------------------------------------------------------------

    /// Buffering phase check, run every display frame until playback starts
    pub fn poll_buffering(&mut self) -> BufferingPoll {
        if self.state != ControllerState::Buffering {
            return BufferingPoll::NotBuffering;
        }

        let end = self.buffered_extent().end().unwrap_or(0.0);
        match buffering_check(end, self.config.delay_secs_f64()) {
            BufferingCheck::Ready { cursor } => {
                self.state = ControllerState::Playing;
                self.surface.set_cursor(cursor);
                if let Err(e) = self.surface.play() {
                    warn!(error = %e, "playback start rejected");
                    self.stats.play_rejections += 1;
                }
                self.drift.reset();
                info!(cursor, buffered_end = end, "buffering complete, delayed playback started");
                self.sink.report(Status::Delayed);
                BufferingPoll::Started { cursor }
            }
            BufferingCheck::Pending { progress } => {
                self.sink.report(Status::Buffering { progress });
                BufferingPoll::Pending { progress }
            }
        }
    }

    /// Drift correction and stall detection, every `drift_tick_interval` while playing
    pub fn drift_tick(&mut self) -> Option<DriftDecision> {
        if self.state != ControllerState::Playing || self.is_passthrough_session() {
            return None;
        }

        let extent = self.buffered_extent();
        let delay = self.config.delay_seconds;
        let cursor = self.surface.cursor();
        let decision = self.drift.tick(cursor, &extent, f64::from(delay));

        if let Some(d) = &decision {
            match d.action {
                DriftAction::HardCorrect { to } => {
                    debug!(drift = d.drift, target = to, "drift beyond threshold, correcting");
                    self.surface.set_cursor(to);
                    self.stats.hard_corrections += 1;
                }
                DriftAction::StallSkip { to } => {
                    warn!(cursor, to, "playback stalled, jumping over gap");
                    self.surface.set_cursor(to);
                    self.stats.stall_skips += 1;
                }
                DriftAction::None => {}
            }
            self.sink.report(Status::Playing {
                configured: delay,
                actual: d.actual_delay,
            });
        }

        self.sink.report(Status::Diagnostics {
            delay,
            cursor: self.surface.cursor(),
            extent,
        });
        decision
    }

    /// Trailing-window eviction, every `eviction_interval` while playing.
    /// Also retries a parked append. Returns true if a remove was queued.
    pub fn eviction_tick(&mut self) -> bool {
        if self.state != ControllerState::Playing {
            return false;
        }
        let forced = match self.session.as_ref() {
            Some(session) if session.queue.is_some() => session.capacity_blocked,
            _ => return false,
        };

        match self.evict(forced) {
            Some(outcome) => {
                self.after_drain(outcome);
                true
            }
            None => {
                if forced {
                    if let Some(queue) = self.session.as_mut().and_then(|s| s.queue.as_mut()) {
                        let outcome = queue.drain();
                        self.after_drain(outcome);
                    }
                }
                false
            }
        }
    }

    /// Let playback time pass on surfaces that need to be driven
    pub fn advance_playback(&mut self, elapsed_secs: f64) {
        if self.state != ControllerState::Playing || self.is_passthrough_session() {
            return;
        }
        let extent = self.buffered_extent();
        self.surface.advance(elapsed_secs, &extent);
    }

    // ---------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn delay_seconds(&self) -> u32 {
        self.config.delay_seconds
    }

    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    pub fn stats(&self) -> &MirrorStats {
        &self.stats
    }

    pub fn session_id(&self) -> Option<u64> {
        self.session.as_ref().map(|s| s.id)
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    fn is_passthrough_session(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.queue.is_none())
    }

    /// Queue of the current buffered session
    pub fn queue(&self) -> Option<&OperationQueue<B::Buffer>> {
        self.session.as_ref().and_then(|s| s.queue.as_ref())
    }

    pub fn is_capacity_blocked(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.capacity_blocked)
    }

    pub fn buffered_extent(&self) -> BufferedExtent {
        self.queue()
            .and_then(OperationQueue::resource)
            .map(BufferResource::buffered_extent)
            .unwrap_or_default()
    }

    pub fn surface(&self) -> &P {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut P {
        &mut self.surface
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn drift_controller(&self) -> &DriftController {
        &self.drift
    }

    pub fn snapshot(&self) -> MirrorSnapshot {
        let queue = self.queue();
        MirrorSnapshot {
            state: self.state,
            delay_seconds: self.config.delay_seconds,
            session_id: self.session_id(),
            cursor: self.surface.cursor(),
            extent: self.buffered_extent(),
            queue_depth: queue.map(OperationQueue::len).unwrap_or(0),
            in_flight: queue.is_some_and(OperationQueue::is_in_flight),
            stall_count: self.drift.stall_count(),
            stats: self.stats.clone(),
            queue: queue.map(|q| q.stats().clone()),
        }
    }
}

impl<B: MediaBackend, P: PlaybackSurface, K: StatusSink> Drop for Mirror<B, P, K> {
    fn drop(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.source.stop();
            if let Some(mut queue) = session.queue.take() {
                queue.detach();
            }
        }
    }
}
