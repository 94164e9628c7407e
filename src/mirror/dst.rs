//! Deterministic Simulation Testing for the delayed mirror
//!
//! Drives a sans-io `Mirror` through virtual time in 10ms steps:
//! - Seeded chunk sizes, gaps and empty chunks from a manual source
//! - Fault injection at the buffer resource (capacity, submit, mutation, latency)
//! - Decoder stalls on the playback surface
//! - Random restarts and delay changes
//! - Invariant checking after every interaction
//!
//! ```text
//! for seed in 0..1000 {
//!     let mut harness = MirrorDSTHarness::new(MirrorDSTConfig::chaos(seed));
//!     harness.run();
//!     harness.check_invariants();
//!     assert!(harness.result().is_success(), "seed {}", seed);
//! }
//! ```

use super::backend::MediaBackend;
use super::buffer::{BufferEvent, BufferEventSender};
use super::clock::SimulatedClock;
use super::config::MirrorConfig;
use super::drift::DriftAction;
use super::error::AcquisitionError;
use super::playback::{PlaybackSurface, SimulatedPlayback};
use super::segment::{Operation, Segment};
use super::session::{BufferingPoll, ControllerState, Mirror, MirrorStats, SessionStreams};
use super::simulated_buffer::{
    SimulatedBufferConfig, SimulatedBufferResource, SimulatedBufferStats, SubmissionRecord,
    SubmissionResult,
};
use super::source::ManualSource;
use super::status::{Status, StatusSink};
use crate::buggify::{self, faults, BuggifyStats, FaultConfig};
use crate::io::simulation::SimulatedRng;
use crate::io::Rng;
use std::collections::HashSet;

const STEP_MS: u64 = 10;
const EPSILON: f64 = 1e-6;
const MAX_RECORDED_VIOLATIONS: usize = 64;

/// Configuration for mirror DST
#[derive(Debug, Clone)]
pub struct MirrorDSTConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    pub mirror: MirrorConfig,
    /// Buffer resource fault configuration
    pub store: SimulatedBufferConfig,
    /// Virtual run length
    pub duration_secs: u64,
    /// Chunk payload size range in bytes (inclusive)
    pub chunk_bytes: (u64, u64),
    /// Chunk dropped by the source, leaving a hole in the timeline
    pub gap_probability: f64,
    pub empty_chunk_probability: f64,
    /// Per drift tick
    pub decoder_stall_probability: f64,
    /// Per virtual second
    pub restart_probability: f64,
    /// Per session start
    pub acquire_fail_probability: f64,
    /// Upper bound for random delay changes
    pub max_delay_seconds: u32,
}

impl Default for MirrorDSTConfig {
    fn default() -> Self {
        MirrorDSTConfig {
            seed: 0,
            mirror: MirrorConfig::default(),
            store: SimulatedBufferConfig::default(),
            duration_secs: 60,
            chunk_bytes: (1_000, 4_000),
            gap_probability: 0.01,
            empty_chunk_probability: 0.01,
            decoder_stall_probability: 0.02,
            restart_probability: 0.01,
            acquire_fail_probability: 0.02,
            max_delay_seconds: 5,
        }
    }
}

impl MirrorDSTConfig {
    pub fn new(seed: u64) -> Self {
        MirrorDSTConfig {
            seed,
            ..Default::default()
        }
    }

    /// Calm mode - no faults, one long session
    pub fn calm(seed: u64) -> Self {
        MirrorDSTConfig {
            seed,
            store: SimulatedBufferConfig::no_faults(),
            duration_secs: 90,
            gap_probability: 0.0,
            empty_chunk_probability: 0.0,
            decoder_stall_probability: 0.0,
            restart_probability: 0.0,
            acquire_fail_probability: 0.0,
            ..Default::default()
        }
    }

    /// Chaos mode - aggressive faults and a buffer too small for the
    /// retained window, so forced eviction runs regularly
    pub fn chaos(seed: u64) -> Self {
        MirrorDSTConfig {
            seed,
            mirror: MirrorConfig::test().with_delay(3),
            store: SimulatedBufferConfig {
                capacity_bytes: 256 * 1024,
                ..SimulatedBufferConfig::high_chaos()
            },
            duration_secs: 120,
            gap_probability: 0.03,
            empty_chunk_probability: 0.02,
            decoder_stall_probability: 0.05,
            restart_probability: 0.02,
            acquire_fail_probability: 0.1,
            ..Default::default()
        }
    }

    /// Moderate fault injection
    pub fn moderate(seed: u64) -> Self {
        MirrorDSTConfig::new(seed)
    }
}

/// Result of a DST run
#[derive(Debug, Clone)]
pub struct MirrorDSTResult {
    pub seed: u64,
    pub steps: u64,
    pub chunks_emitted: u64,
    pub gaps: u64,
    pub restarts: u64,
    /// Injected acquisition failures
    pub acquire_failures: u64,
    pub decoder_stalls: u64,
    /// Sessions that left buffering and started delayed playback
    pub sessions_played: u64,
    pub error_reports: u64,
    pub max_bytes_buffered: usize,
    pub mirror_stats: MirrorStats,
    /// Summed over every buffer opened during the run
    pub buffer_stats: SimulatedBufferStats,
    /// Fault checks and triggers seen by this run's thread
    pub buggify_stats: BuggifyStats,
    pub invariant_violations: Vec<String>,
}

impl MirrorDSTResult {
    pub fn new(seed: u64) -> Self {
        MirrorDSTResult {
            seed,
            steps: 0,
            chunks_emitted: 0,
            gaps: 0,
            restarts: 0,
            acquire_failures: 0,
            decoder_stalls: 0,
            sessions_played: 0,
            error_reports: 0,
            max_bytes_buffered: 0,
            mirror_stats: MirrorStats::default(),
            buffer_stats: SimulatedBufferStats::default(),
            buggify_stats: BuggifyStats::default(),
            invariant_violations: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.invariant_violations.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "Seed {}: {} chunks ({} gaps), {} sessions played, {} restarts, \
             {} corrections, {} skips, {} evictions ({} forced), {} capacity failures, {} violations",
            self.seed,
            self.chunks_emitted,
            self.gaps,
            self.sessions_played,
            self.restarts,
            self.mirror_stats.hard_corrections,
            self.mirror_stats.stall_skips,
            self.mirror_stats.evictions,
            self.mirror_stats.forced_evictions,
            self.mirror_stats.capacity_failures,
            self.invariant_violations.len()
        )
    }
}

/// Manual source plus one fault-injecting buffer per session.
///
/// Keeps a handle on the current buffer so the harness can advance its
/// virtual time and read its submission log.
pub struct SimulatedBackend {
    source: ManualSource,
    store: SimulatedBufferConfig,
    rng: SimulatedRng,
    current: Option<SimulatedBufferResource<SimulatedRng>>,
    retired: SimulatedBufferStats,
    buffers_opened: u64,
}

impl SimulatedBackend {
    pub fn new(seed: u64, store: SimulatedBufferConfig) -> Self {
        SimulatedBackend {
            source: ManualSource::new(),
            store,
            rng: SimulatedRng::new(seed),
            current: None,
            retired: SimulatedBufferStats::default(),
            buffers_opened: 0,
        }
    }

    /// Handle on the shared capture source
    pub fn source(&self) -> ManualSource {
        self.source.clone()
    }

    /// Most recently opened buffer
    pub fn buffer(&self) -> Option<&SimulatedBufferResource<SimulatedRng>> {
        self.current.as_ref()
    }

    pub fn buffers_opened(&self) -> u64 {
        self.buffers_opened
    }

    /// Fault counters of every buffer opened so far
    pub fn total_stats(&self) -> SimulatedBufferStats {
        let mut total = self.retired.clone();
        if let Some(buffer) = &self.current {
            accumulate(&mut total, &buffer.stats());
        }
        total
    }
}

impl MediaBackend for SimulatedBackend {
    type Source = ManualSource;
    type Buffer = SimulatedBufferResource<SimulatedRng>;

    fn acquire_source(&mut self) -> Result<ManualSource, AcquisitionError> {
        Ok(self.source.clone())
    }

    fn open_buffer(&mut self, events: BufferEventSender) -> Result<Self::Buffer, AcquisitionError> {
        if let Some(old) = self.current.take() {
            accumulate(&mut self.retired, &old.stats());
        }
        let buffer = SimulatedBufferResource::new(self.rng.fork(), self.store.clone(), events);
        self.current = Some(buffer.clone());
        self.buffers_opened += 1;
        Ok(buffer)
    }
}

fn accumulate(total: &mut SimulatedBufferStats, stats: &SimulatedBufferStats) {
    total.submissions += stats.submissions;
    total.capacity_rejections += stats.capacity_rejections;
    total.squeezed += stats.squeezed;
    total.submit_faults += stats.submit_faults;
    total.mutation_faults += stats.mutation_faults;
    total.slow_completions += stats.slow_completions;
    total.overlapping_submissions += stats.overlapping_submissions;
}

/// Status sink that only keeps counters, so long runs stay small
#[derive(Debug, Default)]
pub struct CountingStatusSink {
    reports: u64,
    errors: u64,
    last_error: Option<String>,
}

impl CountingStatusSink {
    pub fn reports(&self) -> u64 {
        self.reports
    }

    pub fn errors(&self) -> u64 {
        self.errors
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

impl StatusSink for CountingStatusSink {
    fn report(&mut self, status: Status) {
        self.reports += 1;
        if let Status::Error { message } = status {
            self.errors += 1;
            self.last_error = Some(message);
        }
    }
}

pub type DSTMirror = Mirror<SimulatedBackend, SimulatedPlayback, CountingStatusSink>;

enum Pumped {
    Segment(Segment),
    Buffer(BufferEvent),
}

fn next_pumped(streams: &mut SessionStreams) -> Option<Pumped> {
    if let Ok(segment) = streams.segments.try_recv() {
        return Some(Pumped::Segment(segment));
    }
    streams
        .buffer_events
        .as_mut()
        .and_then(|events| events.try_recv().ok())
        .map(Pumped::Buffer)
}

/// Main DST harness for the mirror
pub struct MirrorDSTHarness {
    config: MirrorDSTConfig,
    rng: SimulatedRng,
    clock: SimulatedClock,
    mirror: DSTMirror,
    source: ManualSource,
    streams: Option<SessionStreams>,
    /// Chunks (emitted or dropped) since the session started
    chunk_index: u64,
    next_chunk_ms: u64,
    next_poll_ms: Option<u64>,
    next_drift_ms: Option<u64>,
    next_eviction_ms: Option<u64>,
    next_restart_ms: u64,
    /// End bound of the remove last checked, as bits
    tracked_remove: Option<u64>,
    result: MirrorDSTResult,
}

impl MirrorDSTHarness {
    pub fn new(config: MirrorDSTConfig) -> Self {
        buggify::set_config(FaultConfig::new());
        buggify::reset_stats();

        let backend = SimulatedBackend::new(config.seed.wrapping_add(1), config.store.clone());
        let source = backend.source();
        let mirror = Mirror::new(
            config.mirror.clone(),
            backend,
            SimulatedPlayback::new(),
            CountingStatusSink::default(),
        );

        let mut harness = MirrorDSTHarness {
            rng: SimulatedRng::new(config.seed),
            clock: SimulatedClock::new(0),
            mirror,
            source,
            streams: None,
            chunk_index: 0,
            next_chunk_ms: 0,
            next_poll_ms: None,
            next_drift_ms: None,
            next_eviction_ms: None,
            next_restart_ms: 1_000,
            tracked_remove: None,
            result: MirrorDSTResult::new(config.seed),
            config,
        };
        harness.start_session();
        harness
    }

    /// Run for the configured virtual duration
    pub fn run(&mut self) {
        let steps = self.config.duration_secs * 1_000 / STEP_MS;
        for _ in 0..steps {
            self.step();
        }
    }

    /// Run for `secs` more virtual seconds
    pub fn run_for(&mut self, secs: u64) {
        for _ in 0..secs * 1_000 / STEP_MS {
            self.step();
        }
    }

    fn now_ms(&self) -> u64 {
        self.clock.current_ms()
    }

    fn millis(duration: std::time::Duration) -> u64 {
        (duration.as_millis() as u64).max(1)
    }

    fn step(&mut self) {
        self.clock.advance_ms(STEP_MS);
        let now = self.now_ms();
        self.result.steps += 1;

        if now >= self.next_restart_ms {
            self.next_restart_ms += 1_000;
            self.maybe_restart();
        }

        if let Some(buffer) = self.mirror.backend().buffer() {
            buffer.advance_to(now);
        }

        if self.streams.is_some() && now >= self.next_chunk_ms {
            self.next_chunk_ms += Self::millis(self.config.mirror.chunk_interval);
            self.emit_chunk();
        }
        self.pump();

        if let Some(due) = self.next_poll_ms {
            if now >= due {
                self.next_poll_ms = Some(due + Self::millis(self.config.mirror.buffering_poll_interval));
                self.poll_buffering();
            }
        }

        self.mirror.advance_playback(STEP_MS as f64 / 1_000.0);

        if let Some(due) = self.next_drift_ms {
            if now >= due {
                self.next_drift_ms = Some(due + Self::millis(self.config.mirror.drift_tick_interval));
                self.drift_tick();
            }
        }

        if let Some(due) = self.next_eviction_ms {
            if now >= due {
                self.next_eviction_ms = Some(due + Self::millis(self.config.mirror.eviction_interval));
                self.mirror.eviction_tick();
                self.observe_remove();
            }
        }

        self.pump();
        self.check_step_invariants();
    }

    // ---------------------------------------------------------------
    // Workload
    // ---------------------------------------------------------------

    fn inject_acquire_fault(&mut self) {
        let prob = self.config.acquire_fail_probability;
        if crate::buggify!(&mut self.rng, faults::source::ACQUIRE_FAIL, prob) {
            self.result.acquire_failures += 1;
            self.source
                .fail_next_start(AcquisitionError::Unavailable("simulated device busy".to_string()));
        }
    }

    fn start_session(&mut self) {
        self.inject_acquire_fault();
        let opened = self.mirror.backend().buffers_opened();
        let streams = self.mirror.start().ok();
        self.check_passthrough_bypass(opened);
        self.install(streams);
    }

    fn pick_delay(&mut self) -> u32 {
        if self.rng.gen_bool(0.1) {
            0
        } else {
            self.rng.gen_range(1, u64::from(self.config.max_delay_seconds) + 1) as u32
        }
    }

    fn maybe_restart(&mut self) {
        if !self.mirror.is_active() {
            self.start_session();
            return;
        }
        if !self.rng.gen_bool(self.config.restart_probability) {
            return;
        }

        self.result.restarts += 1;
        match self.rng.gen_range(0, 10) {
            0..=5 => {
                let delay = self.pick_delay();
                self.inject_acquire_fault();
                let opened = self.mirror.backend().buffers_opened();
                let streams = self.mirror.set_delay(delay).ok().flatten();
                self.check_passthrough_bypass(opened);
                self.install(streams);
            }
            6..=7 => {
                self.mirror.stop();
                self.install(None);
            }
            _ => self.start_session(),
        }
    }

    fn install(&mut self, streams: Option<SessionStreams>) {
        let now = self.now_ms();
        self.streams = streams;
        self.chunk_index = 0;
        self.next_chunk_ms = now + Self::millis(self.config.mirror.chunk_interval);
        self.next_poll_ms = (self.mirror.state() == ControllerState::Buffering)
            .then(|| now + Self::millis(self.config.mirror.buffering_poll_interval));
        self.next_drift_ms = None;
        self.next_eviction_ms = None;
        self.tracked_remove = None;
    }

    fn emit_chunk(&mut self) {
        let duration = Self::millis(self.config.mirror.chunk_interval) as f64 / 1_000.0;
        let start = self.chunk_index as f64 * duration;
        self.chunk_index += 1;

        let gap_prob = self.config.gap_probability;
        if crate::buggify!(&mut self.rng, faults::source::CHUNK_GAP, gap_prob) {
            self.result.gaps += 1;
            return;
        }

        let bytes = if self.rng.gen_bool(self.config.empty_chunk_probability) {
            0
        } else {
            let (min, max) = self.config.chunk_bytes;
            self.rng.gen_range(min, max + 1) as usize
        };
        if self.source.emit_chunk(start, duration, bytes) {
            self.result.chunks_emitted += 1;
        }
    }

    fn pump(&mut self) {
        while let Some(item) = self.streams.as_mut().and_then(next_pumped) {
            match item {
                Pumped::Segment(segment) => self.mirror.on_segment(segment),
                Pumped::Buffer(event) => self.mirror.on_buffer_event(event),
            }
            self.observe_remove();
        }
    }

    fn poll_buffering(&mut self) {
        match self.mirror.poll_buffering() {
            BufferingPoll::NotBuffering => self.next_poll_ms = None,
            BufferingPoll::Pending { .. } => {}
            BufferingPoll::Started { cursor } => {
                self.next_poll_ms = None;
                self.result.sessions_played += 1;

                let end = self.mirror.buffered_extent().end().unwrap_or(0.0);
                let delay = f64::from(self.mirror.delay_seconds());
                if end <= delay {
                    self.violation(format!(
                        "playback started with {:.3}s buffered for a {}s delay",
                        end, delay
                    ));
                }
                if (cursor - (end - delay)).abs() > EPSILON
                    || (self.mirror.surface().cursor() - cursor).abs() > EPSILON
                {
                    self.violation(format!(
                        "playback started at {:.3}, expected {:.3}",
                        cursor,
                        end - delay
                    ));
                }

                let now = self.now_ms();
                self.next_drift_ms = Some(now + Self::millis(self.config.mirror.drift_tick_interval));
                self.next_eviction_ms = Some(now + Self::millis(self.config.mirror.eviction_interval));
            }
        }
    }

    fn drift_tick(&mut self) {
        let stall_prob = self.config.decoder_stall_probability;
        if crate::buggify!(&mut self.rng, faults::playback::DECODER_STALL, stall_prob) {
            self.result.decoder_stalls += 1;
            let steps = self.rng.gen_range(20, 150) as u32;
            self.mirror.surface_mut().freeze_for(steps);
        }

        let Some(decision) = self.mirror.drift_tick() else {
            return;
        };
        let cursor = self.mirror.surface().cursor();
        let delay = f64::from(self.mirror.delay_seconds());

        match decision.action {
            DriftAction::HardCorrect { to } => {
                if (cursor - to).abs() > EPSILON {
                    self.violation(format!("hard correction to {:.3} left cursor at {:.3}", to, cursor));
                }
                if (to - (decision.buffered_end - delay)).abs() > EPSILON {
                    self.violation(format!(
                        "hard correction to {:.3}, end {:.3} minus delay {} expected",
                        to, decision.buffered_end, delay
                    ));
                }
            }
            DriftAction::StallSkip { to } => {
                if to >= decision.buffered_end {
                    self.violation(format!(
                        "stall skip to {:.3} passes buffered end {:.3}",
                        to, decision.buffered_end
                    ));
                }
                if (cursor - to).abs() > EPSILON {
                    self.violation(format!("stall skip to {:.3} left cursor at {:.3}", to, cursor));
                }
            }
            DriftAction::None => {}
        }
    }

    // ---------------------------------------------------------------
    // Invariants
    // ---------------------------------------------------------------

    fn violation(&mut self, message: String) {
        if self.result.invariant_violations.len() < MAX_RECORDED_VIOLATIONS {
            let at = self.now_ms();
            self.result.invariant_violations.push(format!("t={}ms: {}", at, message));
        }
    }

    /// At most one remove outstanding, and a newly planned remove never
    /// reaches into the retained window behind the cursor
    fn observe_remove(&mut self) {
        let removes: Vec<f64> = match self.mirror.queue() {
            Some(queue) => queue
                .in_flight()
                .into_iter()
                .chain(queue.iter())
                .filter_map(|op| match op {
                    Operation::Remove { end, .. } => Some(*end),
                    Operation::Append(_) => None,
                })
                .collect(),
            None => Vec::new(),
        };

        if removes.len() > 1 {
            self.violation(format!("{} removes outstanding", removes.len()));
        }

        let Some(&end) = removes.first() else {
            self.tracked_remove = None;
            return;
        };
        if self.tracked_remove == Some(end.to_bits()) {
            return;
        }
        self.tracked_remove = Some(end.to_bits());

        let limit = self.mirror.surface().cursor() - self.mirror.config().eviction.retain_secs;
        if end > limit + EPSILON {
            self.violation(format!(
                "remove up to {:.3} reaches past cursor minus retain ({:.3})",
                end, limit
            ));
        }
    }

    fn check_passthrough_bypass(&mut self, buffers_before: u64) {
        let passthrough = self.mirror.config().is_passthrough();
        if passthrough && self.mirror.is_active() {
            if self.mirror.backend().buffers_opened() != buffers_before {
                self.violation("zero-delay session opened a buffer".to_string());
            }
            if self.mirror.state() != ControllerState::Playing {
                self.violation(format!("zero-delay session in state {}", self.mirror.state()));
            }
        }
    }

    fn check_step_invariants(&mut self) {
        let mut bytes = 0;
        let mut updating = false;
        if let Some(buffer) = self.mirror.backend().buffer() {
            bytes = buffer.bytes_buffered();
            updating = buffer.is_updating();
        }
        self.result.max_bytes_buffered = self.result.max_bytes_buffered.max(bytes);

        if let Some(queue) = self.mirror.queue() {
            if updating && !queue.is_in_flight() {
                self.violation("resource updating with nothing in flight".to_string());
            }
        }

        if self.mirror.state() == ControllerState::Playing
            && self.mirror.queue().is_some()
            && !self.mirror.surface().is_playing()
        {
            self.violation("controller playing but surface paused".to_string());
        }
    }

    /// Every append rejected for capacity in the live session was later
    /// resubmitted, or is still queued
    fn check_submission_log(&mut self, log: &[SubmissionRecord]) {
        let Some(queue) = self.mirror.queue() else {
            return;
        };
        let queued: HashSet<u64> = queue
            .in_flight()
            .into_iter()
            .chain(queue.iter())
            .filter_map(Operation::sequence)
            .collect();
        let resolved: HashSet<u64> = log
            .iter()
            .filter(|r| r.result != SubmissionResult::CapacityExceeded)
            .filter_map(|r| r.sequence)
            .collect();

        let lost: Vec<u64> = log
            .iter()
            .filter(|r| r.result == SubmissionResult::CapacityExceeded)
            .filter_map(|r| r.sequence)
            .filter(|seq| !resolved.contains(seq) && !queued.contains(seq))
            .collect();
        for seq in lost {
            self.violation(format!("append {} rejected for capacity and never resubmitted", seq));
        }

        let mut last_accepted: Option<u64> = None;
        let accepted = log
            .iter()
            .filter(|r| r.result == SubmissionResult::Accepted)
            .filter_map(|r| r.sequence);
        for seq in accepted {
            if let Some(prev) = last_accepted {
                if seq <= prev {
                    self.violation(format!("append {} accepted after append {}", seq, prev));
                }
            }
            last_accepted = Some(seq);
        }
    }

    /// End-of-run checks; also fills in the aggregate counters
    pub fn check_invariants(&mut self) {
        let totals = self.mirror.backend().total_stats();
        if totals.overlapping_submissions > 0 {
            self.violation(format!(
                "{} submissions overlapped an outstanding mutation",
                totals.overlapping_submissions
            ));
        }

        if self.mirror.queue().is_some() {
            let log = self
                .mirror
                .backend()
                .buffer()
                .map(SimulatedBufferResource::submission_log)
                .unwrap_or_default();
            self.check_submission_log(&log);
        }

        let fault_stats = buggify::get_stats();
        for id in fault_stats.checks.keys() {
            if !faults::ALL_FAULTS.contains(&id.as_str()) {
                self.violation(format!("unregistered fault id {}", id));
            }
        }

        self.result.buffer_stats = totals;
        self.result.buggify_stats = fault_stats;
        self.result.mirror_stats = self.mirror.stats().clone();
        self.result.error_reports = self.mirror.sink().errors();
    }

    pub fn mirror(&self) -> &DSTMirror {
        &self.mirror
    }

    pub fn result(&self) -> &MirrorDSTResult {
        &self.result
    }

    pub fn into_result(self) -> MirrorDSTResult {
        self.result
    }
}

/// Run a batch of DST runs with consecutive seeds
pub fn run_mirror_dst_batch(
    base_seed: u64,
    count: usize,
    config_fn: impl Fn(u64) -> MirrorDSTConfig,
) -> Vec<MirrorDSTResult> {
    let mut results = Vec::with_capacity(count);

    for i in 0..count {
        let seed = base_seed + i as u64;
        let mut harness = MirrorDSTHarness::new(config_fn(seed));
        harness.run();
        harness.check_invariants();
        results.push(harness.into_result());
    }

    results
}

/// Summary of batch results
pub fn summarize_mirror_dst_batch(results: &[MirrorDSTResult]) -> String {
    let total = results.len();
    let passed = results.iter().filter(|r| r.is_success()).count();
    let failed_seeds: Vec<u64> = results
        .iter()
        .filter(|r| !r.is_success())
        .map(|r| r.seed)
        .collect();

    let chunks: u64 = results.iter().map(|r| r.chunks_emitted).sum();
    let restarts: u64 = results.iter().map(|r| r.restarts).sum();
    let forced: u64 = results.iter().map(|r| r.mirror_stats.forced_evictions).sum();
    let skips: u64 = results.iter().map(|r| r.mirror_stats.stall_skips).sum();

    let mut summary = format!(
        "Batch: {}/{} passed, {} chunks, {} restarts, {} forced evictions, {} stall skips",
        passed, total, chunks, restarts, forced, skips
    );

    if !failed_seeds.is_empty() {
        summary.push_str(&format!("\nFailed seeds: {:?}", failed_seeds));
    }

    summary
}
