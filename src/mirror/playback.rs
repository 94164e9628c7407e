//! Playback Surface
//!
//! The delay controller treats the surface as a mutable time register plus
//! a play/pause switch. Zero-delay sessions bypass the buffer and hand
//! segments straight to `present_live`.

use super::error::PlaybackError;
use super::segment::{BufferedExtent, Segment};

/// Consumer of buffered media
pub trait PlaybackSurface: Send {
    /// Current read position in seconds
    fn cursor(&self) -> f64;

    fn set_cursor(&mut self, position: f64);

    fn play(&mut self) -> Result<(), PlaybackError>;

    fn pause(&mut self);

    fn is_playing(&self) -> bool;

    /// Real-time passthrough of a segment
    fn present_live(&mut self, segment: &Segment);

    /// Forget all state from the previous session
    fn reset(&mut self);

    /// Let wall-clock time pass. Surfaces that play on their own ignore this.
    fn advance(&mut self, _elapsed_secs: f64, _extent: &BufferedExtent) {}
}

/// In-process playback register driven by explicit time steps.
///
/// The cursor only moves through buffered media: inside a gap or at the
/// live edge it freezes, which is what stall detection looks for.
#[derive(Debug, Clone, Default)]
pub struct SimulatedPlayback {
    cursor: f64,
    playing: bool,
    /// `play()` calls to refuse (autoplay policy)
    refuse_play: u32,
    /// Remaining `advance` calls that freeze the cursor (decoder stall)
    frozen_steps: u32,
    live_segments: u64,
    live_bytes: u64,
    cursor_writes: u64,
}

impl SimulatedPlayback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse the next `count` calls to `play()`
    pub fn refuse_play(mut self, count: u32) -> Self {
        self.refuse_play = count;
        self
    }

    /// Freeze the cursor for the next `steps` calls to `advance`
    pub fn freeze_for(&mut self, steps: u32) {
        self.frozen_steps = self.frozen_steps.max(steps);
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen_steps > 0
    }

    pub fn live_segments(&self) -> u64 {
        self.live_segments
    }

    pub fn live_bytes(&self) -> u64 {
        self.live_bytes
    }

    pub fn cursor_writes(&self) -> u64 {
        self.cursor_writes
    }
}

impl PlaybackSurface for SimulatedPlayback {
    fn cursor(&self) -> f64 {
        self.cursor
    }

    fn set_cursor(&mut self, position: f64) {
        self.cursor = position.max(0.0);
        self.cursor_writes += 1;
    }

    fn play(&mut self) -> Result<(), PlaybackError> {
        if self.refuse_play > 0 {
            self.refuse_play -= 1;
            return Err(PlaybackError("autoplay prevented".to_string()));
        }
        self.playing = true;
        Ok(())
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn present_live(&mut self, segment: &Segment) {
        self.live_segments += 1;
        self.live_bytes += segment.len() as u64;
        self.cursor = segment.end();
    }

    fn reset(&mut self) {
        *self = SimulatedPlayback {
            refuse_play: self.refuse_play,
            ..SimulatedPlayback::default()
        };
    }

    fn advance(&mut self, elapsed_secs: f64, extent: &BufferedExtent) {
        if !self.playing || elapsed_secs <= 0.0 {
            return;
        }
        if self.frozen_steps > 0 {
            self.frozen_steps -= 1;
            return;
        }
        if let Some(range) = extent.range_containing(self.cursor) {
            self.cursor = (self.cursor + elapsed_secs).min(range.end);
        }
    }
}
