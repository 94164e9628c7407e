//! Delay Controller
//!
//! Keeps the playback cursor pinned to `buffer_end - delay`:
//!
//! 1. Large drift (`> max_drift_secs`): jump straight to the target.
//! 2. Small drift: watch tick-over-tick advancement. A cursor that barely
//!    moves for more than `stall_ticks` ticks while media is buffered ahead
//!    is stuck at a gap; skip it forward by `stall_skip_secs`.
//!
//! The controller is pure: it reads positions and returns a decision, the
//! caller writes the cursor.

use super::config::DriftConfig;
use super::segment::BufferedExtent;
use serde::Serialize;

/// Cursor write requested by a tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum DriftAction {
    None,
    /// Drift exceeded the threshold
    HardCorrect { to: f64 },
    /// Cursor stalled with data ahead
    StallSkip { to: f64 },
}

impl DriftAction {
    /// New cursor position, if any
    pub fn target(&self) -> Option<f64> {
        match self {
            DriftAction::None => None,
            DriftAction::HardCorrect { to } | DriftAction::StallSkip { to } => Some(*to),
        }
    }
}

/// Result of one drift tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DriftDecision {
    pub action: DriftAction,
    /// `cursor - (end - delay)` before correction
    pub drift: f64,
    /// `end - cursor` after correction
    pub actual_delay: f64,
    pub buffered_end: f64,
    pub stall_count: u32,
}

/// Result of a buffering poll
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BufferingCheck {
    /// Enough media: start playing here
    Ready { cursor: f64 },
    /// Percent of the delay buffered so far
    Pending { progress: u8 },
}

/// Decide whether buffering is done.
///
/// Playback starts once strictly more than `delay` seconds are buffered.
pub fn buffering_check(buffered_end: f64, delay: f64) -> BufferingCheck {
    if buffered_end > delay {
        BufferingCheck::Ready {
            cursor: (buffered_end - delay).max(0.0),
        }
    } else {
        let ratio = if delay > 0.0 { buffered_end / delay } else { 1.0 };
        let progress = (ratio * 100.0).round().clamp(0.0, 100.0) as u8;
        BufferingCheck::Pending { progress }
    }
}

/// Drift-correction and stall-detection state
#[derive(Debug, Clone)]
pub struct DriftController {
    config: DriftConfig,
    /// Cursor seen by the previous tick; `None` right after (re)start
    last_cursor: Option<f64>,
    stall_count: u32,
}

impl DriftController {
    pub fn new(config: DriftConfig) -> Self {
        DriftController {
            config,
            last_cursor: None,
            stall_count: 0,
        }
    }

    pub fn config(&self) -> &DriftConfig {
        &self.config
    }

    pub fn stall_count(&self) -> u32 {
        self.stall_count
    }

    pub fn last_cursor(&self) -> Option<f64> {
        self.last_cursor
    }

    /// Forget cursor history and the stall counter
    pub fn reset(&mut self) {
        self.last_cursor = None;
        self.stall_count = 0;
    }

    /// Run one tick. Returns `None` when nothing is buffered.
    pub fn tick(&mut self, cursor: f64, extent: &BufferedExtent, delay: f64) -> Option<DriftDecision> {
        let end = extent.end()?;
        let target = end - delay;
        let drift = cursor - target;

        let mut action = DriftAction::None;
        let mut position = cursor;

        if drift.abs() > self.config.max_drift_secs {
            position = target;
            action = DriftAction::HardCorrect { to: target };
            self.stall_count = 0;
        } else {
            let advanced = self
                .last_cursor
                .map(|last| (cursor - last).abs())
                .unwrap_or(f64::INFINITY);

            if advanced < self.config.stall_advance_secs {
                self.stall_count += 1;
            } else {
                self.stall_count = 0;
            }

            if self.stall_count > self.config.stall_ticks
                && end > cursor + self.config.stall_min_ahead_secs
            {
                position = (cursor + self.config.stall_skip_secs).min(end);
                action = DriftAction::StallSkip { to: position };
                self.stall_count = 0;
            }
        }

        self.last_cursor = Some(position);

        Some(DriftDecision {
            action,
            drift,
            actual_delay: end - position,
            buffered_end: end,
            stall_count: self.stall_count,
        })
    }
}
