//! Status reporting
//!
//! Every user-visible state change and the per-tick diagnostics line go
//! through a `StatusSink`. `Display` renders the human-readable text;
//! `Serialize` gives the same event as JSON.

use super::segment::BufferedExtent;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Status {
    Idle,
    /// Waiting for the capture device
    RequestingDevice,
    /// Source running, buffer filling
    Recording { delay: u32 },
    Buffering { progress: u8 },
    /// Buffering finished, delayed playback begins
    Delayed,
    Playing { configured: u32, actual: f64 },
    /// Zero-delay passthrough
    Realtime,
    /// Overlay line, emitted every drift tick
    Diagnostics {
        delay: u32,
        cursor: f64,
        extent: BufferedExtent,
    },
    Error { message: String },
}

impl Status {
    pub fn error(message: impl Into<String>) -> Self {
        Status::Error {
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Status::Error { .. })
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Idle => write!(f, "Idle"),
            Status::RequestingDevice => write!(f, "Requesting camera access..."),
            Status::Recording { delay } => {
                write!(f, "Recording... playback starts in {}s", delay)
            }
            Status::Buffering { progress } => write!(f, "Buffering... {}%", progress),
            Status::Playing { configured, actual } => write!(
                f,
                "Playing (configured: {}s, actual: {:.1}s)",
                configured, actual
            ),
            Status::Delayed => write!(f, "Playing (delayed)"),
            Status::Realtime => write!(f, "Playing (real-time)"),
            Status::Diagnostics {
                delay,
                cursor,
                extent,
            } => write!(f, "Delay: {}s | Time: {:.1}s | {}", delay, cursor, extent),
            Status::Error { message } => write!(f, "Error: {}", message),
        }
    }
}

/// Receiver of status updates
pub trait StatusSink: Send {
    fn report(&mut self, status: Status);
}

/// Emits status through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingStatusSink;

impl StatusSink for TracingStatusSink {
    fn report(&mut self, status: Status) {
        match &status {
            Status::Diagnostics { .. } | Status::Buffering { .. } => {
                debug!(target: "delay_mirror::status", "{}", status)
            }
            Status::Error { .. } => error!(target: "delay_mirror::status", "{}", status),
            _ => info!(target: "delay_mirror::status", "{}", status),
        }
    }
}

/// Keeps every update in a shared list
#[derive(Debug, Clone, Default)]
pub struct RecordingStatusSink {
    events: Arc<Mutex<Vec<Status>>>,
}

impl RecordingStatusSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Status> {
        self.events.lock().clone()
    }

    pub fn last(&self) -> Option<Status> {
        self.events.lock().last().cloned()
    }

    /// Latest update that is not a diagnostics line
    pub fn last_state(&self) -> Option<Status> {
        self.events
            .lock()
            .iter()
            .rev()
            .find(|s| !matches!(s, Status::Diagnostics { .. }))
            .cloned()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl StatusSink for RecordingStatusSink {
    fn report(&mut self, status: Status) {
        self.events.lock().push(status);
    }
}
