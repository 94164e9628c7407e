//! Delayed Mirror
//!
//! Records a live segment stream into a bounded buffer and plays it back a
//! fixed number of seconds behind real time.
//!
//! ## Architecture
//!
//! ```text
//! SegmentSource ─► OperationQueue ─► BufferResource
//!                        ▲                 │ (completion events)
//!                        └─────────────────┘
//!
//! BufferedExtent ─► DriftController ─► PlaybackSurface.cursor
//!                ─► EvictionPolicy  ─► Remove [0, cursor - retain)
//! ```
//!
//! ## Key Features
//!
//! - **Serialized mutations**: at most one append or remove in flight
//! - **Capacity recovery**: rejected appends park at the head while a forced
//!   eviction frees space
//! - **Drift correction**: hard jumps past 0.5s of drift, gap skips on stalls
//! - **Trailing-window eviction**: keeps the last 30s behind the cursor
//! - **Real-time passthrough**: zero delay bypasses the buffer entirely

pub mod actor;
pub mod backend;
pub mod buffer;
pub mod clock;
pub mod config;
pub mod drift;
pub mod dst;
pub mod error;
pub mod eviction;
pub mod playback;
pub mod queue;
pub mod segment;
pub mod session;
pub mod simulated_buffer;
pub mod source;
pub mod status;

pub use actor::{spawn_mirror_actor, MirrorActor, MirrorHandle, MirrorMessage};
pub use backend::{InMemoryBackend, MediaBackend};
pub use buffer::{
    buffer_event_channel, BufferEvent, BufferEventReceiver, BufferEventSender, BufferResource,
    MemoryBufferResource, MemoryBufferStats, SettleMode,
};
pub use clock::{MediaTimestamp, MirrorClock, ProductionClock, SimulatedClock};
pub use config::{DriftConfig, EvictionConfig, MirrorConfig};
pub use drift::{buffering_check, BufferingCheck, DriftAction, DriftController, DriftDecision};
pub use dst::{
    run_mirror_dst_batch, summarize_mirror_dst_batch, CountingStatusSink, MirrorDSTConfig,
    MirrorDSTHarness, MirrorDSTResult, SimulatedBackend,
};
pub use error::{AcquisitionError, ConfigError, MirrorError, PlaybackError, SubmitError};
pub use eviction::{EvictionContext, EvictionPolicy, EvictionStats};
pub use playback::{PlaybackSurface, SimulatedPlayback};
pub use queue::{DrainOutcome, OperationQueue, QueueStats};
pub use segment::{BufferedExtent, Operation, Segment, TimeRange};
pub use session::{
    BufferingPoll, ControllerState, Mirror, MirrorSnapshot, MirrorStats, SessionStreams,
};
pub use simulated_buffer::{
    SimulatedBufferConfig, SimulatedBufferResource, SimulatedBufferStats, SubmissionRecord,
    SubmissionResult,
};
pub use source::{
    ManualSource, SegmentSource, SegmentStream, SyntheticSource, SyntheticSourceConfig,
};
pub use status::{RecordingStatusSink, Status, StatusSink, TracingStatusSink};
