//! Fault identifiers
//!
//! Each constant names one injection site. IDs are grouped by the component
//! that checks them so statistics read naturally (`buffer.capacity_squeeze`).

pub mod buffer {
    /// Submission rejected as if the buffer were full
    pub const CAPACITY_SQUEEZE: &str = "buffer.capacity_squeeze";
    /// Submission rejected with a non-capacity error
    pub const SUBMIT_FAULT: &str = "buffer.submit_fault";
    /// Mutation accepted but fails asynchronously
    pub const MUTATION_FAULT: &str = "buffer.mutation_fault";
    /// Completion delivered late
    pub const SLOW_COMPLETION: &str = "buffer.slow_completion";
}

pub mod source {
    /// Chunk never produced, leaving a hole in the timeline
    pub const CHUNK_GAP: &str = "source.chunk_gap";
    /// Device refuses to start
    pub const ACQUIRE_FAIL: &str = "source.acquire_fail";
}

pub mod playback {
    /// Decoder starves and the cursor freezes
    pub const DECODER_STALL: &str = "playback.decoder_stall";
}

/// Every registered fault ID
pub const ALL_FAULTS: &[&str] = &[
    buffer::CAPACITY_SQUEEZE,
    buffer::SUBMIT_FAULT,
    buffer::MUTATION_FAULT,
    buffer::SLOW_COMPLETION,
    source::CHUNK_GAP,
    source::ACQUIRE_FAIL,
    playback::DECODER_STALL,
];
