//! Stateright Model Checking for delay-mirror
//!
//! Exhaustive state-space exploration sits next to the DST harness: the
//! harness samples long randomized runs, the models enumerate every
//! interleaving of a small bounded system.
//!
//! ## Available Models
//!
//! - `queue`: serialized buffer mutations, capacity recovery and eviction
//!
//! ## Running Model Checks
//!
//! ```bash
//! # Model checks are marked #[ignore] for CI speed
//! cargo test stateright -- --ignored --nocapture
//! ```

pub mod queue;

pub use queue::OperationQueueModel;
