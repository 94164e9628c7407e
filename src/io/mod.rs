//! Randomness Abstraction
//!
//! Every random decision in the crate (fault injection, workload generation,
//! chunk sizes) goes through the [`Rng`] trait so simulation runs replay
//! exactly from a seed.
//!
//! - `SimulatedRng`: seeded ChaCha8, used by DST and tests
//! - `ProductionRng`: thread-local entropy, used by the demo binary

pub mod production;
pub mod simulation;

pub use production::ProductionRng;
pub use simulation::SimulatedRng;

/// Source of random decisions
pub trait Rng: Send {
    fn next_u64(&mut self) -> u64;

    /// Returns true with the given probability (clamped to [0, 1])
    fn gen_bool(&mut self, probability: f64) -> bool;

    /// Uniform value in `[min, max)`; returns `min` when the range is empty
    fn gen_range(&mut self, min: u64, max: u64) -> u64;

    /// Uniform float in `[0, 1)`
    fn gen_unit(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }
}
