pub mod io;
pub mod buggify;
pub mod mirror;

#[cfg(test)]
mod stateright;

pub use mirror::{
    spawn_mirror_actor, ControllerState, InMemoryBackend, Mirror, MirrorConfig, MirrorError,
    MirrorHandle, SimulatedPlayback, Status, TracingStatusSink,
};
