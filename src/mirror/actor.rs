//! Mirror Actor - single-consumer runtime shell around `Mirror`
//!
//! ```text
//! MirrorHandle ──► commands ──┐
//! source ──────► segments ────┤
//! buffer ──────► completions ─┼──► MirrorActor ──► Mirror
//! timers (phase-scoped) ──────┘
//! ```
//!
//! Everything that touches the controller runs on this one task, so the
//! control path needs no locks. Timers exist only while their phase is
//! active: the buffering poll while buffering, drift and eviction ticks
//! while playing from the buffer.

use super::backend::MediaBackend;
use super::buffer::{BufferEvent, BufferEventReceiver};
use super::config::MirrorConfig;
use super::error::{ConfigError, MirrorError};
use super::playback::PlaybackSurface;
use super::session::{ControllerState, Mirror, MirrorSnapshot, SessionStreams};
use super::source::SegmentStream;
use super::status::StatusSink;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Messages for the mirror actor
pub enum MirrorMessage {
    Start {
        response_tx: oneshot::Sender<Result<(), MirrorError>>,
    },
    Stop {
        response_tx: oneshot::Sender<()>,
    },
    /// Change the delay; restarts an active session
    SetDelay {
        delay_seconds: u32,
        response_tx: oneshot::Sender<Result<(), MirrorError>>,
    },
    Snapshot {
        response_tx: oneshot::Sender<MirrorSnapshot>,
    },
    /// Stop the session and end the actor
    Shutdown {
        response_tx: oneshot::Sender<()>,
    },
}

pub struct MirrorActor<B: MediaBackend, P: PlaybackSurface, K: StatusSink> {
    mirror: Mirror<B, P, K>,
    rx: mpsc::UnboundedReceiver<MirrorMessage>,
    segments: Option<SegmentStream>,
    buffer_events: Option<BufferEventReceiver>,
    buffering_timer: Option<Interval>,
    drift_timer: Option<Interval>,
    eviction_timer: Option<Interval>,
    /// Last time the playback surface was advanced
    last_advance: Instant,
}

impl<B: MediaBackend, P: PlaybackSurface, K: StatusSink> MirrorActor<B, P, K> {
    fn new(mirror: Mirror<B, P, K>, rx: mpsc::UnboundedReceiver<MirrorMessage>) -> Self {
        MirrorActor {
            mirror,
            rx,
            segments: None,
            buffer_events: None,
            buffering_timer: None,
            drift_timer: None,
            eviction_timer: None,
            last_advance: Instant::now(),
        }
    }

    /// Run the actor loop
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                msg = self.rx.recv() => match msg {
                    Some(msg) => {
                        if self.handle_message(msg) {
                            break;
                        }
                    }
                    None => {
                        debug!("all mirror handles dropped");
                        self.mirror.stop();
                        break;
                    }
                },

                event = recv_or_pending(&mut self.buffer_events) => match event {
                    Some(event) => self.handle_buffer_event(event),
                    None => self.buffer_events = None,
                },

                segment = recv_or_pending(&mut self.segments) => match segment {
                    Some(segment) => self.mirror.on_segment(segment),
                    None => {
                        warn!("segment stream ended");
                        self.segments = None;
                    }
                },

                _ = tick_or_pending(&mut self.buffering_timer) => {
                    self.mirror.poll_buffering();
                    self.last_advance = Instant::now();
                }

                _ = tick_or_pending(&mut self.drift_timer) => {
                    let now = Instant::now();
                    let elapsed = now.duration_since(self.last_advance);
                    self.last_advance = now;
                    self.mirror.advance_playback(elapsed.as_secs_f64());
                    self.mirror.drift_tick();
                }

                _ = tick_or_pending(&mut self.eviction_timer) => {
                    self.mirror.eviction_tick();
                }
            }

            self.sync_timers();
        }

        info!("mirror actor shutting down");
    }

    /// Handle one command. Returns true on shutdown.
    fn handle_message(&mut self, msg: MirrorMessage) -> bool {
        match msg {
            MirrorMessage::Start { response_tx } => {
                let result = self.mirror.start();
                let _ = response_tx.send(self.install(result));
                false
            }
            MirrorMessage::Stop { response_tx } => {
                self.mirror.stop();
                self.segments = None;
                self.buffer_events = None;
                let _ = response_tx.send(());
                false
            }
            MirrorMessage::SetDelay {
                delay_seconds,
                response_tx,
            } => {
                let result = match self.mirror.set_delay(delay_seconds) {
                    Ok(Some(streams)) => self.install(Ok(streams)),
                    Ok(None) => Ok(()),
                    Err(e) => self.install(Err(e)),
                };
                let _ = response_tx.send(result);
                false
            }
            MirrorMessage::Snapshot { response_tx } => {
                let _ = response_tx.send(self.mirror.snapshot());
                false
            }
            MirrorMessage::Shutdown { response_tx } => {
                self.mirror.stop();
                self.segments = None;
                self.buffer_events = None;
                let _ = response_tx.send(());
                true
            }
        }
    }

    /// Swap in a new session's streams; old receivers are dropped
    fn install(&mut self, result: Result<SessionStreams, MirrorError>) -> Result<(), MirrorError> {
        match result {
            Ok(streams) => {
                debug!(session = streams.session_id, "session streams installed");
                self.segments = Some(streams.segments);
                self.buffer_events = streams.buffer_events;
                Ok(())
            }
            Err(e) => {
                self.segments = None;
                self.buffer_events = None;
                Err(e)
            }
        }
    }

    fn handle_buffer_event(&mut self, event: BufferEvent) {
        self.mirror.on_buffer_event(event);
    }

    /// Create or drop timers to match the controller phase
    fn sync_timers(&mut self) {
        let state = self.mirror.state();
        let buffered = self.mirror.queue().is_some();
        let config = self.mirror.config();
        let (poll_every, drift_every, evict_every) = (
            config.buffering_poll_interval,
            config.drift_tick_interval,
            config.eviction_interval,
        );

        set_timer(
            &mut self.buffering_timer,
            state == ControllerState::Buffering,
            poll_every,
        );

        let playing = state == ControllerState::Playing && buffered;
        let started = playing && self.drift_timer.is_none();
        set_timer(&mut self.drift_timer, playing, drift_every);
        set_timer(&mut self.eviction_timer, playing, evict_every);
        if started {
            self.last_advance = Instant::now();
        }
    }
}

fn set_timer(timer: &mut Option<Interval>, active: bool, period: Duration) {
    match (active, timer.is_some()) {
        (true, false) => {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            *timer = Some(interval);
        }
        (false, true) => *timer = None,
        _ => {}
    }
}

async fn recv_or_pending<T>(rx: &mut Option<mpsc::UnboundedReceiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn tick_or_pending(timer: &mut Option<Interval>) -> Instant {
    match timer {
        Some(timer) => timer.tick().await,
        None => std::future::pending().await,
    }
}

// ============================================================================
// MirrorHandle - public interface for interacting with the mirror actor
// ============================================================================

/// Cloneable handle for sending commands to the mirror actor
#[derive(Clone)]
pub struct MirrorHandle {
    tx: mpsc::UnboundedSender<MirrorMessage>,
}

impl MirrorHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> MirrorMessage,
    ) -> Result<T, MirrorError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(make(response_tx))
            .map_err(|_| MirrorError::ActorUnavailable)?;
        response_rx.await.map_err(|_| MirrorError::ActorUnavailable)
    }

    pub async fn start(&self) -> Result<(), MirrorError> {
        self.request(|response_tx| MirrorMessage::Start { response_tx })
            .await?
    }

    pub async fn stop(&self) -> Result<(), MirrorError> {
        self.request(|response_tx| MirrorMessage::Stop { response_tx })
            .await
    }

    pub async fn set_delay(&self, delay_seconds: u32) -> Result<(), MirrorError> {
        self.request(|response_tx| MirrorMessage::SetDelay {
            delay_seconds,
            response_tx,
        })
        .await?
    }

    pub async fn snapshot(&self) -> Result<MirrorSnapshot, MirrorError> {
        self.request(|response_tx| MirrorMessage::Snapshot { response_tx })
            .await
    }

    /// Graceful shutdown; waits for the session to be torn down
    pub async fn shutdown(&self) {
        let _ = self
            .request(|response_tx| MirrorMessage::Shutdown { response_tx })
            .await;
    }
}

/// Spawn a mirror actor and return its handle + join handle.
///
/// The config is validated first: the phase timers need non-zero periods.
pub fn spawn_mirror_actor<B, P, K>(
    config: MirrorConfig,
    backend: B,
    surface: P,
    sink: K,
) -> Result<(MirrorHandle, tokio::task::JoinHandle<()>), ConfigError>
where
    B: MediaBackend + 'static,
    P: PlaybackSurface + 'static,
    K: StatusSink + 'static,
{
    config.validate()?;
    let (tx, rx) = mpsc::unbounded_channel();
    let actor = MirrorActor::new(Mirror::new(config, backend, surface, sink), rx);
    let task = tokio::spawn(actor.run());
    Ok((MirrorHandle { tx }, task))
}
