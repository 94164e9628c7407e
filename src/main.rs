//! Delayed mirror demo
//!
//! Runs the mirror actor against synthetic capture and an in-memory buffer,
//! logging status updates and a JSON snapshot every couple of seconds.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | MIRROR_CONFIG | - | TOML config file, overridden by the variables below |
//! | MIRROR_DELAY_SECONDS | 5 | Playback delay (0 = real-time) |
//! | MIRROR_RUN_SECS | 20 | Stop after this many seconds (0 = until Ctrl-C) |
//! | MIRROR_CAPACITY_MB | 64 | Buffer capacity |
//! | MIRROR_LOG_JSON | - | Set to 1 for JSON log lines |
//! | RUST_LOG | info | Log filter |

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use delay_mirror::mirror::{InMemoryBackend, SyntheticSourceConfig};
use delay_mirror::{spawn_mirror_actor, MirrorConfig, SimulatedPlayback, TracingStatusSink};
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_RUN_SECS: u64 = 20;
const DEFAULT_CAPACITY_MB: usize = 64;
const SNAPSHOT_INTERVAL: Duration = Duration::from_secs(2);

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if std::env::var("MIRROR_LOG_JSON").is_ok_and(|v| v == "1") {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config() -> Result<MirrorConfig, Box<dyn std::error::Error>> {
    let mut config = match std::env::var("MIRROR_CONFIG") {
        Ok(path) => MirrorConfig::load(&path)?,
        Err(_) => MirrorConfig::default(),
    };
    config.apply_env();
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = load_config()?;
    let run_secs: u64 = env_or("MIRROR_RUN_SECS", DEFAULT_RUN_SECS);
    let capacity = env_or("MIRROR_CAPACITY_MB", DEFAULT_CAPACITY_MB) * 1024 * 1024;

    info!(
        delay_seconds = config.delay_seconds,
        chunk_interval_ms = config.chunk_interval.as_millis() as u64,
        capacity,
        "starting delayed mirror"
    );

    let backend = InMemoryBackend::new(capacity, SyntheticSourceConfig::default());
    let (handle, task) = spawn_mirror_actor(
        config,
        backend,
        SimulatedPlayback::new(),
        TracingStatusSink,
    )?;

    handle.start().await?;

    let deadline = async {
        if run_secs == 0 {
            std::future::pending::<()>().await;
        } else {
            tokio::time::sleep(Duration::from_secs(run_secs)).await;
        }
    };
    tokio::pin!(deadline);

    let mut snapshots = tokio::time::interval(SNAPSHOT_INTERVAL);
    snapshots.tick().await;

    loop {
        tokio::select! {
            _ = &mut deadline => {
                info!(run_secs, "run time elapsed");
                break;
            }
            _ = signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
            _ = snapshots.tick() => {
                match handle.snapshot().await {
                    Ok(snapshot) => info!(snapshot = %serde_json::to_string(&snapshot)?, "mirror snapshot"),
                    Err(e) => {
                        warn!(error = %e, "mirror actor gone");
                        break;
                    }
                }
            }
        }
    }

    handle.shutdown().await;
    task.await?;
    Ok(())
}
