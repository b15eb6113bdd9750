//! mousetrace binary: batch capture entry point.
//!
//! Registers for raw input, records every attached mouse until Ctrl-C, then
//! flushes the buffered events and writes one `mousetrack-<device>.csv` per
//! device.
//!
//! ```text
//! main()
//!  └─ load config            -- platform config dir, or first positional arg
//!  └─ RecordSession::start() -- raw input registration (fatal on refusal)
//!  └─ drain on a blocking task until Ctrl-C posts stop()
//!  └─ export::write_tracks() -- one CSV per device
//! ```
//!
//! Live cursor rendering is a library concern: a GUI embeds
//! `mousetrace_capture::application::live::LiveDispatcher` with its own
//! presenter and tick loop rather than going through this binary.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mousetrace_capture::application::record::RecordSession;
use mousetrace_capture::infrastructure::export;
use mousetrace_capture::infrastructure::input_capture::{self, InputSource};
use mousetrace_capture::infrastructure::storage;
use mousetrace_core::PointerRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = match std::env::args_os().nth(1) {
        Some(arg) => PathBuf::from(arg),
        None => storage::config::config_file_path().context("resolving config path")?,
    };
    let config = storage::config::load_config(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    // Structured logging; RUST_LOG overrides the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.capture.log_level.clone())),
        )
        .init();

    info!("mousetrace starting");

    let source = make_source()?;
    let registry = PointerRegistry::new(config.registry_mode(), config.capture.sensitivity);
    let mut session = RecordSession::new(Arc::clone(&source), registry, config.batch_profile());
    session
        .start()
        .context("raw input registration failed; cannot start session")?;

    // Ctrl-C undoes the registration; the drain below then flushes whatever
    // was buffered before the stop and returns.
    let stopper = session.source();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            stopper.stop();
        }
    });

    info!("collecting raw mouse input; press Ctrl-C to stop and export");
    let outcome = tokio::task::spawn_blocking(move || session.drain())
        .await
        .context("capture drain task panicked")?;

    if outcome.counters.malformed > 0 || outcome.counters.unknown_disconnects > 0 {
        info!(
            malformed = outcome.counters.malformed,
            unknown_disconnects = outcome.counters.unknown_disconnects,
            "session finished with soft errors"
        );
    }

    let written = export::write_tracks(&outcome.tracks, &config.output.directory)
        .context("exporting tracks")?;
    info!(
        devices = written.len(),
        samples = outcome.tracks.sample_count(),
        directory = %config.output.directory.display(),
        "export complete"
    );
    Ok(())
}

#[cfg(target_os = "windows")]
fn make_source() -> anyhow::Result<Arc<dyn InputSource>> {
    Ok(Arc::new(
        input_capture::windows::WindowsRawInputSource::new(),
    ))
}

#[cfg(not(target_os = "windows"))]
fn make_source() -> anyhow::Result<Arc<dyn InputSource>> {
    anyhow::bail!(input_capture::CaptureError::UnsupportedPlatform(
        std::env::consts::OS.to_string(),
    ))
}
