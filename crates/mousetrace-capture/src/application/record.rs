//! Batch recording use case: capture raw deltas until the source stops,
//! then hand back the accumulated tracks.
//!
//! The batch profile performs no clamping and no Y inversion — the track is
//! a faithful unbounded sum of raw deltas, kept for offline analysis. The
//! whole session is buffered in memory; that is a deliberate
//! memory-for-latency tradeoff suitable for short analysis runs, not for a
//! long-running service.
//!
//! Shutdown contract: once the source's `stop()` is called, no further
//! records are accepted, and [`RecordSession::drain`] still consumes every
//! record buffered before the stop. Nothing is lost on a graceful shutdown.

use std::sync::Arc;

use tracing::{info, warn};

use mousetrace_core::{advance, normalize, EventKind, MotionProfile, PointerRegistry, TrackStore};

use super::SessionCounters;
use crate::infrastructure::input_capture::{CaptureError, InputSource, StampedRecord};

/// Result of a completed batch session.
#[derive(Debug)]
pub struct BatchOutcome {
    /// One track per device that produced motion.
    pub tracks: TrackStore,
    pub counters: SessionCounters,
}

/// A batch capture session over one input source.
pub struct RecordSession {
    source: Arc<dyn InputSource>,
    receiver: Option<std::sync::mpsc::Receiver<StampedRecord>>,
    registry: PointerRegistry,
    profile: MotionProfile,
    store: TrackStore,
    counters: SessionCounters,
}

impl RecordSession {
    /// Creates a session around `source`. `registry` decides the tracking
    /// mode; `profile` is normally [`MotionProfile::batch`].
    pub fn new(
        source: Arc<dyn InputSource>,
        registry: PointerRegistry,
        profile: MotionProfile,
    ) -> Self {
        Self {
            source,
            receiver: None,
            registry,
            profile,
            store: TrackStore::new(),
            counters: SessionCounters::default(),
        }
    }

    /// Performs platform registration and opens the record channel.
    ///
    /// # Errors
    ///
    /// [`CaptureError::RegistrationFailed`] is fatal to the session: nothing
    /// was captured and nothing will be.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        let rx = self.source.start()?;
        self.receiver = Some(rx);
        info!("batch capture session started");
        Ok(())
    }

    /// Consumes buffered records until the channel closes, then returns the
    /// accumulated tracks.
    ///
    /// Blocks until the source's `stop()` has been called (from another
    /// thread or a signal handler) and every record buffered before the stop
    /// has been applied.
    pub fn drain(mut self) -> BatchOutcome {
        let Some(rx) = self.receiver.take() else {
            // start() was never called; an empty outcome is the honest answer.
            return BatchOutcome {
                tracks: self.store,
                counters: self.counters,
            };
        };

        while let Ok(record) = rx.recv() {
            self.apply(record);
        }

        info!(
            events = self.counters.events,
            malformed = self.counters.malformed,
            unknown_disconnects = self.counters.unknown_disconnects,
            devices = self.store.device_count(),
            samples = self.store.sample_count(),
            "batch capture session complete"
        );
        BatchOutcome {
            tracks: self.store,
            counters: self.counters,
        }
    }

    /// The handle used to stop the session from another thread.
    pub fn source(&self) -> Arc<dyn InputSource> {
        Arc::clone(&self.source)
    }

    fn apply(&mut self, record: StampedRecord) {
        let event = match normalize(&record.bytes, record.timestamp_ms) {
            Ok(event) => event,
            Err(e) => {
                self.counters.malformed += 1;
                warn!(error = %e, "malformed record dropped");
                return;
            }
        };
        self.counters.events += 1;

        match event.kind {
            EventKind::Connect => {
                // Idempotent on duplicate connect notifications.
                self.registry.resolve(event.device);
            }
            EventKind::Disconnect => {
                if self.registry.remove(event.device).is_err() {
                    self.counters.unknown_disconnects += 1;
                    warn!(device = %event.device, "disconnect for untracked device ignored");
                }
            }
            EventKind::Motion => {
                // Motion may arrive before the explicit connect notification;
                // resolve() treats that as an implicit connect.
                let pointer = self.registry.resolve(event.device);
                let sample = advance(pointer, &event, &self.profile);
                self.store.record(sample);
            }
        }
    }
}
