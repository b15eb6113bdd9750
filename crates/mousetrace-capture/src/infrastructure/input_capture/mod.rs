//! Input capture infrastructure.
//!
//! On Windows, a message-only window registered for Raw Input notifications
//! receives `WM_INPUT` and `WM_INPUT_DEVICE_CHANGE` on a dedicated message
//! loop thread. Each notification is packed into the wire record format and
//! pushed into an `mpsc` channel; consumers drain the channel on their own
//! cycle.
//!
//! The channel is the single synchronization point between the native
//! producer and the engine: the producer only appends, consumers only drain
//! already-appended records, and nothing is mutated from both sides. Buffer
//! growth is unbounded for the duration of a session — acceptable for short
//! analysis runs, documented as such, and bounded only by session length
//! times device event rate.
//!
//! # Testability
//!
//! The [`InputSource`] trait lets tests inject fabricated records through
//! [`mock::MockInputSource`] without a Windows message loop.

use std::sync::mpsc;

use thiserror::Error;

pub mod mock;

#[cfg(target_os = "windows")]
pub mod windows;

/// A packed wire record paired with the producer's capture clock.
///
/// `bytes` is decoded by `mousetrace_core::wire::normalize`; `timestamp_ms`
/// is milliseconds since the session epoch, stamped by the producer at the
/// moment of delivery.
#[derive(Debug, Clone)]
pub struct StampedRecord {
    pub bytes: Vec<u8>,
    pub timestamp_ms: f64,
}

/// Error type for input capture operations.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The platform refused the raw-input registration. Fatal to session
    /// start: the engine aborts startup and reports it.
    #[error("raw input registration failed: {0}")]
    RegistrationFailed(String),

    /// `start()` was called on a source that is already running.
    #[error("capture source already started")]
    AlreadyStarted,

    /// No capture backend exists for this platform.
    #[error("platform not supported: {0}")]
    UnsupportedPlatform(String),
}

/// Trait abstracting the raw record producer.
///
/// The production implementation registers with the OS; tests use
/// [`mock::MockInputSource`]. `stop()` must undo the platform registration
/// and close the channel so consumers can drain everything already buffered
/// and then observe disconnection — graceful shutdown loses no records.
pub trait InputSource: Send + Sync {
    /// Starts the producer and returns the receiving end of the record
    /// channel.
    fn start(&self) -> Result<mpsc::Receiver<StampedRecord>, CaptureError>;

    /// Undoes platform registration and closes the channel. No further
    /// records are accepted after this returns.
    fn stop(&self);
}
