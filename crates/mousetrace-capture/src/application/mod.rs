//! Application use cases: the two consumption modes of the engine.
//!
//! [`record::RecordSession`] drains the capture channel to completion and
//! produces per-device tracks for export. [`live::LiveDispatcher`] drains it
//! tick by tick and drives renderable cursors. Both feed every record
//! through the same normalize → resolve → advance path; only the motion
//! profile and the sink differ.

pub mod live;
pub mod record;

/// Soft-error and throughput counters for one session.
///
/// Non-fatal conditions are counted here instead of aborting: a malformed
/// platform record is dropped, a disconnect for an untracked device is
/// ignored. Only registration failure at startup is fatal, and that is
/// reported through `CaptureError`, not counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionCounters {
    /// Records decoded and applied.
    pub events: u64,
    /// Records dropped because they could not be decoded.
    pub malformed: u64,
    /// Disconnect notifications for handles that were not tracked.
    pub unknown_disconnects: u64,
}
