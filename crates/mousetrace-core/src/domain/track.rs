//! Per-device track storage and CSV serialization.
//!
//! A track is the ordered, append-only sequence of [`MotionSample`]s one
//! device produced over a session. Ordering is strictly the order `record`
//! was called — samples are never reordered by timestamp. Serialization is
//! deterministic: the same in-memory track always renders to byte-identical
//! text.

use std::collections::BTreeMap;

use crate::domain::motion::MotionSample;
use crate::domain::registry::DeviceHandle;

/// The export header, identical for every produced file.
pub const CSV_HEADER: &str = "Device;X;Y;DeltaT";

/// Ordered samples for one device.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Track {
    samples: Vec<MotionSample>,
}

impl Track {
    /// Number of recorded samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// `true` if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The recorded samples, in record order.
    pub fn samples(&self) -> &[MotionSample] {
        &self.samples
    }

    /// Renders the track as CSV: the fixed header, then one
    /// `device;x;y;delta_t` row per sample. Numeric fields use up to four
    /// fractional digits with trailing zeros trimmed.
    pub fn to_csv(&self) -> String {
        let mut out = String::with_capacity(CSV_HEADER.len() + 1 + self.samples.len() * 24);
        out.push_str(CSV_HEADER);
        out.push('\n');
        for sample in &self.samples {
            out.push_str(&sample.device.to_string());
            out.push(';');
            out.push_str(&format_compact(sample.x));
            out.push(';');
            out.push_str(&format_compact(sample.y));
            out.push(';');
            out.push_str(&format_compact(sample.elapsed_ms));
            out.push('\n');
        }
        out
    }
}

/// All tracks of a session, keyed by device handle.
///
/// `BTreeMap` keeps iteration order stable so multi-device exports and
/// summaries come out in a deterministic sequence.
#[derive(Debug, Clone, Default)]
pub struct TrackStore {
    tracks: BTreeMap<i32, Track>,
}

impl TrackStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a sample to its device's track, creating the track on first
    /// sight.
    pub fn record(&mut self, sample: MotionSample) {
        self.tracks
            .entry(sample.device.0)
            .or_default()
            .samples
            .push(sample);
    }

    /// The track for one device, if any samples were recorded for it.
    pub fn track(&self, device: DeviceHandle) -> Option<&Track> {
        self.tracks.get(&device.0)
    }

    /// Iterates tracks in ascending device-handle order.
    pub fn iter(&self) -> impl Iterator<Item = (DeviceHandle, &Track)> {
        self.tracks
            .iter()
            .map(|(handle, track)| (DeviceHandle(*handle), track))
    }

    /// Number of devices with at least one sample.
    pub fn device_count(&self) -> usize {
        self.tracks.len()
    }

    /// Total samples across all tracks.
    pub fn sample_count(&self) -> usize {
        self.tracks.values().map(Track::len).sum()
    }
}

/// Formats a value with up to four fractional digits, trimming trailing
/// zeros and a dangling decimal point (the `0.####` pattern).
fn format_compact(value: f64) -> String {
    let mut s = format!("{value:.4}");
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    // Tiny negative values round to "-0.0000" and trim to "-0".
    if s == "-0" {
        s.remove(0);
    }
    s
}
