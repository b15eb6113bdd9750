//! Integration tests for the capture sessions, exercised through the same
//! public API the binary and embedding GUIs use.
//!
//! # Purpose
//!
//! Unit tests inside the crates cover the registry, accumulator, and track
//! store in isolation. These tests run whole pipelines end to end with the
//! mock input source standing in for the Windows producer:
//!
//! ```text
//! MockInputSource ── StampedRecord ──> RecordSession ──> TrackStore ──> CSV files
//!                                  └─> LiveDispatcher ──> CursorPresenter
//! ```
//!
//! They verify the contract a consumer actually relies on: the exported CSV
//! shape, the no-loss shutdown flush, device identity across hotplug, and
//! the equivalence of both consumption modes' accumulation.

use std::sync::Arc;

use mousetrace_capture::application::live::{
    CursorPresenter, DispatcherState, LiveDispatcher,
};
use mousetrace_capture::application::record::RecordSession;
use mousetrace_capture::infrastructure::export::write_tracks;
use mousetrace_capture::infrastructure::input_capture::mock::MockInputSource;
use mousetrace_capture::infrastructure::input_capture::InputSource;
use mousetrace_core::{
    ClampRegion, DeviceHandle, MotionProfile, PointerId, PointerRegistry, RegistryMode,
};

fn batch_session(source: &Arc<MockInputSource>) -> RecordSession {
    RecordSession::new(
        Arc::clone(source) as Arc<dyn InputSource>,
        PointerRegistry::new(RegistryMode::MultiDevice, 1.0),
        MotionProfile::batch(1.0),
    )
}

// ── Batch pipeline ────────────────────────────────────────────────────────────

/// The canonical scenario: device "A" sends deltas (5,0), (−3,0), (10,0)
/// with sensitivity 1 and an acceleration threshold that never triggers.
/// The exported X column must read 5, 2, 12 and the first DeltaT must be 0.
#[test]
fn test_batch_scenario_exports_running_sums() {
    let source = Arc::new(MockInputSource::new());
    let mut session = RecordSession::new(
        Arc::clone(&source) as Arc<dyn InputSource>,
        PointerRegistry::new(RegistryMode::MultiDevice, 1.0),
        MotionProfile::batch(1.0).with_acceleration(1000.0, 2.0),
    );
    session.start().expect("registration");

    source.inject_connect(DeviceHandle(7), 0.0);
    source.inject_motion(DeviceHandle(7), 5, 0, 10.0);
    source.inject_motion(DeviceHandle(7), -3, 0, 20.0);
    source.inject_motion(DeviceHandle(7), 10, 0, 30.0);
    source.stop();

    let outcome = session.drain();
    let csv = outcome.tracks.track(DeviceHandle(7)).expect("track").to_csv();
    let lines: Vec<&str> = csv.lines().collect();

    assert_eq!(
        lines,
        vec!["Device;X;Y;DeltaT", "7;5;0;0", "7;2;0;10", "7;12;0;10"]
    );
}

/// Everything buffered before the stop signal must survive the shutdown:
/// registration undone, no further events accepted, buffered events flushed.
#[test]
fn test_graceful_shutdown_loses_no_events() {
    let source = Arc::new(MockInputSource::new());
    let mut session = batch_session(&source);
    session.start().expect("registration");

    for i in 0..1000 {
        source.inject_motion(DeviceHandle(1), 1, 1, f64::from(i));
    }
    source.stop();

    let outcome = session.drain();
    assert_eq!(outcome.counters.events, 1000);
    let track = outcome.tracks.track(DeviceHandle(1)).expect("track");
    assert_eq!(track.len(), 1000);
    // Final accumulated position confirms nothing was skipped mid-stream.
    let last = track.samples().last().unwrap();
    assert_eq!((last.x, last.y), (1000.0, 1000.0));
}

/// Hotplugging the same physical handle twice must produce two tracks under
/// the same device handle but two distinct logical identities; here the
/// observable effect is that accumulation restarts from the origin.
#[test]
fn test_reconnected_device_starts_a_fresh_accumulation() {
    let source = Arc::new(MockInputSource::new());
    let mut session = batch_session(&source);
    session.start().expect("registration");

    source.inject_connect(DeviceHandle(3), 0.0);
    source.inject_motion(DeviceHandle(3), 100, 0, 1.0);
    source.inject_disconnect(DeviceHandle(3), 2.0);
    source.inject_connect(DeviceHandle(3), 3.0);
    source.inject_motion(DeviceHandle(3), 1, 0, 4.0);
    source.stop();

    let outcome = session.drain();
    let xs: Vec<f64> = outcome
        .tracks
        .track(DeviceHandle(3))
        .expect("track")
        .samples()
        .iter()
        .map(|s| s.x)
        .collect();
    // 100 from the first incarnation, then 1 from a pointer reset to origin.
    assert_eq!(xs, vec![100.0, 1.0]);
}

/// Multi-device batch: one exported file per device, each with the fixed
/// header, and a second export byte-identical to the first.
#[test]
fn test_export_writes_one_deterministic_file_per_device() {
    let source = Arc::new(MockInputSource::new());
    let mut session = batch_session(&source);
    session.start().expect("registration");

    source.inject_motion(DeviceHandle(10), 4, -4, 0.0);
    source.inject_motion(DeviceHandle(20), 8, 8, 0.5);
    source.inject_motion(DeviceHandle(10), 1, 0, 1.0);
    source.stop();
    let outcome = session.drain();

    let dir = tempfile::tempdir().expect("tempdir");
    let written = write_tracks(&outcome.tracks, dir.path()).expect("export");
    assert_eq!(written.len(), 2);

    let mut first_pass = Vec::new();
    for path in &written {
        let content = std::fs::read_to_string(path).expect("read");
        assert_eq!(content.lines().next(), Some("Device;X;Y;DeltaT"));
        first_pass.push(content);
    }

    let rewritten = write_tracks(&outcome.tracks, dir.path()).expect("re-export");
    for (path, before) in rewritten.iter().zip(first_pass) {
        assert_eq!(std::fs::read_to_string(path).expect("read"), before);
    }
}

// ── Live pipeline ─────────────────────────────────────────────────────────────

/// Presenter that keeps only the latest known position per pointer.
#[derive(Default)]
struct LatestPositions {
    live: std::collections::HashMap<PointerId, (f64, f64)>,
    despawned: Vec<PointerId>,
}

impl CursorPresenter for LatestPositions {
    fn spawn(&mut self, id: PointerId, _device: DeviceHandle, x: f64, y: f64) {
        self.live.insert(id, (x, y));
    }
    fn moved(&mut self, id: PointerId, x: f64, y: f64) {
        self.live.insert(id, (x, y));
    }
    fn despawn(&mut self, id: PointerId) {
        self.live.remove(&id);
        self.despawned.push(id);
    }
}

/// Two mice moving concurrently must drive two independent cursors, both
/// obeying the border clamp, and session teardown must despawn both.
#[test]
fn test_live_session_tracks_two_mice_independently() {
    let source = Arc::new(MockInputSource::new());
    let profile = MotionProfile::live(
        2.0,
        ClampRegion {
            border: 16.0,
            width: 800.0,
            height: 600.0,
        },
    );
    let mut dispatcher = LiveDispatcher::new(
        Arc::clone(&source) as Arc<dyn InputSource>,
        RegistryMode::MultiDevice,
        profile,
        LatestPositions::default(),
    );
    dispatcher.start().expect("registration");

    source.inject_connect(DeviceHandle(1), 0.0);
    source.inject_connect(DeviceHandle(2), 0.0);
    dispatcher.tick();

    // Device 1 nudges right; device 2 slams into the top-left border.
    source.inject_motion(DeviceHandle(1), 10, 0, 1.0);
    source.inject_motion(DeviceHandle(2), -10_000, -10_000, 1.0);
    dispatcher.tick();

    let positions = &dispatcher.presenter().live;
    assert_eq!(positions.len(), 2);
    assert_eq!(positions[&1], (420.0, 300.0), "sensitivity 2 doubled the delta");
    assert_eq!(positions[&2], (16.0, 584.0), "clamped to the border, dy inverted");

    dispatcher.stop();
    assert_eq!(dispatcher.state(), DispatcherState::Stopped);
    assert!(dispatcher.presenter().live.is_empty());
    assert_eq!(dispatcher.presenter().despawned.len(), 2);
}

/// The batch and live paths share one accumulator; with an identical
/// profile they must produce identical positions for the same event stream.
#[test]
fn test_batch_and_live_accumulation_agree_under_one_profile() {
    let profile = MotionProfile::batch(1.5).with_acceleration(4.0, 2.0);
    let stream = [(3, 1), (-8, 2), (5, -5), (0, 9)];

    // Batch pass.
    let source = Arc::new(MockInputSource::new());
    let mut session = RecordSession::new(
        Arc::clone(&source) as Arc<dyn InputSource>,
        PointerRegistry::new(RegistryMode::MultiDevice, 1.5),
        profile,
    );
    session.start().expect("registration");
    for (i, &(dx, dy)) in stream.iter().enumerate() {
        source.inject_motion(DeviceHandle(1), dx, dy, i as f64);
    }
    source.stop();
    let outcome = session.drain();
    let batch_last = *outcome
        .tracks
        .track(DeviceHandle(1))
        .expect("track")
        .samples()
        .last()
        .unwrap();

    // Live pass with the same (unclamped, non-inverted) profile.
    let source = Arc::new(MockInputSource::new());
    let mut dispatcher = LiveDispatcher::new(
        Arc::clone(&source) as Arc<dyn InputSource>,
        RegistryMode::MultiDevice,
        profile,
        LatestPositions::default(),
    );
    dispatcher.start().expect("registration");
    for (i, &(dx, dy)) in stream.iter().enumerate() {
        source.inject_motion(DeviceHandle(1), dx, dy, i as f64);
    }
    dispatcher.tick();

    let cursor = dispatcher.cursors()[0];
    assert_eq!((cursor.x, cursor.y), (batch_last.x, batch_last.y));
}
