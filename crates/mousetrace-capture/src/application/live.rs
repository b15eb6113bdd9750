//! Live dispatch use case: drive one renderable cursor per device in real
//! time.
//!
//! The dispatcher is a small state machine, `Uninitialized -> Polling ->
//! Stopped`. While polling, each tick drains everything the producer has
//! buffered since the previous tick, in order, and routes it: connect
//! notifications spawn a cursor, disconnects despawn one, motion runs
//! through the same accumulator as batch capture (with the live profile's Y
//! inversion and border clamp) and pushes the new position to the presenter.
//!
//! A device may start sending motion before its connect notification
//! arrives; the dispatcher treats that as an implicit connect, and the
//! resulting pointer is indistinguishable from an explicitly connected one.
//!
//! Rendering itself is not this crate's business: [`CursorPresenter`] is the
//! push surface a rendering collaborator implements, and [`cursors`] is the
//! pull surface for per-tick queries.
//!
//! [`cursors`]: LiveDispatcher::cursors

use std::collections::HashSet;
use std::sync::mpsc::Receiver;
use std::sync::Arc;

use tracing::{info, warn};

use mousetrace_core::{
    advance, normalize, DeviceHandle, EventKind, MotionProfile, PointerId, PointerRegistry,
    RegistryMode,
};

use super::SessionCounters;
use crate::infrastructure::input_capture::{CaptureError, InputSource, StampedRecord};

/// Lifecycle of a live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    /// Created, platform registration not yet performed.
    Uninitialized,
    /// Registered; `tick()` consumes events.
    Polling,
    /// Unregistered; all pointers discarded. Terminal.
    Stopped,
}

/// Receiver of cursor lifecycle and position updates.
///
/// The production implementation projects onto a visual surface; tests
/// record the calls.
pub trait CursorPresenter {
    /// A new logical pointer appeared at (`x`, `y`).
    fn spawn(&mut self, id: PointerId, device: DeviceHandle, x: f64, y: f64);
    /// An existing pointer moved.
    fn moved(&mut self, id: PointerId, x: f64, y: f64);
    /// A pointer went away.
    fn despawn(&mut self, id: PointerId);
}

/// Snapshot of one live cursor, for the pull-style query surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorState {
    pub id: PointerId,
    pub device: DeviceHandle,
    pub x: f64,
    pub y: f64,
}

/// Per-tick event dispatcher for live cursor rendering.
pub struct LiveDispatcher<P: CursorPresenter> {
    state: DispatcherState,
    source: Arc<dyn InputSource>,
    receiver: Option<Receiver<StampedRecord>>,
    registry: PointerRegistry,
    profile: MotionProfile,
    presenter: P,
    /// Ids the presenter currently knows about.
    spawned: HashSet<PointerId>,
    counters: SessionCounters,
}

impl<P: CursorPresenter> LiveDispatcher<P> {
    /// Creates an unstarted dispatcher.
    ///
    /// New pointers spawn at the centre of the clamp region when the profile
    /// has one, so cursors appear mid-screen rather than at the corner.
    pub fn new(
        source: Arc<dyn InputSource>,
        mode: RegistryMode,
        profile: MotionProfile,
        presenter: P,
    ) -> Self {
        let mut registry = PointerRegistry::new(mode, profile.sensitivity);
        if let Some(region) = &profile.clamp {
            registry.set_origin(region.width / 2.0, region.height / 2.0);
        }
        Self {
            state: DispatcherState::Uninitialized,
            source,
            receiver: None,
            registry,
            profile,
            presenter,
            spawned: HashSet::new(),
            counters: SessionCounters::default(),
        }
    }

    /// Performs platform registration: `Uninitialized -> Polling`.
    ///
    /// # Errors
    ///
    /// [`CaptureError::RegistrationFailed`] aborts the session before it
    /// begins; [`CaptureError::AlreadyStarted`] if called twice.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.state != DispatcherState::Uninitialized {
            return Err(CaptureError::AlreadyStarted);
        }
        self.receiver = Some(self.source.start()?);
        self.state = DispatcherState::Polling;
        info!("live dispatch session started");
        Ok(())
    }

    /// Drains everything buffered since the previous tick, in arrival order.
    ///
    /// A tick with nothing buffered is not an error; it simply means no
    /// events this tick. Calling `tick()` outside `Polling` is a no-op.
    pub fn tick(&mut self) {
        if self.state != DispatcherState::Polling {
            return;
        }
        let records: Vec<StampedRecord> = match &self.receiver {
            Some(rx) => rx.try_iter().collect(),
            None => return,
        };
        for record in records {
            self.apply(&record);
        }
    }

    /// Unregisters and tears down: `Polling -> Stopped`.
    ///
    /// Everything buffered but not yet drained is flushed through the normal
    /// dispatch path first, then every cursor is despawned and all pointers
    /// discarded.
    pub fn stop(&mut self) {
        if self.state != DispatcherState::Polling {
            self.state = DispatcherState::Stopped;
            return;
        }
        self.source.stop();

        if let Some(rx) = self.receiver.take() {
            // The sender is gone, so this iterator ends once the buffer is
            // empty; no event is lost on a graceful shutdown.
            let remaining: Vec<StampedRecord> = rx.iter().collect();
            for record in remaining {
                self.apply(&record);
            }
        }

        for id in self.spawned.drain() {
            self.presenter.despawn(id);
        }
        self.registry.clear();
        self.state = DispatcherState::Stopped;
        info!(
            events = self.counters.events,
            malformed = self.counters.malformed,
            unknown_disconnects = self.counters.unknown_disconnects,
            "live dispatch session stopped"
        );
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DispatcherState {
        self.state
    }

    /// Soft-error and throughput counters so far.
    pub fn counters(&self) -> SessionCounters {
        self.counters
    }

    /// Pull-style query surface: every active cursor's identity and
    /// position, for a rendering collaborator.
    pub fn cursors(&self) -> Vec<CursorState> {
        self.registry
            .iter()
            .map(|p| CursorState {
                id: p.id,
                device: p.device,
                x: p.x,
                y: p.y,
            })
            .collect()
    }

    /// Borrow of the presenter, mainly for test assertions.
    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    fn apply(&mut self, record: &StampedRecord) {
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
                self.ensure_cursor(event.device);
            }
            EventKind::Disconnect => match self.registry.remove(event.device) {
                Ok(id) => {
                    // Primary mode reports success without removing anything;
                    // only despawn when the pointer is actually gone.
                    if self.registry.get(event.device).is_none() && self.spawned.remove(&id) {
                        self.presenter.despawn(id);
                    }
                }
                Err(_) => {
                    self.counters.unknown_disconnects += 1;
                    warn!(device = %event.device, "disconnect for untracked device ignored");
                }
            },
            EventKind::Motion => {
                // Implicit connect: motion may outrun the arrival notification.
                self.ensure_cursor(event.device);
                let pointer = self.registry.resolve(event.device);
                let sample = advance(pointer, &event, &self.profile);
                let id = pointer.id;
                self.presenter.moved(id, sample.x, sample.y);
            }
        }
    }

    fn ensure_cursor(&mut self, device: DeviceHandle) {
        let pointer = self.registry.resolve(device);
        let (id, device, x, y) = (pointer.id, pointer.device, pointer.x, pointer.y);
        if self.spawned.insert(id) {
            self.presenter.spawn(id, device, x, y);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::input_capture::mock::MockInputSource;
    use mousetrace_core::ClampRegion;

    #[derive(Debug, PartialEq, Clone, Copy)]
    enum Call {
        Spawn(PointerId, DeviceHandle, f64, f64),
        Moved(PointerId, f64, f64),
        Despawn(PointerId),
    }

    #[derive(Default)]
    struct RecordingPresenter {
        calls: Vec<Call>,
    }

    impl CursorPresenter for RecordingPresenter {
        fn spawn(&mut self, id: PointerId, device: DeviceHandle, x: f64, y: f64) {
            self.calls.push(Call::Spawn(id, device, x, y));
        }
        fn moved(&mut self, id: PointerId, x: f64, y: f64) {
            self.calls.push(Call::Moved(id, x, y));
        }
        fn despawn(&mut self, id: PointerId) {
            self.calls.push(Call::Despawn(id));
        }
    }

    fn live_profile() -> MotionProfile {
        MotionProfile::live(
            1.0,
            ClampRegion {
                border: 16.0,
                width: 1920.0,
                height: 1080.0,
            },
        )
    }

    fn dispatcher(
        source: &Arc<MockInputSource>,
        mode: RegistryMode,
    ) -> LiveDispatcher<RecordingPresenter> {
        LiveDispatcher::new(
            Arc::clone(source) as Arc<dyn InputSource>,
            mode,
            live_profile(),
            RecordingPresenter::default(),
        )
    }

    #[test]
    fn test_connect_spawns_a_cursor_at_screen_center() {
        let source = Arc::new(MockInputSource::new());
        let mut d = dispatcher(&source, RegistryMode::MultiDevice);
        d.start().expect("start");

        source.inject_connect(DeviceHandle(5), 0.0);
        d.tick();

        assert_eq!(
            d.presenter().calls,
            vec![Call::Spawn(1, DeviceHandle(5), 960.0, 540.0)]
        );
    }

    #[test]
    fn test_motion_moves_the_cursor_with_screen_conventions() {
        let source = Arc::new(MockInputSource::new());
        let mut d = dispatcher(&source, RegistryMode::MultiDevice);
        d.start().expect("start");

        source.inject_connect(DeviceHandle(5), 0.0);
        // Raw dy of +10 moves the screen cursor up from centre.
        source.inject_motion(DeviceHandle(5), 4, 10, 1.0);
        d.tick();

        assert_eq!(
            d.presenter().calls.last(),
            Some(&Call::Moved(1, 964.0, 530.0))
        );
    }

    #[test]
    fn test_motion_before_connect_is_an_implicit_connect() {
        let source = Arc::new(MockInputSource::new());
        let mut d = dispatcher(&source, RegistryMode::MultiDevice);
        d.start().expect("start");

        source.inject_motion(DeviceHandle(9), 1, 0, 0.0);
        d.tick();

        assert_eq!(
            d.presenter().calls,
            vec![
                Call::Spawn(1, DeviceHandle(9), 960.0, 540.0),
                Call::Moved(1, 961.0, 540.0),
            ]
        );
        // The late explicit connect changes nothing.
        source.inject_connect(DeviceHandle(9), 1.0);
        d.tick();
        assert_eq!(d.presenter().calls.len(), 2);
        assert_eq!(d.cursors().len(), 1);
    }

    #[test]
    fn test_disconnect_despawns_and_frees_the_cursor() {
        let source = Arc::new(MockInputSource::new());
        let mut d = dispatcher(&source, RegistryMode::MultiDevice);
        d.start().expect("start");

        source.inject_connect(DeviceHandle(5), 0.0);
        source.inject_disconnect(DeviceHandle(5), 1.0);
        d.tick();

        assert_eq!(d.presenter().calls.last(), Some(&Call::Despawn(1)));
        assert!(d.cursors().is_empty());
    }

    #[test]
    fn test_unknown_disconnect_is_counted_and_ignored() {
        let source = Arc::new(MockInputSource::new());
        let mut d = dispatcher(&source, RegistryMode::MultiDevice);
        d.start().expect("start");

        source.inject_disconnect(DeviceHandle(404), 0.0);
        d.tick();

        assert_eq!(d.counters().unknown_disconnects, 1);
        assert!(d.presenter().calls.is_empty());
    }

    #[test]
    fn test_clamp_invariant_holds_on_the_query_surface() {
        let source = Arc::new(MockInputSource::new());
        let mut d = dispatcher(&source, RegistryMode::MultiDevice);
        d.start().expect("start");

        source.inject_motion(DeviceHandle(1), 1_000_000, -1_000_000, 0.0);
        d.tick();

        let cursor = d.cursors()[0];
        assert_eq!((cursor.x, cursor.y), (1904.0, 1064.0));
    }

    #[test]
    fn test_primary_mode_aliases_every_device_to_one_cursor() {
        let source = Arc::new(MockInputSource::new());
        let mut d = dispatcher(&source, RegistryMode::SinglePrimary);
        d.start().expect("start");

        source.inject_motion(DeviceHandle(1), 10, 0, 0.0);
        source.inject_motion(DeviceHandle(2), 10, 0, 1.0);
        // A disconnect must not take the shared cursor down.
        source.inject_disconnect(DeviceHandle(1), 2.0);
        source.inject_motion(DeviceHandle(3), 10, 0, 3.0);
        d.tick();

        let cursors = d.cursors();
        assert_eq!(cursors.len(), 1);
        assert_eq!(cursors[0].id, 0);
        assert_eq!(cursors[0].x, 990.0, "all three deltas landed on one pointer");
        assert!(!d.presenter().calls.contains(&Call::Despawn(0)));
    }

    #[test]
    fn test_stop_flushes_buffered_events_then_despawns_everything() {
        let source = Arc::new(MockInputSource::new());
        let mut d = dispatcher(&source, RegistryMode::MultiDevice);
        d.start().expect("start");

        source.inject_connect(DeviceHandle(1), 0.0);
        source.inject_motion(DeviceHandle(1), 5, 0, 1.0);
        // Never ticked; stop must still process both records.
        d.stop();

        assert_eq!(d.state(), DispatcherState::Stopped);
        assert_eq!(d.counters().events, 2);
        assert_eq!(
            d.presenter().calls,
            vec![
                Call::Spawn(1, DeviceHandle(1), 960.0, 540.0),
                Call::Moved(1, 965.0, 540.0),
                Call::Despawn(1),
            ]
        );
        assert!(d.cursors().is_empty());
    }

    #[test]
    fn test_tick_outside_polling_is_a_no_op() {
        let source = Arc::new(MockInputSource::new());
        let mut d = dispatcher(&source, RegistryMode::MultiDevice);

        d.tick(); // Uninitialized
        assert_eq!(d.state(), DispatcherState::Uninitialized);

        d.start().expect("start");
        d.stop();
        d.tick(); // Stopped
        assert_eq!(d.counters().events, 0);
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let source = Arc::new(MockInputSource::new());
        let mut d = dispatcher(&source, RegistryMode::MultiDevice);

        d.start().expect("first start");
        assert!(matches!(d.start(), Err(CaptureError::AlreadyStarted)));
    }
}
