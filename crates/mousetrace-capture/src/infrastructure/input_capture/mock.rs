//! Mock input source for unit and integration testing.
//!
//! Lets tests inject fabricated wire records without a Windows message loop.
//! `stop()` drops the sender, which is exactly how the real backend closes
//! the channel, so shutdown/flush behavior is exercised the same way in
//! tests as in production.

use std::sync::{
    mpsc::{self, Sender},
    Arc, Mutex,
};

use mousetrace_core::{wire, DeviceHandle};

use super::{CaptureError, InputSource, StampedRecord};

/// A mock [`InputSource`] that injects caller-supplied records.
pub struct MockInputSource {
    sender: Arc<Mutex<Option<Sender<StampedRecord>>>>,
}

impl MockInputSource {
    pub fn new() -> Self {
        Self {
            sender: Arc::new(Mutex::new(None)),
        }
    }

    /// Injects arbitrary bytes, as if delivered by the platform.
    ///
    /// Panics if `start()` has not been called or `stop()` already has.
    pub fn inject_bytes(&self, bytes: Vec<u8>, timestamp_ms: f64) {
        let guard = self.sender.lock().expect("lock poisoned");
        match guard.as_ref() {
            Some(sender) => sender
                .send(StampedRecord {
                    bytes,
                    timestamp_ms,
                })
                .expect("receiver dropped; did the consumer exit?"),
            None => panic!("MockInputSource::inject_bytes called before start()"),
        }
    }

    /// Injects a well-formed connect record.
    pub fn inject_connect(&self, device: DeviceHandle, timestamp_ms: f64) {
        self.inject_bytes(wire::connect_record(device), timestamp_ms);
    }

    /// Injects a well-formed disconnect record.
    pub fn inject_disconnect(&self, device: DeviceHandle, timestamp_ms: f64) {
        self.inject_bytes(wire::disconnect_record(device), timestamp_ms);
    }

    /// Injects a well-formed motion record.
    pub fn inject_motion(&self, device: DeviceHandle, dx: i32, dy: i32, timestamp_ms: f64) {
        self.inject_bytes(wire::motion_record(device, dx, dy), timestamp_ms);
    }
}

impl Default for MockInputSource {
    fn default() -> Self {
        Self::new()
    }
}

impl InputSource for MockInputSource {
    fn start(&self) -> Result<mpsc::Receiver<StampedRecord>, CaptureError> {
        let mut guard = self.sender.lock().expect("lock poisoned");
        if guard.is_some() {
            return Err(CaptureError::AlreadyStarted);
        }
        let (tx, rx) = mpsc::channel();
        *guard = Some(tx);
        Ok(rx)
    }

    fn stop(&self) {
        // Dropping the sender closes the channel once buffered records drain.
        *self.sender.lock().expect("lock poisoned") = None;
    }
}
