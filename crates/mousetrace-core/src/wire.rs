//! Decoder for the packed raw-input record delivered by the platform producer.
//!
//! Wire format (little-endian, 19 bytes):
//! ```text
//! [dev_handle:i32][dx:i32][dy:i32][wheel:i32][pressed:u8][released:u8][type:u8]
//! ```
//! Type tags: `0` = device connect, `1` = device disconnect, `2` = motion or
//! button change.
//!
//! This module is the single point where platform byte layout is interpreted.
//! Everything downstream of [`normalize`] works with typed [`RawEvent`]s and
//! never sees the packed representation. The record itself carries no
//! timestamp; the producer stamps each record with its capture clock at
//! delivery time and passes that clock value into [`normalize`].

use thiserror::Error;

use crate::domain::registry::DeviceHandle;

/// Size in bytes of one packed record.
pub const RECORD_LEN: usize = 19;

/// Wire type tag for a device-connect notification.
pub const TAG_CONNECT: u8 = 0;
/// Wire type tag for a device-disconnect notification.
pub const TAG_DISCONNECT: u8 = 1;
/// Wire type tag for a motion/button event.
pub const TAG_MOTION: u8 = 2;

/// Errors raised while decoding a packed record.
///
/// Both variants are soft conditions: the consumer drops the record, bumps a
/// counter, and keeps going. They never abort a session.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    /// The record is not exactly [`RECORD_LEN`] bytes long.
    #[error("truncated record: expected {expected} bytes, got {got}")]
    TruncatedRecord { expected: usize, got: usize },

    /// The type tag byte is not one of the recognized values.
    #[error("unknown record type tag: 0x{0:02X}")]
    UnknownTypeTag(u8),
}

/// What a [`RawEvent`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A device appeared (explicit connect notification).
    Connect,
    /// A device went away.
    Disconnect,
    /// Relative motion, wheel movement, or a button state change.
    Motion,
}

/// A normalized input event, one per platform notification.
///
/// Immutable once produced. Ordered by arrival; within one device's stream
/// timestamps are monotonically non-decreasing, across devices interleaving
/// is arbitrary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawEvent {
    /// Platform handle of the originating device.
    pub device: DeviceHandle,
    pub kind: EventKind,
    /// Signed relative X movement in device counts.
    pub dx: i32,
    /// Signed relative Y movement in device counts (positive = toward user
    /// in the raw-device convention).
    pub dy: i32,
    /// Accumulated wheel delta since the previous record.
    pub wheel: i32,
    /// Button number pressed by this event, 0 if none.
    pub pressed: u8,
    /// Button number released by this event, 0 if none.
    pub released: u8,
    /// Producer capture clock, milliseconds since session start.
    pub timestamp_ms: f64,
}

/// Decodes one packed record into a [`RawEvent`].
///
/// `timestamp_ms` is the producer's capture clock at the moment the record
/// was delivered; it is copied through verbatim.
///
/// # Errors
///
/// Returns [`WireError::TruncatedRecord`] for any length other than
/// [`RECORD_LEN`], and [`WireError::UnknownTypeTag`] for an unrecognized tag
/// byte. Callers treat both as countable, non-fatal drops.
pub fn normalize(bytes: &[u8], timestamp_ms: f64) -> Result<RawEvent, WireError> {
    if bytes.len() != RECORD_LEN {
        return Err(WireError::TruncatedRecord {
            expected: RECORD_LEN,
            got: bytes.len(),
        });
    }

    let kind = match bytes[18] {
        TAG_CONNECT => EventKind::Connect,
        TAG_DISCONNECT => EventKind::Disconnect,
        TAG_MOTION => EventKind::Motion,
        other => return Err(WireError::UnknownTypeTag(other)),
    };

    Ok(RawEvent {
        device: DeviceHandle(read_i32(bytes, 0)),
        kind,
        dx: read_i32(bytes, 4),
        dy: read_i32(bytes, 8),
        wheel: read_i32(bytes, 12),
        pressed: bytes[16],
        released: bytes[17],
        timestamp_ms,
    })
}

/// Encodes a packed record — the inverse of [`normalize`].
///
/// Used by the mock input source and by tests to fabricate well-formed
/// records; the Windows producer builds records through this function too so
/// there is exactly one definition of the layout.
pub fn encode_record(
    device: DeviceHandle,
    tag: u8,
    dx: i32,
    dy: i32,
    wheel: i32,
    pressed: u8,
    released: u8,
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(RECORD_LEN);
    buf.extend_from_slice(&device.0.to_le_bytes());
    buf.extend_from_slice(&dx.to_le_bytes());
    buf.extend_from_slice(&dy.to_le_bytes());
    buf.extend_from_slice(&wheel.to_le_bytes());
    buf.push(pressed);
    buf.push(released);
    buf.push(tag);
    buf
}

/// Convenience constructor for a motion record.
pub fn motion_record(device: DeviceHandle, dx: i32, dy: i32) -> Vec<u8> {
    encode_record(device, TAG_MOTION, dx, dy, 0, 0, 0)
}

/// Convenience constructor for a connect record.
pub fn connect_record(device: DeviceHandle) -> Vec<u8> {
    encode_record(device, TAG_CONNECT, 0, 0, 0, 0, 0)
}

/// Convenience constructor for a disconnect record.
pub fn disconnect_record(device: DeviceHandle) -> Vec<u8> {
    encode_record(device, TAG_DISCONNECT, 0, 0, 0, 0, 0)
}

fn read_i32(bytes: &[u8], offset: usize) -> i32 {
    // Length is validated by the caller; the slice/array conversion cannot fail.
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    i32::from_le_bytes(raw)
}
