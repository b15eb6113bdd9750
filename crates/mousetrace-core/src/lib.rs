//! # mousetrace-core
//!
//! Domain and wire logic for the mousetrace multi-device pointer input
//! engine. The operating system merges every attached mouse into a single
//! logical cursor; this engine keeps the devices apart, turning each one's
//! stream of raw relative deltas into its own coherent motion trace.
//!
//! The crate has zero dependencies on OS APIs or rendering — platform
//! capture and cursor presentation live in `mousetrace-capture`. What is
//! here:
//!
//! - **`wire`** – decoder for the packed 19-byte record the platform
//!   producer delivers, and the only place that byte layout is known.
//! - **`domain::registry`** – maps opaque device handles to tracked
//!   pointers with engine-assigned logical ids that survive OS handle reuse.
//! - **`domain::motion`** – one parameterized accumulator applying
//!   sensitivity, per-axis acceleration, optional Y inversion, and optional
//!   screen-border clamping; shared verbatim by the batch and live paths.
//! - **`domain::track`** – append-only per-device tracks and their
//!   deterministic `Device;X;Y;DeltaT` CSV rendering.

pub mod domain;
pub mod wire;

pub use domain::motion::{advance, ClampRegion, MotionProfile, MotionSample};
pub use domain::registry::{
    DeviceHandle, PointerId, PointerRegistry, RegistryError, RegistryMode, TrackedPointer,
    PRIMARY_POINTER_ID,
};
pub use domain::track::{Track, TrackStore, CSV_HEADER};
pub use wire::{normalize, EventKind, RawEvent, WireError, RECORD_LEN};
