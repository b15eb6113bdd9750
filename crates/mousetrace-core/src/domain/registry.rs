//! Device registry: the mapping from platform device handles to tracked
//! logical pointers.
//!
//! The OS merges every physical mouse into one logical cursor; this registry
//! is what keeps them apart. Each connected handle owns exactly one
//! [`TrackedPointer`] carrying an engine-assigned logical id that survives
//! handle reuse: the platform may hand a disconnected device's handle to a
//! different device later, so identity is tracked on our side, not the OS's.
//!
//! # Id assignment
//!
//! Logical ids start at 1 and grow monotonically; id 0 is reserved for the
//! primary-mode pointer. When a pointer is removed its id returns to a free
//! pool and may be reassigned to a *different* device, but never back to the
//! handle that last held it — a device that disconnects and reconnects is a
//! new identity, and its track must not silently continue the old one.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use thiserror::Error;
use tracing::debug;

/// Opaque platform-assigned identifier for a physical pointer device.
///
/// Stable for the lifetime of the physical connection. The OS may reuse the
/// value after a disconnect, so it must never be treated as globally unique
/// across a connect/disconnect cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle(pub i32);

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Engine-assigned logical pointer identity.
pub type PointerId = u32;

/// The id reserved for the single pointer in primary mode.
pub const PRIMARY_POINTER_ID: PointerId = 0;

/// Per-device pointer state: logical identity plus accumulated position.
///
/// Exactly one `TrackedPointer` exists per currently connected device handle.
/// Position and timestamp are mutated in place by the motion accumulator.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedPointer {
    /// Logical id, unique among live pointers.
    pub id: PointerId,
    /// The platform handle this pointer is bound to.
    pub device: DeviceHandle,
    /// Accumulated absolute X, relative to the spawn origin.
    pub x: f64,
    /// Accumulated absolute Y, relative to the spawn origin.
    pub y: f64,
    /// Per-device delta multiplier.
    pub sensitivity: f64,
    /// Capture clock of the last accumulated event; `None` until the first
    /// motion event, so the first sample reports elapsed = 0.
    pub last_timestamp_ms: Option<f64>,
}

/// Whether the registry tracks devices individually or aliases them all to
/// one pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryMode {
    /// One tracked pointer per connected device.
    MultiDevice,
    /// Every device aliases the single id-0 pointer, for consumers that can
    /// only deal with one cursor.
    SinglePrimary,
}

/// Soft errors reported by the registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A disconnect arrived for a handle that is not tracked. The platform's
    /// disconnect notification can race engine shutdown, so this is counted
    /// and ignored rather than treated as fatal.
    #[error("disconnect for untracked device {0}")]
    UnknownDevice(DeviceHandle),
}

/// Owned mapping from device handles to tracked pointers.
///
/// Create/remove lifecycle is explicit; there is no global state. The
/// registry is handed by mutable reference into whichever consumer (batch
/// recorder or live dispatcher) owns the session.
pub struct PointerRegistry {
    mode: RegistryMode,
    pointers: HashMap<DeviceHandle, TrackedPointer>,
    next_id: PointerId,
    /// Released ids available for reassignment, smallest first.
    free_ids: BTreeSet<PointerId>,
    /// Last id each handle held, consulted so a reconnecting handle never
    /// gets its own previous id back.
    last_id_by_handle: HashMap<DeviceHandle, PointerId>,
    default_sensitivity: f64,
    /// Position newly created pointers start from. (0, 0) for batch capture;
    /// the live dispatcher seeds it with the screen center.
    origin: (f64, f64),
}

impl PointerRegistry {
    /// Creates an empty registry. Newly resolved pointers inherit
    /// `default_sensitivity` and spawn at origin (0, 0).
    pub fn new(mode: RegistryMode, default_sensitivity: f64) -> Self {
        Self {
            mode,
            pointers: HashMap::new(),
            next_id: 1,
            free_ids: BTreeSet::new(),
            last_id_by_handle: HashMap::new(),
            default_sensitivity,
            origin: (0.0, 0.0),
        }
    }

    /// Sets the spawn position for pointers created after this call.
    pub fn set_origin(&mut self, x: f64, y: f64) {
        self.origin = (x, y);
    }

    /// Resolves the tracked pointer for `handle`, creating it on first sight.
    ///
    /// Idempotent: a duplicate connect notification returns the existing
    /// pointer and leaves the registry unchanged. In
    /// [`RegistryMode::SinglePrimary`] every handle resolves to the fixed
    /// id-0 pointer.
    pub fn resolve(&mut self, handle: DeviceHandle) -> &mut TrackedPointer {
        let key = match self.mode {
            RegistryMode::MultiDevice => handle,
            // All devices alias one pointer stored under handle 0.
            RegistryMode::SinglePrimary => DeviceHandle(0),
        };

        if !self.pointers.contains_key(&key) {
            let id = match self.mode {
                RegistryMode::MultiDevice => self.allocate_id(key),
                RegistryMode::SinglePrimary => PRIMARY_POINTER_ID,
            };
            debug!(device = %key, id, "tracking new pointer");
            self.pointers.insert(
                key,
                TrackedPointer {
                    id,
                    device: key,
                    x: self.origin.0,
                    y: self.origin.1,
                    sensitivity: self.default_sensitivity,
                    last_timestamp_ms: None,
                },
            );
        }

        self.pointers.get_mut(&key).expect("pointer inserted above")
    }

    /// Removes the pointer for `handle` and releases its logical id.
    ///
    /// Returns the released id. In primary mode this is a no-op (the single
    /// pointer outlives any individual device).
    ///
    /// # Errors
    ///
    /// [`RegistryError::UnknownDevice`] if the handle is not tracked; callers
    /// count it and carry on.
    pub fn remove(&mut self, handle: DeviceHandle) -> Result<PointerId, RegistryError> {
        if self.mode == RegistryMode::SinglePrimary {
            return Ok(PRIMARY_POINTER_ID);
        }

        let pointer = self
            .pointers
            .remove(&handle)
            .ok_or(RegistryError::UnknownDevice(handle))?;
        debug!(device = %handle, id = pointer.id, "pointer removed");
        self.last_id_by_handle.insert(handle, pointer.id);
        self.free_ids.insert(pointer.id);
        Ok(pointer.id)
    }

    /// Returns the tracked pointer for `handle` without creating one.
    pub fn get(&self, handle: DeviceHandle) -> Option<&TrackedPointer> {
        match self.mode {
            RegistryMode::MultiDevice => self.pointers.get(&handle),
            RegistryMode::SinglePrimary => self.pointers.get(&DeviceHandle(0)),
        }
    }

    /// Number of live pointers.
    pub fn len(&self) -> usize {
        self.pointers.len()
    }

    /// `true` if no pointer is tracked.
    pub fn is_empty(&self) -> bool {
        self.pointers.is_empty()
    }

    /// Iterates over all live pointers in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &TrackedPointer> {
        self.pointers.values()
    }

    /// Drops every tracked pointer. Ids are not returned to the free pool;
    /// this is session teardown, not a disconnect.
    pub fn clear(&mut self) {
        self.pointers.clear();
    }

    /// Picks the smallest free id not last held by `handle`, or mints a
    /// fresh one.
    fn allocate_id(&mut self, handle: DeviceHandle) -> PointerId {
        let previous = self.last_id_by_handle.get(&handle).copied();
        let reusable = self
            .free_ids
            .iter()
            .copied()
            .find(|id| Some(*id) != previous);

        match reusable {
            Some(id) => {
                self.free_ids.remove(&id);
                id
            }
            None => {
                let id = self.next_id;
                self.next_id += 1;
                id
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> PointerRegistry {
        PointerRegistry::new(RegistryMode::MultiDevice, 1.0)
    }

    #[test]
    fn test_resolve_assigns_monotonic_ids_from_one() {
        let mut reg = registry();

        let a = reg.resolve(DeviceHandle(100)).id;
        let b = reg.resolve(DeviceHandle(200)).id;
        let c = reg.resolve(DeviceHandle(300)).id;

        assert_eq!((a, b, c), (1, 2, 3));
    }

    #[test]
    fn test_duplicate_connect_is_idempotent() {
        let mut reg = registry();
        reg.resolve(DeviceHandle(100)).x = 42.0;

        // Second resolve for the same handle must return the same pointer,
        // state intact, without growing the registry.
        let again = reg.resolve(DeviceHandle(100));
        assert_eq!(again.id, 1);
        assert_eq!(again.x, 42.0);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_reconnect_of_same_handle_yields_a_distinct_id() {
        let mut reg = registry();

        let first = reg.resolve(DeviceHandle(100)).id;
        reg.remove(DeviceHandle(100)).expect("tracked");
        let second = reg.resolve(DeviceHandle(100)).id;

        assert_ne!(first, second);
    }

    #[test]
    fn test_freed_id_may_go_to_a_different_device() {
        let mut reg = registry();

        let freed = reg.resolve(DeviceHandle(100)).id;
        reg.remove(DeviceHandle(100)).expect("tracked");

        // A different handle is allowed to pick up the released id.
        let newcomer = reg.resolve(DeviceHandle(200)).id;
        assert_eq!(newcomer, freed);
    }

    #[test]
    fn test_remove_unknown_handle_is_a_soft_error() {
        let mut reg = registry();

        let err = reg.remove(DeviceHandle(999)).unwrap_err();
        assert_eq!(err, RegistryError::UnknownDevice(DeviceHandle(999)));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_primary_mode_aliases_every_handle_to_id_zero() {
        let mut reg = PointerRegistry::new(RegistryMode::SinglePrimary, 1.0);

        reg.resolve(DeviceHandle(100)).x = 7.0;
        let other = reg.resolve(DeviceHandle(555));

        assert_eq!(other.id, PRIMARY_POINTER_ID);
        assert_eq!(other.x, 7.0, "both handles must share one pointer");
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_primary_mode_remove_is_a_no_op() {
        let mut reg = PointerRegistry::new(RegistryMode::SinglePrimary, 1.0);
        reg.resolve(DeviceHandle(100));

        let id = reg.remove(DeviceHandle(100)).expect("no-op succeeds");
        assert_eq!(id, PRIMARY_POINTER_ID);
        assert_eq!(reg.len(), 1, "primary pointer survives disconnects");
    }

    #[test]
    fn test_new_pointers_spawn_at_the_configured_origin() {
        let mut reg = registry();
        reg.set_origin(960.0, 540.0);

        let p = reg.resolve(DeviceHandle(1));
        assert_eq!((p.x, p.y), (960.0, 540.0));
    }
}
