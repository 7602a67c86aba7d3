//! Native buffer registry.

use std::collections::{HashMap, VecDeque};
use std::ffi::c_void;
use std::sync::OnceLock;

use parking_lot::RwLock;

use crate::error::BridgeError;
use crate::safety::BufferState;

/// Released addresses remembered for double-release detection.
pub const RECENT_RELEASES: usize = 256;

/// Metadata for a tracked allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationMeta {
    /// Base address of the tracked allocation.
    pub base: usize,
    /// Allocation length in bytes, terminator included.
    pub len: usize,
    /// Registry-wide registration sequence number.
    pub generation: u64,
    /// Lifecycle state at the time the metadata was taken.
    pub state: BufferState,
}

#[derive(Debug, Default)]
struct RegistryInner {
    live: HashMap<usize, AllocationMeta>,
    recently_released: VecDeque<usize>,
    live_bytes: usize,
    allocated_total: u64,
    released_total: u64,
}

/// Concurrent registry of live native buffers.
///
/// Only live buffers are stored. The last [`RECENT_RELEASES`] released
/// addresses are kept so a second release of one of them is reported as
/// [`BridgeError::DoubleRelease`] rather than an unknown address.
#[derive(Debug, Default)]
pub struct PointerRegistry {
    inner: RwLock<RegistryInner>,
    byte_limit: Option<usize>,
}

impl PointerRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry that refuses allocations once live bytes would exceed `limit`.
    #[must_use]
    pub fn with_byte_limit(limit: usize) -> Self {
        Self {
            inner: RwLock::default(),
            byte_limit: Some(limit),
        }
    }

    #[must_use]
    pub fn byte_limit(&self) -> Option<usize> {
        self.byte_limit
    }

    /// Check that `size` more live bytes fit under the byte limit.
    pub fn reserve(&self, size: usize) -> Result<(), BridgeError> {
        let Some(limit) = self.byte_limit else {
            return Ok(());
        };
        let live = self.inner.read().live_bytes;
        match live.checked_add(size) {
            Some(total) if total <= limit => Ok(()),
            _ => Err(BridgeError::Allocation { requested: size }),
        }
    }

    /// Register a fresh allocation.
    pub fn register_allocation(&self, base: *const c_void, len: usize) -> AllocationMeta {
        let base_addr = base as usize;
        let mut inner = self.inner.write();
        inner.allocated_total = inner.allocated_total.saturating_add(1);
        let entry = AllocationMeta {
            base: base_addr,
            len,
            generation: inner.allocated_total,
            state: BufferState::Allocated,
        };
        inner.recently_released.retain(|&addr| addr != base_addr);
        if let Some(stale) = inner.live.insert(base_addr, entry) {
            inner.live_bytes = inner.live_bytes.saturating_sub(stale.len);
        }
        inner.live_bytes = inner.live_bytes.saturating_add(len);
        entry
    }

    /// Mark allocation as released and stop tracking it.
    ///
    /// Fails if the address is not live: [`BridgeError::DoubleRelease`] when it
    /// was released recently, [`BridgeError::UnknownAllocation`] otherwise.
    pub fn mark_released(&self, base: *const c_void) -> Result<AllocationMeta, BridgeError> {
        let base_addr = base as usize;
        let mut inner = self.inner.write();
        let Some(mut meta) = inner.live.remove(&base_addr) else {
            return Err(if inner.recently_released.contains(&base_addr) {
                BridgeError::DoubleRelease { addr: base_addr }
            } else {
                BridgeError::UnknownAllocation { addr: base_addr }
            });
        };
        meta.state = BufferState::Released;
        inner.live_bytes = inner.live_bytes.saturating_sub(meta.len);
        inner.released_total = inner.released_total.saturating_add(1);
        if inner.recently_released.len() == RECENT_RELEASES {
            inner.recently_released.pop_front();
        }
        inner.recently_released.push_back(base_addr);
        Ok(meta)
    }

    /// Metadata of the live allocation at exactly `base`, if any.
    #[must_use]
    pub fn lookup(&self, base: *const c_void) -> Option<AllocationMeta> {
        self.inner.read().live.get(&(base as usize)).copied()
    }

    /// Lifecycle state of the allocation at exactly `base`.
    #[must_use]
    pub fn state_of(&self, base: *const c_void) -> BufferState {
        let addr = base as usize;
        let inner = self.inner.read();
        if inner.live.contains_key(&addr) {
            BufferState::Allocated
        } else if inner.recently_released.contains(&addr) {
            BufferState::Released
        } else {
            BufferState::Unknown
        }
    }

    /// Number of buffers currently allocated and not yet released.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.inner.read().live.len()
    }

    /// Bytes held by live buffers, terminators included.
    #[must_use]
    pub fn live_bytes(&self) -> usize {
        self.inner.read().live_bytes
    }

    /// Total successful registrations since creation.
    #[must_use]
    pub fn allocated_total(&self) -> u64 {
        self.inner.read().allocated_total
    }

    /// Total successful releases since creation.
    #[must_use]
    pub fn released_total(&self) -> u64 {
        self.inner.read().released_total
    }
}

static GLOBAL_REGISTRY: OnceLock<PointerRegistry> = OnceLock::new();

/// Process-wide registry used by [`crate::allocate_native_copy`].
#[must_use]
pub fn global_registry() -> &'static PointerRegistry {
    GLOBAL_REGISTRY.get_or_init(PointerRegistry::new)
}
