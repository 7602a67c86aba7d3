//! Lifecycle states for tracked native buffers.

/// Lifecycle state of a native allocation as seen by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    /// Address has no known metadata.
    Unknown,
    /// Buffer is allocated and may be read by native code.
    Allocated,
    /// Buffer has been handed back to the native allocator.
    Released,
}

impl BufferState {
    /// Returns true if native code may still dereference the region.
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Allocated)
    }
}
