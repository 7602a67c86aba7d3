//! Error type shared by the bridge, its stream writers, and the registry.

use thiserror::Error;

/// Failures surfaced while moving text across the native boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// The native allocator returned null.
    #[error("native allocation of {requested} bytes failed")]
    Allocation { requested: usize },
    /// The text holds a zero byte and cannot be expressed as a C string.
    #[error("text contains a nul byte at offset {position}")]
    InteriorNul { position: usize },
    /// The native write routine reported failure.
    #[error("native stream write failed (status {status}, errno {errno})")]
    IoWrite { status: i32, errno: i32 },
    /// The registry saw a second release of the same allocation.
    #[error("allocation at {addr:#x} released twice")]
    DoubleRelease { addr: usize },
    /// The registry was asked to release an address it never tracked.
    #[error("allocation at {addr:#x} is not tracked")]
    UnknownAllocation { addr: usize },
}

impl BridgeError {
    /// Returns true for conditions the binary treats as fatal.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Allocation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_allocation_failure_is_fatal() {
        assert!(BridgeError::Allocation { requested: 12 }.is_fatal());
        assert!(!BridgeError::InteriorNul { position: 3 }.is_fatal());
        assert!(!BridgeError::IoWrite { status: -1, errno: 9 }.is_fatal());
    }

    #[test]
    fn messages_name_the_address_in_hex() {
        let err = BridgeError::DoubleRelease { addr: 0x1000 };
        assert_eq!(err.to_string(), "allocation at 0x1000 released twice");
    }
}
