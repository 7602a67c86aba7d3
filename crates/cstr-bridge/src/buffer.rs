//! Owned, zero-terminated copies of Rust text on the native heap.
//!
//! A [`NativeBuffer`] is allocated with the C allocator so native routines may
//! treat it exactly like memory they obtained themselves. The buffer is freed
//! when the value is dropped, which happens exactly once: after
//! [`NativeBuffer::release`] consumes it, or when it goes out of scope on any
//! other path (early `?` return, unwinding panic).

use std::ffi::{CStr, c_char, c_void};
use std::fmt;
use std::ptr::NonNull;

use crate::error::BridgeError;
use crate::safety::{PointerRegistry, global_registry};

/// Allocation routine with the `malloc` contract: null, or `size` writable
/// bytes that `libc::free` accepts.
pub(crate) type RawAlloc = unsafe fn(usize) -> *mut c_void;

unsafe fn native_malloc(size: usize) -> *mut c_void {
    // SAFETY: malloc has no preconditions.
    unsafe { libc::malloc(size) }
}

/// Zero-terminated byte copy of a string, owned on the native heap.
pub struct NativeBuffer<'r> {
    ptr: NonNull<c_char>,
    /// Text bytes, terminator excluded.
    len: usize,
    registry: &'r PointerRegistry,
}

impl<'r> NativeBuffer<'r> {
    /// Copy `text` into a fresh native allocation tracked by `registry`.
    ///
    /// The allocation is `text.len() + 1` bytes: the text followed by a single
    /// zero byte.
    pub fn allocate_in(text: &str, registry: &'r PointerRegistry) -> Result<Self, BridgeError> {
        Self::allocate_with(text, registry, native_malloc)
    }

    pub(crate) fn allocate_with(
        text: &str,
        registry: &'r PointerRegistry,
        alloc: RawAlloc,
    ) -> Result<Self, BridgeError> {
        let bytes = text.as_bytes();
        if let Some(position) = bytes.iter().position(|&b| b == 0) {
            return Err(BridgeError::InteriorNul { position });
        }
        let size = bytes.len().checked_add(1).ok_or(BridgeError::Allocation {
            requested: usize::MAX,
        })?;
        registry.reserve(size)?;

        // SAFETY: `alloc` follows the malloc contract; a null return is
        // handled below.
        let raw = unsafe { alloc(size) }.cast::<c_char>();
        let ptr = NonNull::new(raw).ok_or(BridgeError::Allocation { requested: size })?;

        // SAFETY: `ptr` is a fresh allocation of `size` bytes, which cannot
        // overlap `bytes`. Index `bytes.len()` is the last byte of it.
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.as_ptr().cast::<u8>(), bytes.len());
            ptr.as_ptr().add(bytes.len()).write(0);
        }

        registry.register_allocation(ptr.as_ptr().cast_const().cast::<c_void>(), size);

        Ok(Self {
            ptr,
            len: bytes.len(),
            registry,
        })
    }

    /// Address handed to native routines.
    #[must_use]
    pub fn as_ptr(&self) -> *const c_char {
        self.ptr.as_ptr().cast_const()
    }

    /// Number of text bytes, terminator excluded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size of the native allocation, terminator included.
    #[must_use]
    pub fn len_with_nul(&self) -> usize {
        self.len + 1
    }

    /// Text bytes, terminator excluded.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.as_bytes_with_nul()[..self.len]
    }

    /// Full allocation contents, terminator included.
    #[must_use]
    pub fn as_bytes_with_nul(&self) -> &[u8] {
        // SAFETY: the allocation holds `len + 1` initialized bytes and lives
        // at least as long as `self`.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr().cast::<u8>(), self.len_with_nul()) }
    }

    /// Borrow as a C string.
    #[must_use]
    pub fn as_c_str(&self) -> &CStr {
        // SAFETY: the buffer ends with its only zero byte; allocation rejects
        // interior nul bytes.
        unsafe { CStr::from_bytes_with_nul_unchecked(self.as_bytes_with_nul()) }
    }

    /// Registry that tracks this allocation.
    #[must_use]
    pub fn registry(&self) -> &'r PointerRegistry {
        self.registry
    }

    /// Free the allocation now.
    ///
    /// Consumes the buffer so no use can follow the release.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for NativeBuffer<'_> {
    fn drop(&mut self) {
        // Mark before freeing: once freed, the allocator may hand the address
        // to another buffer that registers it again.
        let marked = self
            .registry
            .mark_released(self.ptr.as_ptr().cast_const().cast::<c_void>());
        debug_assert!(marked.is_ok(), "native buffer bookkeeping: {marked:?}");

        // SAFETY: `ptr` came from libc::malloc and `drop` runs once.
        unsafe { libc::free(self.ptr.as_ptr().cast::<c_void>()) };
    }
}

impl fmt::Debug for NativeBuffer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeBuffer")
            .field("addr", &self.ptr)
            .field("len", &self.len)
            .field("text", &self.as_c_str())
            .finish()
    }
}

/// Copy `text` into a native buffer tracked by the global registry.
pub fn allocate_native_copy(text: &str) -> Result<NativeBuffer<'static>, BridgeError> {
    NativeBuffer::allocate_in(text, global_registry())
}

/// Free `buffer`. Equivalent to dropping it.
pub fn release(buffer: NativeBuffer<'_>) {
    buffer.release();
}
