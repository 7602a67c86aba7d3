//! Fixed-arity native output routines behind the [`NativeStreamWriter`] seam.
//!
//! Only `fputs` is bound. `printf` and the rest of the variadic family are
//! deliberately absent: a typed binding cannot forward a variable argument
//! list safely.

use std::ffi::{CStr, c_int};

use crate::buffer::NativeBuffer;
use crate::config::StatusPolicy;
use crate::error::BridgeError;

#[cfg(not(target_vendor = "apple"))]
unsafe extern "C" {
    static mut stdout: *mut libc::FILE;
}

#[cfg(target_vendor = "apple")]
unsafe extern "C" {
    #[link_name = "__stdoutp"]
    static mut stdout: *mut libc::FILE;
}

/// Capability to hand a native buffer to an output routine.
pub trait NativeStreamWriter {
    /// Write the buffer's bytes up to, not including, its terminator.
    fn write(&mut self, buffer: &NativeBuffer<'_>) -> Result<(), BridgeError>;
}

impl<W: NativeStreamWriter + ?Sized> NativeStreamWriter for &mut W {
    fn write(&mut self, buffer: &NativeBuffer<'_>) -> Result<(), BridgeError> {
        (**self).write(buffer)
    }
}

/// Forward `buffer` to `stream`.
pub fn write_to_stream<W: NativeStreamWriter + ?Sized>(
    buffer: &NativeBuffer<'_>,
    stream: &mut W,
) -> Result<(), BridgeError> {
    stream.write(buffer)
}

/// A borrowed C `FILE*` written with `fputs`.
///
/// The handle is never opened or closed here.
#[derive(Debug)]
pub struct CFileStream {
    handle: *mut libc::FILE,
    policy: StatusPolicy,
}

impl CFileStream {
    /// The process's C `stdout`.
    #[must_use]
    pub fn stdout(policy: StatusPolicy) -> Self {
        // SAFETY: the C runtime initializes `stdout` before `main`; we only
        // copy the pointer value.
        let handle = unsafe { stdout };
        Self { handle, policy }
    }

    /// Wrap an arbitrary stream handle.
    ///
    /// # Safety
    ///
    /// `handle` must be a valid, open `FILE*` for as long as the returned value
    /// is used for writing.
    #[must_use]
    pub unsafe fn from_raw(handle: *mut libc::FILE, policy: StatusPolicy) -> Self {
        Self { handle, policy }
    }

    #[must_use]
    pub fn policy(&self) -> StatusPolicy {
        self.policy
    }

    #[must_use]
    pub fn as_raw(&self) -> *mut libc::FILE {
        self.handle
    }

    fn check(&self, status: c_int) -> Result<(), BridgeError> {
        if status >= 0 || !self.policy.checks_status() {
            return Ok(());
        }
        let errno = std::io::Error::last_os_error()
            .raw_os_error()
            .unwrap_or_default();
        Err(BridgeError::IoWrite { status, errno })
    }
}

impl NativeStreamWriter for CFileStream {
    fn write(&mut self, buffer: &NativeBuffer<'_>) -> Result<(), BridgeError> {
        // SAFETY: `buffer` is zero-terminated and alive for the call; the
        // handle is valid per the constructor contracts.
        let status = unsafe { libc::fputs(buffer.as_ptr(), self.handle) };
        self.check(status)?;
        // SAFETY: same handle as above.
        let status = unsafe { libc::fflush(self.handle) };
        self.check(status)
    }
}

/// In-memory stream that scans buffers the way `fputs` does.
#[derive(Debug, Default, Clone)]
pub struct MemoryStream {
    bytes: Vec<u8>,
    writes: usize,
    fail_with: Option<BridgeError>,
}

impl MemoryStream {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A stream whose every write fails with `err`.
    #[must_use]
    pub fn failing(err: BridgeError) -> Self {
        Self {
            fail_with: Some(err),
            ..Self::default()
        }
    }

    /// Everything written so far.
    #[must_use]
    pub fn contents(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of write calls that succeeded.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.writes
    }

    #[must_use]
    pub fn into_contents(self) -> Vec<u8> {
        self.bytes
    }
}

impl NativeStreamWriter for MemoryStream {
    fn write(&mut self, buffer: &NativeBuffer<'_>) -> Result<(), BridgeError> {
        if let Some(err) = &self.fail_with {
            return Err(err.clone());
        }
        // SAFETY: `buffer` is zero-terminated and alive for the call.
        let text = unsafe { CStr::from_ptr(buffer.as_ptr()) };
        self.bytes.extend_from_slice(text.to_bytes());
        self.writes += 1;
        Ok(())
    }
}
