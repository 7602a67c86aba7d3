//! allocate → write → release, in one call.

use crate::buffer::NativeBuffer;
use crate::config::StatusPolicy;
use crate::error::BridgeError;
use crate::safety::PointerRegistry;
use crate::stream::{CFileStream, NativeStreamWriter, write_to_stream};

/// Hands Rust text to a native stream through a scoped native buffer.
#[derive(Debug)]
pub struct NativeStringBridge<'r, W> {
    writer: W,
    registry: &'r PointerRegistry,
}

impl<'r> NativeStringBridge<'r, CFileStream> {
    /// Bridge onto C `stdout`, tracking buffers in `registry`.
    #[must_use]
    pub fn stdout(registry: &'r PointerRegistry, policy: StatusPolicy) -> Self {
        Self::with_registry(CFileStream::stdout(policy), registry)
    }
}

impl<'r, W: NativeStreamWriter> NativeStringBridge<'r, W> {
    /// Bridge tracking buffers in `registry`.
    #[must_use]
    pub fn with_registry(writer: W, registry: &'r PointerRegistry) -> Self {
        Self { writer, registry }
    }

    /// Copy `text` into a native buffer tracked by this bridge's registry.
    pub fn allocate(&self, text: &str) -> Result<NativeBuffer<'r>, BridgeError> {
        NativeBuffer::allocate_in(text, self.registry)
    }

    /// Hand `buffer` to the bridge's writer.
    pub fn write(&mut self, buffer: &NativeBuffer<'_>) -> Result<(), BridgeError> {
        write_to_stream(buffer, &mut self.writer)
    }

    /// Copy `text` to the native heap, write it, and free the copy.
    ///
    /// Returns the number of text bytes handed to the writer. The native copy
    /// is released before returning on every path, including write failure.
    pub fn put_str(&mut self, text: &str) -> Result<usize, BridgeError> {
        let buffer = self.allocate(text)?;
        self.write(&buffer)?;
        let written = buffer.len();
        buffer.release();
        Ok(written)
    }

    #[must_use]
    pub fn writer(&self) -> &W {
        &self.writer
    }

    #[must_use]
    pub fn registry(&self) -> &'r PointerRegistry {
        self.registry
    }

    #[must_use]
    pub fn into_writer(self) -> W {
        self.writer
    }
}
