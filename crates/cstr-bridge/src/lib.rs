//! cstr-bridge: hand Rust text to fixed-arity C stdio routines.
//!
//! Text is copied into a zero-terminated buffer on the native heap
//! ([`NativeBuffer`]), passed to `fputs` through a [`NativeStreamWriter`], and
//! freed when the buffer goes out of scope. Every buffer is recorded in a
//! [`PointerRegistry`] so leaks and double releases are observable.

pub mod bridge;
pub mod buffer;
pub mod config;
pub mod error;
pub mod safety;
pub mod stream;

pub use bridge::NativeStringBridge;
pub use buffer::{NativeBuffer, allocate_native_copy, release};
pub use config::{StatusPolicy, override_status_policy, status_policy};
pub use error::BridgeError;
pub use safety::{BufferState, PointerRegistry, global_registry};
pub use stream::{CFileStream, MemoryStream, NativeStreamWriter, write_to_stream};
