//! Integration test: native buffer lifecycle under an isolated registry.
//!
//! Validates that:
//! 1. Every allocation is released exactly once, on success and failure paths.
//! 2. Repeated runs leave no live buffers behind.
//! 3. Released buffers leave no registry entries behind.

use std::ffi::c_void;

use cstr_bridge::{
    BridgeError, BufferState, MemoryStream, NativeBuffer, NativeStreamWriter, NativeStringBridge,
    PointerRegistry, write_to_stream,
};

/// Stream that fails every other write.
#[derive(Default)]
struct FlakyStream {
    calls: usize,
    inner: MemoryStream,
}

impl NativeStreamWriter for FlakyStream {
    fn write(&mut self, buffer: &NativeBuffer<'_>) -> Result<(), BridgeError> {
        self.calls += 1;
        if self.calls % 2 == 0 {
            return Err(BridgeError::IoWrite {
                status: libc::EOF,
                errno: libc::ENOSPC,
            });
        }
        self.inner.write(buffer)
    }
}

#[test]
fn repeated_runs_return_live_count_to_zero() {
    const RUNS: usize = 64;

    let registry = PointerRegistry::new();
    let mut bridge = NativeStringBridge::with_registry(MemoryStream::new(), &registry);

    for run in 0..RUNS {
        assert_eq!(bridge.put_str("hello world").unwrap(), 11, "run={run}");
        assert_eq!(registry.live_count(), 0, "run={run}: buffer leaked");
    }

    let sink = bridge.into_writer();
    assert_eq!(sink.writes(), RUNS);
    assert_eq!(sink.contents(), "hello world".repeat(RUNS).as_bytes());
    assert_eq!(registry.allocated_total(), RUNS as u64);
    assert_eq!(registry.released_total(), RUNS as u64);
}

#[test]
fn failures_release_as_reliably_as_successes() {
    let registry = PointerRegistry::new();
    let mut bridge = NativeStringBridge::with_registry(FlakyStream::default(), &registry);

    let mut failures = 0;
    for _ in 0..10 {
        if bridge.put_str("abc").is_err() {
            failures += 1;
        }
        assert_eq!(registry.live_count(), 0);
    }

    assert_eq!(failures, 5);
    assert_eq!(registry.released_total(), 10);
    assert_eq!(bridge.writer().inner.contents(), b"abcabcabcabcabc");
}

#[test]
fn step_by_step_matches_put_str() {
    let registry = PointerRegistry::new();
    let mut stream = MemoryStream::new();

    let buffer = NativeBuffer::allocate_in("hello world", &registry).unwrap();
    assert_eq!(buffer.len_with_nul(), "hello world".len() + 1);
    let addr = buffer.as_ptr().cast::<c_void>();
    assert_eq!(registry.state_of(addr), BufferState::Allocated);

    write_to_stream(&buffer, &mut stream).unwrap();
    cstr_bridge::release(buffer);

    assert_eq!(stream.contents(), b"hello world");
    assert_eq!(registry.state_of(addr), BufferState::Released);
    assert_eq!(registry.live_count(), 0);
    assert_eq!(registry.released_total(), 1);
}

#[test]
fn registry_flags_double_release_by_address() {
    let registry = PointerRegistry::new();
    let buffer = NativeBuffer::allocate_in("once", &registry).unwrap();
    let addr = buffer.as_ptr().cast::<c_void>();
    drop(buffer);

    // The buffer itself can no longer be released; the registry still guards
    // raw addresses handed around by native code.
    assert_eq!(
        registry.mark_released(addr),
        Err(BridgeError::DoubleRelease { addr: addr as usize })
    );
}

#[test]
fn copies_match_input_for_varied_text() {
    let registry = PointerRegistry::new();
    let samples = ["", "a", "hello world", "tab\tand newline\n", "ünïcödé ✓"];

    for text in samples {
        let buffer = NativeBuffer::allocate_in(text, &registry).unwrap();
        let mut expected = text.as_bytes().to_vec();
        expected.push(0);
        assert_eq!(buffer.as_bytes_with_nul(), expected.as_slice(), "text={text:?}");
        assert_eq!(buffer.len_with_nul(), text.len() + 1);
    }
    assert_eq!(registry.live_count(), 0);
}

#[test]
fn many_simultaneous_buffers_leave_no_entries() {
    const BUFFERS: usize = 1_000;

    let registry = PointerRegistry::new();
    let buffers: Vec<NativeBuffer<'_>> = (0..BUFFERS)
        .map(|i| NativeBuffer::allocate_in(&format!("buffer-{i}"), &registry).unwrap())
        .collect();
    let addrs: Vec<*const c_void> = buffers.iter().map(|b| b.as_ptr().cast()).collect();
    assert_eq!(registry.live_count(), BUFFERS);

    drop(buffers);

    assert_eq!(registry.live_count(), 0);
    assert_eq!(registry.live_bytes(), 0);
    assert!(addrs.iter().all(|&addr| registry.lookup(addr).is_none()));
    assert_eq!(registry.released_total(), BUFFERS as u64);
}
