//! Harness around cstr-bridge.
//!
//! This crate provides:
//! - Structured JSONL logging of buffer lifecycle events
//! - A runner that drives the bridge repeatedly and reports per-run facts
//! - The `hello-bridge` binary

#![forbid(unsafe_code)]

pub mod runner;
pub mod structured_log;

pub use runner::{BridgeRunner, RunError, RunRecord, RunReport};
pub use structured_log::{LogEmitter, LogEntry, LogLevel, Outcome, Stage};
