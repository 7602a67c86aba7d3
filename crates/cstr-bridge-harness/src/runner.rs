//! Drives the bridge one step at a time and records what each run did.

use std::time::Instant;

use cstr_bridge::{
    BridgeError, NativeStreamWriter, NativeStringBridge, PointerRegistry, StatusPolicy,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::structured_log::{LogEmitter, LogEntry, LogLevel, Outcome, Stage};

/// Failures that stop a harness run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("run {run}: {source}")]
    Bridge {
        run: usize,
        #[source]
        source: BridgeError,
    },
    #[error("structured log: {0}")]
    Log(#[from] std::io::Error),
}

impl RunError {
    /// The bridge error behind this failure, if any.
    #[must_use]
    pub fn bridge_error(&self) -> Option<&BridgeError> {
        match self {
            Self::Bridge { source, .. } => Some(source),
            Self::Log(_) => None,
        }
    }
}

/// Facts about one allocate → write → release cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run: usize,
    /// Native allocation size, terminator included.
    pub buffer_len: usize,
    pub bytes_written: usize,
    /// Buffers still allocated once the cycle finished.
    pub live_after: usize,
}

/// Summary of a harness invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub policy: String,
    pub text_len: usize,
    pub runs: Vec<RunRecord>,
    pub allocated_total: u64,
    pub released_total: u64,
}

impl RunReport {
    /// True when every run wrote the same bytes and left nothing allocated.
    #[must_use]
    pub fn is_idempotent(&self) -> bool {
        let Some(first) = self.runs.first() else {
            return true;
        };
        self.runs.iter().all(|r| {
            r.live_after == 0
                && r.buffer_len == first.buffer_len
                && r.bytes_written == first.bytes_written
        })
    }

    /// True when every allocation seen by the registry was released.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.allocated_total == self.released_total
    }
}

/// Repeats the bridge cycle over one bridge, logging each step.
pub struct BridgeRunner<'r, W> {
    text: String,
    repeat: usize,
    policy: StatusPolicy,
    bridge: NativeStringBridge<'r, W>,
    log: Option<LogEmitter>,
}

impl<'r, W: NativeStreamWriter> BridgeRunner<'r, W> {
    #[must_use]
    pub fn new(text: impl Into<String>, bridge: NativeStringBridge<'r, W>) -> Self {
        Self {
            text: text.into(),
            repeat: 1,
            policy: StatusPolicy::default(),
            bridge,
            log: None,
        }
    }

    #[must_use]
    pub fn with_repeat(mut self, repeat: usize) -> Self {
        self.repeat = repeat;
        self
    }

    /// Policy reported in logs; the writer enforces it.
    #[must_use]
    pub fn with_policy(mut self, policy: StatusPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_log(mut self, emitter: LogEmitter) -> Self {
        self.log = Some(emitter);
        self
    }

    /// Run every cycle, stopping at the first bridge error.
    pub fn run(&mut self) -> Result<RunReport, RunError> {
        let allocated_before = self.registry().allocated_total();
        let released_before = self.registry().released_total();

        self.log(
            LogEntry::new(String::new(), LogLevel::Info, "bridge_run_start")
                .with_stage(Stage::Run, "fputs")
                .with_details(serde_json::json!({
                    "repeat": self.repeat,
                    "text_len": self.text.len(),
                })),
        )?;

        let mut runs = Vec::with_capacity(self.repeat);
        for run in 0..self.repeat {
            match self.run_once(run) {
                Ok(record) => runs.push(record),
                Err(RunError::Bridge { run, source }) => {
                    let level = if source.is_fatal() {
                        LogLevel::Fatal
                    } else {
                        LogLevel::Error
                    };
                    self.log(
                        LogEntry::new(String::new(), level, "bridge_run_end")
                            .with_stage(Stage::Run, "fputs")
                            .with_run(run)
                            .with_outcome(Outcome::Error)
                            .with_live_buffers(self.registry().live_count())
                            .with_details(serde_json::json!({ "error": source.to_string() })),
                    )?;
                    self.flush_log()?;
                    return Err(RunError::Bridge { run, source });
                }
                Err(err) => return Err(err),
            }
        }

        let report = RunReport {
            policy: self.policy.as_str().to_string(),
            text_len: self.text.len(),
            runs,
            allocated_total: self.registry().allocated_total() - allocated_before,
            released_total: self.registry().released_total() - released_before,
        };

        self.log(
            LogEntry::new(String::new(), LogLevel::Info, "bridge_run_end")
                .with_stage(Stage::Run, "fputs")
                .with_outcome(Outcome::Pass)
                .with_live_buffers(self.registry().live_count())
                .with_details(serde_json::json!({
                    "runs": report.runs.len(),
                    "idempotent": report.is_idempotent(),
                    "balanced": report.is_balanced(),
                })),
        )?;
        self.flush_log()?;
        Ok(report)
    }

    /// One allocate → write → release cycle.
    pub fn run_once(&mut self, run: usize) -> Result<RunRecord, RunError> {
        let started = Instant::now();
        let buffer = match self.bridge.allocate(&self.text) {
            Ok(buffer) => buffer,
            Err(source) => {
                self.log(
                    self.step_entry(run, LogLevel::Fatal, "buffer_allocated", Stage::Allocate)
                        .with_outcome(Outcome::Fail)
                        .with_details(serde_json::json!({ "error": source.to_string() })),
                )?;
                return Err(RunError::Bridge { run, source });
            }
        };
        let buffer_len = buffer.len_with_nul();
        self.log(
            self.step_entry(run, LogLevel::Debug, "buffer_allocated", Stage::Allocate)
                .with_outcome(Outcome::Pass)
                .with_buffer_len(buffer_len)
                .with_live_buffers(self.registry().live_count()),
        )?;

        let written = self.bridge.write(&buffer);
        let bytes_written = if written.is_ok() { buffer.len() } else { 0 };
        let mut entry = self
            .step_entry(run, LogLevel::Debug, "stream_write", Stage::Write)
            .with_buffer_len(buffer_len)
            .with_bytes(bytes_written);
        entry = match &written {
            Ok(()) => entry.with_outcome(Outcome::Pass),
            Err(BridgeError::IoWrite { errno, .. }) => {
                let mut entry = entry.with_outcome(Outcome::Fail).with_errno(*errno);
                entry.level = LogLevel::Error;
                entry
            }
            Err(_) => {
                let mut entry = entry.with_outcome(Outcome::Fail);
                entry.level = LogLevel::Error;
                entry
            }
        };
        self.log(entry)?;

        buffer.release();
        let live_after = self.registry().live_count();
        self.log(
            self.step_entry(run, LogLevel::Debug, "buffer_released", Stage::Release)
                .with_outcome(Outcome::Pass)
                .with_live_buffers(live_after)
                .with_latency_ns(u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX)),
        )?;

        written.map_err(|source| RunError::Bridge { run, source })?;
        Ok(RunRecord {
            run,
            buffer_len,
            bytes_written,
            live_after,
        })
    }

    #[must_use]
    pub fn writer(&self) -> &W {
        self.bridge.writer()
    }

    #[must_use]
    pub fn registry(&self) -> &'r PointerRegistry {
        self.bridge.registry()
    }

    /// Hand back the writer and the log emitter, if one was attached.
    pub fn into_parts(self) -> (W, Option<LogEmitter>) {
        (self.bridge.into_writer(), self.log)
    }

    fn step_entry(&self, run: usize, level: LogLevel, event: &str, stage: Stage) -> LogEntry {
        let symbol = match stage {
            Stage::Allocate => "malloc",
            Stage::Write | Stage::Run => "fputs",
            Stage::Release => "free",
        };
        LogEntry::new(String::new(), level, event)
            .with_stage(stage, symbol)
            .with_policy(self.policy.as_str())
            .with_run(run)
    }

    fn log(&mut self, entry: LogEntry) -> Result<(), RunError> {
        if let Some(emitter) = self.log.as_mut() {
            emitter.emit_entry(entry)?;
        }
        Ok(())
    }

    fn flush_log(&mut self) -> Result<(), RunError> {
        if let Some(emitter) = self.log.as_mut() {
            emitter.flush()?;
        }
        Ok(())
    }
}
