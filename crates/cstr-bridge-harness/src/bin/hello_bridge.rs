//! CLI entrypoint: write text to C `stdout` through `fputs`.
//!
//! With no arguments this prints exactly `hello world`, without a newline.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};

use cstr_bridge::{
    NativeStringBridge, PointerRegistry, StatusPolicy, override_status_policy, status_policy,
};
use cstr_bridge_harness::{BridgeRunner, LogEmitter, RunError};

/// Environment variable naming a JSONL log file when `--log` is absent.
const LOG_ENV: &str = "CSTR_BRIDGE_LOG";

/// Accepted `--status` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StatusArg {
    /// Ignore the native write status.
    #[value(alias = "ignore", alias = "off")]
    Permissive,
    /// Fail when `fputs` or `fflush` reports `EOF`.
    #[value(alias = "check", alias = "strict")]
    Checked,
}

impl From<StatusArg> for StatusPolicy {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Permissive => Self::Permissive,
            StatusArg::Checked => Self::Checked,
        }
    }
}

/// Hand a string to libc `fputs` through a scoped native buffer.
#[derive(Debug, Parser)]
#[command(name = "hello-bridge")]
#[command(about = "Write text to C stdout via fputs")]
struct Cli {
    /// Text to write.
    #[arg(long, default_value = "hello world")]
    text: String,
    /// Number of allocate/write/release cycles.
    #[arg(long, default_value_t = 1)]
    repeat: usize,
    /// Native write status policy; overrides CSTR_BRIDGE_STATUS.
    #[arg(long, value_enum)]
    status: Option<StatusArg>,
    /// Structured JSONL log path; overrides CSTR_BRIDGE_LOG.
    #[arg(long)]
    log: Option<PathBuf>,
    /// Optional JSON run report path.
    #[arg(long)]
    report: Option<PathBuf>,
    /// Refuse native allocations once this many bytes would be live.
    #[arg(long, value_name = "BYTES")]
    max_native_bytes: Option<usize>,
}

fn run(cli: Cli) -> Result<(), RunError> {
    if let Some(arg) = cli.status {
        override_status_policy(arg.into());
    }
    let policy = status_policy();

    let registry = match cli.max_native_bytes {
        Some(limit) => PointerRegistry::with_byte_limit(limit),
        None => PointerRegistry::new(),
    };
    let mut runner = BridgeRunner::new(cli.text, NativeStringBridge::stdout(&registry, policy))
        .with_repeat(cli.repeat)
        .with_policy(policy);

    let log_path = cli
        .log
        .or_else(|| std::env::var_os(LOG_ENV).map(PathBuf::from));
    if let Some(path) = log_path {
        let run_id = format!("pid-{}", std::process::id());
        runner = runner.with_log(LogEmitter::to_file(&path, "hello-bridge", &run_id)?);
    }

    let report = runner.run()?;

    if let Some(path) = cli.report {
        let body = serde_json::to_string_pretty(&report).map_err(std::io::Error::other)?;
        fs::write(path, body)?;
    }
    Ok(())
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("hello-bridge: {err}");
            ExitCode::FAILURE
        }
    }
}
