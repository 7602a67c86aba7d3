//! Write-status policy configuration.
//!
//! The policy is set via the `CSTR_BRIDGE_STATUS` environment variable:
//! - `permissive` (default): the return value of the native write routine is
//!   ignored. A failed `fputs` is indistinguishable from a successful one.
//! - `checked`: a negative return from the native write routine is surfaced as
//!   [`BridgeError::IoWrite`](crate::BridgeError::IoWrite) with the current errno.

use std::sync::atomic::{AtomicU8, Ordering};

/// Environment variable consulted on first use of [`status_policy`].
pub const STATUS_ENV: &str = "CSTR_BRIDGE_STATUS";

/// How the bridge treats the status returned by native write routines.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusPolicy {
    /// Ignore the native return status.
    #[default]
    Permissive,
    /// Turn a negative native return status into an error.
    Checked,
}

impl StatusPolicy {
    /// Parse from string (case-insensitive). Unknown values map to the default.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "checked" | "check" | "strict" => Self::Checked,
            _ => Self::Permissive,
        }
    }

    /// Returns true if a failed native write must be reported.
    #[must_use]
    pub const fn checks_status(self) -> bool {
        matches!(self, Self::Checked)
    }

    /// Stable lowercase name, as accepted by [`StatusPolicy::from_str_loose`].
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Permissive => "permissive",
            Self::Checked => "checked",
        }
    }
}

// 0=unresolved, 1=Permissive, 2=Checked.
static CACHED_POLICY: AtomicU8 = AtomicU8::new(0);

const POLICY_UNRESOLVED: u8 = 0;
const POLICY_PERMISSIVE: u8 = 1;
const POLICY_CHECKED: u8 = 2;

fn policy_to_u8(policy: StatusPolicy) -> u8 {
    match policy {
        StatusPolicy::Permissive => POLICY_PERMISSIVE,
        StatusPolicy::Checked => POLICY_CHECKED,
    }
}

fn u8_to_policy(v: u8) -> StatusPolicy {
    match v {
        POLICY_CHECKED => StatusPolicy::Checked,
        _ => StatusPolicy::Permissive,
    }
}

/// Get the configured status policy (reads env var on first call, caches thereafter).
#[must_use]
pub fn status_policy() -> StatusPolicy {
    let cached = CACHED_POLICY.load(Ordering::Acquire);
    if cached != POLICY_UNRESOLVED {
        return u8_to_policy(cached);
    }

    let policy = std::env::var(STATUS_ENV)
        .map(|v| StatusPolicy::from_str_loose(&v))
        .unwrap_or_default();

    // A concurrent override wins over the env-derived value.
    match CACHED_POLICY.compare_exchange(
        POLICY_UNRESOLVED,
        policy_to_u8(policy),
        Ordering::AcqRel,
        Ordering::Acquire,
    ) {
        Ok(_) => policy,
        Err(current) => u8_to_policy(current),
    }
}

/// Pin the process-wide policy, bypassing the environment.
pub fn override_status_policy(policy: StatusPolicy) {
    CACHED_POLICY.store(policy_to_u8(policy), Ordering::Release);
}
