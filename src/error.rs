//! Typed error hierarchy for the registry's slow paths and setup
//! routines. The hot-path handle API (`create`/`delete`/`get`/`modify`)
//! keeps the cheaper null/bool shape described by the public surface;
//! this enum backs the internals that already hold a lock and the
//! public `status()` query.

use std::cell::Cell;

use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RootError {
    #[error("registry has not completed setup")]
    NotSetup,
    #[error("registry has been torn down")]
    TornDown,
    #[error("registry setup failed permanently")]
    Invalid,
    #[error("caller does not hold the domain lock")]
    NoDomainLock,
    #[error("backing pool allocation failed")]
    OutOfMemory,
}

thread_local! {
    /// Per-thread "errno" for the hot-path calls that can only report
    /// failure as `None`/`false` (`create`, `modify`): set on failure,
    /// left untouched on success, exactly like libc's `errno` is only
    /// meaningful right after a call that reported an error.
    static LAST_ERROR: Cell<Option<RootError>> = Cell::new(None);
}

pub(crate) fn set_last_error(e: RootError) {
    LAST_ERROR.with(|c| c.set(Some(e)));
}

/// The reason the calling thread's most recent `create`/`modify` failed,
/// if it did. Mirrors the original design's `errno`-style reporting
/// (`EPERM` for a missing domain lock, `ENOMEM` for backing-store
/// exhaustion) without tying this crate to POSIX's actual `errno`.
pub fn last_error() -> Option<RootError> {
    LAST_ERROR.with(|c| c.get())
}

/// Snapshot of registry lifecycle state, readable at any time without a
/// lock. Mirrors the status enum from the original design; `NotSetup`
/// and `Invalid` exist for parity with that taxonomy even though a
/// `Registry` is only ever constructed already `Running` here — Rust's
/// constructor replaces the original's separate one-shot setup call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryStatus {
    NotSetup,
    Running,
    TornDown,
    Invalid,
}

impl RegistryStatus {
    pub fn is_usable(self) -> bool {
        matches!(self, RegistryStatus::Running)
    }
}

impl From<RootError> for RegistryStatus {
    fn from(e: RootError) -> Self {
        match e {
            RootError::NotSetup => RegistryStatus::NotSetup,
            RootError::TornDown => RegistryStatus::TornDown,
            RootError::Invalid => RegistryStatus::Invalid,
            // these don't represent a lifecycle state change
            RootError::NoDomainLock | RootError::OutOfMemory => RegistryStatus::Running,
        }
    }
}
