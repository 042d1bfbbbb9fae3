//! Compile-time layout constants plus the handful of knobs that are
//! safe to vary per [`Registry`](crate::registry::Registry).
//!
//! The performance-critical constants (pool size, dealloc threshold)
//! stay `const` so slot arithmetic in the hot path keeps inlining the
//! way it does in the original design; [`Config`] covers the rest.

/// log2 of the pool size in bytes. 14 => 16 KiB pools, matching the
/// recommended default.
pub const POOL_LOG_SIZE: u32 = 14;

/// Size in bytes of one pool. Always a power of two.
pub const POOL_SIZE: usize = 1 << POOL_LOG_SIZE;

/// Number of allocated slots at which a pool crosses from "recently
/// freed from" back toward reuse consideration. Must be a power of two
/// so the threshold test in `delete` reduces to a mask.
pub const DEALLOC_THRESHOLD: usize = POOL_SIZE / 2;

const _: () = assert!(DEALLOC_THRESHOLD.is_power_of_two());
const _: () = assert!(POOL_SIZE.is_power_of_two());

/// Runtime configuration for a [`Registry`](crate::registry::Registry).
///
/// Distinct from the constants above: these are instance-level choices
/// that don't affect slot layout, so they can vary between a production
/// registry and a test registry in the same process.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether more than one domain may call into the registry
    /// concurrently. Informational: the registry doesn't branch on it
    /// directly, but a single-threaded host's `Host` impl naturally
    /// always reports its one domain's lock as held, so `delete` never
    /// actually takes the remote path in that case either. Logged at
    /// startup to make the deployment shape visible.
    pub multithreaded: bool,
    /// Testing only: force every `delete` through the remote/delayed
    /// path even when the caller holds the owning domain's lock. Lets
    /// tests exercise the delayed-list drain without truly concurrent
    /// domains.
    pub force_remote: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            multithreaded: true,
            force_remote: cfg!(feature = "force_remote"),
        }
    }
}

impl Config {
    pub fn single_threaded() -> Self {
        Config {
            multithreaded: false,
            force_remote: false,
        }
    }
}
