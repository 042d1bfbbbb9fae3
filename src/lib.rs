//! A pool-allocated registry of GC roots for a host runtime with a
//! moving, generational collector.
//!
//! A *root* is a cell outside the host heap that the collector must
//! treat as live and may rewrite when the value it holds moves. Roots
//! are handed out as opaque [`Handle`]s backed by slots carved out of
//! page-aligned [`pool::Pool`]s; the hot path (`create`/`get`/`get_ref`/
//! `modify`/`delete`) touches only the allocating domain's own data
//! structures, and the registry's interaction with the collector is a
//! small [`Host`] trait rather than a hard dependency on one runtime.
//!
//! See [`registry::Registry`] for the entry point.

pub mod config;
pub mod domain;
pub mod error;
pub mod host;
pub mod orphan;
pub mod platform;
pub mod pool;
pub mod registry;
pub mod ring;
pub mod slot;
pub mod stats;

pub use config::Config;
pub use error::{last_error, RegistryStatus, RootError};
pub use host::{Host, ScanKind};
pub use registry::Registry;
pub use slot::{Handle, Value};
pub use stats::Stats;
