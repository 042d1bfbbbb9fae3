//! The seam between this crate and the host runtime's moving,
//! generational collector. [`Host`] makes the external collaborators
//! described in the public surface (scan-roots hook, minor/major
//! timing, domain termination, scanning action, and the predicates a
//! scan loop needs) into a concrete trait, so the protocol in
//! [`crate::registry`] can be driven by a fake host under test instead
//! of a real moving GC.

use crate::pool::DomainId;
use crate::slot::Value;

/// What triggered a scan: decides which rings get walked and whether
/// the specialized young-only loop applies.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ScanKind {
    /// Minor collection: only young/current pools are visited.
    Minor,
    /// Major collection or full root enumeration: young and old.
    Major,
}

/// Host-provided predicates and the scanning action itself.
///
/// A real binding to a host runtime implements this directly against
/// the runtime's GC; tests implement it against an in-process fake
/// that tracks which blocks are young and records every rewrite.
pub trait Host {
    /// Is `v` a pointer into the host heap (as opposed to an immediate)?
    fn is_block(&self, v: Value) -> bool;

    /// Is `v` a pointer into the young generation? Only ever called on
    /// values for which `is_block` is true.
    fn is_young(&self, v: Value) -> bool;

    /// The current domain id for whichever thread is calling in. Used
    /// to decide whether a `delete` can take the local fast path.
    fn current_domain_id(&self) -> DomainId;

    /// Does the calling thread hold the lock for `domain`? `delete` and
    /// `modify` take the local path only when this is true and the
    /// domain matches the pool's owner.
    fn domain_lock_held(&self, domain: DomainId) -> bool;

    /// Invoked once per allocated root slot during a scan. The host
    /// may rewrite the cell in place (via the callback's access to the
    /// slot) when the collector relocates `value`.
    ///
    /// Takes `&self`, not `&mut self`: scans only ever happen under
    /// the host's own stop-the-world section, so the implementation is
    /// free to use interior mutability and relies on that external
    /// exclusivity rather than on Rust's borrow checker for it.
    fn scan_action(&self, kind: ScanKind, value: Value, slot: &mut Value);

    /// Enroll `slot` in the host's remembered-set equivalent. Used by
    /// `modify`'s slow path when reallocating the handle fails: the
    /// value is written in place instead, and this keeps the old
    /// generation's write barrier honest until the next GC fixes the
    /// classification up.
    fn remember(&self, slot: &mut Value);
}
