//! Lock table for one variable on one site.
//!
//! Strict two-phase locking with shared/exclusive modes and in-place
//! shared-to-exclusive upgrade. Locks are only ever released by transaction
//! termination or site failure, never mid-transaction.

use crate::storage::{TransactionId, VariableId};

/// Lock modes for read and write intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Read intent; any number of compatible holders.
    Shared,
    /// Write intent; a single holder, incompatible with everything else.
    Exclusive,
}

/// A lock held by one transaction on one variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lock {
    pub tid: TransactionId,
    pub vid: VariableId,
    pub mode: LockMode,
}

/// Owns the locks for a single variable copy.
///
/// Invariants: at most one exclusive lock exists at a time; a transaction
/// holds at most one lock here (its mode may be upgraded in place).
#[derive(Debug, Clone)]
pub struct LockManager {
    vid: VariableId,
    locks: Vec<Lock>,
}

impl LockManager {
    pub fn new(vid: VariableId) -> Self {
        Self { vid, locks: Vec::new() }
    }

    pub fn vid(&self) -> VariableId {
        self.vid
    }

    /// Whether `tid` could take a lock of `mode` right now.
    ///
    /// Shared is blocked only by a foreign exclusive lock. Exclusive needs
    /// the table empty, or to contain exactly `tid`'s own lock (the upgrade
    /// path).
    pub fn can_acquire(&self, mode: LockMode, tid: TransactionId) -> bool {
        match mode {
            LockMode::Shared => !self
                .locks
                .iter()
                .any(|l| l.mode == LockMode::Exclusive && l.tid != tid),
            LockMode::Exclusive => {
                self.locks.is_empty()
                    || (self.locks.len() == 1 && self.locks[0].tid == tid)
            }
        }
    }

    /// Take or upgrade a lock. No-op when not grantable.
    pub fn acquire(&mut self, mode: LockMode, tid: TransactionId) {
        if !self.can_acquire(mode, tid) {
            return;
        }
        match self.locks.iter_mut().find(|l| l.tid == tid) {
            Some(existing) => {
                // Shared on top of an existing lock changes nothing;
                // exclusive upgrades in place.
                if mode == LockMode::Exclusive {
                    existing.mode = LockMode::Exclusive;
                }
            }
            None => {
                self.locks.push(Lock { tid, vid: self.vid, mode });
            }
        }
    }

    /// Drop every lock `tid` holds here.
    pub fn release(&mut self, tid: TransactionId) {
        self.locks.retain(|l| l.tid != tid);
    }

    /// Clear the table. Used on site failure.
    pub fn release_all(&mut self) {
        self.locks.clear();
    }

    /// True iff the exclusive lock, if any, belongs to `tid`.
    pub fn is_exclusive_holder(&self, tid: TransactionId) -> bool {
        self.locks
            .iter()
            .any(|l| l.mode == LockMode::Exclusive && l.tid == tid)
    }

    /// Transactions currently holding any lock, in acquisition order.
    /// Seeds wait-for edges.
    pub fn holders(&self) -> Vec<TransactionId> {
        self.locks.iter().map(|l| l.tid).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
