//! One site of the cluster: its variables, lock tables, and availability.

use std::collections::BTreeMap;

use tracing::debug;

use crate::site::lock::{LockManager, LockMode};
use crate::storage::{SiteId, Timestamp, TransactionId, Value, Variable, VariableId};
use crate::transaction::{Operation, TransactionKind};

/// A data manager for one site.
///
/// Owns a `Variable` and a `LockManager` for exactly the variables the
/// replication rule assigns it, and applies the site-local availability
/// rules for reads and writes.
#[derive(Debug, Clone)]
pub struct Site {
    id: SiteId,
    active: bool,
    variables: BTreeMap<VariableId, Variable>,
    locks: BTreeMap<VariableId, LockManager>,
}

impl Site {
    pub fn new(id: SiteId) -> Self {
        let mut variables = BTreeMap::new();
        let mut locks = BTreeMap::new();
        for vid in VariableId::all() {
            if vid.is_replicated() || vid.home_site() == Some(id) {
                variables.insert(vid, Variable::new(vid));
                locks.insert(vid, LockManager::new(vid));
            }
        }
        Self { id, active: true, variables, locks }
    }

    pub fn id(&self) -> SiteId {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether this site stores a copy of `vid`.
    pub fn holds(&self, vid: VariableId) -> bool {
        self.variables.contains_key(&vid)
    }

    /// Whether `op`'s read could be served here right now.
    ///
    /// Read-write transactions additionally need a shared lock to be
    /// grantable; read-only transactions go through MVCC and never lock.
    pub fn can_read(&self, kind: TransactionKind, op: &Operation) -> bool {
        let Some(variable) = self.variables.get(&op.vid) else {
            return false;
        };
        if !self.active || !variable.is_readable() {
            return false;
        }
        match kind {
            TransactionKind::ReadOnly => true,
            TransactionKind::ReadWrite => self
                .locks
                .get(&op.vid)
                .is_some_and(|lm| lm.can_acquire(LockMode::Shared, op.tid)),
        }
    }

    /// Serve a read, acquiring the shared lock for read-write transactions.
    ///
    /// Read-only transactions see the committed value as of their start
    /// timestamp. A read-write transaction sees its own staged value if it
    /// owns the pending write, otherwise the last committed value.
    pub fn read(&mut self, kind: TransactionKind, start_ts: Timestamp, op: &Operation) -> Option<Value> {
        if op.is_write() || !self.can_read(kind, op) {
            return None;
        }
        match kind {
            TransactionKind::ReadOnly => {
                self.variables.get(&op.vid).map(|v| v.read_as_of(start_ts))
            }
            TransactionKind::ReadWrite => {
                self.locks.get_mut(&op.vid)?.acquire(LockMode::Shared, op.tid);
                let variable = self.variables.get(&op.vid)?;
                if variable.pending_owner() == Some(op.tid) {
                    Some(variable.pending_value())
                } else {
                    Some(variable.last_committed())
                }
            }
        }
    }

    /// Whether `op`'s write could be applied here right now.
    pub fn can_write(&self, kind: TransactionKind, op: &Operation) -> bool {
        if !self.active || kind == TransactionKind::ReadOnly || !self.holds(op.vid) {
            return false;
        }
        self.locks
            .get(&op.vid)
            .is_some_and(|lm| lm.can_acquire(LockMode::Exclusive, op.tid))
    }

    /// Take the exclusive lock and stage the value.
    pub fn write(&mut self, kind: TransactionKind, op: &Operation) {
        let Some(value) = op.write_value() else { return };
        if !self.can_write(kind, op) {
            return;
        }
        if let Some(lm) = self.locks.get_mut(&op.vid) {
            lm.acquire(LockMode::Exclusive, op.tid);
        }
        if let Some(variable) = self.variables.get_mut(&op.vid) {
            variable.stage_write(op.tid, value);
        }
    }

    /// Commit every variable `tid` holds exclusively, then release all of
    /// `tid`'s locks here.
    pub fn commit(&mut self, tid: TransactionId, ts: Timestamp) {
        for (vid, lm) in self.locks.iter_mut() {
            if lm.is_exclusive_holder(tid) {
                if let Some(variable) = self.variables.get_mut(vid) {
                    variable.commit(ts);
                }
            }
            lm.release(tid);
        }
    }

    /// Release `tid`'s locks. Staged values are abandoned in place and
    /// overwritten by future writers.
    pub fn abort(&mut self, tid: TransactionId) {
        for lm in self.locks.values_mut() {
            lm.release(tid);
        }
    }

    /// Site failure: committed state survives, everything in flight is void.
    pub fn fail(&mut self) {
        debug!(site = %self.id, "site failing, clearing lock tables");
        self.active = false;
        for variable in self.variables.values_mut() {
            variable.fail();
        }
        for lm in self.locks.values_mut() {
            lm.release_all();
        }
    }

    /// Site recovery: non-replicated variables become readable at once,
    /// replicated copies wait for a fresh commit.
    pub fn recover(&mut self) {
        debug!(site = %self.id, "site recovering");
        self.active = true;
        for variable in self.variables.values_mut() {
            variable.recover();
        }
    }

    /// Transactions holding any lock on `vid` here.
    pub fn lock_holders(&self, vid: VariableId) -> Vec<TransactionId> {
        self.locks.get(&vid).map(|lm| lm.holders()).unwrap_or_default()
    }

    /// Last committed value of every variable held here, ascending by id.
    /// Reported by `dump` whether or not the site is up.
    pub fn committed_values(&self) -> Vec<(VariableId, Value)> {
        self.variables
            .iter()
            .map(|(vid, v)| (*vid, v.last_committed()))
            .collect()
    }

    /// True when no transaction holds any lock on this site.
    pub fn has_no_locks(&self) -> bool {
        self.locks.values().all(|lm| lm.is_empty())
    }
}
