//! Per-transaction session state.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::storage::{SiteId, Timestamp, TransactionId};

/// Read-only transactions take snapshot reads and never lock; read-write
/// transactions go through two-phase locking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    ReadOnly,
    ReadWrite,
}

/// Why a transaction was (or will be) aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbortReason {
    /// Chosen as the youngest member of a wait-for cycle.
    Deadlock,
    /// A site this transaction had read or written on failed.
    SiteFailure,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Deadlock => write!(f, "deadlock"),
            AbortReason::SiteFailure => write!(f, "site failure"),
        }
    }
}

/// Coordinator-owned record of one live transaction.
///
/// Created on `begin`/`beginRO`, destroyed when the transaction commits or
/// aborts; nothing else holds a reference to it.
#[derive(Debug, Clone)]
pub struct Transaction {
    id: TransactionId,
    kind: TransactionKind,
    /// Logical clock value at `begin`; fixes the snapshot for read-only
    /// transactions and decides deadlock-victim age for read-write ones.
    start_ts: Timestamp,
    blocked: bool,
    /// Set when a site this transaction touched fails; consumed at `end`,
    /// which aborts instead of committing.
    abort_pending: Option<AbortReason>,
    /// Sites this transaction has read or written on.
    accessed: BTreeSet<SiteId>,
    /// Wall-clock begin time, surfaced in stats.
    started_at: chrono::DateTime<chrono::Utc>,
}

impl Transaction {
    pub fn new(id: TransactionId, start_ts: Timestamp, kind: TransactionKind) -> Self {
        Self {
            id,
            kind,
            start_ts,
            blocked: false,
            abort_pending: None,
            accessed: BTreeSet::new(),
            started_at: chrono::Utc::now(),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    pub fn is_read_only(&self) -> bool {
        self.kind == TransactionKind::ReadOnly
    }

    pub fn start_ts(&self) -> Timestamp {
        self.start_ts
    }

    pub fn started_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.started_at
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    pub fn block(&mut self) {
        self.blocked = true;
    }

    pub fn unblock(&mut self) {
        self.blocked = false;
    }

    pub fn abort_pending(&self) -> Option<AbortReason> {
        self.abort_pending
    }

    /// Flag the transaction for abort at its `end`. The first reason wins.
    pub fn flag_abort(&mut self, reason: AbortReason) {
        if self.abort_pending.is_none() {
            self.abort_pending = Some(reason);
        }
    }

    pub fn record_access(&mut self, sid: SiteId) {
        self.accessed.insert(sid);
    }

    pub fn has_accessed(&self, sid: SiteId) -> bool {
        self.accessed.contains(&sid)
    }

    /// Accessed sites in ascending order.
    pub fn accessed_sites(&self) -> impl Iterator<Item = SiteId> + '_ {
        self.accessed.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_flags() {
        let mut t = Transaction::new(
            TransactionId::new(1),
            Timestamp::new(1),
            TransactionKind::ReadWrite,
        );
        assert!(!t.is_blocked());
        t.block();
        assert!(t.is_blocked());
        t.unblock();
        assert!(!t.is_blocked());
    }

    #[test]
    fn test_first_abort_reason_wins() {
        let mut t = Transaction::new(
            TransactionId::new(2),
            Timestamp::new(4),
            TransactionKind::ReadWrite,
        );
        t.flag_abort(AbortReason::SiteFailure);
        t.flag_abort(AbortReason::Deadlock);
        assert_eq!(t.abort_pending(), Some(AbortReason::SiteFailure));
    }

    #[test]
    fn test_accessed_sites_ordered() {
        let mut t = Transaction::new(
            TransactionId::new(3),
            Timestamp::new(2),
            TransactionKind::ReadWrite,
        );
        t.record_access(SiteId::new(7).unwrap());
        t.record_access(SiteId::new(2).unwrap());
        t.record_access(SiteId::new(7).unwrap());
        let sites: Vec<u32> = t.accessed_sites().map(|s| s.as_u32()).collect();
        assert_eq!(sites, vec![2, 7]);
        assert!(t.has_accessed(SiteId::new(2).unwrap()));
        assert!(!t.has_accessed(SiteId::new(3).unwrap()));
    }
}
