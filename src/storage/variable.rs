//! Versioned storage cell for a single variable copy.
//!
//! Each site keeps one `Variable` per variable it hosts. The cell records
//! the full committed history keyed by commit timestamp (the multiversion
//! half of the engine), a single staged-but-uncommitted value (the locking
//! half), and a readability flag driven by site failure and recovery.

use std::collections::BTreeMap;

use crate::storage::types::{Timestamp, TransactionId, Value, VariableId};

/// One copy of one variable at one site.
#[derive(Debug, Clone)]
pub struct Variable {
    id: VariableId,
    /// Value staged by the current exclusive-lock holder, if any.
    pending_value: Value,
    /// Transaction that staged `pending_value`. Abandoned on abort and
    /// simply overwritten by the next writer.
    pending_owner: Option<TransactionId>,
    /// Committed value at the greatest history key.
    last_committed: Value,
    /// Commit timestamp -> committed value, keys strictly increasing.
    history: BTreeMap<Timestamp, Value>,
    /// False while the copy cannot serve reads (site down, or a replicated
    /// copy on a recovered site that has not seen a fresh commit yet).
    readable: bool,
}

impl Variable {
    /// Create the cell with its initial value committed at time zero.
    pub fn new(id: VariableId) -> Self {
        let initial = id.initial_value();
        let mut history = BTreeMap::new();
        history.insert(Timestamp::ZERO, initial);
        Self {
            id,
            pending_value: initial,
            pending_owner: None,
            last_committed: initial,
            history,
            readable: true,
        }
    }

    pub fn id(&self) -> VariableId {
        self.id
    }

    pub fn is_readable(&self) -> bool {
        self.readable
    }

    /// Committed value with the greatest commit timestamp `<= ts`.
    ///
    /// The time-zero seed guarantees a match for any driver timestamp.
    pub fn read_as_of(&self, ts: Timestamp) -> Value {
        self.history
            .range(..=ts)
            .next_back()
            .map(|(_, value)| *value)
            .unwrap_or(0)
    }

    /// Most recently committed value.
    pub fn last_committed(&self) -> Value {
        self.last_committed
    }

    pub fn pending_value(&self) -> Value {
        self.pending_value
    }

    pub fn pending_owner(&self) -> Option<TransactionId> {
        self.pending_owner
    }

    /// Stage an uncommitted value on behalf of `tid`. Committed history is
    /// untouched until `commit`.
    pub fn stage_write(&mut self, tid: TransactionId, value: Value) {
        self.pending_value = value;
        self.pending_owner = Some(tid);
    }

    /// Promote the staged value into committed history at `ts`.
    ///
    /// Also restores readability: a fresh commit is what proves a recovered
    /// replicated copy is current again.
    pub fn commit(&mut self, ts: Timestamp) {
        self.last_committed = self.pending_value;
        self.history.insert(ts, self.last_committed);
        self.readable = true;
    }

    /// Site failure: committed state survives, but the copy stops serving
    /// reads. Pending state is left as-is.
    pub fn fail(&mut self) {
        self.readable = false;
    }

    /// Site recovery. A non-replicated variable is the only copy in the
    /// system, so it cannot have missed a write and is readable at once. A
    /// replicated copy stays unreadable until the next commit lands here,
    /// though it accepts locks and staged writes immediately.
    pub fn recover(&mut self) {
        if !self.id.is_replicated() {
            self.readable = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vid(k: u32) -> VariableId {
        VariableId::new(k).unwrap()
    }

    #[test]
    fn test_initial_state() {
        let v = Variable::new(vid(3));
        assert_eq!(v.last_committed(), 30);
        assert_eq!(v.read_as_of(Timestamp::ZERO), 30);
        assert!(v.is_readable());
        assert_eq!(v.pending_owner(), None);
    }

    #[test]
    fn test_stage_then_commit() {
        let mut v = Variable::new(vid(2));
        let t1 = TransactionId::new(1);
        v.stage_write(t1, 99);
        // Staged value is invisible to committed reads.
        assert_eq!(v.last_committed(), 20);
        assert_eq!(v.pending_value(), 99);
        assert_eq!(v.pending_owner(), Some(t1));

        v.commit(Timestamp::new(5));
        assert_eq!(v.last_committed(), 99);
        assert_eq!(v.read_as_of(Timestamp::new(5)), 99);
    }

    #[test]
    fn test_snapshot_reads() {
        let mut v = Variable::new(vid(4));
        v.stage_write(TransactionId::new(1), 41);
        v.commit(Timestamp::new(3));
        v.stage_write(TransactionId::new(2), 42);
        v.commit(Timestamp::new(7));

        assert_eq!(v.read_as_of(Timestamp::new(2)), 40);
        assert_eq!(v.read_as_of(Timestamp::new(3)), 41);
        assert_eq!(v.read_as_of(Timestamp::new(6)), 41);
        assert_eq!(v.read_as_of(Timestamp::new(7)), 42);
        assert_eq!(v.read_as_of(Timestamp::new(100)), 42);
    }

    #[test]
    fn test_fail_keeps_committed_state() {
        let mut v = Variable::new(vid(6));
        v.stage_write(TransactionId::new(1), 61);
        v.fail();
        assert!(!v.is_readable());
        assert_eq!(v.last_committed(), 60);
        assert_eq!(v.pending_value(), 61);
    }

    #[test]
    fn test_recover_non_replicated_readable_immediately() {
        let mut v = Variable::new(vid(5));
        v.fail();
        v.recover();
        assert!(v.is_readable());
    }

    #[test]
    fn test_recover_replicated_waits_for_commit() {
        let mut v = Variable::new(vid(8));
        v.fail();
        v.recover();
        assert!(!v.is_readable());

        // A fresh commit proves the copy current again.
        v.stage_write(TransactionId::new(3), 88);
        v.commit(Timestamp::new(9));
        assert!(v.is_readable());
        assert_eq!(v.last_committed(), 88);
    }
}
