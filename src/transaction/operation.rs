//! A pending read or write request.
//!
//! Operations are created for every read/write event the driver issues.
//! One that cannot execute immediately sits in the coordinator's waiting
//! queue, identified by its (transaction, timestamp) pair, until a retry
//! pass completes it or its transaction terminates.

use serde::{Deserialize, Serialize};

use crate::storage::{Timestamp, TransactionId, Value, VariableId};

/// What the operation does; writes carry their payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    Read,
    Write(Value),
}

/// One read or write request against a single variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Logical time the driver issued the request. Retries keep it.
    pub ts: Timestamp,
    pub tid: TransactionId,
    pub vid: VariableId,
    pub kind: OperationKind,
}

impl Operation {
    pub fn read(ts: Timestamp, tid: TransactionId, vid: VariableId) -> Self {
        Self { ts, tid, vid, kind: OperationKind::Read }
    }

    pub fn write(ts: Timestamp, tid: TransactionId, vid: VariableId, value: Value) -> Self {
        Self { ts, tid, vid, kind: OperationKind::Write(value) }
    }

    pub fn is_write(&self) -> bool {
        matches!(self.kind, OperationKind::Write(_))
    }

    pub fn write_value(&self) -> Option<Value> {
        match self.kind {
            OperationKind::Write(v) => Some(v),
            OperationKind::Read => None,
        }
    }

    /// Queue identity: the driver hands out one timestamp per event, so
    /// (tid, ts) names this request across retries.
    pub fn same_request(&self, other: &Operation) -> bool {
        self.tid == other.tid && self.ts == other.ts
    }
}
