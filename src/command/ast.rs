//! Parsed driver commands.

use serde::{Deserialize, Serialize};

use crate::storage::{SiteId, TransactionId, Value, VariableId};

/// One driver event, as written in a script line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// `begin(T1)`: start a read-write transaction.
    Begin { tid: TransactionId },
    /// `beginRO(T2)`: start a read-only (snapshot) transaction.
    BeginReadOnly { tid: TransactionId },
    /// `R(T1,x4)`: read a variable.
    Read { tid: TransactionId, vid: VariableId },
    /// `W(T1,x4,101)`: write a value to every live copy.
    Write { tid: TransactionId, vid: VariableId, value: Value },
    /// `end(T1)`: commit or, if flagged by a site failure, abort.
    End { tid: TransactionId },
    /// `fail(2)`: take a site down.
    Fail { sid: SiteId },
    /// `recover(2)`: bring a site back.
    Recover { sid: SiteId },
    /// `dump()`: report committed values at every site.
    Dump,
}
