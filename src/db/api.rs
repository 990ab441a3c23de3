//! Database facade: the engine plus the logical clock behind one handle.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;

use crate::command::{Command, ParseError, Parser};
use crate::storage::{Timestamp, TransactionId};
use crate::transaction::{DumpReport, Outcome, TransactionManager};

/// Result type for database operations.
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Errors surfaced to the driver. The engine itself never errors; illegal
/// events are no-ops, so everything here comes from parsing or I/O.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// What one command produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CommandResult {
    /// Outcome trace from a state-changing event.
    Trace(Vec<Outcome>),
    /// Cluster snapshot from `dump()`.
    Dump(DumpReport),
}

/// Point-in-time counters for the cluster.
#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub active_transactions: usize,
    pub sites_up: usize,
    pub events_processed: u64,
    pub opened_at: chrono::DateTime<chrono::Utc>,
}

/// Summary of one live transaction.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionInfo {
    pub tid: TransactionId,
    pub read_only: bool,
    pub start_ts: Timestamp,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

struct DatabaseInner {
    engine: TransactionManager,
    /// Logical clock; advances once per applied command, dumps included.
    clock: Timestamp,
    events: u64,
    opened_at: chrono::DateTime<chrono::Utc>,
}

/// The main database handle.
///
/// Cloneable and shareable across threads: all state sits behind one
/// mutex, which also serializes events the way the engine requires.
#[derive(Clone)]
pub struct Database {
    inner: Arc<Mutex<DatabaseInner>>,
}

impl Database {
    /// Create a fresh cluster: ten live sites, twenty variables at their
    /// initial values, logical clock at zero.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(DatabaseInner {
                engine: TransactionManager::new(),
                clock: Timestamp::ZERO,
                events: 0,
                opened_at: chrono::Utc::now(),
            })),
        }
    }

    /// Parse and apply one script line. `Ok(None)` for blanks and comments.
    pub fn execute(&self, line: &str) -> DatabaseResult<Option<CommandResult>> {
        match Parser::parse_line(line)? {
            None => Ok(None),
            Some(cmd) => Ok(Some(self.apply(&cmd))),
        }
    }

    /// Apply one parsed command at the next clock tick.
    pub fn apply(&self, cmd: &Command) -> CommandResult {
        let mut inner = self.inner.lock();
        inner.clock = inner.clock.next();
        inner.events += 1;
        let ts = inner.clock;

        match *cmd {
            Command::Begin { tid } => CommandResult::Trace(inner.engine.begin(tid, ts)),
            Command::BeginReadOnly { tid } => {
                CommandResult::Trace(inner.engine.begin_read_only(tid, ts))
            }
            Command::Read { tid, vid } => {
                CommandResult::Trace(inner.engine.read(tid, vid, ts))
            }
            Command::Write { tid, vid, value } => {
                CommandResult::Trace(inner.engine.write(tid, vid, value, ts))
            }
            Command::End { tid } => CommandResult::Trace(inner.engine.end(tid, ts)),
            Command::Fail { sid } => CommandResult::Trace(inner.engine.fail(sid)),
            Command::Recover { sid } => CommandResult::Trace(inner.engine.recover(sid)),
            Command::Dump => CommandResult::Dump(inner.engine.dump()),
        }
    }

    /// Current logical clock value.
    pub fn now(&self) -> Timestamp {
        self.inner.lock().clock
    }

    pub fn stats(&self) -> Stats {
        let inner = self.inner.lock();
        Stats {
            active_transactions: inner.engine.active_transaction_count(),
            sites_up: inner.engine.sites_up(),
            events_processed: inner.events,
            opened_at: inner.opened_at,
        }
    }

    /// Live transactions, ascending by id.
    pub fn active_transactions(&self) -> Vec<TransactionInfo> {
        let inner = self.inner.lock();
        inner
            .engine
            .transactions()
            .map(|txn| TransactionInfo {
                tid: txn.id(),
                read_only: txn.is_read_only(),
                start_ts: txn.start_ts(),
                started_at: txn.started_at(),
            })
            .collect()
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("Database")
            .field("active_transactions", &stats.active_transactions)
            .field("sites_up", &stats.sites_up)
            .field("events_processed", &stats.events_processed)
            .finish()
    }
}
