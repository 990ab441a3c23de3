//! Transaction coordinator: scheduling, retry, and deadlock detection.
//!
//! The manager owns every site, every live transaction record, the FIFO
//! waiting queue, and the wait-for graph. The driver feeds it one
//! timestamped event at a time; each handler returns the ordered outcomes
//! it produced, including cascaded effects when a commit, abort, or
//! recovery lets queued operations complete.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::site::Site;
use crate::storage::{SiteId, Timestamp, TransactionId, Value, VariableId};
use crate::transaction::context::{AbortReason, Transaction, TransactionKind};
use crate::transaction::operation::{Operation, OperationKind};
use crate::transaction::outcome::{DumpEntry, DumpReport, Outcome, SiteDump};
use crate::transaction::waits_for::WaitsForGraph;

/// Top-level orchestrator of the simulated cluster.
pub struct TransactionManager {
    sites: BTreeMap<SiteId, Site>,
    transactions: BTreeMap<TransactionId, Transaction>,
    /// Operations that could not run, in arrival order.
    waiting: Vec<Operation>,
    waits_for: WaitsForGraph,
    /// Outcomes accumulated while handling the current event.
    trace: Vec<Outcome>,
}

impl TransactionManager {
    pub fn new() -> Self {
        Self {
            sites: SiteId::all().map(|sid| (sid, Site::new(sid))).collect(),
            transactions: BTreeMap::new(),
            waiting: Vec::new(),
            waits_for: WaitsForGraph::new(),
            trace: Vec::new(),
        }
    }

    /// Begin a read-write transaction. No-op when `tid` already exists.
    pub fn begin(&mut self, tid: TransactionId, ts: Timestamp) -> Vec<Outcome> {
        if !self.transactions.contains_key(&tid) {
            self.transactions
                .insert(tid, Transaction::new(tid, ts, TransactionKind::ReadWrite));
            self.waits_for.add_node(tid);
            self.trace.push(Outcome::Began { tid, read_only: false });
            debug!(%tid, %ts, "read-write transaction begins");
        }
        self.take_trace()
    }

    /// Begin a read-only transaction. No-op when `tid` already exists.
    ///
    /// Read-only transactions never lock, so they get no wait-for node.
    pub fn begin_read_only(&mut self, tid: TransactionId, ts: Timestamp) -> Vec<Outcome> {
        if !self.transactions.contains_key(&tid) {
            self.transactions
                .insert(tid, Transaction::new(tid, ts, TransactionKind::ReadOnly));
            self.trace.push(Outcome::Began { tid, read_only: true });
            debug!(%tid, %ts, "read-only transaction begins");
        }
        self.take_trace()
    }

    /// Read `vid` on behalf of `tid`. No-op for unknown transactions.
    pub fn read(&mut self, tid: TransactionId, vid: VariableId, ts: Timestamp) -> Vec<Outcome> {
        if self.transactions.contains_key(&tid) {
            let op = Operation::read(ts, tid, vid);
            self.attempt(&op);
        }
        self.take_trace()
    }

    /// Write `value` to every live copy of `vid`. No-op for unknown
    /// transactions.
    pub fn write(
        &mut self,
        tid: TransactionId,
        vid: VariableId,
        value: Value,
        ts: Timestamp,
    ) -> Vec<Outcome> {
        if self.transactions.contains_key(&tid) {
            let op = Operation::write(ts, tid, vid, value);
            self.attempt(&op);
        }
        self.take_trace()
    }

    /// Finish `tid`: commit unless a site failure flagged it for abort.
    pub fn end(&mut self, tid: TransactionId, ts: Timestamp) -> Vec<Outcome> {
        let Some(txn) = self.transactions.get(&tid) else {
            return self.take_trace();
        };
        let pending_abort = txn.abort_pending();
        let kind = txn.kind();
        let accessed: Vec<SiteId> = txn.accessed_sites().collect();

        match pending_abort {
            Some(reason) => {
                self.trace.push(Outcome::Aborted { tid, reason });
                info!(%tid, %reason, "transaction aborts at end");
                self.abort(tid);
            }
            None => {
                if kind == TransactionKind::ReadWrite {
                    for sid in accessed {
                        if let Some(site) = self.sites.get_mut(&sid) {
                            site.commit(tid, ts);
                        }
                    }
                }
                self.trace.push(Outcome::Committed { tid });
                debug!(%tid, %ts, "transaction commits");
                self.remove_transaction(tid);
                self.retry();
            }
        }
        self.take_trace()
    }

    /// A site goes down: its locks and in-flight work are void, and every
    /// transaction that touched it is flagged to abort at its `end`.
    pub fn fail(&mut self, sid: SiteId) -> Vec<Outcome> {
        if let Some(site) = self.sites.get_mut(&sid) {
            site.fail();
            for txn in self.transactions.values_mut() {
                if txn.has_accessed(sid) {
                    txn.flag_abort(AbortReason::SiteFailure);
                }
            }
            self.trace.push(Outcome::SiteFailed { sid });
            info!(%sid, "site fails");
        }
        self.take_trace()
    }

    /// A site comes back; queued operations may now be able to run.
    pub fn recover(&mut self, sid: SiteId) -> Vec<Outcome> {
        if let Some(site) = self.sites.get_mut(&sid) {
            site.recover();
            self.trace.push(Outcome::SiteRecovered { sid });
            info!(%sid, "site recovers");
            self.retry();
        }
        self.take_trace()
    }

    /// Committed values of every variable at every site, including sites
    /// that are down.
    pub fn dump(&self) -> DumpReport {
        DumpReport {
            sites: self
                .sites
                .values()
                .map(|site| SiteDump {
                    sid: site.id(),
                    active: site.is_active(),
                    entries: site
                        .committed_values()
                        .into_iter()
                        .map(|(vid, value)| DumpEntry { vid, value })
                        .collect(),
                })
                .collect(),
        }
    }

    pub fn active_transaction_count(&self) -> usize {
        self.transactions.len()
    }

    /// Live transaction records, ascending by id.
    pub fn transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.values()
    }

    pub fn sites_up(&self) -> usize {
        self.sites.values().filter(|s| s.is_active()).count()
    }

    pub fn waiting_operations(&self) -> usize {
        self.waiting.len()
    }

    pub fn site(&self, sid: SiteId) -> Option<&Site> {
        self.sites.get(&sid)
    }

    fn take_trace(&mut self) -> Vec<Outcome> {
        std::mem::take(&mut self.trace)
    }

    /// Try to run `op` now. Shared by fresh driver events and `retry`.
    /// Returns true when the operation completed.
    fn attempt(&mut self, op: &Operation) -> bool {
        let Some(txn) = self.transactions.get(&op.tid) else {
            return false;
        };
        let kind = txn.kind();
        let start_ts = txn.start_ts();

        // Arrival order is preserved: a conflicting older request that is
        // still waiting goes first, even if this one could run.
        if self.has_earlier_conflict(op) {
            self.block(op);
            return false;
        }

        let executed = match op.kind {
            OperationKind::Read => self.execute_read(op, kind, start_ts),
            OperationKind::Write(value) => self.execute_write(op, kind, value),
        };
        if executed {
            if let Some(txn) = self.transactions.get_mut(&op.tid) {
                txn.unblock();
            }
            true
        } else {
            self.block(op);
            false
        }
    }

    /// A strictly earlier waiting operation on the same variable by another
    /// transaction. Writes queue behind any earlier operation; reads only
    /// behind earlier writes.
    fn has_earlier_conflict(&self, op: &Operation) -> bool {
        self.waiting.iter().any(|queued| {
            queued.ts < op.ts
                && queued.vid == op.vid
                && queued.tid != op.tid
                && (op.is_write() || queued.is_write())
        })
    }

    /// Serve a read from the first live site with a readable copy,
    /// scanning in ascending site order.
    fn execute_read(&mut self, op: &Operation, kind: TransactionKind, start_ts: Timestamp) -> bool {
        for sid in SiteId::all() {
            let value = match self.sites.get_mut(&sid) {
                Some(site) => site.read(kind, start_ts, op),
                None => None,
            };
            if let Some(value) = value {
                if let Some(txn) = self.transactions.get_mut(&op.tid) {
                    txn.record_access(sid);
                }
                self.trace.push(Outcome::Read { tid: op.tid, vid: op.vid, value });
                debug!(tid = %op.tid, vid = %op.vid, value, site = %sid, "read served");
                return true;
            }
        }
        false
    }

    /// Apply a write to every live site holding the variable, or to none.
    fn execute_write(&mut self, op: &Operation, kind: TransactionKind, value: Value) -> bool {
        let holding: Vec<SiteId> = self
            .sites
            .values()
            .filter(|site| site.is_active() && site.holds(op.vid))
            .map(|site| site.id())
            .collect();
        // With every copy down there is nothing to write to; wait for a
        // recovery instead of "succeeding" nowhere.
        if holding.is_empty() {
            return false;
        }
        let admissible = holding.iter().all(|sid| {
            self.sites
                .get(sid)
                .is_some_and(|site| site.can_write(kind, op))
        });
        if !admissible {
            return false;
        }
        for sid in &holding {
            if let Some(site) = self.sites.get_mut(sid) {
                site.write(kind, op);
            }
            if let Some(txn) = self.transactions.get_mut(&op.tid) {
                txn.record_access(*sid);
            }
        }
        self.trace.push(Outcome::Wrote { tid: op.tid, vid: op.vid, value });
        debug!(tid = %op.tid, vid = %op.vid, value, sites = holding.len(), "write staged");
        true
    }

    /// Mark the transaction blocked, queue the operation (once), refresh
    /// wait-for edges, and look for a deadlock.
    fn block(&mut self, op: &Operation) {
        if let Some(txn) = self.transactions.get_mut(&op.tid) {
            txn.block();
        }
        if !self.waiting.iter().any(|queued| queued.same_request(op)) {
            self.waiting.push(*op);
            self.trace.push(Outcome::Blocked { tid: op.tid });
            debug!(tid = %op.tid, vid = %op.vid, "operation blocked and queued");
        }
        self.update_waits_for(op);
        self.detect_deadlock(op.tid);
    }

    /// Add edges from `op.tid` to the owners of conflicting earlier queued
    /// operations and to the lock holders of the contested variable at
    /// every live site holding it.
    fn update_waits_for(&mut self, op: &Operation) {
        if !self.waits_for.contains(op.tid) {
            // Read-only transactions never hold anyone up and cannot
            // deadlock; they have no node.
            return;
        }
        let queue_owners: Vec<TransactionId> = self
            .waiting
            .iter()
            .filter(|queued| {
                queued.ts < op.ts
                    && queued.vid == op.vid
                    && queued.tid != op.tid
                    && (op.is_write() || queued.is_write())
            })
            .map(|queued| queued.tid)
            .collect();
        let holders: Vec<TransactionId> = self
            .sites
            .values()
            .filter(|site| site.is_active() && site.holds(op.vid))
            .flat_map(|site| site.lock_holders(op.vid))
            .filter(|holder| *holder != op.tid)
            .collect();
        for other in queue_owners.into_iter().chain(holders) {
            self.waits_for.add_edge(op.tid, other);
        }
    }

    /// DFS from the just-blocked transaction; on a cycle, abort the member
    /// with the greatest start timestamp (ties: smallest id).
    fn detect_deadlock(&mut self, tid: TransactionId) {
        let Some(cycle) = self.waits_for.find_cycle_from(tid) else {
            return;
        };
        let victim = cycle.iter().copied().max_by_key(|member| {
            let start = self
                .transactions
                .get(member)
                .map(|t| t.start_ts())
                .unwrap_or(Timestamp::ZERO);
            (start, std::cmp::Reverse(member.as_u32()))
        });
        let Some(victim) = victim else { return };
        info!(%victim, ?cycle, "deadlock detected, aborting youngest member");
        self.trace.push(Outcome::Aborted { tid: victim, reason: AbortReason::Deadlock });
        self.abort(victim);
    }

    /// Tear `tid` down completely: locks at every site, queue entries,
    /// graph node and inbound edges, and the record itself. Then let
    /// waiters have another go.
    fn abort(&mut self, tid: TransactionId) {
        for site in self.sites.values_mut() {
            site.abort(tid);
        }
        self.remove_transaction(tid);
        self.retry();
    }

    fn remove_transaction(&mut self, tid: TransactionId) {
        self.waiting.retain(|op| op.tid != tid);
        self.waits_for.remove(tid);
        self.transactions.remove(&tid);
    }

    /// One FIFO pass over the waiting queue, re-attempting each operation
    /// and removing the ones that complete. An operation that completes
    /// early in the pass can unblock a later one in the same pass.
    fn retry(&mut self) {
        let snapshot = self.waiting.clone();
        for op in snapshot {
            // A nested abort earlier in this pass may have purged it.
            if !self.waiting.iter().any(|queued| queued.same_request(&op)) {
                continue;
            }
            if !self.transactions.contains_key(&op.tid) {
                self.waiting.retain(|queued| !queued.same_request(&op));
                continue;
            }
            if self.attempt(&op) {
                self.waiting.retain(|queued| !queued.same_request(&op));
            }
        }
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}
