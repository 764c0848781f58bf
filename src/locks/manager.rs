//! Lock Manager for minitxn
//!
//! Implements strict two-phase locking over the bit page's data items:
//! transactions accumulate shared and exclusive locks as they operate and
//! release everything at commit or rollback.
//!
//! ### Acquisition
//! A request scans the item's ordered holder sequence. A holder's own
//! re-request is granted immediately; a shared-to-exclusive upgrade is
//! granted in place only for the sole holder, and otherwise waits like any
//! incompatible request. A denied request records the transaction's single
//! outstanding wait and creates no partial state.
//!
//! ### Deadlock handling
//! "Waiting" is a logical state - nothing blocks. Once per cycle the
//! manager rebuilds the wait-for graph from the waiting set (edge
//! `holder -> waiter`), runs a depth-first search, and extracts the exact
//! cycle when a back-edge closes one. The victim is the cycle member with
//! the fewest completed operations (ties broken by smallest transaction
//! id). With probability `rollback_prob` the victim is rolled back on the
//! spot; otherwise it is marked blocked and the timeout sweep rolls it
//! back once its wait exceeds `timeout` cycles.
//!
//! Rollback delegates to the recovery manager, which reverses the victim's
//! logged updates before the locks are torn down; the recovery manager
//! never calls back into this module.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::database::Database;
use crate::error::Result;
use crate::types::{Did, Trid, TxnProgress};
use crate::wal::RecoveryManager;
use super::list::{LockEntry, LockList, LockMode};

/// Manages locks, waiters, and deadlock resolution
pub struct LockManager {
    /// Holder sequence per data item
    lock_table: HashMap<Did, LockList>,
    /// The single outstanding `(did, mode)` request per blocked transaction
    waiting: BTreeMap<Trid, (Did, LockMode)>,
    /// Mirror of the lock table keyed by transaction, for O(1) release-all
    transaction_locks: HashMap<Trid, BTreeSet<Did>>,
    /// Cycle number at which each blocked transaction first became blocked
    blocked_since: BTreeMap<Trid, u64>,
    /// Probability that a deadlock victim is rolled back immediately
    rollback_prob: f64,
    /// Cycles a transaction may stay blocked before forced rollback
    timeout: u64,
    /// Seeded source for the rollback-probability draw
    rng: StdRng,
}

impl LockManager {
    pub fn new(rollback_prob: f64, timeout: u64, seed: u64) -> Self {
        Self {
            lock_table: HashMap::new(),
            waiting: BTreeMap::new(),
            transaction_locks: HashMap::new(),
            blocked_since: BTreeMap::new(),
            rollback_prob,
            timeout,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Attempt to acquire a lock for `trid` on `did`.
    ///
    /// Returns whether the lock was granted. A denied request records the
    /// wait; the caller retries on a later cycle.
    pub fn acquire(&mut self, trid: Trid, did: Did, mode: LockMode) -> bool {
        let list = self.lock_table.entry(did).or_default();

        if let Some(held) = list.find(trid).map(|e| e.mode) {
            if held == LockMode::Shared && mode == LockMode::Exclusive {
                if list.len() > 1 {
                    // Upgrade must wait for the other shared holders
                    self.waiting.insert(trid, (did, mode));
                    return false;
                }
                list.upgrade(trid);
            }
            self.waiting.remove(&trid);
            return true;
        }

        for holder in list.iter() {
            if !mode.compatible_with(holder.mode) {
                log::debug!(
                    "txn {} waits for {} lock on item {} held by txn {}",
                    trid,
                    mode.as_str(),
                    did,
                    holder.trid
                );
                self.waiting.insert(trid, (did, mode));
                return false;
            }
        }

        list.append(LockEntry { trid, mode });
        self.transaction_locks.entry(trid).or_default().insert(did);
        self.waiting.remove(&trid);
        true
    }

    /// Release `trid`'s lock on `did`; reports whether a holder was removed
    pub fn release(&mut self, trid: Trid, did: Did) -> bool {
        let removed = match self.lock_table.get_mut(&did) {
            Some(list) => list.remove(trid),
            None => false,
        };

        if removed {
            if let Some(held) = self.transaction_locks.get_mut(&trid) {
                held.remove(&did);
                if held.is_empty() {
                    self.transaction_locks.remove(&trid);
                }
            }
        }

        removed
    }

    /// Release every lock held by `trid`.
    ///
    /// Only called when a transaction ends, so its outstanding wait and
    /// blocked mark are dropped along with the locks.
    pub fn release_all(&mut self, trid: Trid) {
        self.waiting.remove(&trid);
        self.blocked_since.remove(&trid);

        let held: Vec<Did> = match self.transaction_locks.get(&trid) {
            Some(dids) => dids.iter().copied().collect(),
            None => return,
        };

        for did in held {
            self.release(trid, did);
        }
    }

    /// End-of-cycle deadlock pass: sweep timeouts, then rebuild the
    /// wait-for graph and resolve at most one detected cycle.
    ///
    /// Returns whether a deadlock was detected.
    pub fn detect_deadlock(
        &mut self,
        active: &mut BTreeMap<Trid, TxnProgress>,
        recovery: &mut RecoveryManager,
        db: &mut Database,
        current_cycle: u64,
    ) -> Result<bool> {
        self.check_timeouts(active, recovery, db, current_cycle)?;

        let graph = self.wait_for_graph();
        if let Some(members) = Self::find_cycle(&graph) {
            log::debug!("wait-for cycle at cycle {}: {:?}", current_cycle, members);
            self.resolve_deadlock(&members, active, recovery, db, current_cycle)?;
            return Ok(true);
        }

        Ok(false)
    }

    /// Roll back every transaction whose blocked age exceeds the timeout
    pub fn check_timeouts(
        &mut self,
        active: &mut BTreeMap<Trid, TxnProgress>,
        recovery: &mut RecoveryManager,
        db: &mut Database,
        current_cycle: u64,
    ) -> Result<()> {
        let expired: Vec<Trid> = self
            .blocked_since
            .iter()
            .filter(|&(_, &since)| current_cycle - since > self.timeout)
            .map(|(&trid, _)| trid)
            .collect();

        for trid in expired {
            log::info!(
                "txn {} exceeded the lock wait timeout; rolling back",
                trid
            );
            self.rollback_victim(trid, active, recovery, db)?;
        }

        Ok(())
    }

    /// Build the disposable wait-for graph: edge `holder -> waiter` for
    /// every holder of an item some other transaction is waiting on.
    fn wait_for_graph(&self) -> BTreeMap<Trid, BTreeSet<Trid>> {
        let mut graph: BTreeMap<Trid, BTreeSet<Trid>> = BTreeMap::new();

        for (&waiter, &(did, _)) in &self.waiting {
            if let Some(list) = self.lock_table.get(&did) {
                for holder in list.iter() {
                    if holder.trid != waiter {
                        graph.entry(holder.trid).or_default().insert(waiter);
                    }
                }
            }
        }

        graph
    }

    /// Depth-first search for a cycle; returns the exact cycle members
    /// (the stack suffix from the re-entered node) when one exists.
    fn find_cycle(graph: &BTreeMap<Trid, BTreeSet<Trid>>) -> Option<Vec<Trid>> {
        let mut visited = BTreeSet::new();
        let mut stack = Vec::new();

        for &node in graph.keys() {
            if !visited.contains(&node) {
                if let Some(cycle) = Self::dfs(node, graph, &mut visited, &mut stack) {
                    return Some(cycle);
                }
            }
        }

        None
    }

    fn dfs(
        node: Trid,
        graph: &BTreeMap<Trid, BTreeSet<Trid>>,
        visited: &mut BTreeSet<Trid>,
        stack: &mut Vec<Trid>,
    ) -> Option<Vec<Trid>> {
        visited.insert(node);
        stack.push(node);

        if let Some(successors) = graph.get(&node) {
            for &next in successors {
                if !visited.contains(&next) {
                    if let Some(cycle) = Self::dfs(next, graph, visited, stack) {
                        return Some(cycle);
                    }
                } else if let Some(pos) = stack.iter().position(|&t| t == next) {
                    // Back-edge into the current path closes a cycle
                    return Some(stack[pos..].to_vec());
                }
            }
        }

        stack.pop();
        None
    }

    /// Pick a victim from the cycle and either roll it back now or mark it
    /// blocked for the timeout sweep.
    ///
    /// Victim: fewest completed operations, ties broken by smallest trid.
    fn resolve_deadlock(
        &mut self,
        members: &[Trid],
        active: &mut BTreeMap<Trid, TxnProgress>,
        recovery: &mut RecoveryManager,
        db: &mut Database,
        current_cycle: u64,
    ) -> Result<()> {
        let victim = members
            .iter()
            .copied()
            .min_by_key(|trid| (active.get(trid).map_or(u32::MAX, |p| p.ops_done), *trid));

        let victim = match victim {
            Some(trid) if active.contains_key(&trid) => trid,
            _ => return Ok(()),
        };

        if self.rng.gen::<f64>() < self.rollback_prob {
            log::info!("deadlock detected; rolling back victim txn {}", victim);
            self.rollback_victim(victim, active, recovery, db)?;
        } else {
            log::debug!(
                "deadlock detected; victim txn {} marked blocked at cycle {}",
                victim,
                current_cycle
            );
            self.blocked_since.entry(victim).or_insert(current_cycle);
        }

        Ok(())
    }

    /// Undo the victim through the log, then tear down its lock state.
    ///
    /// Order matters: the logged updates must be reversed while the log
    /// still shows them, before the victim disappears from every index.
    fn rollback_victim(
        &mut self,
        victim: Trid,
        active: &mut BTreeMap<Trid, TxnProgress>,
        recovery: &mut RecoveryManager,
        db: &mut Database,
    ) -> Result<()> {
        recovery.rollback(db, victim)?;
        self.release_all(victim);
        self.waiting.remove(&victim);
        self.blocked_since.remove(&victim);
        active.remove(&victim);
        Ok(())
    }

    /// Clear all lock state
    pub fn close(&mut self) {
        self.lock_table.clear();
        self.waiting.clear();
        self.transaction_locks.clear();
        self.blocked_since.clear();
    }

    /// Holder sequence for `did`, when one exists
    pub fn holders(&self, did: Did) -> Option<&LockList> {
        self.lock_table.get(&did)
    }

    /// Items currently locked by `trid`
    pub fn locks_held_by(&self, trid: Trid) -> Option<&BTreeSet<Did>> {
        self.transaction_locks.get(&trid)
    }

    /// The request `trid` is blocked on, when it is waiting
    pub fn waiting_on(&self, trid: Trid) -> Option<(Did, LockMode)> {
        self.waiting.get(&trid).copied()
    }

    /// Cycle at which `trid` was first marked blocked, when it is marked
    pub fn blocked_at(&self, trid: Trid) -> Option<u64> {
        self.blocked_since.get(&trid).copied()
    }
}

#[cfg(test)]
mod tests;
