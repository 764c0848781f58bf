//! The cycle driver
//!
//! Owns the page, lock manager, and recovery manager and walks them
//! through discrete logical cycles. Each cycle may start one transaction,
//! advances every active transaction by one operation (a failed lock
//! acquisition still consumes the slot), commits transactions that have
//! done their configured work, and ends with a deadlock detection pass.
//!
//! On the write path the update's pre-image is logged strictly before the
//! page write - the write-ahead discipline recovery depends on.

use std::collections::{BTreeMap, BTreeSet};

use crate::database::Database;
use crate::error::Result;
use crate::locks::{LockManager, LockMode};
use crate::types::{Trid, TxnProgress};
use crate::wal::{LogRecord, RecoveryManager};
use crate::Config;
use super::workload::Workload;

/// A full simulation run over one data directory
pub struct Simulation {
    config: Config,
    db: Database,
    locks: LockManager,
    recovery: RecoveryManager,
    /// Next transaction id to hand out
    next_trid: Trid,
    /// Active transactions and their progress
    active: BTreeMap<Trid, TxnProgress>,
    /// Transactions that committed during this run
    completed: BTreeSet<Trid>,
}

impl Simulation {
    /// Construct the components and bring the system to a consistent
    /// state: crash recovery runs here, and its result seeds the
    /// transaction id counter past every recovered id.
    pub fn new(config: Config) -> Result<Self> {
        let mut db = Database::new(&config.data_dir)?;
        let mut recovery = RecoveryManager::new(&config.data_dir)?;
        let max_trid = recovery.recover(&mut db)?;

        let locks = LockManager::new(config.rollback_prob, config.timeout, config.seed);

        Ok(Self {
            next_trid: max_trid + 1,
            config,
            db,
            locks,
            recovery,
            active: BTreeMap::new(),
            completed: BTreeSet::new(),
        })
    }

    /// Run the configured number of cycles against `workload`
    pub fn run<W: Workload>(&mut self, workload: &mut W) -> Result<()> {
        for cycle in 0..self.config.cycles {
            self.run_cycle(workload, cycle)?;
        }

        log::info!(
            "simulation finished: {} committed, {} still active",
            self.completed.len(),
            self.active.len()
        );
        Ok(())
    }

    /// One logical cycle of the transaction lifecycle
    pub fn run_cycle<W: Workload>(&mut self, workload: &mut W, cycle: u64) -> Result<()> {
        if workload.starts_transaction() {
            let trid = self.next_trid;
            self.next_trid += 1;
            self.active.insert(trid, TxnProgress::new());
            self.recovery.log_start(trid)?;
            log::debug!("cycle {}: txn {} started", cycle, trid);
        }

        // Snapshot the ids: commits below mutate the map mid-iteration
        let snapshot: Vec<Trid> = self.active.keys().copied().collect();
        for trid in snapshot {
            let progress = match self.active.get(&trid) {
                Some(progress) => *progress,
                None => continue,
            };

            if progress.ops_done < self.config.trans_size {
                let did = workload.pick_item();
                if workload.is_write() {
                    if let Some(old) = self.db.read(did) {
                        let new = 1 - old;
                        if self.locks.acquire(trid, did, LockMode::Exclusive) {
                            // Pre-image to the log before the page sees the
                            // new value
                            self.recovery.log_update(trid, did, old)?;
                            self.db.write(trid, did, new)?;
                        }
                    }
                } else if self.locks.acquire(trid, did, LockMode::Shared) {
                    self.db.read(did);
                }

                // The slot is spent whether or not the lock was granted
                self.active.insert(
                    trid,
                    TxnProgress {
                        ops_done: progress.ops_done + 1,
                        last_did: Some(did),
                    },
                );
            } else {
                self.recovery.log_commit(trid)?;
                self.locks.release_all(trid);
                self.active.remove(&trid);
                self.completed.insert(trid);
                log::debug!("cycle {}: txn {} committed", cycle, trid);
            }
        }

        self.locks
            .detect_deadlock(&mut self.active, &mut self.recovery, &mut self.db, cycle)?;

        Ok(())
    }

    /// Flush the log, drop all lock state, and report the final page image
    pub fn shutdown(mut self) -> Result<()> {
        self.recovery.close()?;
        self.locks.close();
        self.db.close();
        Ok(())
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.locks
    }

    pub fn active(&self) -> &BTreeMap<Trid, TxnProgress> {
        &self.active
    }

    pub fn completed(&self) -> &BTreeSet<Trid> {
        &self.completed
    }

    pub fn next_trid(&self) -> Trid {
        self.next_trid
    }

    /// Snapshot of the on-disk log (flushes buffered records first)
    pub fn log_records(&mut self) -> Result<Vec<LogRecord>> {
        self.recovery.records()
    }
}
