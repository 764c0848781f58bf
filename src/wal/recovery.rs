//! Recovery Manager for minitxn
//!
//! Emits write-ahead log records, reverses single transactions, and
//! performs full crash recovery.
//!
//! ### Write-ahead discipline
//! Callers must log an update's pre-image before writing the new value to
//! the page. That ordering is the only thing that makes recovery correct;
//! the cycle driver enforces it and the test suite pins it.
//!
//! ### Buffering
//! Records accumulate in a small in-memory buffer. Transaction boundaries
//! (start, commit, rollback) flush immediately; updates flush once the
//! buffer holds `LOG_BUFFER_CAPACITY` records. `rollback` and `recover`
//! flush first so every earlier update is on disk before being read back.
//!
//! ### Crash recovery
//! Three passes over the same on-disk log:
//! 1. **Analysis** (forward): reconstruct the still-active and rolled-back
//!    transaction sets and the highest transaction id.
//! 2. **Redo** (forward): reapply every update by toggling the bit - the
//!    only mutation the system performs is a flip, and the logged value is
//!    the pre-image, so the post-image is its complement.
//! 3. **Undo** (backward): restore pre-images for active and rolled-back
//!    transactions, appending a rollback record at each still-active
//!    transaction's start.
//!
//! After a successful recovery the log is truncated.

use std::collections::BTreeSet;
use std::path::Path;

use crate::database::Database;
use crate::error::Result;
use crate::types::{Bit, Did, Trid};
use super::log::LogRecord;
use super::store::LogStore;

/// Update records are buffered up to this many before being forced out
pub const LOG_BUFFER_CAPACITY: usize = 25;

/// Manages the transaction log and recovery from it
pub struct RecoveryManager {
    store: LogStore,
    /// Pending records not yet on disk
    buffer: Vec<LogRecord>,
}

impl RecoveryManager {
    pub fn new(data_dir: &Path) -> Result<Self> {
        Ok(Self {
            store: LogStore::new(data_dir)?,
            buffer: Vec::new(),
        })
    }

    /// Log the start of a transaction (flushed immediately)
    pub fn log_start(&mut self, trid: Trid) -> Result<()> {
        self.buffer.push(LogRecord::Start { trid });
        self.flush_log()
    }

    /// Log an update's pre-image. Must be called before the page write.
    pub fn log_update(&mut self, trid: Trid, did: Did, old_value: Bit) -> Result<()> {
        self.buffer.push(LogRecord::Update { trid, did, old_value });
        if self.buffer.len() >= LOG_BUFFER_CAPACITY {
            self.flush_log()?;
        }
        Ok(())
    }

    /// Log a commit (flushed immediately)
    pub fn log_commit(&mut self, trid: Trid) -> Result<()> {
        self.buffer.push(LogRecord::Commit { trid });
        self.flush_log()
    }

    /// Log a rollback (flushed immediately)
    pub fn log_rollback(&mut self, trid: Trid) -> Result<()> {
        self.buffer.push(LogRecord::Rollback { trid });
        self.flush_log()
    }

    /// Write any buffered records to disk
    fn flush_log(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        log::debug!("flushing {} buffered log records", self.buffer.len());
        self.store.append(&self.buffer)?;
        self.buffer.clear();
        Ok(())
    }

    /// Reverse every logged update of `trid` and append a rollback record.
    ///
    /// Scans the log backward, restoring pre-images until the transaction's
    /// start record. A transaction with no log presence gets only the
    /// rollback record.
    pub fn rollback(&mut self, db: &mut Database, trid: Trid) -> Result<()> {
        self.flush_log()?;

        let records = self.store.records()?;
        for record in records.iter().rev() {
            match *record {
                LogRecord::Start { trid: t } if t == trid => break,
                LogRecord::Update { trid: t, did, old_value } if t == trid => {
                    db.rollback(did, old_value);
                }
                _ => {}
            }
        }

        self.log_rollback(trid)
    }

    /// Full crash recovery. Returns the highest transaction id observed in
    /// the log; the caller seeds its counter past it so recovered ids are
    /// never reused.
    pub fn recover(&mut self, db: &mut Database) -> Result<Trid> {
        self.flush_log()?;

        log::info!("starting recovery from the transaction log...");
        let records = self.store.records()?;

        // Phase 1: Analysis
        let mut active: BTreeSet<Trid> = BTreeSet::new();
        let mut rolled_back: BTreeSet<Trid> = BTreeSet::new();
        let mut max_trid: Trid = 0;

        for record in &records {
            match *record {
                LogRecord::Start { trid } => {
                    active.insert(trid);
                    max_trid = max_trid.max(trid);
                }
                LogRecord::Commit { trid } => {
                    active.remove(&trid);
                }
                LogRecord::Rollback { trid } => {
                    rolled_back.insert(trid);
                    active.remove(&trid);
                }
                LogRecord::Update { .. } => {}
            }
        }

        // Phase 2: Redo - every logged update was a flip of the pre-image
        for record in &records {
            if let LogRecord::Update { trid, did, .. } = *record {
                if let Some(current) = db.read(did) {
                    db.write(trid, did, 1 - current)?;
                }
            }
        }
        db.flush()?;

        // Phase 3: Undo losers back to front
        for record in records.iter().rev() {
            match *record {
                LogRecord::Update { trid, did, old_value }
                    if active.contains(&trid) || rolled_back.contains(&trid) =>
                {
                    db.rollback(did, old_value);
                }
                LogRecord::Start { trid } if active.contains(&trid) => {
                    self.log_rollback(trid)?;
                    active.remove(&trid);
                }
                LogRecord::Start { trid } => {
                    rolled_back.remove(&trid);
                }
                _ => {}
            }
        }
        db.flush()?;

        self.store.truncate()?;
        log::info!(
            "recovery complete; highest transaction id in the log was {}",
            max_trid
        );

        Ok(max_trid)
    }

    /// Flush remaining buffered records before shutdown
    pub fn close(&mut self) -> Result<()> {
        self.flush_log()
    }

    /// Flush, then snapshot the on-disk log (used by tests and tooling)
    pub fn records(&mut self) -> Result<Vec<LogRecord>> {
        self.flush_log()?;
        self.store.records()
    }
}
