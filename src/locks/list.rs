//! Ordered lock holder sequences
//!
//! Holders for one data item form an insertion-ordered sequence so that
//! waiters can observe which holders precede them. Lookup is a linear scan
//! by transaction id; the sequences stay tiny.

use crate::types::Trid;

/// Lock mode for a granted or requested lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Shared (read) lock
    Shared,
    /// Exclusive (write) lock
    Exclusive,
}

impl LockMode {
    /// Two locks are compatible only when both are shared
    pub fn compatible_with(self, other: LockMode) -> bool {
        matches!((self, other), (LockMode::Shared, LockMode::Shared))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LockMode::Shared => "S",
            LockMode::Exclusive => "X",
        }
    }
}

/// A granted lock: `(transaction, mode)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockEntry {
    pub trid: Trid,
    pub mode: LockMode,
}

/// Insertion-ordered holder sequence for a single data item.
///
/// Invariants maintained by the lock manager: at most one exclusive holder,
/// an exclusive holder is the sole holder, and a transaction appears at
/// most once.
#[derive(Debug, Default)]
pub struct LockList {
    entries: Vec<LockEntry>,
}

impl LockList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a holder at the tail, preserving grant order
    pub fn append(&mut self, entry: LockEntry) {
        self.entries.push(entry);
    }

    /// Remove the holder owned by `trid`; reports whether one was present
    pub fn remove(&mut self, trid: Trid) -> bool {
        match self.entries.iter().position(|e| e.trid == trid) {
            Some(pos) => {
                self.entries.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Find the holder owned by `trid`
    pub fn find(&self, trid: Trid) -> Option<&LockEntry> {
        self.entries.iter().find(|e| e.trid == trid)
    }

    /// Switch `trid`'s holder to exclusive mode in place
    pub fn upgrade(&mut self, trid: Trid) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.trid == trid) {
            entry.mode = LockMode::Exclusive;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &LockEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
