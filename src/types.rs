//! Core domain types shared across components

/// Transaction ID
pub type Trid = u64;

/// Data item ID - an index into the fixed-width page
pub type Did = usize;

/// A single bit value, restricted to 0 or 1 by validation at the edges
pub type Bit = u8;

/// Width of the database page in bits
pub const PAGE_WIDTH: usize = 32;

/// Per-transaction progress tracked by the cycle driver
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxnProgress {
    /// Operations performed so far (failed lock acquisitions count too)
    pub ops_done: u32,
    /// Data item touched by the most recent operation
    pub last_did: Option<Did>,
}

impl TxnProgress {
    pub fn new() -> Self {
        Self::default()
    }
}
