//! Write-ahead logging and crash recovery
//!
//! The log is an append-only CSV file scanned forward and backward during
//! recovery. Update records carry pre-images; recovery is analysis, redo,
//! undo over the same on-disk log.

pub mod log;
pub mod recovery;
pub mod store;

pub use self::log::LogRecord;
pub use self::recovery::RecoveryManager;
pub use self::store::LogStore;
