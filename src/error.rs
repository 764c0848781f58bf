//! Error types for minitxn
//!
//! Defines a unified error type that can represent errors from all components.
//! I/O faults are fatal: they propagate up to `main` and terminate the run
//! with a diagnostic. Everything else (out-of-range page indexes, malformed
//! log records, a corrupt data file) has a defined local disposition and
//! never surfaces as an error.

use std::fmt;
use std::io;

/// Unified error type for minitxn operations
#[derive(Debug)]
pub enum MiniTxnError {
    /// I/O error (data file or log file operations)
    Io(io::Error),
    /// CSV-level error while reading or writing the transaction log
    Csv(String),
}

impl fmt::Display for MiniTxnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MiniTxnError::Io(e) => write!(f, "{}", e),
            MiniTxnError::Csv(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for MiniTxnError {}

impl From<io::Error> for MiniTxnError {
    fn from(e: io::Error) -> Self {
        MiniTxnError::Io(e)
    }
}

impl From<csv::Error> for MiniTxnError {
    fn from(e: csv::Error) -> Self {
        MiniTxnError::Csv(e.to_string())
    }
}

/// Result type alias for minitxn operations
pub type Result<T> = std::result::Result<T, MiniTxnError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_display() {
        let err = MiniTxnError::from(io::Error::new(io::ErrorKind::NotFound, "no such file"));
        assert_eq!(err.to_string(), "no such file");
    }

    #[test]
    fn test_csv_error_carries_message() {
        let err = MiniTxnError::Csv("bad row".to_string());
        assert_eq!(err.to_string(), "bad row");
    }
}
