//! Log record shapes and their CSV codec
//!
//! One record per line, comma-separated, no header:
//!
//! ```text
//! trid,S                  start
//! trid,did,old_value,F    update (pre-image)
//! trid,C                  commit
//! trid,R                  rollback
//! ```
//!
//! The line index is the record's logical sequence number. Parsing is
//! tolerant: anything that does not match a shape yields `None` and the
//! scan moves on.

use csv::StringRecord;

use crate::types::{Bit, Did, Trid};

/// A single write-ahead log record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRecord {
    /// Transaction started
    Start { trid: Trid },
    /// A bit was overwritten; `old_value` is the pre-image
    Update { trid: Trid, did: Did, old_value: Bit },
    /// Transaction committed
    Commit { trid: Trid },
    /// Transaction rolled back
    Rollback { trid: Trid },
}

impl LogRecord {
    /// The transaction this record belongs to
    pub fn trid(&self) -> Trid {
        match *self {
            LogRecord::Start { trid }
            | LogRecord::Update { trid, .. }
            | LogRecord::Commit { trid }
            | LogRecord::Rollback { trid } => trid,
        }
    }

    /// CSV fields in file order
    pub fn fields(&self) -> Vec<String> {
        match *self {
            LogRecord::Start { trid } => vec![trid.to_string(), "S".to_string()],
            LogRecord::Update { trid, did, old_value } => vec![
                trid.to_string(),
                did.to_string(),
                old_value.to_string(),
                "F".to_string(),
            ],
            LogRecord::Commit { trid } => vec![trid.to_string(), "C".to_string()],
            LogRecord::Rollback { trid } => vec![trid.to_string(), "R".to_string()],
        }
    }

    /// Decode one CSV row; `None` when it matches no record shape
    pub fn parse(row: &StringRecord) -> Option<LogRecord> {
        match row.len() {
            2 => {
                let trid: Trid = row.get(0)?.parse().ok()?;
                match row.get(1)? {
                    "S" => Some(LogRecord::Start { trid }),
                    "C" => Some(LogRecord::Commit { trid }),
                    "R" => Some(LogRecord::Rollback { trid }),
                    _ => None,
                }
            }
            4 => {
                if row.get(3)? != "F" {
                    return None;
                }
                let trid: Trid = row.get(0)?.parse().ok()?;
                let did: Did = row.get(1)?.parse().ok()?;
                let old_value: Bit = row.get(2)?.parse().ok()?;
                if old_value > 1 {
                    return None;
                }
                Some(LogRecord::Update { trid, did, old_value })
            }
            _ => None,
        }
    }
}
