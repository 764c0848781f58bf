//! Append-only log file access
//!
//! Owns `data/log.csv`. Handles are scoped to a single operation: append
//! opens, writes, flushes, and closes; scans read the whole file into a
//! record snapshot. Nothing reads the file while a writer holds it.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::Result;
use super::log::LogRecord;

/// The on-disk transaction log
pub struct LogStore {
    path: PathBuf,
}

impl LogStore {
    /// Open the store in `data_dir`, creating an empty log when missing
    pub fn new(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)?;

        let path = data_dir.join("log.csv");
        if !path.exists() {
            File::create(&path)?;
        }

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append records in issuance order
    pub fn append(&self, records: &[LogRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let file = OpenOptions::new().append(true).open(&self.path)?;
        let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(file);

        for record in records {
            writer.write_record(record.fields())?;
        }
        writer.flush()?;

        Ok(())
    }

    /// Forward scan of every readable record.
    ///
    /// Malformed rows are skipped with a warning; a backward scan is a
    /// reverse iteration over this snapshot.
    pub fn records(&self) -> Result<Vec<LogRecord>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&self.path)?;

        let mut records = Vec::new();
        for row in reader.records() {
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    log::warn!("skipping unreadable log row: {}", e);
                    continue;
                }
            };
            match LogRecord::parse(&row) {
                Some(record) => records.push(record),
                None => log::warn!("skipping malformed log record: {:?}", row),
            }
        }

        Ok(records)
    }

    /// Reset the log to an empty file
    pub fn truncate(&self) -> Result<()> {
        OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        Ok(())
    }
}
