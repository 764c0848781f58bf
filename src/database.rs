//! The bit-valued database page
//!
//! A fixed-width array of 32 bits backed by `data/db.txt`. The in-memory
//! image is the authoritative value visible to readers; persistence is
//! buffered and flushed every 25th write (or on demand). Durability is
//! entirely the write-ahead log's job: the page itself makes no promise
//! beyond "the on-disk image equals the in-memory image after `flush`".

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::types::{Bit, Did, Trid, PAGE_WIDTH};

/// Every `FLUSH_INTERVAL`-th write triggers an automatic flush
pub const FLUSH_INTERVAL: u32 = 25;

/// The database page and its buffered persistence state
pub struct Database {
    /// Path to the data file
    data_path: PathBuf,
    /// In-memory page image - the authoritative value
    bits: [Bit; PAGE_WIDTH],
    /// Writes since the last flush
    write_count: u32,
}

impl Database {
    /// Open the page in `data_dir`, creating the directory and an all-zero
    /// data file when missing. A wrong-length or non-bit file is treated as
    /// all zeros.
    pub fn new(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)?;

        let mut db = Self {
            data_path: data_dir.join("db.txt"),
            bits: [0; PAGE_WIDTH],
            write_count: 0,
        };

        if db.data_path.exists() {
            db.load()?;
        } else {
            db.flush()?;
        }

        Ok(db)
    }

    /// Load the on-disk image, keeping the all-zero default when malformed
    fn load(&mut self) -> Result<()> {
        let raw = fs::read_to_string(&self.data_path)?;
        let image = raw.trim();

        if image.len() == PAGE_WIDTH && image.bytes().all(|b| b == b'0' || b == b'1') {
            for (did, byte) in image.bytes().enumerate() {
                self.bits[did] = byte - b'0';
            }
        } else {
            log::warn!(
                "data file '{}' is malformed; starting from an all-zero page",
                self.data_path.display()
            );
        }

        Ok(())
    }

    /// Read the bit at `did`, or `None` when out of range
    pub fn read(&self, did: Did) -> Option<Bit> {
        self.bits.get(did).copied()
    }

    /// Write `value` at `did` on behalf of `trid`.
    ///
    /// Out-of-range indexes and non-bit values are silently ignored; the
    /// interface is total. Every `FLUSH_INTERVAL`-th accepted write flushes
    /// the page.
    pub fn write(&mut self, trid: Trid, did: Did, value: Bit) -> Result<()> {
        if did >= PAGE_WIDTH || value > 1 {
            return Ok(());
        }

        self.bits[did] = value;
        self.write_count += 1;
        log::debug!("txn {} wrote bit {} = {}", trid, did, value);

        if self.write_count % FLUSH_INTERVAL == 0 {
            self.flush()?;
        }

        Ok(())
    }

    /// Overwrite `did` with a logged pre-image, bypassing write counting.
    ///
    /// Used by recovery-driven undo; emits no log record and never flushes.
    pub fn rollback(&mut self, did: Did, old_value: Bit) {
        if did < PAGE_WIDTH && old_value <= 1 {
            self.bits[did] = old_value;
        }
    }

    /// Write the full page image to disk and reset the write counter
    pub fn flush(&mut self) -> Result<()> {
        let temp_path = self.data_path.with_extension("txt.tmp");
        fs::write(&temp_path, self.image())?;

        // Atomic rename for crash safety
        fs::rename(&temp_path, &self.data_path)?;

        log::debug!("page flushed after {} writes", self.write_count);
        self.write_count = 0;
        Ok(())
    }

    /// The page as a 32-character string of '0' and '1'
    pub fn image(&self) -> String {
        self.bits.iter().map(|&b| char::from(b'0' + b)).collect()
    }

    /// Report the final in-memory image. Deliberately does not flush: the
    /// end of a run simulates a crash, and recovery must repair the rest.
    pub fn close(&self) {
        println!("Database Internal State Before Crash:");
        println!("{}", self.image());
    }

    /// Restore the all-zero image in memory and on disk
    pub fn reset(&mut self) -> Result<()> {
        self.bits = [0; PAGE_WIDTH];
        self.flush()
    }
}
