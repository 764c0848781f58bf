//! minitxn - a minimal transactional storage simulator
//!
//! This is an educational implementation demonstrating core database
//! concepts:
//! - Strict two-phase locking with deadlock detection and victim rollback
//! - Write-ahead logging with analysis/redo/undo crash recovery
//! - A tiny bit-valued page with buffered persistence
//! - Single-threaded cooperative scheduling over logical cycles
//!
//! Architecture Overview:
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Cycle Driver                           │
//! │      (transaction lifecycle, one deadlock pass per cycle)   │
//! └─────────────────────────────────────────────────────────────┘
//!            │                    │                    │
//!            ▼                    ▼                    ▼
//! ┌──────────────────┐ ┌──────────────────┐ ┌──────────────────┐
//! │   Lock Manager   │ │ Recovery Manager │ │  Database Page   │
//! │ (2PL, wait-for   │ │ (WAL, rollback,  │ │ (32 bits,        │
//! │  graph, timeouts)│─▶  crash recovery) │ │  buffered flush) │
//! └──────────────────┘ └──────────────────┘ └──────────────────┘
//!                               │                    │
//!                               ▼                    ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       File System                           │
//! │                (data/log.csv, data/db.txt)                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The lock manager calls into the recovery manager only to roll a victim
//! back; the recovery manager never calls the lock manager.

use std::path::PathBuf;

pub mod database;
pub mod error;
pub mod locks;
pub mod sim;
pub mod types;
pub mod wal;

pub use error::{MiniTxnError, Result};
pub use sim::Simulation;

/// Simulation configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Number of cycles to run
    pub cycles: u64,
    /// Operations each transaction performs before committing
    pub trans_size: u32,
    /// Probability that a new transaction starts per cycle
    pub start_prob: f64,
    /// Probability that an operation is a write
    pub write_prob: f64,
    /// Probability that a deadlock victim is rolled back immediately
    pub rollback_prob: f64,
    /// Cycles a blocked transaction may wait before forced rollback
    pub timeout: u64,
    /// Directory for the data and log files
    pub data_dir: PathBuf,
    /// Seed for every random draw in the run
    pub seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cycles: 0,
            trans_size: 0,
            start_prob: 0.0,
            write_prob: 0.0,
            rollback_prob: 0.0,
            timeout: 0,
            data_dir: PathBuf::from("./data"),
            seed: 0,
        }
    }
}
