//! Workload generation
//!
//! The driver consumes three kinds of draws per cycle: whether a new
//! transaction starts, which data item an operation touches, and whether
//! the operation is a write. The trait keeps the driver independent of
//! where the draws come from; tests substitute a scripted sequence.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::types::{Did, PAGE_WIDTH};

/// Source of the per-cycle draws `(start?, did, write?)`
pub trait Workload {
    /// Does a new transaction start this cycle?
    fn starts_transaction(&mut self) -> bool;

    /// Which data item does the next operation touch?
    fn pick_item(&mut self) -> Did;

    /// Is the next operation a write?
    fn is_write(&mut self) -> bool;
}

/// Seeded random workload with configurable start and write probabilities
pub struct RandomWorkload {
    rng: StdRng,
    start_prob: f64,
    write_prob: f64,
}

impl RandomWorkload {
    pub fn new(seed: u64, start_prob: f64, write_prob: f64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            start_prob,
            write_prob,
        }
    }
}

impl Workload for RandomWorkload {
    fn starts_transaction(&mut self) -> bool {
        self.rng.gen::<f64>() < self.start_prob
    }

    fn pick_item(&mut self) -> Did {
        self.rng.gen_range(0..PAGE_WIDTH)
    }

    fn is_write(&mut self) -> bool {
        self.rng.gen::<f64>() < self.write_prob
    }
}

/// Deterministic workload replaying queued draws; every queue falls back
/// to a fixed default (`false` / item 0) once exhausted.
#[derive(Default)]
pub struct ScriptedWorkload {
    starts: VecDeque<bool>,
    items: VecDeque<Did>,
    writes: VecDeque<bool>,
}

impl ScriptedWorkload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_start(&mut self, start: bool) {
        self.starts.push_back(start);
    }

    pub fn queue_item(&mut self, did: Did) {
        self.items.push_back(did);
    }

    pub fn queue_write(&mut self, write: bool) {
        self.writes.push_back(write);
    }
}

impl Workload for ScriptedWorkload {
    fn starts_transaction(&mut self) -> bool {
        self.starts.pop_front().unwrap_or(false)
    }

    fn pick_item(&mut self) -> Did {
        self.items.pop_front().unwrap_or(0)
    }

    fn is_write(&mut self) -> bool {
        self.writes.pop_front().unwrap_or(false)
    }
}
