//! The cycle driver and its workload seam
//!
//! Scheduling is single-threaded cooperative over discrete logical cycles;
//! all nondeterminism flows through a seeded workload, so a fixed seed
//! reproduces a run byte-for-byte.

pub mod driver;
pub mod workload;

pub use driver::Simulation;
pub use workload::{RandomWorkload, ScriptedWorkload, Workload};
