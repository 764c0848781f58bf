//! minitxn - a minimal transactional storage simulator
//!
//! Runs a configurable number of logical cycles in which randomly driven
//! transactions read and flip bits of a tiny page under strict two-phase
//! locking, with every update write-ahead logged. Ending a run simulates a
//! crash; the next start (or `--recover`) repairs the page from the log.

use std::path::PathBuf;

use log::info;

use minitxn::sim::RandomWorkload;
use minitxn::{Config, Simulation};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();

    let mut config = Config::default();
    let mut recover_only = false;
    let mut seed: Option<u64> = None;
    let mut positional: Vec<String> = Vec::new();

    // Simple argument parsing
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--recover" => {
                recover_only = true;
            }
            "--data-dir" | "-d" => {
                if i + 1 < args.len() {
                    config.data_dir = PathBuf::from(&args[i + 1]);
                    i += 1;
                }
            }
            "--seed" | "-s" => {
                if i + 1 < args.len() {
                    seed = Some(args[i + 1].parse()?);
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("minitxn - a minimal transactional storage simulator");
                println!();
                println!("Usage: minitxn [OPTIONS] [cycles] [trans_size] [start_prob] [write_prob] [rollback_prob] [timeout]");
                println!();
                println!("Positional arguments:");
                println!("  cycles          Number of simulation cycles (default: 0)");
                println!("  trans_size      Operations per transaction (default: 0)");
                println!("  start_prob      Probability a transaction starts per cycle (default: 0.0)");
                println!("  write_prob      Probability an operation is a write (default: 0.0)");
                println!("  rollback_prob   Probability a deadlock victim rolls back at once (default: 0.0)");
                println!("  timeout         Blocked cycles before forced rollback (default: 0)");
                println!();
                println!("Options:");
                println!("  --recover           Run crash recovery and exit");
                println!("  -d, --data-dir DIR  Data directory (default: ./data)");
                println!("  -s, --seed N        Seed for reproducible runs (default: random)");
                println!("  -h, --help          Show this help");
                return Ok(());
            }
            arg => {
                positional.push(arg.to_string());
            }
        }
        i += 1;
    }

    if let Some(v) = positional.first() {
        config.cycles = v.parse()?;
    }
    if let Some(v) = positional.get(1) {
        config.trans_size = v.parse()?;
    }
    if let Some(v) = positional.get(2) {
        config.start_prob = v.parse()?;
    }
    if let Some(v) = positional.get(3) {
        config.write_prob = v.parse()?;
    }
    if let Some(v) = positional.get(4) {
        config.rollback_prob = v.parse()?;
    }
    if let Some(v) = positional.get(5) {
        config.timeout = v.parse()?;
    }
    config.seed = seed.unwrap_or_else(rand::random);

    info!("Starting minitxn (seed {})...", config.seed);

    // Construction runs crash recovery
    let mut sim = Simulation::new(config.clone())?;

    if recover_only {
        return Ok(());
    }

    let mut workload = RandomWorkload::new(config.seed, config.start_prob, config.write_prob);
    sim.run(&mut workload)?;
    sim.shutdown()?;

    Ok(())
}
