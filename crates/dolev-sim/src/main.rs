//! dolev-sim binary.
//!
//! # Usage
//!
//! ```bash
//! # Reproducible step run
//! dolev-sim --seed 42 --honest 3 --bad 1 --steps 5000
//!
//! # Concurrent run with a CBOR report
//! dolev-sim --mode concurrent --sessions 16 --report run.cbor
//! ```

use std::path::PathBuf;

use clap::Parser;
use dolev_core::Environment;
use dolev_harness::SimConfig;
use dolev_sim::{Mode, RunOptions, SystemEnv};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// NSL model checker
#[derive(Parser, Debug)]
#[command(name = "dolev-sim")]
#[command(about = "Runs the Needham-Schroeder-Lowe handshake against a Dolev-Yao adversary")]
#[command(version)]
struct Args {
    /// Seed of the run (drawn from the OS if omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Scheduling mode
    #[arg(long, value_enum, default_value = "step")]
    mode: Mode,

    /// Good principals
    #[arg(long, default_value = "2")]
    honest: usize,

    /// Bad principals controlled by the adversary from the start
    #[arg(long, default_value = "1")]
    bad: usize,

    /// Scheduler steps (step mode) or adversary actions (concurrent mode)
    #[arg(long, default_value = "500")]
    steps: usize,

    /// Initiator sessions (concurrent mode)
    #[arg(long, default_value = "4")]
    sessions: usize,

    /// Receives per concurrent participant
    #[arg(long, default_value = "256")]
    budget: usize,

    /// Write a CBOR run report here
    #[arg(long)]
    report: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let seed = args.seed.unwrap_or_else(|| SystemEnv::new().random_u64());
    tracing::info!(seed, mode = ?args.mode, "dolev-sim starting");

    let options = RunOptions {
        seed,
        mode: args.mode,
        config: SimConfig {
            honest: args.honest,
            bad: args.bad,
            steps: args.steps,
            sessions: args.sessions,
            receive_budget: args.budget,
            ..SimConfig::default()
        },
    };

    let report = dolev_sim::run(&options).await?;
    if let Some(path) = &args.report {
        dolev_sim::write_report(path, &report)?;
    }
    dolev_sim::verdict(&report)?;

    tracing::info!(summary = ?report.summary, "integrity holds");
    Ok(())
}
