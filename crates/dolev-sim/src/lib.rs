//! Command-line driver for NSL model runs.
//!
//! ```text
//! dolev-sim
//!   ├─ SystemEnv      (seed entropy)
//!   ├─ run            (step or concurrent mode, then integrity check)
//!   └─ write_report   (CBOR run report)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod system_env;

use std::path::Path;

use dolev_harness::{RunReport, SimConfig, SimEnv, Simulation, Verdict, execute_concurrent};
pub use error::CliError;
pub use system_env::SystemEnv;

/// How participants are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Mode {
    /// One thread applying seeded steps; reproducible.
    Step,
    /// Tokio tasks; the scheduler picks the interleaving.
    Concurrent,
}

/// Everything a run needs.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Seed of the run's environment.
    pub seed: u64,
    /// Scheduling mode.
    pub mode: Mode,
    /// Population and step counts.
    pub config: SimConfig,
}

/// Execute one run and judge it.
///
/// A broken integrity property is not an error here: it is the report's
/// verdict. Errors are model faults only.
pub async fn run(options: &RunOptions) -> Result<RunReport, CliError> {
    let env = SimEnv::with_seed(options.seed);
    let seed = env.seed();
    let config = options.config.clone();

    let report = match options.mode {
        Mode::Step => {
            let mut sim = Simulation::new(config.clone())?;
            for _ in 0..config.steps {
                let step = sim.random_step(&env);
                sim.apply(&step)?;
            }
            RunReport::new(seed, config, sim.summary(), sim.world(), sim.journal())
        },
        Mode::Concurrent => {
            let run = execute_concurrent(config.clone(), env).await?;
            RunReport::new(seed, config, run.summary.clone(), &run.world, &run.journal)
        },
    };

    tracing::info!(
        seed,
        mode = ?options.mode,
        world = report.world.len(),
        verdict = ?report.verdict,
        "run finished"
    );
    Ok(report)
}

/// Turn a violated verdict into an error.
pub fn verdict(report: &RunReport) -> Result<(), CliError> {
    match &report.verdict {
        Verdict::Holds => Ok(()),
        Verdict::Violated { reason } => {
            Err(CliError::Violated { seed: report.seed, reason: reason.clone() })
        },
    }
}

/// Write `report` to `path` as CBOR.
pub fn write_report(path: &Path, report: &RunReport) -> Result<(), CliError> {
    let bytes = report.to_cbor()?;
    std::fs::write(path, bytes)
        .map_err(|source| CliError::Io { path: path.to_path_buf(), source })?;
    tracing::info!(path = %path.display(), "report written");
    Ok(())
}
