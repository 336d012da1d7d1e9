//! Simulation harness for the NSL model.
//!
//! Drives honest sessions and a Dolev-Yao adversary over one shared world,
//! then checks that nothing the adversary did broke secrecy or
//! authentication.
//!
//! # Modes
//!
//! - Step mode ([`Simulation`]): a single thread applies [`Step`]s, so a
//!   seed or a step list reproduces a run exactly. Used by proptest and the
//!   fuzzer.
//! - Concurrent mode ([`run_concurrent`]): sessions and the adversary are
//!   tokio tasks and the scheduler picks the interleaving.
//!
//! Both modes report into a [`Journal`] and are judged by the same
//! [`IntegrityChecker`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod adversary;
pub mod config;
pub mod error;
pub mod integrity;
pub mod journal;
pub mod report;
pub mod runtime;
pub mod setup;
pub mod sim_env;
pub mod simulation;

pub use adversary::{Abandoned, ActionOutcome, Adversary, AdversaryAction, Selector};
pub use config::SimConfig;
pub use error::SimError;
pub use integrity::{IntegrityChecker, Violation};
pub use journal::{Journal, Role, SessionEvent};
pub use report::{RunReport, Verdict};
pub use runtime::{ConcurrentRun, execute_concurrent, run_concurrent};
pub use setup::{NslWorld, Population};
pub use sim_env::SimEnv;
pub use simulation::{RunSummary, Simulation, Step, StepOutcome};
