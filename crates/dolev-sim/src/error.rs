//! CLI error types.

use std::path::PathBuf;

use dolev_core::CodecError;
use dolev_harness::SimError;
use thiserror::Error;

/// Errors that end a CLI run.
#[derive(Debug, Error)]
pub enum CliError {
    /// The model faulted or could not be set up.
    #[error(transparent)]
    Sim(#[from] SimError),

    /// The report could not be encoded.
    #[error("report encoding: {0}")]
    Codec(#[from] CodecError),

    /// The report could not be written.
    #[error("writing {}: {source}", path.display())]
    Io {
        /// Report path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The run finished but broke an integrity property.
    #[error("integrity violated (seed {seed}): {reason}")]
    Violated {
        /// Seed that reproduces the run in step mode.
        seed: u64,
        /// The violation.
        reason: String,
    },
}
